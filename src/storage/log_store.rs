use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use fs4::tokio::AsyncFileExt;
use thiserror::Error;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
};
use tracing::{debug, warn};

use crate::date_key;

use super::entities::{LogEntry, LogPatch};

#[derive(Debug, Error)]
pub enum LogStoreError {
    /// Update/delete aimed at an id that is not on disk. Surfaced to the
    /// caller as-is; it never disturbs other state.
    #[error("log entry '{0}' not found")]
    NotFound(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Log entry persistence: one JSON-lines file per local day under the record
/// directory, named by [date_key]. Files are fs4-locked around reads and
/// rewrites so a CLI invocation and a running `serve` process don't interleave.
pub struct LogStore {
    record_dir: PathBuf,
}

impl LogStore {
    pub fn new(app_dir: &Path) -> Result<Self, std::io::Error> {
        let record_dir = app_dir.join("records");
        std::fs::create_dir_all(&record_dir)?;
        Ok(Self { record_dir })
    }

    fn day_path(&self, date: NaiveDate) -> PathBuf {
        self.record_dir.join(date_key(date))
    }

    pub async fn add(&self, entry: &LogEntry) -> Result<(), LogStoreError> {
        let file = File::options()
            .append(true)
            .create(true)
            .open(self.day_path(entry.date))
            .await?;
        file.lock_exclusive()?;
        let result = Self::append_line(file.try_clone().await?, entry).await;
        file.unlock_async().await?;
        result
    }

    async fn append_line(mut file: File, entry: &LogEntry) -> Result<(), LogStoreError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    pub async fn logs_for_date(&self, date: NaiveDate) -> Result<Vec<LogEntry>, LogStoreError> {
        let path = self.day_path(date);
        debug!("Reading records from {path:?}");
        let file = match File::open(&path).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };
        file.lock_shared()?;

        let buffer = BufReader::new(file.try_clone().await?);
        let mut lines = buffer.lines();
        let mut entries = vec![];
        while let Ok(Some(line)) = lines.next_line().await {
            match serde_json::from_str::<LogEntry>(&line) {
                Ok(v) => entries.push(v),
                Err(e) => {
                    // ignore illegal lines. Might happen after shutdowns
                    warn!("Found illegal json line in {path:?}: {e}")
                }
            }
        }

        file.unlock_async().await?;
        Ok(entries)
    }

    /// All stored days, oldest first.
    async fn stored_dates(&self) -> Result<Vec<NaiveDate>, LogStoreError> {
        let mut dir = tokio::fs::read_dir(&self.record_dir).await?;
        let mut dates = vec![];
        while let Some(dir_entry) = dir.next_entry().await? {
            let name = dir_entry.file_name();
            match NaiveDate::parse_from_str(&name.to_string_lossy(), "%Y-%m-%d") {
                Ok(date) => dates.push(date),
                Err(_) => warn!("Skipping unexpected file {name:?} in record dir"),
            }
        }
        dates.sort();
        Ok(dates)
    }

    pub async fn all_logs(&self) -> Result<Vec<LogEntry>, LogStoreError> {
        let mut logs = vec![];
        for date in self.stored_dates().await? {
            logs.extend(self.logs_for_date(date).await?);
        }
        Ok(logs)
    }

    pub async fn update(&self, id: &str, patch: LogPatch) -> Result<LogEntry, LogStoreError> {
        for date in self.stored_dates().await? {
            let mut entries = self.logs_for_date(date).await?;
            if let Some(entry) = entries.iter_mut().find(|e| e.id == id) {
                entry.apply(patch);
                let updated = entry.clone();
                self.rewrite_day(date, &entries).await?;
                return Ok(updated);
            }
        }
        Err(LogStoreError::NotFound(id.into()))
    }

    pub async fn delete(&self, id: &str) -> Result<(), LogStoreError> {
        for date in self.stored_dates().await? {
            let entries = self.logs_for_date(date).await?;
            let remaining: Vec<_> = entries.iter().filter(|e| e.id != id).cloned().collect();
            if remaining.len() != entries.len() {
                self.rewrite_day(date, &remaining).await?;
                return Ok(());
            }
        }
        Err(LogStoreError::NotFound(id.into()))
    }

    pub async fn clear_all(&self) -> Result<(), LogStoreError> {
        for date in self.stored_dates().await? {
            tokio::fs::remove_file(self.day_path(date)).await?;
        }
        Ok(())
    }

    async fn rewrite_day(
        &self,
        date: NaiveDate,
        entries: &[LogEntry],
    ) -> Result<(), LogStoreError> {
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.day_path(date))
            .await?;
        file.lock_exclusive()?;
        let result = Self::write_all_lines(file.try_clone().await?, entries).await;
        file.unlock_async().await?;
        result
    }

    async fn write_all_lines(mut file: File, entries: &[LogEntry]) -> Result<(), LogStoreError> {
        let mut buffer = Vec::<u8>::new();
        for entry in entries {
            serde_json::to_writer(&mut buffer, entry)?;
            buffer.push(b'\n');
        }
        file.write_all(&buffer).await?;
        file.flush().await?;
        Ok(())
    }
}
