use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// The scheduler's own durable runtime state, kept separate from logs and
/// settings. `pending_log` is the contract between a fired reminder and the
/// eventual log entry: true from the moment a notification is sent until the
/// user completes a log (possibly from another process, or after a restart).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerState {
    pub last_notification_time: Option<DateTime<Local>>,
    pub pending_log: bool,
}

/// Durability for [SchedulerState]. Writes must be synchronous: the scheduler
/// persists `pending_log` before invoking any callback that depends on it.
pub trait SchedulerStateStore: Send + Sync {
    fn load(&self) -> Result<SchedulerState>;
    fn save(&self, state: &SchedulerState) -> Result<()>;
}

pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(app_dir: &Path) -> Self {
        Self {
            path: app_dir.join("state.json"),
        }
    }
}

impl SchedulerStateStore for FileStateStore {
    fn load(&self) -> Result<SchedulerState> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(v) => Ok(v),
                Err(e) => {
                    warn!("Scheduler state file is corrupted, resetting: {e}");
                    Ok(SchedulerState::default())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SchedulerState::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, state: &SchedulerState) -> Result<()> {
        use std::io::Write;

        let raw = serde_json::to_vec_pretty(state)?;
        let mut file = std::fs::File::create(&self.path)?;
        file.write_all(&raw)?;
        // sync_all so the pending flag survives a crash right after a fire
        file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn state_survives_reload() -> Result<()> {
        let dir = tempdir()?;
        let store = FileStateStore::new(dir.path());

        assert_eq!(store.load()?, SchedulerState::default());

        let state = SchedulerState {
            last_notification_time: Some(Local::now()),
            pending_log: true,
        };
        store.save(&state)?;

        // a fresh handle simulates a process restart
        let reopened = FileStateStore::new(dir.path());
        assert_eq!(reopened.load()?, state);
        Ok(())
    }

    #[test]
    fn corrupted_state_resets_to_default() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join("state.json"), "{not json")?;
        let store = FileStateStore::new(dir.path());
        assert_eq!(store.load()?, SchedulerState::default());
        Ok(())
    }
}
