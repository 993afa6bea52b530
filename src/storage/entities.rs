use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A single self-rated time slot, as stored on disk. One entry per
/// (date, slot_hour) pair under normal use; nothing enforces that, rendering
/// reconciles by `slot_hour` and takes the first match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: String,
    /// When the entry was written, not when the slot started.
    pub timestamp: DateTime<Utc>,
    pub date: NaiveDate,
    pub slot_start: DateTime<Local>,
    pub slot_end: DateTime<Local>,
    /// Fractional hour-of-day the slot begins at. This is the key slots are
    /// matched on, with [SLOT_HOUR_TOLERANCE](crate::scheduler::slots::SLOT_HOUR_TOLERANCE).
    pub slot_hour: f64,
    /// 0 = unknown, 1 = wasted, 2 = moderate, 3..=4 = productive.
    #[serde(default)]
    pub productivity: u8,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub source: LogSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSource {
    #[default]
    Manual,
}

/// Partial update applied to an existing entry. `category` is doubly optional
/// so a patch can distinguish "leave as is" from "clear the category".
#[derive(Debug, Clone, Default)]
pub struct LogPatch {
    pub productivity: Option<u8>,
    pub category: Option<Option<String>>,
    pub note: Option<String>,
}

impl LogEntry {
    pub fn apply(&mut self, patch: LogPatch) {
        if let Some(productivity) = patch.productivity {
            self.productivity = productivity;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(note) = patch.note {
            self.note = note;
        }
    }
}

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Ids are `<unix millis>-<process counter>`: unique enough for a single-user
/// store and sortable by creation time.
pub fn new_log_id(now: DateTime<Utc>) -> String {
    let n = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}-{n:04}", now.timestamp_millis())
}

/// An activity category a log entry can point at. The default set ships with
/// the settings defaults; users can add their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub emoji: String,
    #[serde(default)]
    pub is_default: bool,
}

impl Category {
    pub fn default_set() -> Vec<Category> {
        let defaults = [
            ("deep-work", "Deep Work", "🧠"),
            ("light-work", "Light Work", "💼"),
            ("eating", "Eating/Breaks", "🍽️"),
            ("rest", "Rest/Sleep", "😴"),
            ("leisure", "Leisure", "🎮"),
            ("other", "Other", "🚶"),
        ];
        defaults
            .into_iter()
            .map(|(id, name, emoji)| Category {
                id: id.into(),
                name: name.into(),
                emoji: emoji.into(),
                is_default: true,
            })
            .collect()
    }
}
