//! On-disk state, all under the application directory:
//!  - `records/` holds one JSON-lines file of log entries per local day.
//!  - `settings.json` holds user settings, merged over documented defaults.
//!  - `state.json` holds the scheduler's own durable runtime state and is
//!    written synchronously so a crash right after a reminder fired still
//!    leaves the pending flag recorded.

pub mod entities;
pub mod log_store;
pub mod settings;
pub mod state;

use chrono::{DateTime, Utc};
use serde::Serialize;

use entities::LogEntry;
use settings::Settings;

/// Full data dump produced by `prodpulse export`. Field names match the
/// original export format of the app so old dumps stay comparable.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub export_date: DateTime<Utc>,
    pub logs: Vec<LogEntry>,
    pub settings: Settings,
}
