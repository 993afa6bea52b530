//! Personal productivity tracker: prompts you at configurable intervals to
//! self-rate the time slot that just passed, keeps the ratings on disk, and
//! renders daily timelines and summaries in the terminal.
//!
//! The interesting part lives in [scheduler]: slot boundary math aligned to
//! local midnight, quiet-hour suppression, and missed-reminder escalation.

pub mod cli;
pub mod notify;
pub mod scheduler;
pub mod stats;
pub mod storage;
pub mod utils;

use chrono::NaiveDate;

/// This is the standard way of converting a date into a storage key / file name.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
