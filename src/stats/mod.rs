//! Pure reduction of a day's log entries into aggregate hour totals and a
//! per-category breakdown. Every entry is assumed to represent one slot of the
//! currently configured interval; entries logged under an interval that has
//! since changed will misstate totals (see DESIGN.md, open questions).

use std::collections::HashMap;

use serde::Serialize;

use crate::storage::entities::LogEntry;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayStats {
    pub productive_hours: f64,
    pub moderate_hours: f64,
    pub wasted_hours: f64,
    pub unknown_hours: f64,
    pub total_logged: usize,
    /// Mean of the raw 0..=4 levels, unknown counted as 0.
    pub average_productivity: f64,
    /// Hours accumulated per category id.
    pub category_breakdown: HashMap<String, f64>,
}

pub fn aggregate(logs: &[LogEntry], interval_hours: f64) -> DayStats {
    let mut stats = DayStats {
        total_logged: logs.len(),
        ..DayStats::default()
    };
    if logs.is_empty() {
        return stats;
    }

    let mut total_productivity = 0u64;
    for log in logs {
        let bucket = match log.productivity {
            3 | 4 => &mut stats.productive_hours,
            2 => &mut stats.moderate_hours,
            1 => &mut stats.wasted_hours,
            _ => &mut stats.unknown_hours,
        };
        *bucket += interval_hours;
        total_productivity += u64::from(log.productivity);

        if let Some(category) = &log.category {
            *stats
                .category_breakdown
                .entry(category.clone())
                .or_insert(0.0) += interval_hours;
        }
    }

    stats.average_productivity = total_productivity as f64 / logs.len() as f64;
    stats
}

/// Compact hour display used by the stats and timeline views:
/// `0h`, `45m`, `2h`.
pub fn format_hours(hours: f64) -> String {
    if hours == 0.0 {
        "0h".to_string()
    } else if hours < 1.0 {
        format!("{}m", (hours * 60.0).round())
    } else {
        format!("{hours}h")
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Local, Utc};

    use crate::storage::entities::{new_log_id, LogSource};

    use super::*;

    fn entry(productivity: u8, category: Option<&str>) -> LogEntry {
        let now = Utc::now();
        LogEntry {
            id: new_log_id(now),
            timestamp: now,
            date: now.date_naive(),
            slot_start: Local::now(),
            slot_end: Local::now(),
            slot_hour: 9.0,
            productivity,
            category: category.map(Into::into),
            note: String::new(),
            source: LogSource::Manual,
        }
    }

    #[test]
    fn buckets_by_productivity_level() {
        let logs = vec![entry(4, None), entry(1, None), entry(2, None)];
        let stats = aggregate(&logs, 1.0);

        assert_eq!(stats.productive_hours, 1.0);
        assert_eq!(stats.wasted_hours, 1.0);
        assert_eq!(stats.moderate_hours, 1.0);
        assert_eq!(stats.unknown_hours, 0.0);
        assert_eq!(stats.total_logged, 3);
        assert!((stats.average_productivity - 7.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn three_and_four_both_count_as_productive() {
        let stats = aggregate(&[entry(3, None), entry(4, None)], 0.5);
        assert_eq!(stats.productive_hours, 1.0);
    }

    #[test]
    fn zero_level_lands_in_unknown() {
        let stats = aggregate(&[entry(0, None)], 2.0);
        assert_eq!(stats.unknown_hours, 2.0);
        assert_eq!(stats.average_productivity, 0.0);
    }

    #[test]
    fn category_hours_accumulate() {
        let logs = vec![
            entry(4, Some("deep-work")),
            entry(3, Some("deep-work")),
            entry(1, Some("leisure")),
            entry(2, None),
        ];
        let stats = aggregate(&logs, 0.5);
        assert_eq!(stats.category_breakdown["deep-work"], 1.0);
        assert_eq!(stats.category_breakdown["leisure"], 0.5);
        assert_eq!(stats.category_breakdown.len(), 2);
    }

    #[test]
    fn empty_input_yields_zero_stats() {
        let stats = aggregate(&[], 1.0);
        assert_eq!(stats, DayStats::default());
    }

    #[test]
    fn hours_formatting() {
        assert_eq!(format_hours(0.0), "0h");
        assert_eq!(format_hours(0.75), "45m");
        assert_eq!(format_hours(2.0), "2h");
        assert_eq!(format_hours(1.5), "1.5h");
    }
}
