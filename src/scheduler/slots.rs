//! Pure slot math: a day is partitioned into `ceil(24 / interval)` slots
//! starting at local midnight, identified by the fractional hour they begin
//! at. Both the UI grid and the live scheduler derive "now's slot" from the
//! same floor calculation so they always agree.

use chrono::{DateTime, Local, Timelike};

/// Two slot keys are considered the same slot when they differ by less than
/// this many hours (~3.6 seconds).
pub const SLOT_HOUR_TOLERANCE: f64 = 1e-3;

/// Cap on the rendered grid: never finer than 30-minute slots, even when the
/// reminder interval is smaller.
pub const MAX_DAY_SLOTS: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Past,
    Current,
    Future,
}

/// One window of the daily grid. Ephemeral, always recomputed, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    /// Fractional hour-of-day the slot begins at, in `[0, 24)`.
    pub hour: f64,
    pub end_hour: f64,
    pub status: SlotStatus,
}

pub fn same_slot(a: f64, b: f64) -> bool {
    (a - b).abs() < SLOT_HOUR_TOLERANCE
}

/// End bound of the slot starting at `hour`; wraps past midnight.
/// Caller guarantees `0 <= hour < 24` and `interval_hours > 0`.
pub fn slot_bounds(hour: f64, interval_hours: f64) -> (f64, f64) {
    (hour, (hour + interval_hours) % 24.0)
}

/// Fractional hour-of-day, minute precision, matching the original app's
/// notion of "current hour".
pub fn fractional_hour(now: DateTime<Local>) -> f64 {
    now.hour() as f64 + now.minute() as f64 / 60.0
}

/// Start of the slot `current_hour` falls into, on the grid of
/// `interval_hours`-sized slots from midnight.
pub fn current_slot_start(current_hour: f64, interval_hours: f64) -> f64 {
    (current_hour / interval_hours).floor() * interval_hours
}

/// Start of the most recently completed slot; the window a reminder firing in
/// the current slot asks about. Clamped to the first slot of the day.
pub fn just_elapsed_slot(current_hour: f64, interval_hours: f64) -> f64 {
    (current_slot_start(current_hour, interval_hours) - interval_hours).max(0.0)
}

pub fn effective_interval(interval_hours: f64) -> f64 {
    interval_hours.max(24.0 / MAX_DAY_SLOTS as f64)
}

/// A fractional hour as a 12-hour clock label, e.g. `9:00 AM` or `2:30 PM`.
pub fn format_slot_label(hour: f64) -> String {
    let mut h = hour.floor() as u32;
    let mut minutes = ((hour - hour.floor()) * 60.0).round() as u32;
    if minutes == 60 {
        // 9.9999 rounds to minute 60; carry into the next hour
        minutes = 0;
        h = (h + 1) % 24;
    }
    let period = if h >= 12 { "PM" } else { "AM" };
    let hour12 = match h % 12 {
        0 => 12,
        v => v,
    };
    format!("{hour12}:{minutes:02} {period}")
}

pub fn format_slot_range(hour: f64, interval_hours: f64) -> String {
    let (start, end) = slot_bounds(hour, interval_hours);
    format!("{} - {}", format_slot_label(start), format_slot_label(end))
}

/// Lazy grid of today's slots, statuses judged against `current_hour`.
/// The final slot of an uneven partition is truncated at the day boundary.
pub fn day_slots(interval_hours: f64, current_hour: f64) -> impl Iterator<Item = Slot> {
    let interval = effective_interval(interval_hours);
    let count = (24.0 / interval).ceil() as usize;
    let current_start = current_slot_start(current_hour, interval);

    (0..count).map(move |i| {
        let hour = i as f64 * interval;
        let status = if same_slot(hour, current_start) {
            SlotStatus::Current
        } else if hour > current_hour {
            SlotStatus::Future
        } else {
            SlotStatus::Past
        };
        Slot {
            hour,
            end_hour: (hour + interval).min(24.0) % 24.0,
            status,
        }
    })
}
