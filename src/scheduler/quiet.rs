use anyhow::{anyhow, Result};

/// A wall-clock window during which reminders are suppressed, in minutes of
/// the day. `start > end` means the window wraps around midnight
/// (e.g. 23:00..07:00).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuietHours {
    pub start_minutes: u32,
    pub end_minutes: u32,
}

impl QuietHours {
    /// Parses `"HH:MM"` bounds as stored in settings.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Ok(Self {
            start_minutes: parse_minute_of_day(start)?,
            end_minutes: parse_minute_of_day(end)?,
        })
    }

    /// Start-inclusive, end-exclusive in both the plain and the overnight
    /// case: a reminder falling exactly on the end bound is NOT suppressed,
    /// one exactly on the start bound is.
    pub fn contains(&self, now_minutes: u32) -> bool {
        if self.start_minutes > self.end_minutes {
            now_minutes >= self.start_minutes || now_minutes < self.end_minutes
        } else {
            now_minutes >= self.start_minutes && now_minutes < self.end_minutes
        }
    }
}

fn parse_minute_of_day(value: &str) -> Result<u32> {
    let (hours, minutes) = value
        .split_once(':')
        .ok_or_else(|| anyhow!("Expected HH:MM, got '{value}'"))?;
    let hours: u32 = hours.parse()?;
    let minutes: u32 = minutes.parse()?;
    if hours >= 24 || minutes >= 60 {
        return Err(anyhow!("'{value}' is not a valid 24h clock time"));
    }
    Ok(hours * 60 + minutes)
}
