use std::{
    ops::RangeInclusive,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::scheduler::quiet::QuietHours;

use super::entities::Category;

pub const DEFAULT_REMINDER_INTERVAL: f64 = 2.0;
pub const DEFAULT_QUIET_START: &str = "23:00";
pub const DEFAULT_QUIET_END: &str = "07:00";
pub const DEFAULT_MISSED_REMINDER_MINUTES: f64 = 15.0;

/// One minute up to a full day. Anything outside rounds to zero milliseconds
/// or overflows a [std::time::Duration] downstream.
const REMINDER_INTERVAL_RANGE: RangeInclusive<f64> = (1.0 / 60.0)..=24.0;
const MISSED_REMINDER_RANGE: RangeInclusive<f64> = 1.0..=24.0 * 60.0;

/// User settings. Serialized as camelCase to stay compatible with exports from
/// the original app. Missing fields deserialize to the documented defaults, so
/// a partial or outdated settings file is never a fatal error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Length of one slot in hours. Fractional values down to one minute are
    /// supported.
    pub reminder_interval: f64,
    pub quiet_hours_start: String,
    pub quiet_hours_end: String,
    pub tracking_enabled: bool,
    pub missed_reminder_minutes: f64,
    pub onboarding_complete: bool,
    pub categories: Vec<Category>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reminder_interval: DEFAULT_REMINDER_INTERVAL,
            quiet_hours_start: DEFAULT_QUIET_START.into(),
            quiet_hours_end: DEFAULT_QUIET_END.into(),
            tracking_enabled: true,
            missed_reminder_minutes: DEFAULT_MISSED_REMINDER_MINUTES,
            onboarding_complete: false,
            categories: Category::default_set(),
        }
    }
}

impl Settings {
    /// Replaces out-of-range values with defaults instead of failing.
    /// Configuration gaps degrade, they don't abort.
    pub fn sanitized(mut self) -> Self {
        // contains() is false for NaN and both infinities
        if !REMINDER_INTERVAL_RANGE.contains(&self.reminder_interval) {
            warn!(
                "Invalid reminder interval {}, falling back to {DEFAULT_REMINDER_INTERVAL}",
                self.reminder_interval
            );
            self.reminder_interval = DEFAULT_REMINDER_INTERVAL;
        }
        if !MISSED_REMINDER_RANGE.contains(&self.missed_reminder_minutes) {
            warn!(
                "Invalid missed reminder delay {}, falling back to {DEFAULT_MISSED_REMINDER_MINUTES}",
                self.missed_reminder_minutes
            );
            self.missed_reminder_minutes = DEFAULT_MISSED_REMINDER_MINUTES;
        }
        if QuietHours::parse(&self.quiet_hours_start, &self.quiet_hours_end).is_err() {
            warn!(
                "Invalid quiet hours {}..{}, falling back to defaults",
                self.quiet_hours_start, self.quiet_hours_end
            );
            self.quiet_hours_start = DEFAULT_QUIET_START.into();
            self.quiet_hours_end = DEFAULT_QUIET_END.into();
        }
        if self.categories.is_empty() {
            self.categories = Category::default_set();
        }
        self
    }

    pub fn quiet_hours(&self) -> QuietHours {
        // sanitized() guarantees these parse
        QuietHours::parse(&self.quiet_hours_start, &self.quiet_hours_end)
            .unwrap_or_else(|_| QuietHours::parse(DEFAULT_QUIET_START, DEFAULT_QUIET_END).unwrap())
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }
}

/// Settings persistence over a single `settings.json`. Reads always go through
/// [Settings::sanitized], so callers only ever see usable values.
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(app_dir: &Path) -> Self {
        Self {
            path: app_dir.join("settings.json"),
        }
    }

    pub fn load(&self) -> Result<Settings> {
        let settings = match std::fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str::<Settings>(&raw) {
                Ok(v) => v,
                Err(e) => {
                    warn!("Settings file is corrupted, using defaults: {e}");
                    Settings::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Settings::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(settings.sanitized())
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        let raw = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }

    /// Keyed access for the `settings get` command.
    pub fn get_value(&self, key: &str) -> Result<serde_json::Value> {
        let settings = serde_json::to_value(self.load()?)?;
        settings
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow!("Unknown setting '{key}'"))
    }

    /// Keyed update for the `settings set` command. The value is parsed as
    /// JSON first so numbers and booleans work; anything unparseable is taken
    /// as a plain string. The merged result is validated before saving.
    pub fn set_value(&self, key: &str, value: &str) -> Result<Settings> {
        let mut settings = serde_json::to_value(self.load()?)?;
        let slot = settings
            .get_mut(key)
            .ok_or_else(|| anyhow!("Unknown setting '{key}'"))?;
        *slot = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));

        let updated = serde_json::from_value::<Settings>(settings)
            .map_err(|e| anyhow!("'{value}' is not a valid value for '{key}': {e}"))?
            .sanitized();
        self.save(&updated)?;
        Ok(updated)
    }
}
