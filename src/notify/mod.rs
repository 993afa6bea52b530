//! Delivery of reminder signals. The scheduler only knows the
//! [NotificationSink] contract; how a signal reaches the user (desktop
//! notification, console line) is this module's concern.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Local, Timelike};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderKind {
    /// A slot boundary passed and the user should rate the elapsed slot.
    Regular,
    /// Escalation: a fired reminder went unacknowledged past the grace period.
    Missed,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync + 'static {
    async fn notify(&self, kind: ReminderKind) -> Result<()>;
}

/// Sends OS notifications via the desktop notification daemon. When that
/// fails (no daemon, permission denied), degrades to a console line rather
/// than erroring out of the schedule.
pub struct DesktopNotifier;

#[async_trait]
impl NotificationSink for DesktopNotifier {
    async fn notify(&self, kind: ReminderKind) -> Result<()> {
        let (summary, body) = reminder_text(kind, Local::now());
        // show() is a blocking D-Bus roundtrip, keep it off the runtime thread
        let (s, b) = (summary.clone(), body.clone());
        let shown = tokio::task::spawn_blocking(move || {
            notify_rust::Notification::new()
                .appname("prodpulse")
                .summary(&s)
                .body(&b)
                .show()
                .map(drop)
                .map_err(|e| e.to_string())
        })
        .await?;
        if let Err(e) = shown {
            warn!("Desktop notification failed, falling back to console: {e}");
            println!("🔔 {summary}: {body}");
        }
        Ok(())
    }
}

fn reminder_text(kind: ReminderKind, now: DateTime<Local>) -> (String, String) {
    match kind {
        ReminderKind::Regular => {
            let period = match now.hour() {
                0..=11 => "morning",
                12..=16 => "afternoon",
                _ => "evening",
            };
            let messages = [
                format!("How's your {period} going? 🎯"),
                "Time for a quick check-in! ⚡".to_string(),
                "How productive was the last hour? 📊".to_string(),
                "Quick productivity pulse check! 💪".to_string(),
            ];
            let pick = now.timestamp_millis().unsigned_abs() as usize % messages.len();
            ("Productivity Pulse".to_string(), messages[pick].clone())
        }
        ReminderKind::Missed => (
            "Don't forget to log!".to_string(),
            "You missed the last check-in. Log the slot when you get a minute.".to_string(),
        ),
    }
}
