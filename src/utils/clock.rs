use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};

/// Source of wall-clock time and timer sleeps for the scheduler. Injected so
/// tests can drive reminders through virtual time instead of real delays.
///
/// Local time on purpose: slot boundaries and quiet hours are defined against
/// the user's wall clock, not UTC.
#[async_trait]
pub trait Clock: Sync + Send + 'static {
    fn time(&self) -> DateTime<Local>;

    async fn sleep(&self, duration: Duration);
}

pub struct DefaultClock;

#[async_trait]
impl Clock for DefaultClock {
    fn time(&self) -> DateTime<Local> {
        Local::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
