//! The reminder scheduling engine. One recurring timer walks slot boundaries
//! aligned to local midnight; each non-quiet fire persists the pending flag,
//! notifies the sink, and arms a one-shot escalation timer. A [start] call
//! replaces the previous timer generation wholesale, so settings changes are
//! applied by restarting.
//!
//! [start]: ReminderScheduler::start

pub mod quiet;
pub mod slots;

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::Result;
use chrono::{DateTime, Local, Timelike};
use now::DateTimeNow;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    notify::{NotificationSink, ReminderKind},
    storage::{settings::Settings, state::SchedulerStateStore},
    utils::clock::Clock,
};

use quiet::QuietHours;

/// Settings snapshot the scheduler runs with, captured at
/// [ReminderScheduler::start]. The engine does not watch for live settings
/// mutation; changes take effect on the next start.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    /// Slot length in hours.
    pub reminder_interval: f64,
    pub quiet_hours: QuietHours,
    pub tracking_enabled: bool,
    pub missed_reminder_minutes: f64,
}

impl From<&Settings> for SchedulerSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            reminder_interval: settings.reminder_interval,
            quiet_hours: settings.quiet_hours(),
            tracking_enabled: settings.tracking_enabled,
            missed_reminder_minutes: settings.missed_reminder_minutes,
        }
    }
}

/// Delay before a pending log restored from a previous session is
/// re-announced.
const RESUME_NUDGE: Duration = Duration::from_secs(1);

/// Next slot boundary strictly after `now`, aligned to multiples of the
/// interval from local midnight: with a 2 hour interval boundaries are 00:00,
/// 02:00, 04:00... no matter when the process started.
pub fn next_boundary(now: DateTime<Local>, interval_hours: f64) -> DateTime<Local> {
    let midnight = now.beginning_of_day();
    let interval_ms = (interval_hours * 3_600_000.0).round() as i64;
    let into_day = (now - midnight).num_milliseconds();
    let next_ms = (into_day as u64).div_ceil(interval_ms as u64) as i64 * interval_ms;
    let mut next = midnight + chrono::Duration::milliseconds(next_ms);
    if next <= now {
        next += chrono::Duration::milliseconds(interval_ms);
    }
    next
}

fn minute_of_day(t: DateTime<Local>) -> u32 {
    t.hour() * 60 + t.minute()
}

/// The stateful engine. All timer work happens on spawned tasks owned by the
/// current generation's [CancellationToken]; `stop`/`start` cancel the whole
/// generation, `log_complete` only the escalation timer.
pub struct ReminderScheduler {
    clock: Arc<dyn Clock>,
    sink: Arc<dyn NotificationSink>,
    state: Arc<dyn SchedulerStateStore>,
    generation: Mutex<CancellationToken>,
    missed: Arc<Mutex<CancellationToken>>,
}

impl ReminderScheduler {
    pub fn new(
        clock: Arc<dyn Clock>,
        sink: Arc<dyn NotificationSink>,
        state: Arc<dyn SchedulerStateStore>,
    ) -> Self {
        Self {
            clock,
            sink,
            state,
            generation: Mutex::new(CancellationToken::new()),
            missed: Arc::new(Mutex::new(CancellationToken::new())),
        }
    }

    /// Cancels any previous timer generation, then arms the slot-boundary
    /// loop. Stays stopped when tracking is disabled. If a pending log
    /// survived from a previous session, one missed signal is re-emitted
    /// shortly after start without touching the armed timer.
    pub fn start(&self, settings: SchedulerSettings) -> Result<()> {
        self.stop();
        if !settings.tracking_enabled {
            info!("Tracking disabled, scheduler not started");
            return Ok(());
        }

        let token = CancellationToken::new();
        *self.generation.lock().unwrap() = token.clone();

        let resume_pending = self.state.load()?.pending_log;

        let worker = SchedulerWorker {
            settings,
            clock: self.clock.clone(),
            sink: self.sink.clone(),
            state: self.state.clone(),
            missed: self.missed.clone(),
            generation: token.clone(),
        };
        tokio::spawn(worker.run());

        if resume_pending {
            let sink = self.sink.clone();
            let clock = self.clock.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = clock.sleep(RESUME_NUDGE) => {
                        debug!("Re-announcing pending log from previous session");
                        if let Err(e) = sink.notify(ReminderKind::Missed).await {
                            warn!("Could not re-announce pending log {e:?}");
                        }
                    }
                }
            });
        }
        Ok(())
    }

    /// Cancels both the recurring and the escalation timer. Idempotent.
    pub fn stop(&self) {
        self.generation.lock().unwrap().cancel();
        self.missed.lock().unwrap().cancel();
    }

    /// Acknowledges the outstanding reminder: clears the durable pending flag
    /// and cancels the escalation timer. Safe to call when nothing is pending.
    pub fn log_complete(&self) -> Result<()> {
        let mut state = self.state.load()?;
        state.pending_log = false;
        self.state.save(&state)?;
        self.missed.lock().unwrap().cancel();
        Ok(())
    }
}

struct SchedulerWorker {
    settings: SchedulerSettings,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn NotificationSink>,
    state: Arc<dyn SchedulerStateStore>,
    missed: Arc<Mutex<CancellationToken>>,
    generation: CancellationToken,
}

impl SchedulerWorker {
    async fn run(self) {
        loop {
            let now = self.clock.time();
            let next = next_boundary(now, self.settings.reminder_interval);
            let delay = (next - now).to_std().unwrap_or(Duration::ZERO);
            debug!("Next reminder boundary at {next}");

            tokio::select! {
                _ = self.generation.cancelled() => return,
                _ = self.clock.sleep(delay) => {}
            }

            let fired_at = self.clock.time();
            // quiet hours are judged at fire time, not schedule time
            if self.settings.quiet_hours.contains(minute_of_day(fired_at)) {
                debug!("Boundary at {fired_at} is inside quiet hours, skipping");
                continue;
            }

            if let Err(e) = self.fire(fired_at).await {
                // a failed fire must not kill the recurring schedule
                error!("Reminder fire failed {e:?}");
            }
        }
    }

    async fn fire(&self, fired_at: DateTime<Local>) -> Result<()> {
        // stop() may have landed between the sleep completing and this point
        if self.generation.is_cancelled() {
            return Ok(());
        }

        let mut state = self.state.load()?;
        state.last_notification_time = Some(fired_at);
        state.pending_log = true;
        // durable before the sink sees it; a crash mid-notify keeps the flag
        self.state.save(&state)?;

        if let Err(e) = self.sink.notify(ReminderKind::Regular).await {
            error!("Reminder notification failed {e:?}");
        }

        self.arm_missed_timer();
        Ok(())
    }

    fn arm_missed_timer(&self) {
        let token = CancellationToken::new();
        {
            // only one escalation timer at a time
            let mut current = self.missed.lock().unwrap();
            current.cancel();
            *current = token.clone();
        }

        let delay = Duration::from_secs_f64(self.settings.missed_reminder_minutes * 60.0);
        let clock = self.clock.clone();
        let sink = self.sink.clone();
        let state = self.state.clone();
        let generation = self.generation.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                // the escalation dies with its generation even when stop()
                // raced the swap in the slot above
                _ = generation.cancelled() => {}
                _ = clock.sleep(delay) => {
                    // log_complete may have raced the cancellation; the
                    // durable flag decides
                    match state.load() {
                        Ok(state) if state.pending_log => {
                            debug!("Escalating unacknowledged reminder");
                            if let Err(e) = sink.notify(ReminderKind::Missed).await {
                                warn!("Missed-reminder notification failed {e:?}");
                            }
                        }
                        Ok(_) => {}
                        Err(e) => warn!("Could not read scheduler state {e:?}"),
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use chrono::TimeZone;
    use tokio::time::Instant;

    use crate::{
        notify::MockNotificationSink,
        storage::state::SchedulerState,
        utils::logging::TEST_LOGGING,
    };

    use super::*;

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn boundary_rounds_up_to_interval_multiples_from_midnight() {
        let now = local(2018, 7, 4, 1, 15, 0);
        assert_eq!(next_boundary(now, 2.0), local(2018, 7, 4, 2, 0, 0));

        let now = local(2018, 7, 4, 13, 7, 0);
        assert_eq!(next_boundary(now, 0.25), local(2018, 7, 4, 13, 15, 0));

        // late in the day the boundary rolls into tomorrow
        let now = local(2018, 7, 4, 23, 30, 0);
        assert_eq!(next_boundary(now, 2.0), local(2018, 7, 5, 0, 0, 0));
    }

    #[test]
    fn boundary_is_strictly_after_now() {
        let midnight = local(2018, 7, 4, 0, 0, 0);
        assert_eq!(next_boundary(midnight, 2.0), local(2018, 7, 4, 2, 0, 0));

        let on_boundary = local(2018, 7, 4, 14, 0, 0);
        assert_eq!(next_boundary(on_boundary, 2.0), local(2018, 7, 4, 16, 0, 0));
    }

    /// Virtual clock: wall time advances exactly as fast as tokio's paused
    /// test time.
    struct TestClock {
        start: DateTime<Local>,
        reference: Instant,
    }

    impl TestClock {
        fn starting_at(start: DateTime<Local>) -> Arc<Self> {
            Arc::new(Self {
                start,
                reference: Instant::now(),
            })
        }
    }

    #[async_trait]
    impl Clock for TestClock {
        fn time(&self) -> DateTime<Local> {
            self.start + chrono::Duration::from_std(self.reference.elapsed()).unwrap()
        }

        async fn sleep(&self, duration: Duration) {
            tokio::time::sleep(duration).await;
        }
    }

    #[derive(Default)]
    struct MemoryStateStore(StdMutex<SchedulerState>);

    impl MemoryStateStore {
        fn pending(state: &SchedulerState) -> Arc<Self> {
            Arc::new(Self(StdMutex::new(state.clone())))
        }
    }

    impl SchedulerStateStore for MemoryStateStore {
        fn load(&self) -> Result<SchedulerState> {
            Ok(self.0.lock().unwrap().clone())
        }

        fn save(&self, state: &SchedulerState) -> Result<()> {
            *self.0.lock().unwrap() = state.clone();
            Ok(())
        }
    }

    /// Records each signal together with the durable pending flag at the
    /// moment the sink was invoked.
    struct RecordingSink {
        state: Arc<MemoryStateStore>,
        events: StdMutex<Vec<(ReminderKind, bool)>>,
    }

    impl RecordingSink {
        fn new(state: Arc<MemoryStateStore>) -> Arc<Self> {
            Arc::new(Self {
                state,
                events: StdMutex::new(vec![]),
            })
        }

        fn events(&self) -> Vec<(ReminderKind, bool)> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn notify(&self, kind: ReminderKind) -> Result<()> {
            let pending = self.state.load()?.pending_log;
            self.events.lock().unwrap().push((kind, pending));
            Ok(())
        }
    }

    fn test_settings(interval: f64, quiet: (&str, &str)) -> SchedulerSettings {
        SchedulerSettings {
            reminder_interval: interval,
            quiet_hours: QuietHours::parse(quiet.0, quiet.1).unwrap(),
            tracking_enabled: true,
            missed_reminder_minutes: 15.0,
        }
    }

    // "00:00".."00:00" is an empty window, so nothing is ever suppressed
    const NO_QUIET: (&str, &str) = ("00:00", "00:00");

    #[tokio::test(start_paused = true)]
    async fn fire_persists_pending_before_notifying() -> Result<()> {
        *TEST_LOGGING;
        let clock = TestClock::starting_at(local(2018, 7, 4, 8, 59, 0));
        let state = Arc::new(MemoryStateStore::default());
        let sink = RecordingSink::new(state.clone());

        let scheduler = ReminderScheduler::new(clock, sink.clone(), state.clone());
        scheduler.start(test_settings(1.0, NO_QUIET))?;

        tokio::time::sleep(Duration::from_secs(2 * 60)).await;

        assert_eq!(sink.events(), vec![(ReminderKind::Regular, true)]);
        let stored = state.load()?;
        assert!(stored.pending_log);
        assert_eq!(
            stored.last_notification_time,
            Some(local(2018, 7, 4, 9, 0, 0))
        );

        scheduler.stop();
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_boundaries_suppress_then_escalation_follows_a_real_fire() -> Result<()> {
        *TEST_LOGGING;
        let clock = TestClock::starting_at(local(2018, 7, 4, 21, 30, 0));
        let state = Arc::new(MemoryStateStore::default());
        let sink = RecordingSink::new(state.clone());

        let scheduler = ReminderScheduler::new(clock, sink.clone(), state.clone());
        scheduler.start(test_settings(1.0, ("22:00", "06:00")))?;

        // 22:00 and 23:00 fall inside quiet hours: no signal, no pending flag
        tokio::time::sleep(Duration::from_secs(2 * 3600)).await;
        assert!(sink.events().is_empty());
        assert!(!state.load()?.pending_log);

        // 06:00 is end-exclusive, so that boundary notifies; fifteen unacked
        // minutes later the missed escalation follows. Stop short of 07:00.
        tokio::time::sleep(Duration::from_secs(6 * 3600 + 50 * 60)).await;
        assert_eq!(
            sink.events(),
            vec![(ReminderKind::Regular, true), (ReminderKind::Missed, true)]
        );

        scheduler.stop();
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn log_complete_cancels_the_escalation() -> Result<()> {
        *TEST_LOGGING;
        let clock = TestClock::starting_at(local(2018, 7, 4, 8, 30, 0));
        let state = Arc::new(MemoryStateStore::default());
        let sink = RecordingSink::new(state.clone());

        let scheduler = ReminderScheduler::new(clock, sink.clone(), state.clone());
        scheduler.start(test_settings(1.0, NO_QUIET))?;

        tokio::time::sleep(Duration::from_secs(31 * 60)).await;
        assert_eq!(sink.events(), vec![(ReminderKind::Regular, true)]);

        scheduler.log_complete()?;
        assert!(!state.load()?.pending_log);

        // well past the missed grace period, still no escalation
        tokio::time::sleep(Duration::from_secs(25 * 60)).await;
        assert_eq!(sink.events(), vec![(ReminderKind::Regular, true)]);

        scheduler.stop();
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn log_complete_without_pending_is_a_noop() -> Result<()> {
        let clock = TestClock::starting_at(local(2018, 7, 4, 8, 30, 0));
        let state = Arc::new(MemoryStateStore::default());
        let sink = RecordingSink::new(state.clone());

        let scheduler = ReminderScheduler::new(clock, sink, state.clone());
        scheduler.log_complete()?;
        scheduler.log_complete()?;
        assert_eq!(state.load()?, SchedulerState::default());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_silences_everything() -> Result<()> {
        let clock = TestClock::starting_at(local(2018, 7, 4, 8, 30, 0));
        let state = Arc::new(MemoryStateStore::default());
        let sink = RecordingSink::new(state.clone());

        let scheduler = ReminderScheduler::new(clock, sink.clone(), state);
        scheduler.start(test_settings(1.0, NO_QUIET))?;
        scheduler.stop();
        scheduler.stop();

        tokio::time::sleep(Duration::from_secs(4 * 3600)).await;
        assert!(sink.events().is_empty());
        Ok(())
    }

    /// Regular deliveries stall long enough for other calls to land mid-fire.
    struct StallingSink {
        events: StdMutex<Vec<ReminderKind>>,
    }

    #[async_trait]
    impl NotificationSink for StallingSink {
        async fn notify(&self, kind: ReminderKind) -> Result<()> {
            self.events.lock().unwrap().push(kind);
            if kind == ReminderKind::Regular {
                tokio::time::sleep(Duration::from_secs(120)).await;
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_a_slow_fire_still_silences_the_escalation() -> Result<()> {
        *TEST_LOGGING;
        let clock = TestClock::starting_at(local(2018, 7, 4, 8, 59, 0));
        let state = Arc::new(MemoryStateStore::default());
        let sink = Arc::new(StallingSink {
            events: StdMutex::new(vec![]),
        });

        let scheduler = ReminderScheduler::new(clock, sink.clone(), state.clone());
        scheduler.start(test_settings(1.0, NO_QUIET))?;

        // 09:00 fires and the delivery is still in flight when stop() arrives,
        // so the escalation timer has not been armed yet
        tokio::time::sleep(Duration::from_secs(90)).await;
        scheduler.stop();

        // the pending flag stays (nothing was logged), but a stopped
        // scheduler must not escalate
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(state.load()?.pending_log);
        assert_eq!(
            *sink.events.lock().unwrap(),
            vec![ReminderKind::Regular]
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_the_previous_generation() -> Result<()> {
        *TEST_LOGGING;
        let clock = TestClock::starting_at(local(2018, 7, 4, 8, 30, 0));
        let state = Arc::new(MemoryStateStore::default());
        let sink = RecordingSink::new(state.clone());

        let scheduler = ReminderScheduler::new(clock, sink.clone(), state);
        scheduler.start(test_settings(1.0, NO_QUIET))?;
        scheduler.start(test_settings(1.0, NO_QUIET))?;

        tokio::time::sleep(Duration::from_secs(31 * 60)).await;
        // two coexisting generations would have produced two signals
        assert_eq!(sink.events().len(), 1);

        scheduler.stop();
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_tracking_keeps_the_scheduler_stopped() -> Result<()> {
        let clock = TestClock::starting_at(local(2018, 7, 4, 8, 30, 0));
        let state = Arc::new(MemoryStateStore::default());
        let sink = RecordingSink::new(state.clone());

        let scheduler = ReminderScheduler::new(clock, sink.clone(), state);
        let settings = SchedulerSettings {
            tracking_enabled: false,
            ..test_settings(1.0, NO_QUIET)
        };
        scheduler.start(settings)?;

        tokio::time::sleep(Duration::from_secs(6 * 3600)).await;
        assert!(sink.events().is_empty());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn pending_log_from_previous_session_is_reannounced() -> Result<()> {
        *TEST_LOGGING;
        let clock = TestClock::starting_at(local(2018, 7, 4, 8, 10, 0));
        let state = MemoryStateStore::pending(&SchedulerState {
            last_notification_time: Some(local(2018, 7, 4, 8, 0, 0)),
            pending_log: true,
        });
        let sink = RecordingSink::new(state.clone());

        let scheduler = ReminderScheduler::new(clock, sink.clone(), state);
        scheduler.start(test_settings(2.0, NO_QUIET))?;

        // the nudge comes shortly after start, long before the next boundary
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(sink.events(), vec![(ReminderKind::Missed, true)]);

        scheduler.stop();
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn sink_errors_do_not_kill_the_schedule() -> Result<()> {
        *TEST_LOGGING;
        let clock = TestClock::starting_at(local(2018, 7, 4, 8, 59, 0));
        let state = Arc::new(MemoryStateStore::default());

        let mut sink = MockNotificationSink::new();
        sink.expect_notify()
            .times(2..)
            .returning(|_| Err(anyhow::anyhow!("notification daemon is gone")));

        let scheduler = ReminderScheduler::new(clock, Arc::new(sink), state.clone());
        scheduler.start(test_settings(1.0, NO_QUIET))?;

        // both the 09:00 and the 10:00 boundary must reach the sink even
        // though every delivery fails
        tokio::time::sleep(Duration::from_secs(2 * 3600)).await;
        assert!(state.load()?.pending_log);

        scheduler.stop();
        Ok(())
    }
}
