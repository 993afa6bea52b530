use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use chrono::Local;
use tracing::info;

use crate::{
    notify::DesktopNotifier,
    scheduler::{next_boundary, ReminderScheduler, SchedulerSettings},
    storage::{settings::SettingsStore, state::FileStateStore},
    utils::clock::DefaultClock,
};

/// Runs the reminder scheduler in the foreground until Ctrl-C. Settings are
/// snapshotted at launch; re-run after changing them.
pub async fn run_serve(app_dir: PathBuf) -> Result<()> {
    let settings = SettingsStore::new(&app_dir).load()?;
    let state = Arc::new(FileStateStore::new(&app_dir));

    let scheduler = ReminderScheduler::new(
        Arc::new(DefaultClock),
        Arc::new(DesktopNotifier),
        state,
    );
    scheduler.start(SchedulerSettings::from(&settings))?;

    if settings.tracking_enabled {
        let next = next_boundary(Local::now(), settings.reminder_interval);
        println!(
            "Tracking every {}h, next reminder at {}. Ctrl-C to stop.",
            settings.reminder_interval,
            next.format("%H:%M")
        );
    } else {
        println!("Tracking is disabled (settings set trackingEnabled true to enable).");
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    scheduler.stop();
    Ok(())
}
