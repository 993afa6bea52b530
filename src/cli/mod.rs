pub mod serve;
pub mod timeline;

use std::path::PathBuf;

use anyhow::{bail, Result};
use chrono::{Local, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

use crate::{
    scheduler::slots::{format_slot_label, format_slot_range, fractional_hour, just_elapsed_slot},
    storage::{
        entities::{new_log_id, LogEntry, LogPatch, LogSource},
        log_store::LogStore,
        settings::SettingsStore,
        state::{FileStateStore, SchedulerStateStore},
        ExportData,
    },
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX, SERVE_PREFIX},
    },
};

use timeline::{process_stats_command, process_timeline_command, DayQuery};

#[derive(Parser, Debug)]
#[command(name = "Prodpulse", version, long_about = None)]
#[command(about = "Interval reminders and self-rated productivity summaries")]
struct Args {
    #[command(subcommand)]
    command: Commands,
    #[arg(
        long,
        help = "Application directory. By default $XDG_STATE_HOME/prodpulse or $HOME/.local/state/prodpulse"
    )]
    dir: Option<PathBuf>,
    #[arg(long, help = "Enable console logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Run the reminder scheduler in the foreground until interrupted")]
    Serve {},
    #[command(about = "Display the slot timeline for a day")]
    Timeline {
        #[command(flatten)]
        query: DayQuery,
    },
    #[command(about = "Show aggregate productivity stats for a day")]
    Stats {
        #[command(flatten)]
        query: DayQuery,
    },
    #[command(about = "Rate a time slot (this also acknowledges a pending reminder)")]
    Log {
        #[arg(short, long, help = "Productivity level: 0 unknown, 1 wasted, 2 moderate, 3-4 productive", value_parser = clap::value_parser!(u8).range(0..=4))]
        productivity: u8,
        #[arg(short, long, help = "Category id, e.g. deep-work")]
        category: Option<String>,
        #[arg(short, long, help = "Free-form note")]
        note: Option<String>,
        #[arg(
            short,
            long,
            help = "Fractional start hour of the slot to rate. Defaults to the slot that just elapsed"
        )]
        slot: Option<f64>,
    },
    #[command(about = "Change an existing log entry")]
    Edit {
        id: String,
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=4))]
        productivity: Option<u8>,
        #[arg(short, long, help = "Category id; pass an empty string to clear")]
        category: Option<String>,
        #[arg(short, long)]
        note: Option<String>,
    },
    #[command(about = "Delete a log entry")]
    Delete { id: String },
    #[command(about = "Dump all logs and settings as JSON")]
    Export {
        #[arg(short, long, help = "Write to a file instead of stdout")]
        out: Option<PathBuf>,
    },
    #[command(about = "Read or change settings")]
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    #[command(about = "Delete all stored log entries")]
    Clear {
        #[arg(long, help = "Required confirmation")]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    Show,
    Get { key: String },
    Set { key: String, value: String },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = args
        .dir
        .clone()
        .map_or_else(create_application_default_path, Ok)?;

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    let prefix = match args.command {
        Commands::Serve {} => SERVE_PREFIX,
        _ => CLI_PREFIX,
    };
    enable_logging(prefix, &app_dir, logging_level, args.log)?;

    match args.command {
        Commands::Serve {} => serve::run_serve(app_dir).await,
        Commands::Timeline { query } => process_timeline_command(&app_dir, query).await,
        Commands::Stats { query } => process_stats_command(&app_dir, query).await,
        Commands::Log {
            productivity,
            category,
            note,
            slot,
        } => add_log(&app_dir, productivity, category, note, slot).await,
        Commands::Edit {
            id,
            productivity,
            category,
            note,
        } => edit_log(&app_dir, id, productivity, category, note).await,
        Commands::Delete { id } => {
            LogStore::new(&app_dir)?.delete(&id).await?;
            println!("Deleted {id}");
            Ok(())
        }
        Commands::Export { out } => export_data(&app_dir, out).await,
        Commands::Settings { action } => process_settings_command(&app_dir, action),
        Commands::Clear { yes } => {
            if !yes {
                bail!("This deletes every stored log entry. Re-run with --yes to confirm");
            }
            LogStore::new(&app_dir)?.clear_all().await?;
            println!("All log entries deleted");
            Ok(())
        }
    }
}

/// Wall-clock timestamp for a fractional hour of a date. During a DST gap the
/// nominal time does not exist; nudge forward an hour.
fn slot_datetime(date: NaiveDate, hour: f64) -> chrono::DateTime<Local> {
    let minutes = (hour * 60.0).round() as i64;
    let naive = date.and_time(NaiveTime::MIN) + chrono::Duration::minutes(minutes);
    match Local.from_local_datetime(&naive) {
        chrono::LocalResult::Single(t) | chrono::LocalResult::Ambiguous(t, _) => t,
        chrono::LocalResult::None => Local
            .from_local_datetime(&(naive + chrono::Duration::hours(1)))
            .earliest()
            .expect("time exists after a DST gap"),
    }
}

async fn add_log(
    app_dir: &std::path::Path,
    productivity: u8,
    category: Option<String>,
    note: Option<String>,
    slot: Option<f64>,
) -> Result<()> {
    let settings = SettingsStore::new(app_dir).load()?;
    if let Some(id) = &category {
        if settings.category(id).is_none() {
            let known: Vec<_> = settings.categories.iter().map(|c| c.id.as_str()).collect();
            bail!("Unknown category '{id}'. Known categories: {}", known.join(", "));
        }
    }

    let now = Local::now();
    let interval = settings.reminder_interval;
    let hour = slot.unwrap_or_else(|| just_elapsed_slot(fractional_hour(now), interval));
    if !(0.0..24.0).contains(&hour) {
        bail!("Slot hour must be in [0, 24), got {hour}");
    }

    let slot_start = slot_datetime(now.date_naive(), hour);
    let entry = LogEntry {
        id: new_log_id(Utc::now()),
        timestamp: Utc::now(),
        date: now.date_naive(),
        slot_start,
        slot_end: slot_start + chrono::Duration::milliseconds((interval * 3_600_000.0) as i64),
        slot_hour: hour,
        productivity,
        category,
        note: note.unwrap_or_default(),
        source: LogSource::Manual,
    };
    LogStore::new(app_dir)?.add(&entry).await?;

    // Completing a log acknowledges the reminder: clear the durable pending
    // flag. A running serve process re-reads it before escalating, so this
    // works across processes too.
    let state_store = FileStateStore::new(app_dir);
    let mut state = state_store.load()?;
    state.pending_log = false;
    state_store.save(&state)?;

    println!(
        "Logged {} as level {} ({})",
        format_slot_range(hour, interval),
        productivity,
        entry.id
    );
    Ok(())
}

async fn edit_log(
    app_dir: &std::path::Path,
    id: String,
    productivity: Option<u8>,
    category: Option<String>,
    note: Option<String>,
) -> Result<()> {
    let patch = LogPatch {
        productivity,
        // empty string clears the category
        category: category.map(|c| if c.is_empty() { None } else { Some(c) }),
        note,
    };
    let updated = LogStore::new(app_dir)?.update(&id, patch).await?;
    println!(
        "Updated {} (slot {}, level {})",
        updated.id,
        format_slot_label(updated.slot_hour),
        updated.productivity
    );
    Ok(())
}

async fn export_data(app_dir: &std::path::Path, out: Option<PathBuf>) -> Result<()> {
    let export = ExportData {
        export_date: Utc::now(),
        logs: LogStore::new(app_dir)?.all_logs().await?,
        settings: SettingsStore::new(app_dir).load()?,
    };
    let raw = serde_json::to_string_pretty(&export)?;
    match out {
        Some(path) => {
            std::fs::write(&path, raw)?;
            println!("Exported {} entries to {path:?}", export.logs.len());
        }
        None => println!("{raw}"),
    }
    Ok(())
}

fn process_settings_command(app_dir: &std::path::Path, action: SettingsAction) -> Result<()> {
    let store = SettingsStore::new(app_dir);
    match action {
        SettingsAction::Show => {
            println!("{}", serde_json::to_string_pretty(&store.load()?)?);
        }
        SettingsAction::Get { key } => {
            println!("{}", store.get_value(&key)?);
        }
        SettingsAction::Set { key, value } => {
            store.set_value(&key, &value)?;
            println!("Set {key} = {value}. Restart `prodpulse serve` to apply.");
        }
    }
    Ok(())
}
