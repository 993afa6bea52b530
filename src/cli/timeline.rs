use std::{fmt::Display, path::Path};

use ansi_term::{Colour, Style};
use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDate};
use chrono_english::parse_date_string;
use clap::{Parser, ValueEnum};

use crate::{
    scheduler::slots::{
        day_slots, effective_interval, format_slot_range, fractional_hour, same_slot, Slot,
        SlotStatus,
    },
    stats::{aggregate, format_hours, DayStats},
    storage::{
        entities::LogEntry,
        log_store::LogStore,
        settings::{Settings, SettingsStore},
    },
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct DayQuery {
    #[arg(
        short,
        long,
        help = "Day to show. Examples are \"yesterday\", \"2 days ago\", \"15/03/2025\""
    )]
    date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

impl DayQuery {
    fn resolve(&self) -> Result<NaiveDate> {
        match &self.date {
            None => Ok(Local::now().date_naive()),
            Some(raw) => parse_date_string(raw, Local::now(), self.date_style.into())
                .map(|dt| dt.date_naive())
                .map_err(|e| anyhow!("Could not parse date '{raw}': {e}")),
        }
    }
}

pub async fn process_timeline_command(app_dir: &Path, query: DayQuery) -> Result<()> {
    let date = query.resolve()?;
    let settings = SettingsStore::new(app_dir).load()?;
    let logs = LogStore::new(app_dir)?.logs_for_date(date).await?;
    let interval = effective_interval(settings.reminder_interval);

    let today = Local::now().date_naive();
    let slots: Vec<Slot> = if date == today {
        day_slots(settings.reminder_interval, fractional_hour(Local::now())).collect()
    } else {
        // statuses only mean something for today
        let status = if date < today {
            SlotStatus::Past
        } else {
            SlotStatus::Future
        };
        day_slots(settings.reminder_interval, 0.0)
            .map(|mut slot| {
                slot.status = status;
                slot
            })
            .collect()
    };

    println!("{}", Style::new().bold().paint(format!("Timeline for {date}")));
    for slot in &slots {
        println!(
            "{}",
            render_slot_line(slot, find_log(&logs, slot.hour), &settings, interval)
        );
    }
    print_summary(&aggregate(&logs, settings.reminder_interval));
    Ok(())
}

pub async fn process_stats_command(app_dir: &Path, query: DayQuery) -> Result<()> {
    let date = query.resolve()?;
    let settings = SettingsStore::new(app_dir).load()?;
    let logs = LogStore::new(app_dir)?.logs_for_date(date).await?;
    let stats = aggregate(&logs, settings.reminder_interval);

    println!("{}", Style::new().bold().paint(format!("Stats for {date}")));
    println!("  Logged slots    {}", stats.total_logged);
    println!(
        "  {} Productive    {}",
        Colour::Green.paint("■"),
        format_hours(stats.productive_hours)
    );
    println!(
        "  {} Moderate      {}",
        Colour::Yellow.paint("■"),
        format_hours(stats.moderate_hours)
    );
    println!(
        "  {} Wasted        {}",
        Colour::Red.paint("■"),
        format_hours(stats.wasted_hours)
    );
    println!(
        "  {} Unknown       {}",
        Style::new().dimmed().paint("■"),
        format_hours(stats.unknown_hours)
    );
    println!("  Average level   {:.2}", stats.average_productivity);

    if !stats.category_breakdown.is_empty() {
        println!("{}", Style::new().bold().paint("By category"));
        let total: f64 = stats.category_breakdown.values().sum();
        let mut rows: Vec<_> = stats.category_breakdown.iter().collect();
        rows.sort_by(|a, b| b.1.total_cmp(a.1).then(a.0.cmp(b.0)));
        for (id, hours) in rows {
            let label = settings
                .category(id)
                .map(|c| format!("{} {}", c.emoji, c.name))
                .unwrap_or_else(|| id.clone());
            println!(
                "  {label:<20} {:>5} ({:.0}%)",
                format_hours(*hours),
                hours / total * 100.0
            );
        }
    }
    Ok(())
}

/// First stored entry for the slot starting at `slot_hour`; duplicates past
/// the first are ignored when rendering.
pub fn find_log(logs: &[LogEntry], slot_hour: f64) -> Option<&LogEntry> {
    logs.iter().find(|l| same_slot(l.slot_hour, slot_hour))
}

fn productivity_emoji(level: u8) -> &'static str {
    match level {
        1 => "😫",
        2 => "😕",
        3 => "🙂",
        4 => "🚀",
        _ => "❓",
    }
}

fn productivity_colour(level: u8) -> Style {
    match level {
        1 => Colour::Red.normal(),
        2 => Colour::Yellow.normal(),
        3 | 4 => Colour::Green.normal(),
        _ => Style::new().dimmed(),
    }
}

fn render_slot_line(
    slot: &Slot,
    log: Option<&LogEntry>,
    settings: &Settings,
    interval: f64,
) -> String {
    let marker = match slot.status {
        SlotStatus::Current => "▶",
        _ => " ",
    };
    let range = format_slot_range(slot.hour, interval);

    let (bar, detail) = match log {
        Some(log) => {
            let mut detail = productivity_emoji(log.productivity).to_string();
            if let Some(category) = log.category.as_deref().and_then(|id| settings.category(id)) {
                detail.push_str(&format!(" {} {}", category.emoji, category.name));
            }
            if !log.note.is_empty() {
                detail.push_str(&format!("  \"{}\"", log.note));
            }
            (
                productivity_colour(log.productivity).paint("████").to_string(),
                detail,
            )
        }
        None => {
            let detail = match slot.status {
                SlotStatus::Past => Style::new().dimmed().paint("not logged").to_string(),
                _ => String::new(),
            };
            (Style::new().dimmed().paint("····").to_string(), detail)
        }
    };

    format!("{marker} {range:<21} {bar} {detail}")
}

fn print_summary(stats: &DayStats) {
    println!(
        "{} productive · {} moderate · {} wasted · {} unknown",
        format_hours(stats.productive_hours),
        format_hours(stats.moderate_hours),
        format_hours(stats.wasted_hours),
        format_hours(stats.unknown_hours),
    );
}
