use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use log::debug;

use petminder::clock::{Clock, FixedClock, SystemClock};
use petminder::reminder::gateway::{NotificationGateway, OutboxGateway};
use petminder::reminder::listing::{ReminderCategory, is_upcoming, matches_search};
use petminder::reminder::model::{ReminderDraft, ReminderSettings, parse_utc_offset};
use petminder::reminder::scheduler::{ReminderScheduler, SavedReminder, ScheduleOutcome};
use petminder::reminder::store::{JsonFileStore, ReminderStore, StoreError};
use petminder::reminder::sweeper::ReminderSweeper;

#[derive(Parser, Debug)]
#[command(
    name = "petminder",
    version,
    about = "Pet-care reminders with advance-warning notifications"
)]
struct Cli {
    #[arg(long, default_value = "reminders.json")]
    store: PathBuf,

    #[arg(long, default_value = "notifications.json")]
    outbox: PathBuf,

    #[arg(
        long,
        allow_hyphen_values = true,
        help = "Overrides the offset stored in the reminder file, e.g. +05:30"
    )]
    utc_offset: Option<String>,

    #[arg(long, help = "Pins the clock to an RFC 3339 instant")]
    now: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Create a reminder and schedule its notifications")]
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        date: String,
        #[arg(long)]
        time: String,
    },
    #[command(about = "Change a reminder; its notifications are rescheduled")]
    Edit {
        #[arg(long)]
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        time: Option<String>,
    },
    #[command(about = "Cancel a reminder's notifications and remove it")]
    Delete {
        #[arg(long)]
        id: String,
    },
    #[command(about = "Sweep lapsed reminders and list the rest")]
    List {
        #[arg(long)]
        search: Option<String>,
    },
}

struct Engine {
    store: Arc<JsonFileStore>,
    scheduler: ReminderScheduler,
    sweeper: ReminderSweeper,
    clock: Arc<dyn Clock>,
    settings: ReminderSettings,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let engine = build_engine(&cli)?;

    match cli.command {
        Command::Add { title, date, time } => {
            let saved = engine
                .scheduler
                .save(&ReminderDraft::new(title, date, time), None)
                .await
                .context("failed to save reminder")?;
            report_saved(&saved);
        }
        Command::Edit {
            id,
            title,
            date,
            time,
        } => {
            let existing = find_reminder(&engine, &id).await?;
            let mut draft = ReminderDraft::editing(&existing);
            if let Some(title) = title {
                draft.title = title;
            }
            if let Some(date) = date {
                draft.date = date;
            }
            if let Some(time) = time {
                draft.time = time;
            }
            let saved = engine
                .scheduler
                .save(&draft, Some(existing.triggers.as_slice()))
                .await
                .context("failed to update reminder")?;
            report_saved(&saved);
        }
        Command::Delete { id } => {
            let existing = find_reminder(&engine, &id).await?;
            engine.scheduler.delete(&existing).await?;
            println!("deleted reminder {id}");
        }
        Command::List { search } => {
            let valid = engine
                .sweeper
                .sweep_store()
                .await
                .context("failed to load reminders")?;
            let query = search.unwrap_or_default();
            let now = engine.clock.now();
            let offset = engine.settings.utc_offset()?;

            let shown: Vec<_> = valid
                .iter()
                .filter(|reminder| matches_search(reminder, &query))
                .collect();
            let mut upcoming = 0;
            for reminder in &shown {
                let urgent = is_upcoming(reminder, now, offset);
                if urgent {
                    upcoming += 1;
                }
                println!(
                    "{}  {} {}  {}  [{}] {} notifications{}",
                    reminder.id,
                    reminder.date,
                    reminder.time,
                    reminder.title,
                    ReminderCategory::from_title(&reminder.title),
                    reminder.triggers.len(),
                    if urgent { "  URGENT" } else { "" }
                );
            }
            println!("{} total, {upcoming} upcoming", shown.len());
        }
    }
    Ok(())
}

fn build_engine(cli: &Cli) -> Result<Engine> {
    let store = Arc::new(JsonFileStore::new(&cli.store));
    let mut settings = store
        .settings()
        .with_context(|| format!("failed to load {}", cli.store.display()))?;
    if let Some(offset) = &cli.utc_offset {
        settings.utc_offset_minutes = parse_utc_offset(offset)?;
    }

    let clock: Arc<dyn Clock> = match &cli.now {
        Some(text) => Arc::new(FixedClock::new(parse_now(text)?)),
        None => Arc::new(SystemClock),
    };
    let gateway: Arc<dyn NotificationGateway> = Arc::new(OutboxGateway::new(&cli.outbox));
    debug!(
        "store {} outbox {} offset {} minutes",
        cli.store.display(),
        cli.outbox.display(),
        settings.utc_offset_minutes
    );

    let scheduler = ReminderScheduler::new(
        store.clone(),
        gateway.clone(),
        clock.clone(),
        settings.clone(),
    )?;
    let sweeper = ReminderSweeper::new(store.clone(), gateway, clock.clone(), &settings)?;
    Ok(Engine {
        store,
        scheduler,
        sweeper,
        clock,
        settings,
    })
}

fn parse_now(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|at| at.with_timezone(&Utc))
        .with_context(|| format!("invalid --now '{text}', expected an RFC 3339 timestamp"))
}

async fn find_reminder(engine: &Engine, id: &str) -> Result<petminder::reminder::model::Reminder> {
    let all = engine
        .store
        .get_all()
        .await
        .context("failed to load reminders")?;
    all.into_iter()
        .find(|reminder| reminder.id == id)
        .ok_or_else(|| anyhow!(StoreError::NotFound(id.to_string())))
}

fn report_saved(saved: &SavedReminder) {
    let reminder = &saved.reminder;
    println!(
        "saved reminder {}: {} on {} at {} ({} notifications scheduled)",
        reminder.id,
        reminder.title,
        reminder.date,
        reminder.time,
        saved.outcome.scheduled()
    );
    match &saved.outcome {
        ScheduleOutcome::Complete { .. } => {}
        ScheduleOutcome::Partial { scheduled, failed } => {
            let failed_list: Vec<String> = failed.iter().map(ToString::to_string).collect();
            println!(
                "warning: only {scheduled} of {} notifications were scheduled (failed: {})",
                scheduled + failed.len(),
                failed_list.join(", ")
            );
        }
        ScheduleOutcome::Absent { .. } => {
            println!("warning: reminder saved but no notifications could be scheduled");
        }
    }
}
