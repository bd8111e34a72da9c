//! Daily timetable for unattended operation
//!
//! The `schedule` command runs a full harvest once a day at `scrape-at`
//! and writes a database backup once a day at `backup-at`, both in local
//! time, until it is interrupted.

use crate::config::{Config, ScheduleConfig};
use crate::pipeline::{run_workflow, WorkerCommand, WorkflowOptions};
use crate::storage::{open_storage, VehicleStore, TIMESTAMP_FORMAT};
use crate::{ConfigError, ConfigResult, Result};
use chrono::{DateTime, Local, NaiveTime, TimeZone};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tokio::sync::watch;

/// Longest single sleep; the next run time is recomputed after each nap
/// so wall-clock changes are picked up
const MAX_NAP: Duration = Duration::from_secs(15 * 60);

/// Parses a local time of day written as `HH:MM`
pub fn parse_time_of_day(value: &str) -> ConfigResult<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|e| {
        ConfigError::Validation(format!("Invalid time of day '{}' (expected HH:MM): {}", value, e))
    })
}

/// First instant strictly after `now` whose local time is `at`
///
/// A day on which `at` does not exist (skipped by a clock change) is
/// passed over.
pub fn next_occurrence<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let mut date = now.date_naive();
    loop {
        if let Some(candidate) = tz.from_local_datetime(&date.and_time(at)).earliest() {
            if candidate > *now {
                return candidate;
            }
        }
        date = match date.succ_opt() {
            Some(next) => next,
            None => return now.clone(),
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyJob {
    Harvest,
    Backup,
}

impl fmt::Display for DailyJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DailyJob::Harvest => write!(f, "harvest"),
            DailyJob::Backup => write!(f, "backup"),
        }
    }
}

/// The two daily run times
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timetable {
    pub harvest_at: NaiveTime,
    pub backup_at: NaiveTime,
}

impl Timetable {
    pub fn from_config(config: &ScheduleConfig) -> ConfigResult<Self> {
        Ok(Self {
            harvest_at: parse_time_of_day(&config.scrape_at)?,
            backup_at: parse_time_of_day(&config.backup_at)?,
        })
    }

    /// The job that comes due first after `now`; a harvest wins a tie
    pub fn next<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> (DateTime<Tz>, DailyJob) {
        let harvest = next_occurrence(now, self.harvest_at);
        let backup = next_occurrence(now, self.backup_at);
        if backup < harvest {
            (backup, DailyJob::Backup)
        } else {
            (harvest, DailyJob::Harvest)
        }
    }
}

/// Runs the timetable until `stop` turns true
///
/// A failed harvest or backup is logged and the next one is still
/// scheduled; only an invalid timetable is returned as an error. A
/// harvest in progress when `stop` fires is interrupted like `run`.
pub async fn run_daily(
    config: &Config,
    config_hash: &str,
    command: WorkerCommand,
    stop: watch::Receiver<bool>,
) -> Result<()> {
    let timetable = Timetable::from_config(&config.schedule)?;
    tracing::info!(
        "Scheduler started with harvest at {} and backup at {}",
        timetable.harvest_at.format("%H:%M"),
        timetable.backup_at.format("%H:%M")
    );

    let mut announced = None;
    loop {
        let now = Local::now();
        let (at, job) = timetable.next(&now);
        if announced != Some((at, job)) {
            tracing::info!("Next {} at {}", job, at.format(TIMESTAMP_FORMAT));
            announced = Some((at, job));
        }

        let wait = (at - now).to_std().unwrap_or(Duration::ZERO);
        tokio::select! {
            _ = tokio::time::sleep(wait.min(MAX_NAP)) => {}
            _ = stopped(stop.clone()) => break,
        }
        if wait > MAX_NAP {
            continue;
        }

        match job {
            DailyJob::Harvest => run_harvest(config, config_hash, &command, stop.clone()).await,
            DailyJob::Backup => run_backup(config),
        }
        if *stop.borrow() {
            break;
        }
    }

    tracing::info!("Scheduler stopped");
    Ok(())
}

async fn run_harvest(
    config: &Config,
    config_hash: &str,
    command: &WorkerCommand,
    stop: watch::Receiver<bool>,
) {
    tracing::info!("Starting scheduled harvest");
    let options = WorkflowOptions {
        fresh: config.schedule.fresh,
        keep_chunks: false,
    };
    match run_workflow(config, config_hash, command.clone(), options, stopped(stop)).await {
        Ok(report) => tracing::info!(
            "Scheduled harvest finished: {} inserted, {} updated, {} failed worker(s)",
            report.sync.inserted,
            report.sync.updated,
            report.failed_workers()
        ),
        Err(e) => tracing::error!("Scheduled harvest failed: {}", e),
    }
}

fn run_backup(config: &Config) {
    tracing::info!("Starting scheduled backup");
    let result = open_storage(Path::new(&config.output.database_path))
        .and_then(|storage| storage.backup_into(Path::new(&config.output.backup_dir)));
    match result {
        Ok(target) => tracing::info!("Scheduled backup finished: {}", target.display()),
        Err(e) => tracing::error!("Scheduled backup failed: {}", e),
    }
}

/// Resolves once `stop` holds true; never resolves if the sender is gone
async fn stopped(mut stop: watch::Receiver<bool>) {
    while !*stop.borrow_and_update() {
        if stop.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
