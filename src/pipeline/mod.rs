//! Orchestration: schedule chunks, run workers, merge, persist
//!
//! This module handles:
//! - Partitioning the page range into [`ChunkJob`]s and supervising one
//!   worker process per job
//! - Reading and writing chunk and canonical artifacts
//! - Merging chunk artifacts and syncing the result into storage

mod artifact;
mod merger;
mod scheduler;

pub use artifact::{
    chunk_artifact_path, chunk_index, list_chunk_artifacts, list_partial_artifacts, read_records,
    remove_artifacts, write_records, ArtifactError,
};
pub use merger::{merge, CanonicalArtifact, MergeReport};
pub use scheduler::{
    partition, ChunkScheduler, SchedulerError, WorkerCommand, WorkerOutcome, WorkerStatus,
    DEFAULT_GRACE_PERIOD,
};

use crate::config::Config;
use crate::record::ChunkJob;
use crate::storage::{
    open_storage, PersistenceSync, SyncReport, SyncRunRecord, VehicleStore, TIMESTAMP_FORMAT,
};
use crate::Result;
use chrono::Local;
use std::future::Future;
use std::path::Path;

/// Switches for [`run_workflow`]
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowOptions {
    /// Truncate stored vehicles before syncing
    pub fresh: bool,
    /// Leave chunk artifacts on disk after the merge
    pub keep_chunks: bool,
}

/// Summary of one complete run
#[derive(Debug, Clone)]
pub struct WorkflowReport {
    pub workers: Vec<WorkerOutcome>,
    pub merge: MergeReport,
    pub sync: SyncReport,
}

impl WorkflowReport {
    pub fn failed_workers(&self) -> usize {
        self.workers.iter().filter(|w| !w.status.is_success()).count()
    }
}

/// Runs the whole harvest
///
/// Only setup failures are returned as errors: an unreachable database,
/// an empty page range, an artifact directory that cannot be created, or
/// a canonical artifact that cannot be written.
/// Failed or cancelled workers are reported and their chunks are simply
/// missing from the merge.
pub async fn run_workflow<S>(
    config: &Config,
    config_hash: &str,
    command: WorkerCommand,
    options: WorkflowOptions,
    shutdown: S,
) -> Result<WorkflowReport>
where
    S: Future<Output = ()>,
{
    let mut storage = open_storage(Path::new(&config.output.database_path))?;

    let scheduler = ChunkScheduler::new(&config.output.artifact_dir, command);
    let jobs = scheduler.schedule(config.crawler.total_pages, config.crawler.chunks)?;

    // Workers write straight into this directory
    std::fs::create_dir_all(scheduler.artifact_dir())?;

    let mut stale = list_chunk_artifacts(scheduler.artifact_dir())?;
    stale.extend(list_partial_artifacts(scheduler.artifact_dir())?);
    if !stale.is_empty() {
        let removed = remove_artifacts(&stale);
        tracing::info!("Removed {} stale chunk artifact(s)", removed);
    }

    let artifact_paths: Vec<_> = jobs.iter().map(|j| j.artifact_path.clone()).collect();
    let workers = scheduler.run(jobs, shutdown).await;
    log_failed_workers(&workers);

    let (canonical, merge_report) = merge(&artifact_paths, &config.extract.country_code);
    let canonical_path = Path::new(&config.output.canonical_path);
    canonical.write(canonical_path)?;
    tracing::info!(
        "Canonical artifact with {} records written to {}",
        canonical.len(),
        canonical_path.display()
    );

    let sync = sync_artifact(
        config,
        &mut storage,
        &canonical,
        config_hash,
        &config.output.canonical_path,
        options.fresh,
    )?;

    if options.keep_chunks {
        tracing::info!("Keeping chunk artifacts in {}", config.output.artifact_dir);
    } else {
        let removed = remove_artifacts(&artifact_paths);
        tracing::debug!("Removed {} chunk artifact(s)", removed);
    }

    Ok(WorkflowReport {
        workers,
        merge: merge_report,
        sync,
    })
}

/// Persists a canonical artifact and records the sync run
///
/// `fresh` truncates the vehicles table first. Per-record failures are
/// counted in the returned report; only bookkeeping failures are errors.
pub fn sync_artifact(
    config: &Config,
    store: &mut dyn VehicleStore,
    artifact: &CanonicalArtifact,
    config_hash: &str,
    source: &str,
    fresh: bool,
) -> Result<SyncReport> {
    let started_at = Local::now().format(TIMESTAMP_FORMAT).to_string();

    if fresh {
        let removed = store.truncate_vehicles()?;
        tracing::info!("Cleared {} stored vehicle(s)", removed);
    }

    let report = PersistenceSync::new(config.storage.conflict_policy).sync(artifact.records(), store);

    let run = SyncRunRecord {
        id: 0,
        started_at,
        finished_at: Local::now().format(TIMESTAMP_FORMAT).to_string(),
        config_hash: config_hash.to_string(),
        source: source.to_string(),
        records: report.records,
        inserted: report.inserted,
        updated: report.updated,
        skipped: report.skipped(),
        failed: report.failed,
    };
    let id = store.record_sync_run(&run)?;
    tracing::debug!("Recorded sync run {}", id);

    Ok(report)
}

fn log_failed_workers(workers: &[WorkerOutcome]) {
    for outcome in workers.iter().filter(|w| !w.status.is_success()) {
        let ChunkJob {
            index,
            start_page,
            end_page,
            ..
        } = outcome.job;
        tracing::warn!(
            "Chunk {} (pages {}-{}) produced no guaranteed output: {:?}",
            index,
            start_page,
            end_page,
            outcome.status
        );
    }
}
