//! Page-range partitioning and the worker-process pool

use crate::pipeline::artifact::chunk_artifact_path;
use crate::record::ChunkJob;
use futures::future::join_all;
use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::watch;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("No pages to crawl")]
    NoPages,

    #[error("Chunk count must be at least 1")]
    NoChunks,
}

/// Splits pages `1..=total_pages` into contiguous inclusive ranges
///
/// Collapses to a single range when there is only one page or fewer pages
/// than chunks. Otherwise every chunk gets `total_pages / chunks` pages and
/// the first `total_pages % chunks` chunks get one more.
///
/// # Examples
///
/// ```
/// use ria_harvest::pipeline::partition;
///
/// assert_eq!(partition(10, 3).unwrap(), vec![(1, 4), (5, 7), (8, 10)]);
/// assert_eq!(partition(2, 5).unwrap(), vec![(1, 2)]);
/// ```
pub fn partition(total_pages: u32, chunks: u32) -> Result<Vec<(u32, u32)>, SchedulerError> {
    if total_pages == 0 {
        return Err(SchedulerError::NoPages);
    }
    if chunks == 0 {
        return Err(SchedulerError::NoChunks);
    }

    if total_pages == 1 || total_pages < chunks {
        return Ok(vec![(1, total_pages)]);
    }

    let per_chunk = total_pages / chunks;
    let remainder = total_pages % chunks;

    let mut ranges = Vec::with_capacity(chunks as usize);
    let mut start = 1;
    for i in 0..chunks {
        let size = per_chunk + u32::from(i < remainder);
        let end = start + size - 1;
        ranges.push((start, end));
        start = end + 1;
    }
    Ok(ranges)
}

/// How a worker process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerStatus {
    Succeeded,
    /// Exited non-zero, or was killed by a signal (`None`)
    Failed(Option<i32>),
    SpawnFailed(String),
    /// Terminated because the run was interrupted
    Cancelled,
}

impl WorkerStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, WorkerStatus::Succeeded)
    }
}

#[derive(Debug, Clone)]
pub struct WorkerOutcome {
    pub job: ChunkJob,
    pub status: WorkerStatus,
}

/// How long a cancelled worker gets to close its browser before it is killed
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Program and leading arguments used to start one worker
///
/// The job-specific arguments `worker --start-page N --end-page M
/// --artifact PATH --supervised` are appended after `leading_args`.
/// Workers get a piped stdin; closing it is the request to shut down.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub leading_args: Vec<OsString>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>, leading_args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            leading_args,
        }
    }

    /// The running executable
    pub fn current_exe(leading_args: Vec<OsString>) -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?, leading_args))
    }

    pub fn build(&self, job: &ChunkJob) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .arg("worker")
            .arg("--start-page")
            .arg(job.start_page.to_string())
            .arg("--end-page")
            .arg(job.end_page.to_string())
            .arg("--artifact")
            .arg(&job.artifact_path)
            .arg("--supervised")
            .stdin(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

/// Runs one isolated worker process per [`ChunkJob`]
pub struct ChunkScheduler {
    artifact_dir: PathBuf,
    command: WorkerCommand,
    grace_period: Duration,
}

impl ChunkScheduler {
    pub fn new(artifact_dir: impl Into<PathBuf>, command: WorkerCommand) -> Self {
        Self {
            artifact_dir: artifact_dir.into(),
            command,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    /// Partitions the page range into jobs with one artifact path each
    pub fn schedule(&self, total_pages: u32, chunks: u32) -> Result<Vec<ChunkJob>, SchedulerError> {
        let ranges = partition(total_pages, chunks)?;
        tracing::debug!(
            "Partitioned {} pages into {} chunk(s)",
            total_pages,
            ranges.len()
        );

        Ok(ranges
            .into_iter()
            .enumerate()
            .map(|(i, (start_page, end_page))| {
                let index = i as u32 + 1;
                ChunkJob {
                    index,
                    start_page,
                    end_page,
                    artifact_path: chunk_artifact_path(&self.artifact_dir, index),
                }
            })
            .collect())
    }

    /// Starts every job and waits until all of them have exited
    ///
    /// When `shutdown` completes first, workers still running have their
    /// stdin closed, are killed if they outlive the grace period, and are
    /// reported as [`WorkerStatus::Cancelled`]. Worker failures are
    /// reported, never returned as errors.
    pub async fn run<S>(&self, jobs: Vec<ChunkJob>, shutdown: S) -> Vec<WorkerOutcome>
    where
        S: Future<Output = ()>,
    {
        let total = jobs.len();
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let workers = jobs.into_iter().map(|job| {
            let cancel = cancel_rx.clone();
            async move {
                let status = self.supervise(&job, total, cancel).await;
                WorkerOutcome { job, status }
            }
        });
        let all = join_all(workers);
        tokio::pin!(all);
        tokio::pin!(shutdown);

        let outcomes = tokio::select! {
            outcomes = &mut all => outcomes,
            _ = &mut shutdown => {
                tracing::warn!("Interrupted, terminating outstanding workers");
                let _ = cancel_tx.send(true);
                all.await
            }
        };

        let succeeded = outcomes.iter().filter(|o| o.status.is_success()).count();
        tracing::info!("{}/{} worker(s) completed successfully", succeeded, total);
        outcomes
    }

    async fn supervise(&self, job: &ChunkJob, total: usize, mut cancel: watch::Receiver<bool>) -> WorkerStatus {
        tracing::info!(
            "Launching worker {}/{} for pages {} to {}, saving to '{}'",
            job.index,
            total,
            job.start_page,
            job.end_page,
            job.artifact_path.display()
        );

        let mut child = match self.command.build(job).spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::error!("Failed to start worker {}: {}", job.index, e);
                return WorkerStatus::SpawnFailed(e.to_string());
            }
        };

        if *cancel.borrow() {
            return terminate(&mut child, job.index, self.grace_period).await;
        }

        tokio::select! {
            status = child.wait() => match status {
                Ok(status) if status.success() => {
                    tracing::info!("Worker {} has finished", job.index);
                    WorkerStatus::Succeeded
                }
                Ok(status) => {
                    tracing::error!("Worker {} exited with {}", job.index, status);
                    WorkerStatus::Failed(status.code())
                }
                Err(e) => {
                    tracing::error!("Waiting on worker {} failed: {}", job.index, e);
                    WorkerStatus::Failed(None)
                }
            },
            _ = cancel.changed() => terminate(&mut child, job.index, self.grace_period).await,
        }
    }
}

/// Stops a worker unless it already exited on its own
///
/// Closing stdin lets a supervised worker close its browser; the process
/// is killed only if it is still running after `grace`.
async fn terminate(child: &mut Child, index: u32, grace: Duration) -> WorkerStatus {
    if let Ok(Some(status)) = child.try_wait() {
        return if status.success() {
            WorkerStatus::Succeeded
        } else {
            WorkerStatus::Failed(status.code())
        };
    }

    drop(child.stdin.take());
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(_) => tracing::debug!("Worker {} shut down", index),
        Err(_) => {
            tracing::warn!("Worker {} ignored shutdown, killing it", index);
            if let Err(e) = child.kill().await {
                tracing::warn!("Failed to kill worker {}: {}", index, e);
            }
        }
    }
    tracing::warn!("Worker {} cancelled", index);
    WorkerStatus::Cancelled
}
