//! ria-harvest main entry point
//!
//! This is the command-line interface for the ria-harvest vehicle harvester.

use clap::{Parser, Subcommand};
use ria_harvest::config::{load_config_with_hash, Config};
use ria_harvest::crawler::run_worker;
use ria_harvest::output::{load_statistics, print_statistics, render_run_summary};
use ria_harvest::pipeline::{
    chunk_index, list_chunk_artifacts, merge, partition, run_workflow, sync_artifact,
    CanonicalArtifact, WorkerCommand, WorkflowOptions,
};
use ria_harvest::record::ChunkJob;
use ria_harvest::schedule::run_daily;
use ria_harvest::storage::{open_storage, VehicleStore};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// ria-harvest: parallel vehicle-listing harvester
///
/// Crawls listing pages in chunks, one worker process per chunk, reveals
/// seller phone numbers in a browser session, merges the chunk artifacts
/// and upserts the result into SQLite.
#[derive(Parser, Debug)]
#[command(name = "ria-harvest")]
#[command(version)]
#[command(about = "Parallel vehicle-listing harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl, merge and sync in one go
    Run {
        /// Clear stored vehicles before syncing
        #[arg(long)]
        fresh: bool,

        /// Show the chunk plan without crawling
        #[arg(long)]
        dry_run: bool,

        /// Keep chunk artifacts after the merge
        #[arg(long)]
        keep_chunks: bool,
    },

    /// Crawl one page range (spawned by `run`)
    Worker {
        #[arg(long)]
        start_page: u32,

        #[arg(long)]
        end_page: u32,

        /// Where to write this chunk's records
        #[arg(long)]
        artifact: PathBuf,

        /// Shut down when stdin closes (set by `run`)
        #[arg(long, hide = true)]
        supervised: bool,
    },

    /// Merge the chunk artifacts present in artifact-dir
    Merge,

    /// Persist a canonical artifact into the database
    Sync {
        /// Artifact to load (defaults to canonical-path)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Clear stored vehicles first
        #[arg(long)]
        fresh: bool,
    },

    /// Show statistics from the database and exit
    Stats,

    /// Write a timestamped copy of the database into backup-dir
    Backup,

    /// Harvest and back up daily at the [schedule] times until interrupted
    Schedule,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::debug!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::debug!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match cli.command {
        Command::Run {
            fresh,
            dry_run: true,
            ..
        } => handle_dry_run(&config, fresh),
        Command::Run {
            fresh, keep_chunks, ..
        } => {
            let leading_args = worker_leading_args(&cli.config, cli.verbose, cli.quiet);
            handle_run(&config, &config_hash, leading_args, fresh, keep_chunks).await
        }
        Command::Worker {
            start_page,
            end_page,
            artifact,
            supervised,
        } => handle_worker(&config, start_page, end_page, artifact, supervised).await,
        Command::Merge => handle_merge(&config),
        Command::Sync { input, fresh } => handle_sync(&config, &config_hash, input, fresh),
        Command::Stats => handle_stats(&config),
        Command::Backup => handle_backup(&config),
        Command::Schedule => {
            let leading_args = worker_leading_args(&cli.config, cli.verbose, cli.quiet);
            handle_schedule(&config, &config_hash, leading_args).await
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("ria_harvest=info,warn"),
            1 => EnvFilter::new("ria_harvest=debug,info"),
            2 => EnvFilter::new("ria_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Arguments every worker process is started with, before the subcommand
fn worker_leading_args(config: &Path, verbose: u8, quiet: bool) -> Vec<OsString> {
    let mut args = vec![config.as_os_str().to_owned()];
    if quiet {
        args.push("--quiet".into());
    }
    for _ in 0..verbose {
        args.push("--verbose".into());
    }
    args
}

/// Handles `run --dry-run`: shows how the page range would be split
fn handle_dry_run(config: &Config, fresh: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== ria-harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Start URL: {}", config.crawler.start_url);
    println!("  Allowed domain: {}", config.crawler.allowed_domain);
    println!("  Total pages: {}", config.crawler.total_pages);
    println!("  Chunks: {}", config.crawler.chunks);

    println!("\nBrowser:");
    println!("  Headless: {}", config.browser.headless);
    println!("  Reveal timeout: {}ms", config.browser.reveal_timeout_ms);

    println!("\nOutput:");
    println!("  Artifacts: {}", config.output.artifact_dir);
    println!("  Canonical artifact: {}", config.output.canonical_path);
    println!("  Database: {}", config.output.database_path);
    println!("  Conflict policy: {:?}", config.storage.conflict_policy);
    if fresh {
        println!("  Stored vehicles would be cleared before syncing");
    }

    println!("\nSchedule:");
    println!("  Daily harvest at: {}", config.schedule.scrape_at);
    println!("  Daily backup at: {}", config.schedule.backup_at);

    let ranges = partition(config.crawler.total_pages, config.crawler.chunks)?;
    println!("\nWorkers ({}):", ranges.len());
    for (i, (start, end)) in ranges.iter().enumerate() {
        println!("  - Chunk {}: pages {} to {}", i + 1, start, end);
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the main harvest operation
async fn handle_run(
    config: &Config,
    config_hash: &str,
    leading_args: Vec<OsString>,
    fresh: bool,
    keep_chunks: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Harvesting {} pages with {} worker(s) (config hash: {})",
        config.crawler.total_pages,
        config.crawler.chunks,
        config_hash
    );

    let command = WorkerCommand::current_exe(leading_args)?;
    let options = WorkflowOptions { fresh, keep_chunks };
    match run_workflow(config, config_hash, command, options, ctrl_c()).await {
        Ok(report) => {
            if report.failed_workers() > 0 {
                tracing::warn!(
                    "{} worker(s) did not finish; their pages are missing from this run",
                    report.failed_workers()
                );
            }
            print!("{}", render_run_summary(&report));
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}

/// Handles the `worker` subcommand: one page range, one browser session
async fn handle_worker(
    config: &Config,
    start_page: u32,
    end_page: u32,
    artifact: PathBuf,
    supervised: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if start_page == 0 || start_page > end_page {
        return Err(format!("Invalid page range {}-{}", start_page, end_page).into());
    }

    let job = ChunkJob {
        index: chunk_index(&artifact).unwrap_or(0),
        start_page,
        end_page,
        artifact_path: artifact,
    };

    let shutdown = async move {
        if supervised {
            tokio::select! {
                _ = wait_for_stdin_close() => tracing::debug!("Supervisor closed stdin"),
                _ = ctrl_c() => {}
            }
        } else {
            ctrl_c().await;
        }
    };

    match run_worker(config, &job, shutdown).await {
        Ok(report) => {
            tracing::info!(
                "Worker {} done: {} records, {} phones revealed",
                job.index,
                report.records,
                report.phones_revealed
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Worker {} failed: {}", job.index, e);
            Err(e.into())
        }
    }
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Resolves once stdin reaches end of file or fails
async fn wait_for_stdin_close() {
    let mut stdin = tokio::io::stdin();
    let mut buf = [0u8; 256];
    while let Ok(n) = stdin.read(&mut buf).await {
        if n == 0 {
            break;
        }
    }
}

/// Handles the `merge` subcommand
fn handle_merge(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let chunks = list_chunk_artifacts(Path::new(&config.output.artifact_dir))?;
    if chunks.is_empty() {
        tracing::warn!("No chunk artifacts found in {}", config.output.artifact_dir);
    }

    let (canonical, report) = merge(&chunks, &config.extract.country_code);
    canonical.write(Path::new(&config.output.canonical_path))?;

    println!(
        "✓ Merged {} artifact(s) into {} ({} records, {} duplicates removed)",
        report.artifacts_read,
        config.output.canonical_path,
        canonical.len(),
        report.duplicates_dropped
    );
    Ok(())
}

/// Handles the `sync` subcommand
fn handle_sync(
    config: &Config,
    config_hash: &str,
    input: Option<PathBuf>,
    fresh: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let input = input.unwrap_or_else(|| PathBuf::from(&config.output.canonical_path));

    let mut storage = open_storage(Path::new(&config.output.database_path))?;
    let canonical = CanonicalArtifact::read(&input, &config.extract.country_code)?;
    tracing::info!("Loaded {} records from {}", canonical.len(), input.display());

    let source = input.to_string_lossy();
    let report = sync_artifact(config, &mut storage, &canonical, config_hash, &source, fresh)?;

    println!(
        "✓ {} inserted, {} updated, {} skipped, {} failed",
        report.inserted,
        report.updated,
        report.skipped(),
        report.failed
    );

    Ok(())
}

/// Handles the `stats` subcommand: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the `backup` subcommand
fn handle_backup(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let storage = open_storage(Path::new(&config.output.database_path))?;
    let target = storage.backup_into(Path::new(&config.output.backup_dir))?;
    println!("✓ Backup written to {}", target.display());
    Ok(())
}

/// Handles the `schedule` subcommand: runs until Ctrl-C
async fn handle_schedule(
    config: &Config,
    config_hash: &str,
    leading_args: Vec<OsString>,
) -> Result<(), Box<dyn std::error::Error>> {
    let command = WorkerCommand::current_exe(leading_args)?;
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        ctrl_c().await;
        tracing::info!("Stopping scheduler");
        let _ = stop_tx.send(true);
    });

    run_daily(config, config_hash, command, stop_rx).await?;
    Ok(())
}
