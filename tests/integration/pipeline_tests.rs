//! Integration tests for the chunked pipeline
//!
//! Workers are stand-in `sh -c` scripts that receive the same arguments
//! as the real `worker` subcommand and write (or fail to write) their
//! chunk artifact.

#![cfg(unix)]

use ria_harvest::config::{parse_config, Config, ConflictPolicy};
use ria_harvest::pipeline::{
    chunk_artifact_path, list_chunk_artifacts, run_workflow, sync_artifact, write_records,
    CanonicalArtifact, ChunkScheduler, WorkerCommand, WorkerStatus, WorkflowOptions,
};
use ria_harvest::record::VehicleRecord;
use ria_harvest::storage::{SqliteStorage, VehicleStore};
use std::path::Path;
use std::time::{Duration, Instant};

/// Writes two records: one for the chunk's first page and one shared by
/// every chunk. The chunk starting at page 5 crashes instead.
///
/// Positional arguments: $1=worker $3=start $5=end $7=artifact $8=--supervised
const WORKER_SCRIPT: &str = r#"
if [ "$3" = "5" ]; then exit 3; fi
printf '[{"url":"https://auto.ria.com/uk/auto_%s.html","vin":"VIN%s","price_usd":%s},{"url":"https://auto.ria.com/uk/auto_shared.html","vin":"VINSHARED","price_usd":%s}]' "$3" "$3" "$5" "$3" > "$7"
"#;

fn sh(script: &str) -> WorkerCommand {
    WorkerCommand::new("sh", vec!["-c".into(), script.into(), "sh".into()])
}

fn test_config(dir: &Path, total_pages: u32, chunks: u32) -> Config {
    parse_config(&format!(
        r#"
[crawler]
start-url = "https://auto.ria.com/uk/car/used/"
allowed-domain = "auto.ria.com"
total-pages = {total_pages}
chunks = {chunks}

[output]
artifact-dir = "{dir}/artifacts"
canonical-path = "{dir}/artifacts/data.json"
database-path = "{dir}/harvest.db"
backup-dir = "{dir}/dumps"
"#,
        dir = dir.display()
    ))
    .expect("test config is valid")
}

fn vehicle(url: &str, vin: &str, price: u64) -> VehicleRecord {
    let mut record = VehicleRecord::new(url);
    record.vin = vin.to_string();
    record.price_usd = Some(price);
    record
}

#[tokio::test]
async fn test_workflow_survives_failed_worker() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), 10, 3);
    let artifact_dir = dir.path().join("artifacts");

    // Left over from an earlier run; must not reach the merge
    let stale = chunk_artifact_path(&artifact_dir, 7);
    write_records(&stale, &[vehicle("https://auto.ria.com/uk/auto_stale.html", "STALE", 1)]).unwrap();
    let partial = artifact_dir.join("chunk_2.json.tmp");
    std::fs::write(&partial, "[{\"url\": ").unwrap();

    let report = run_workflow(
        &config,
        "cafebabe",
        sh(WORKER_SCRIPT),
        WorkflowOptions::default(),
        std::future::pending::<()>(),
    )
    .await
    .unwrap();

    let statuses: Vec<_> = report.workers.iter().map(|w| w.status.clone()).collect();
    assert_eq!(
        statuses,
        vec![WorkerStatus::Succeeded, WorkerStatus::Failed(Some(3)), WorkerStatus::Succeeded]
    );
    assert_eq!(report.failed_workers(), 1);

    assert_eq!(report.merge.artifacts_read, 2);
    assert_eq!(report.merge.skipped_artifacts, vec![chunk_artifact_path(&artifact_dir, 2)]);
    assert_eq!(report.merge.duplicates_dropped, 1);

    let canonical = CanonicalArtifact::read(&dir.path().join("artifacts/data.json"), "380").unwrap();
    let urls: Vec<&str> = canonical.records().iter().map(|r| r.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://auto.ria.com/uk/auto_1.html",
            "https://auto.ria.com/uk/auto_shared.html",
            "https://auto.ria.com/uk/auto_8.html",
        ]
    );

    // First occurrence of the shared record comes from chunk 1
    assert_eq!(canonical.records()[1].price_usd, Some(1));

    assert_eq!(report.sync.inserted, 3);
    let storage = SqliteStorage::new(&dir.path().join("harvest.db")).unwrap();
    assert!(storage.find_by_vin("STALE").unwrap().is_none());
    assert_eq!(storage.find_by_vin("VIN8").unwrap().unwrap().price_usd, Some(10));

    let run = storage.latest_sync_run().unwrap().unwrap();
    assert_eq!(run.config_hash, "cafebabe");
    assert_eq!(run.inserted, 3);

    // Consumed chunk artifacts and half-written leftovers are cleaned up
    assert!(list_chunk_artifacts(&artifact_dir).unwrap().is_empty());
    assert!(!partial.exists());
}

#[tokio::test]
async fn test_keep_chunks_and_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), 2, 2);
    // The artifact directory does not exist yet; workers write straight into it
    assert!(!dir.path().join("artifacts").exists());

    {
        let mut storage = SqliteStorage::new(&dir.path().join("harvest.db")).unwrap();
        let old = vehicle("https://auto.ria.com/uk/auto_old.html", "OLD", 5);
        let seeded = ria_harvest::storage::normalize(&old);
        storage.upsert_vehicle(&seeded, ConflictPolicy::PriceAndOdometer).unwrap();
    }

    let options = WorkflowOptions {
        fresh: true,
        keep_chunks: true,
    };
    let report = run_workflow(&config, "h", sh(WORKER_SCRIPT), options, std::future::pending::<()>())
        .await
        .unwrap();

    assert_eq!(report.failed_workers(), 0);
    assert_eq!(list_chunk_artifacts(&dir.path().join("artifacts")).unwrap().len(), 2);

    let storage = SqliteStorage::new(&dir.path().join("harvest.db")).unwrap();
    assert!(storage.find_by_vin("OLD").unwrap().is_none());
    assert_eq!(storage.vehicle_counts().unwrap().total, 3);
}

#[tokio::test]
async fn test_interrupt_cancels_outstanding_workers() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = ChunkScheduler::new(dir.path(), sh("sleep 30"))
        .with_grace_period(Duration::from_millis(100));
    let jobs = scheduler.schedule(6, 3).unwrap();

    let started = Instant::now();
    let outcomes = scheduler
        .run(jobs, tokio::time::sleep(Duration::from_millis(200)))
        .await;

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|o| o.status == WorkerStatus::Cancelled));
    assert!(list_chunk_artifacts(dir.path()).unwrap().is_empty());
}

#[tokio::test]
async fn test_interrupted_worker_shuts_down_on_stdin_close() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("browser_closed");
    let script = format!("cat > /dev/null; touch '{}'", marker.display());
    let scheduler = ChunkScheduler::new(dir.path(), sh(&script))
        .with_grace_period(Duration::from_secs(5));
    let jobs = scheduler.schedule(1, 1).unwrap();

    let outcomes = scheduler
        .run(jobs, tokio::time::sleep(Duration::from_millis(200)))
        .await;

    assert_eq!(outcomes[0].status, WorkerStatus::Cancelled);
    assert!(marker.exists());
}

#[tokio::test]
async fn test_missing_worker_binary_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let command = WorkerCommand::new(dir.path().join("no-such-worker"), vec![]);
    let scheduler = ChunkScheduler::new(dir.path(), command);
    let jobs = scheduler.schedule(1, 1).unwrap();

    let outcomes = scheduler.run(jobs, std::future::pending::<()>()).await;

    assert_eq!(outcomes.len(), 1);
    assert!(matches!(outcomes[0].status, WorkerStatus::SpawnFailed(_)));
}

#[tokio::test]
async fn test_unreachable_database_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path(), 2, 1);
    // A regular file where the database directory should be
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "").unwrap();
    config.output.database_path = blocker.join("harvest.db").display().to_string();

    let result = run_workflow(
        &config,
        "h",
        sh(WORKER_SCRIPT),
        WorkflowOptions::default(),
        std::future::pending::<()>(),
    )
    .await;

    assert!(result.is_err());
    assert!(list_chunk_artifacts(&dir.path().join("artifacts")).unwrap().is_empty());
}

#[test]
fn test_resync_updates_price_only() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), 1, 1);
    let mut storage = SqliteStorage::new(&dir.path().join("harvest.db")).unwrap();
    let canonical_path = dir.path().join("data.json");

    let first = vehicle("https://auto.ria.com/uk/auto_1.html", "VIN1", 10_000);
    write_records(&canonical_path, &[first]).unwrap();
    let artifact = CanonicalArtifact::read(&canonical_path, "380").unwrap();
    sync_artifact(&config, &mut storage, &artifact, "h", "first", false).unwrap();

    let mut second = vehicle("https://auto.ria.com/uk/auto_1_relisted.html", "VIN1", 9_500);
    second.title = "Renamed".to_string();
    write_records(&canonical_path, &[second]).unwrap();
    let artifact = CanonicalArtifact::read(&canonical_path, "380").unwrap();
    let report = sync_artifact(&config, &mut storage, &artifact, "h", "second", false).unwrap();

    assert_eq!(report.updated, 1);
    let stored = storage.find_by_vin("VIN1").unwrap().unwrap();
    assert_eq!(stored.price_usd, Some(9_500));
    assert_eq!(stored.url, "https://auto.ria.com/uk/auto_1.html");
    assert_eq!(stored.title, "");
    assert_eq!(storage.vehicle_counts().unwrap().total, 1);
}
