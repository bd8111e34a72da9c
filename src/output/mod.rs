//! Human-readable reports
//!
//! This module handles:
//! - Statistics over the stored vehicles
//! - The end-of-run summary printed by the `run` command

pub mod stats;

pub use stats::{load_statistics, print_statistics, render_statistics, VehicleStatistics};

use crate::pipeline::{WorkerStatus, WorkflowReport};
use std::fmt::Write;

/// Formats the outcome of a complete run
pub fn render_run_summary(report: &WorkflowReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== Harvest Summary ===\n");
    let _ = writeln!(out, "Workers:");
    for outcome in &report.workers {
        let status = match &outcome.status {
            WorkerStatus::Succeeded => "ok".to_string(),
            WorkerStatus::Failed(Some(code)) => format!("failed (exit code {})", code),
            WorkerStatus::Failed(None) => "failed (terminated)".to_string(),
            WorkerStatus::SpawnFailed(reason) => format!("not started ({})", reason),
            WorkerStatus::Cancelled => "cancelled".to_string(),
        };
        let _ = writeln!(
            out,
            "  Chunk {} (pages {}-{}): {}",
            outcome.job.index, outcome.job.start_page, outcome.job.end_page, status
        );
    }
    let _ = writeln!(out);

    let merge = &report.merge;
    let _ = writeln!(out, "Merge:");
    let _ = writeln!(out, "  Artifacts read: {}", merge.artifacts_read);
    let _ = writeln!(out, "  Artifacts skipped: {}", merge.skipped_artifacts.len());
    let _ = writeln!(out, "  Records read: {}", merge.records_read);
    let _ = writeln!(out, "  Duplicates removed: {}", merge.duplicates_dropped);
    let _ = writeln!(out);

    let sync = &report.sync;
    let _ = writeln!(out, "Sync:");
    let _ = writeln!(out, "  Inserted: {}", sync.inserted);
    let _ = writeln!(out, "  Updated: {}", sync.updated);
    let _ = writeln!(
        out,
        "  Skipped: {} ({} duplicate, {} without VIN)",
        sync.skipped(),
        sync.skipped_duplicates,
        sync.skipped_missing_vin
    );
    let _ = writeln!(out, "  Failed: {}", sync.failed);

    out
}
