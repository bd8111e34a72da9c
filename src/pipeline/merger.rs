//! Merges chunk artifacts into one deduplicated canonical artifact

use crate::pipeline::artifact::{read_records, write_records, ArtifactError};
use crate::record::VehicleRecord;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Ordered records with at most one entry per `url`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalArtifact {
    records: Vec<VehicleRecord>,
}

impl CanonicalArtifact {
    pub fn records(&self) -> &[VehicleRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<VehicleRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn write(&self, path: &Path) -> Result<(), ArtifactError> {
        write_records(path, &self.records)
    }

    /// Loads a previously written canonical artifact
    ///
    /// Deduplicates again in case the file was edited by hand.
    pub fn read(path: &Path, country_code: &str) -> Result<Self, ArtifactError> {
        let records = read_records(path, country_code)?;
        let (artifact, _) = dedupe(records);
        Ok(artifact)
    }
}

/// What the merge read, skipped and dropped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub artifacts_read: usize,
    pub skipped_artifacts: Vec<PathBuf>,
    pub records_read: usize,
    pub duplicates_dropped: usize,
}

/// Merges artifacts into a [`CanonicalArtifact`]
///
/// Paths are processed in lexicographic order regardless of the order
/// given. Missing or malformed artifacts are skipped with a warning.
/// The first record seen for a `url` wins; later ones are dropped.
pub fn merge(paths: &[PathBuf], country_code: &str) -> (CanonicalArtifact, MergeReport) {
    let mut ordered: Vec<&PathBuf> = paths.iter().collect();
    ordered.sort();
    ordered.dedup();

    let mut report = MergeReport::default();
    let mut combined = Vec::new();

    for path in ordered {
        match read_records(path, country_code) {
            Ok(records) => {
                tracing::debug!("Read {} records from {}", records.len(), path.display());
                report.artifacts_read += 1;
                report.records_read += records.len();
                combined.extend(records);
            }
            Err(e) if e.is_missing() => {
                tracing::warn!("Chunk artifact {} not found, skipping", path.display());
                report.skipped_artifacts.push(path.clone());
            }
            Err(e) => {
                tracing::warn!("Skipping unreadable chunk artifact: {}", e);
                report.skipped_artifacts.push(path.clone());
            }
        }
    }

    let (artifact, dropped) = dedupe(combined);
    report.duplicates_dropped = dropped;

    tracing::info!(
        "Merged {} artifact(s): {} records, {} unique, {} duplicate(s) removed",
        report.artifacts_read,
        report.records_read,
        artifact.len(),
        dropped
    );
    (artifact, report)
}

fn dedupe(records: Vec<VehicleRecord>) -> (CanonicalArtifact, usize) {
    let mut seen = HashSet::with_capacity(records.len());
    let mut unique = Vec::with_capacity(records.len());
    let mut dropped = 0;

    for (index, record) in records.into_iter().enumerate() {
        if seen.contains(&record.url) {
            tracing::info!("Removed duplicate at index {}: {}", index, record.url);
            dropped += 1;
            continue;
        }
        seen.insert(record.url.clone());
        unique.push(record);
    }

    (CanonicalArtifact { records: unique }, dropped)
}
