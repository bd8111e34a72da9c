//! Chunk and canonical artifact files: JSON arrays of [`VehicleRecord`]

use crate::record::VehicleRecord;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed artifact {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl ArtifactError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// True when the artifact simply does not exist
    pub fn is_missing(&self) -> bool {
        matches!(self, ArtifactError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

const CHUNK_PREFIX: &str = "chunk_";
const CHUNK_SUFFIX: &str = ".json";
const TMP_SUFFIX: &str = ".tmp";

/// `<dir>/chunk_<index>.json`
pub fn chunk_artifact_path(dir: &Path, index: u32) -> PathBuf {
    dir.join(format!("{}{}{}", CHUNK_PREFIX, index, CHUNK_SUFFIX))
}

/// The `<n>` of a `chunk_<n>.json` path
pub fn chunk_index(path: &Path) -> Option<u32> {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_prefix(CHUNK_PREFIX))
        .and_then(|n| n.strip_suffix(CHUNK_SUFFIX))
        .filter(|index| index.chars().all(|c| c.is_ascii_digit()))
        .and_then(|index| index.parse().ok())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(TMP_SUFFIX);
    PathBuf::from(name)
}

/// Chunk artifacts present in `dir`, in lexicographic path order
pub fn list_chunk_artifacts(dir: &Path) -> Result<Vec<PathBuf>, ArtifactError> {
    list_files(dir, |path| chunk_index(path).is_some())
}

/// `chunk_<n>.json.tmp` files left behind by workers killed mid-write
pub fn list_partial_artifacts(dir: &Path) -> Result<Vec<PathBuf>, ArtifactError> {
    list_files(dir, |path| {
        path.to_str()
            .and_then(|p| p.strip_suffix(TMP_SUFFIX))
            .is_some_and(|finished| chunk_index(Path::new(finished)).is_some())
    })
}

fn list_files(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>, ArtifactError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ArtifactError::io(dir, e)),
    };

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ArtifactError::io(dir, e))?.path();
        if path.is_file() && keep(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Deletes the given artifacts; returns how many were removed
///
/// Paths that are already gone are ignored; other failures are logged.
pub fn remove_artifacts(paths: &[PathBuf]) -> usize {
    let mut removed = 0;
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => {
                tracing::debug!("Deleted chunk artifact {}", path.display());
                removed += 1;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::error!("Error deleting {}: {}", path.display(), e),
        }
    }
    removed
}

/// Writes `records` to `path` via a temporary file and rename, so readers
/// see either the previous file, nothing, or the complete new array
pub fn write_records(path: &Path, records: &[VehicleRecord]) -> Result<(), ArtifactError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ArtifactError::io(parent, e))?;
    }

    let tmp = tmp_path(path);

    let body = serde_json::to_vec_pretty(records).map_err(|e| ArtifactError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut file = fs::File::create(&tmp).map_err(|e| ArtifactError::io(&tmp, e))?;
    file.write_all(&body)
        .and_then(|_| file.sync_all())
        .map_err(|e| ArtifactError::io(&tmp, e))?;
    drop(file);

    fs::rename(&tmp, path).map_err(|e| ArtifactError::io(path, e))
}

/// Reads an artifact, dropping records that fail validation
pub fn read_records(path: &Path, country_code: &str) -> Result<Vec<VehicleRecord>, ArtifactError> {
    let body = fs::read(path).map_err(|e| ArtifactError::io(path, e))?;
    let records: Vec<VehicleRecord> =
        serde_json::from_slice(&body).map_err(|e| ArtifactError::Json {
            path: path.to_path_buf(),
            source: e,
        })?;

    let total = records.len();
    let valid: Vec<VehicleRecord> = records
        .into_iter()
        .enumerate()
        .filter_map(|(i, record)| match record.validate(country_code) {
            Ok(()) => Some(record),
            Err(e) => {
                tracing::warn!("Dropping record {} of {}: {}", i + 1, path.display(), e);
                None
            }
        })
        .collect();

    if valid.len() < total {
        tracing::warn!(
            "{}: kept {} of {} records",
            path.display(),
            valid.len(),
            total
        );
    }
    Ok(valid)
}
