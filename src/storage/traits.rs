//! Storage traits and error types

use crate::config::ConflictPolicy;
use crate::storage::{StoredVehicle, SyncRunRecord, UpsertOutcome, VehicleCounts};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(code, message)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StorageError::ConstraintViolation(
                    message.clone().unwrap_or_else(|| code.to_string()),
                )
            }
            _ => StorageError::Sqlite(e),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Vehicle persistence operations
///
/// Writes are issued one record at a time; callers rely on that ordering
/// to decide which of two colliding records survives.
pub trait VehicleStore {
    /// Gets a stored vehicle by its VIN
    fn find_by_vin(&self, vin: &str) -> StorageResult<Option<StoredVehicle>>;

    /// Inserts a vehicle, or updates the columns `policy` allows if the VIN
    /// is already stored
    ///
    /// A collision on any other unique column is reported as
    /// `StorageError::ConstraintViolation`.
    fn upsert_vehicle(
        &mut self,
        vehicle: &StoredVehicle,
        policy: ConflictPolicy,
    ) -> StorageResult<UpsertOutcome>;

    /// Deletes every vehicle; returns how many were removed
    fn truncate_vehicles(&mut self) -> StorageResult<u64>;

    fn vehicle_counts(&self) -> StorageResult<VehicleCounts>;

    fn record_sync_run(&mut self, run: &SyncRunRecord) -> StorageResult<i64>;

    fn latest_sync_run(&self) -> StorageResult<Option<SyncRunRecord>>;

    /// Writes a consistent copy of the database into `dir`
    fn backup_into(&self, dir: &Path) -> StorageResult<PathBuf>;
}
