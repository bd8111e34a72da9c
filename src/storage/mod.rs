//! Durable storage for harvested vehicles
//!
//! This module handles:
//! - SQLite database initialization and schema management
//! - Upserting vehicles keyed by VIN
//! - Sync run bookkeeping, truncation and backups

mod schema;
mod sqlite;
mod sync;
mod traits;

pub use sqlite::SqliteStorage;
pub use sync::{normalize, parse_observed_at, PersistenceSync, SyncReport};
pub use traits::{StorageError, StorageResult, VehicleStore};

use chrono::NaiveDateTime;
use std::path::Path;

/// Timestamp format used for `observed_at` columns
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Opens (creating if needed) the vehicle database
///
/// Failure here is a setup failure and aborts the run.
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// A vehicle row as persisted
#[derive(Debug, Clone, PartialEq)]
pub struct StoredVehicle {
    pub vin: String,
    pub url: String,
    pub title: String,
    pub price_usd: Option<i64>,
    pub odometer_km: Option<i64>,
    pub seller_name: String,
    pub phone_number: String,
    pub image_url: String,
    pub images_count: i64,
    pub plate_number: String,
    /// Naive local time
    pub observed_at: Option<NaiveDateTime>,
}

/// What an upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// One persisted sync run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: String,
    pub config_hash: String,
    pub source: String,
    pub records: u64,
    pub inserted: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Aggregate counts over the vehicles table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehicleCounts {
    pub total: u64,
    pub with_phone: u64,
    pub with_price: u64,
    pub with_odometer: u64,
    pub average_price: Option<f64>,
}
