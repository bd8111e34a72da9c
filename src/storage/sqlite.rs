//! SQLite storage implementation

use crate::config::ConflictPolicy;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{StorageResult, VehicleStore};
use crate::storage::{StoredVehicle, SyncRunRecord, UpsertOutcome, VehicleCounts, TIMESTAMP_FORMAT};
use chrono::{Local, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

const INSERT_VEHICLE: &str = "INSERT INTO vehicles (
        vin, url, title, price_usd, odometer_km, seller_name, phone_number,
        image_url, images_count, plate_number, observed_at, first_synced_at, last_synced_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)";

/// Missing prices and odometer readings never erase a known value
const UPDATE_PRICE_AND_ODOMETER: &str = "
    ON CONFLICT(vin) DO UPDATE SET
        price_usd = COALESCE(excluded.price_usd, vehicles.price_usd),
        odometer_km = COALESCE(excluded.odometer_km, vehicles.odometer_km),
        last_synced_at = excluded.last_synced_at";

const UPDATE_FULL_ROW: &str = "
    ON CONFLICT(vin) DO UPDATE SET
        price_usd = COALESCE(excluded.price_usd, vehicles.price_usd),
        odometer_km = COALESCE(excluded.odometer_km, vehicles.odometer_km),
        title = excluded.title,
        seller_name = excluded.seller_name,
        phone_number = excluded.phone_number,
        image_url = excluded.image_url,
        images_count = excluded.images_count,
        plate_number = excluded.plate_number,
        observed_at = excluded.observed_at,
        last_synced_at = excluded.last_synced_at";

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn vin_exists(&self, vin: &str) -> StorageResult<bool> {
        let found = self
            .conn
            .query_row("SELECT 1 FROM vehicles WHERE vin = ?1", params![vin], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    fn count(&self, sql: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn vehicle_from_row(row: &Row<'_>) -> rusqlite::Result<StoredVehicle> {
    let observed_at: Option<String> = row.get(10)?;
    Ok(StoredVehicle {
        vin: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        price_usd: row.get(3)?,
        odometer_km: row.get(4)?,
        seller_name: row.get(5)?,
        phone_number: row.get(6)?,
        image_url: row.get(7)?,
        images_count: row.get(8)?,
        plate_number: row.get(9)?,
        observed_at: observed_at
            .and_then(|s| NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT).ok()),
    })
}

fn sync_run_from_row(row: &Row<'_>) -> rusqlite::Result<SyncRunRecord> {
    Ok(SyncRunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        source: row.get(4)?,
        records: row.get::<_, i64>(5)? as u64,
        inserted: row.get::<_, i64>(6)? as u64,
        updated: row.get::<_, i64>(7)? as u64,
        skipped: row.get::<_, i64>(8)? as u64,
        failed: row.get::<_, i64>(9)? as u64,
    })
}

impl VehicleStore for SqliteStorage {
    fn find_by_vin(&self, vin: &str) -> StorageResult<Option<StoredVehicle>> {
        let vehicle = self
            .conn
            .query_row(
                "SELECT vin, url, title, price_usd, odometer_km, seller_name, phone_number,
                        image_url, images_count, plate_number, observed_at
                 FROM vehicles WHERE vin = ?1",
                params![vin],
                vehicle_from_row,
            )
            .optional()?;
        Ok(vehicle)
    }

    fn upsert_vehicle(
        &mut self,
        vehicle: &StoredVehicle,
        policy: ConflictPolicy,
    ) -> StorageResult<UpsertOutcome> {
        let existed = self.vin_exists(&vehicle.vin)?;

        let conflict_clause = match policy {
            ConflictPolicy::PriceAndOdometer => UPDATE_PRICE_AND_ODOMETER,
            ConflictPolicy::FullRow => UPDATE_FULL_ROW,
        };
        let sql = format!("{}{}", INSERT_VEHICLE, conflict_clause);
        let now = Local::now().format(TIMESTAMP_FORMAT).to_string();

        self.conn.execute(
            &sql,
            params![
                vehicle.vin,
                vehicle.url,
                vehicle.title,
                vehicle.price_usd,
                vehicle.odometer_km,
                vehicle.seller_name,
                vehicle.phone_number,
                vehicle.image_url,
                vehicle.images_count,
                vehicle.plate_number,
                vehicle
                    .observed_at
                    .map(|t| t.format(TIMESTAMP_FORMAT).to_string()),
                now,
            ],
        )?;

        Ok(if existed {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        })
    }

    fn truncate_vehicles(&mut self) -> StorageResult<u64> {
        let removed = self.conn.execute("DELETE FROM vehicles", [])?;
        Ok(removed as u64)
    }

    fn vehicle_counts(&self) -> StorageResult<VehicleCounts> {
        let average_price: Option<f64> = self.conn.query_row(
            "SELECT AVG(price_usd) FROM vehicles WHERE price_usd IS NOT NULL",
            [],
            |row| row.get(0),
        )?;

        Ok(VehicleCounts {
            total: self.count("SELECT COUNT(*) FROM vehicles")?,
            with_phone: self.count("SELECT COUNT(*) FROM vehicles WHERE phone_number != ''")?,
            with_price: self.count("SELECT COUNT(*) FROM vehicles WHERE price_usd IS NOT NULL")?,
            with_odometer: self
                .count("SELECT COUNT(*) FROM vehicles WHERE odometer_km IS NOT NULL")?,
            average_price,
        })
    }

    fn record_sync_run(&mut self, run: &SyncRunRecord) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO sync_runs (started_at, finished_at, config_hash, source,
                                    records, inserted, updated, skipped, failed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                run.started_at,
                run.finished_at,
                run.config_hash,
                run.source,
                run.records as i64,
                run.inserted as i64,
                run.updated as i64,
                run.skipped as i64,
                run.failed as i64,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn latest_sync_run(&self) -> StorageResult<Option<SyncRunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, source,
                        records, inserted, updated, skipped, failed
                 FROM sync_runs ORDER BY id DESC LIMIT 1",
                [],
                sync_run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn backup_into(&self, dir: &Path) -> StorageResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let target = dir.join(format!(
            "backup_{}.db",
            Local::now().format("%Y%m%d_%H%M%S")
        ));
        let target_str = target.to_string_lossy().to_string();
        self.conn.execute("VACUUM INTO ?1", params![target_str])?;
        tracing::info!("Database backup written to {}", target.display());
        Ok(target)
    }
}
