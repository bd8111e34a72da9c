use crate::config::ConflictPolicy;
use crate::record::VehicleRecord;
use crate::storage::{StorageError, StoredVehicle, UpsertOutcome, VehicleStore, TIMESTAMP_FORMAT};
use chrono::{DateTime, Local, NaiveDateTime};

/// Per-record outcome counts of one sync
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub records: u64,
    pub inserted: u64,
    pub updated: u64,
    /// Rejected by a unique constraint other than the VIN key
    pub skipped_duplicates: u64,
    pub skipped_missing_vin: u64,
    pub failed: u64,
}

impl SyncReport {
    pub fn rows_written(&self) -> u64 {
        self.inserted + self.updated
    }

    pub fn skipped(&self) -> u64 {
        self.skipped_duplicates + self.skipped_missing_vin
    }
}

/// Upserts canonical records into a [`VehicleStore`]
///
/// Records are written strictly in order; a failing record is logged and
/// counted, and the batch continues.
#[derive(Debug, Clone, Copy)]
pub struct PersistenceSync {
    policy: ConflictPolicy,
}

impl PersistenceSync {
    pub fn new(policy: ConflictPolicy) -> Self {
        Self { policy }
    }

    pub fn sync(&self, records: &[VehicleRecord], store: &mut dyn VehicleStore) -> SyncReport {
        let mut report = SyncReport {
            records: records.len() as u64,
            ..SyncReport::default()
        };

        for (index, record) in records.iter().enumerate() {
            let index = index + 1;

            if !record.has_vin() {
                tracing::warn!(
                    "Skipping record {} without VIN: url={}",
                    index,
                    record.url
                );
                report.skipped_missing_vin += 1;
                continue;
            }

            let vehicle = normalize(record);
            match store.upsert_vehicle(&vehicle, self.policy) {
                Ok(UpsertOutcome::Inserted) => {
                    tracing::debug!("Inserted record {}/{}: {}", index, records.len(), record.url);
                    report.inserted += 1;
                }
                Ok(UpsertOutcome::Updated) => {
                    tracing::debug!("Updated record {}/{}: {}", index, records.len(), record.url);
                    report.updated += 1;
                }
                Err(StorageError::ConstraintViolation(reason)) => {
                    tracing::warn!(
                        "Skipped duplicate at insert time: index={}, url={} ({})",
                        index,
                        record.url,
                        reason
                    );
                    report.skipped_duplicates += 1;
                }
                Err(e) => {
                    tracing::error!("Failed to store record {} ({}): {}", index, record.url, e);
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            "Sync finished: {} inserted, {} updated, {} skipped, {} failed",
            report.inserted,
            report.updated,
            report.skipped(),
            report.failed
        );
        report
    }
}

/// Converts an artifact record into its stored shape
pub fn normalize(record: &VehicleRecord) -> StoredVehicle {
    StoredVehicle {
        vin: record.vin.trim().to_string(),
        url: record.url.clone(),
        title: record.title.clone(),
        price_usd: record.price_usd.and_then(|p| i64::try_from(p).ok()),
        odometer_km: record.odometer_km.and_then(|o| i64::try_from(o).ok()),
        seller_name: record.seller_name.clone(),
        phone_number: record.phone_number.clone(),
        image_url: record.image_url.clone(),
        images_count: i64::from(record.images_count),
        plate_number: record.plate_number.clone(),
        observed_at: record.observed_at.as_deref().and_then(parse_observed_at),
    }
}

/// Parses an observation timestamp into naive local time
///
/// Accepts HTTP dates (RFC 2822), RFC 3339 and naive
/// `YYYY-MM-DD HH:MM:SS` forms. Offsets are converted to the local zone
/// and then dropped; naive input is taken as already local.
pub fn parse_observed_at(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local).naive_local());
    }

    let parsed = [TIMESTAMP_FORMAT, "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok());
    if parsed.is_none() {
        tracing::debug!("Unrecognized observation timestamp: {:?}", raw);
    }
    parsed
}
