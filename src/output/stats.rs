//! Statistics over the stored vehicles
//!
//! This module provides functionality for extracting and displaying
//! statistics from the storage layer.

use crate::storage::{StorageResult, SyncRunRecord, VehicleStore};
use std::fmt::Write;

/// Stored-vehicle statistics summary
#[derive(Debug, Clone)]
pub struct VehicleStatistics {
    /// Total number of stored vehicles
    pub total_vehicles: u64,

    pub with_phone: u64,
    pub with_price: u64,
    pub with_odometer: u64,

    /// Mean USD price over vehicles with a price
    pub average_price: Option<f64>,

    /// The most recent sync run, if any
    pub latest_run: Option<SyncRunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(VehicleStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn VehicleStore) -> StorageResult<VehicleStatistics> {
    let counts = storage.vehicle_counts()?;
    let latest_run = storage.latest_sync_run()?;

    Ok(VehicleStatistics {
        total_vehicles: counts.total,
        with_phone: counts.with_phone,
        with_price: counts.with_price,
        with_odometer: counts.with_odometer,
        average_price: counts.average_price,
        latest_run,
    })
}

fn percentage(part: u64, total: u64) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

/// Formats statistics for display
pub fn render_statistics(stats: &VehicleStatistics) -> String {
    let mut out = String::new();
    let total = stats.total_vehicles;

    let _ = writeln!(out, "=== Vehicle Statistics ===\n");
    let _ = writeln!(out, "Overview:");
    let _ = writeln!(out, "  Total vehicles: {}", total);
    for (label, count) in [
        ("With phone", stats.with_phone),
        ("With price", stats.with_price),
        ("With odometer", stats.with_odometer),
    ] {
        let _ = writeln!(
            out,
            "  {}: {} ({:.1}%)",
            label,
            count,
            percentage(count, total)
        );
    }
    match stats.average_price {
        Some(avg) => {
            let _ = writeln!(out, "  Average price: ${:.0}", avg);
        }
        None => {
            let _ = writeln!(out, "  Average price: n/a");
        }
    }
    let _ = writeln!(out);

    match &stats.latest_run {
        Some(run) => {
            let _ = writeln!(out, "Latest Sync Run (#{}):", run.id);
            let _ = writeln!(out, "  Started: {}", run.started_at);
            let _ = writeln!(out, "  Finished: {}", run.finished_at);
            let _ = writeln!(out, "  Source: {}", run.source);
            let _ = writeln!(out, "  Config hash: {}", run.config_hash);
            let _ = writeln!(
                out,
                "  Records: {} ({} inserted, {} updated, {} skipped, {} failed)",
                run.records, run.inserted, run.updated, run.skipped, run.failed
            );
        }
        None => {
            let _ = writeln!(out, "No sync runs recorded yet.");
        }
    }

    out
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &VehicleStatistics) {
    print!("{}", render_statistics(stats));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConflictPolicy;
    use crate::storage::{SqliteStorage, StoredVehicle};

    fn vehicle(vin: &str, price: Option<i64>, phone: &str) -> StoredVehicle {
        StoredVehicle {
            vin: vin.to_string(),
            url: format!("https://auto.ria.com/uk/auto_{}.html", vin),
            title: "Car".to_string(),
            price_usd: price,
            odometer_km: None,
            seller_name: String::new(),
            phone_number: phone.to_string(),
            image_url: String::new(),
            images_count: 0,
            plate_number: String::new(),
            observed_at: None,
        }
    }

    #[test]
    fn test_load_statistics() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let policy = ConflictPolicy::PriceAndOdometer;
        storage.upsert_vehicle(&vehicle("A", Some(10_000), "380501234567"), policy).unwrap();
        storage.upsert_vehicle(&vehicle("B", Some(20_000), ""), policy).unwrap();
        storage.upsert_vehicle(&vehicle("C", None, ""), policy).unwrap();

        let stats = load_statistics(&storage).unwrap();
        assert_eq!(stats.total_vehicles, 3);
        assert_eq!(stats.with_phone, 1);
        assert_eq!(stats.with_price, 2);
        assert_eq!(stats.average_price, Some(15_000.0));
        assert!(stats.latest_run.is_none());
    }

    #[test]
    fn test_render_empty_database() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let text = render_statistics(&load_statistics(&storage).unwrap());
        assert!(text.contains("Total vehicles: 0"));
        assert!(text.contains("With phone: 0 (0.0%)"));
        assert!(text.contains("Average price: n/a"));
        assert!(text.contains("No sync runs recorded yet."));
    }

    #[test]
    fn test_render_latest_run() {
        let stats = VehicleStatistics {
            total_vehicles: 4,
            with_phone: 1,
            with_price: 4,
            with_odometer: 2,
            average_price: Some(12_345.6),
            latest_run: Some(SyncRunRecord {
                id: 7,
                started_at: "2024-05-01 10:00:00".to_string(),
                finished_at: "2024-05-01 10:00:05".to_string(),
                config_hash: "abc123".to_string(),
                source: "./artifacts/data.json".to_string(),
                records: 5,
                inserted: 3,
                updated: 1,
                skipped: 1,
                failed: 0,
            }),
        };

        let text = render_statistics(&stats);
        assert!(text.contains("With phone: 1 (25.0%)"));
        assert!(text.contains("With odometer: 2 (50.0%)"));
        assert!(text.contains("Average price: $12346"));
        assert!(text.contains("Latest Sync Run (#7):"));
        assert!(text.contains("Records: 5 (3 inserted, 1 updated, 1 skipped, 0 failed)"));
    }
}
