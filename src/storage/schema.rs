//! Database schema definitions

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per vehicle, keyed by VIN
CREATE TABLE IF NOT EXISTS vehicles (
    vin TEXT PRIMARY KEY NOT NULL,
    url TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL DEFAULT '',
    price_usd INTEGER,
    odometer_km INTEGER,
    seller_name TEXT NOT NULL DEFAULT '',
    phone_number TEXT NOT NULL DEFAULT '',
    image_url TEXT NOT NULL DEFAULT '',
    images_count INTEGER NOT NULL DEFAULT 0,
    plate_number TEXT NOT NULL DEFAULT '',
    observed_at TEXT,
    first_synced_at TEXT NOT NULL,
    last_synced_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_vehicles_observed_at ON vehicles(observed_at);

-- One row per persisted canonical artifact
CREATE TABLE IF NOT EXISTS sync_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    source TEXT NOT NULL,
    records INTEGER NOT NULL,
    inserted INTEGER NOT NULL,
    updated INTEGER NOT NULL,
    skipped INTEGER NOT NULL,
    failed INTEGER NOT NULL
);
"#;

/// Initializes the database schema
///
/// Safe to call on an existing database.
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)
}
