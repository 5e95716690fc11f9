//! Database schema definitions

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per geolocated photo, keyed on the photo id
CREATE TABLE IF NOT EXISTS flickr_meta (
    photo_id TEXT PRIMARY KEY,
    username TEXT NOT NULL,
    photo_title TEXT NOT NULL,
    description TEXT NOT NULL,
    photo_url TEXT NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    harvested_at TEXT NOT NULL
);

-- Track harvest runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    seeds_visited INTEGER NOT NULL DEFAULT 0,
    items_discovered INTEGER NOT NULL DEFAULT 0,
    records_emitted INTEGER NOT NULL DEFAULT 0,
    items_failed INTEGER NOT NULL DEFAULT 0
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)
}
