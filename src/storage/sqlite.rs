//! SQLite storage implementation
//!
//! `SqliteSink` stores one row per geolocated photo in `flickr_meta` and
//! keeps the `runs` table that `--stats` reads back.

use crate::state::{GeoPoint, Record};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{RecordSink, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus, RunTotals};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, status, \
     seeds_visited, items_discovered, records_emitted, items_failed";

/// SQLite-backed record sink
///
/// The connection sits behind a mutex so the sink can be shared by every
/// worker; each write is a single statement.
pub struct SqliteSink {
    conn: Mutex<Connection>,
}

impl SqliteSink {
    /// Opens or creates the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteSink)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database or create the schema
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    // ===== Records =====

    /// Inserts a record, replacing any earlier row for the same photo
    pub fn upsert_record(&self, record: &Record) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn()?.execute(
            "REPLACE INTO flickr_meta
                (photo_id, username, photo_title, description, photo_url, latitude, longitude, harvested_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.item_id,
                record.owner,
                record.title,
                record.description,
                record.url,
                record.latitude(),
                record.longitude(),
                now,
            ],
        )?;
        Ok(())
    }

    /// Looks up a stored record by photo id
    pub fn get_record(&self, photo_id: &str) -> StorageResult<Option<Record>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                "SELECT photo_id, username, photo_title, description, photo_url, latitude, longitude
                 FROM flickr_meta WHERE photo_id = ?1",
                params![photo_id],
                |row| {
                    Ok(Record {
                        item_id: row.get(0)?,
                        owner: row.get(1)?,
                        title: row.get(2)?,
                        description: row.get(3)?,
                        url: row.get(4)?,
                        geo: GeoPoint {
                            latitude: row.get(5)?,
                            longitude: row.get(6)?,
                        },
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    pub fn count_records(&self) -> StorageResult<u64> {
        let count: i64 =
            self.conn()?
                .query_row("SELECT COUNT(*) FROM flickr_meta", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Run Management =====

    /// Creates a new run in the `running` state
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    pub fn begin_run(&self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Stamps a run as finished with its final status and totals
    pub fn finish_run(&self, run_id: i64, status: RunStatus, totals: &RunTotals) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn()?.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, seeds_visited = ?3,
                 items_discovered = ?4, records_emitted = ?5, items_failed = ?6
             WHERE id = ?7",
            params![
                status.to_db_string(),
                now,
                totals.seeds_visited as i64,
                totals.items_discovered as i64,
                totals.records_emitted as i64,
                totals.items_failed as i64,
                run_id,
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    pub fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn()?
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    pub fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn()?
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    pub fn count_runs(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl RecordSink for SqliteSink {
    fn on_record(&self, record: Record) -> StorageResult<()> {
        self.upsert_record(&record)
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(RunStatus::Running),
        seeds_visited: row.get::<_, i64>(5)? as u64,
        items_discovered: row.get::<_, i64>(6)? as u64,
        records_emitted: row.get::<_, i64>(7)? as u64,
        items_failed: row.get::<_, i64>(8)? as u64,
    })
}
