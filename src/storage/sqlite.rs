//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the GameStore trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{GameStore, StorageError, StorageResult};
use crate::storage::{Catalog, DetailRecord};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;

const RECORD_COLUMNS: &str = "sub_id, id, name, required_age, description, about, \
     short_description, languages, developers, publishers, is_free, header_image, \
     website, release_date";

/// SQLite storage backend
pub struct SqliteStore {
    conn: Mutex<Option<Connection>>,
}

impl SqliteStore {
    /// Creates a new SqliteStore instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
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
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| StorageError::Backend("connection lock poisoned".to_string()))?;
        let conn = guard.as_mut().ok_or(StorageError::Closed)?;
        f(conn)
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<(String, DetailRecord, String, String)> {
    let record = DetailRecord {
        id: row.get(1)?,
        name: row.get(2)?,
        required_age: row.get(3)?,
        description: row.get(4)?,
        about: row.get(5)?,
        short_description: row.get(6)?,
        languages: row.get(7)?,
        developers: Vec::new(),
        publishers: Vec::new(),
        is_free: row.get(10)?,
        header_image: row.get(11)?,
        website: row.get(12)?,
        release_date: row.get(13)?,
    };
    Ok((row.get(0)?, record, row.get(8)?, row.get(9)?))
}

// List columns are stored as JSON text and decoded outside the row closure
// so serde errors surface as StorageError::Serialization.
fn finish_record(
    (sub_id, mut record, developers, publishers): (String, DetailRecord, String, String),
) -> StorageResult<(String, DetailRecord)> {
    record.developers = serde_json::from_str(&developers)?;
    record.publishers = serde_json::from_str(&publishers)?;
    Ok((sub_id, record))
}

impl GameStore for SqliteStore {
    // ===== Catalog =====

    fn get_catalog(&self, platform: &str) -> StorageResult<Catalog> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name FROM catalog WHERE platform = ?1")?;

            let catalog = stmt
                .query_map(params![platform], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<Catalog, _>>()?;

            Ok(catalog)
        })
    }

    fn save_catalog(&self, platform: &str, catalog: &Catalog) -> StorageResult<()> {
        tracing::info!("Saving catalog of {} {} titles", catalog.len(), platform);
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM catalog WHERE platform = ?1", params![platform])?;
            {
                let mut stmt =
                    tx.prepare("INSERT INTO catalog (platform, id, name) VALUES (?1, ?2, ?3)")?;
                for (id, name) in catalog {
                    stmt.execute(params![platform, id, name])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    // ===== Records =====

    fn save_record(
        &self,
        platform: &str,
        sub_id: &str,
        record: &DetailRecord,
    ) -> StorageResult<()> {
        tracing::debug!("Saving record {}/{} - {}", platform, sub_id, record.name);
        let developers = serde_json::to_string(&record.developers)?;
        let publishers = serde_json::to_string(&record.publishers)?;
        let now = Utc::now().to_rfc3339();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO records
                 (platform, sub_id, id, name, required_age, description, about,
                  short_description, languages, developers, publishers, is_free,
                  header_image, website, release_date, fetched_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    platform,
                    sub_id,
                    record.id,
                    record.name,
                    record.required_age,
                    record.description,
                    record.about,
                    record.short_description,
                    record.languages,
                    developers,
                    publishers,
                    record.is_free,
                    record.header_image,
                    record.website,
                    record.release_date,
                    now,
                ],
            )?;
            Ok(())
        })
    }

    fn get_record(&self, platform: &str, sub_id: &str) -> StorageResult<Option<DetailRecord>> {
        let row = self.with_conn(|conn| {
            let query = format!(
                "SELECT {} FROM records WHERE platform = ?1 AND sub_id = ?2",
                RECORD_COLUMNS
            );
            Ok(conn
                .query_row(&query, params![platform, sub_id], record_from_row)
                .optional()?)
        })?;

        row.map(finish_record)
            .transpose()
            .map(|found| found.map(|(_, record)| record))
    }

    fn list_records(&self, platform: &str) -> StorageResult<Vec<(String, DetailRecord)>> {
        let rows = self.with_conn(|conn| {
            let query = format!(
                "SELECT {} FROM records WHERE platform = ?1 ORDER BY id",
                RECORD_COLUMNS
            );
            let mut stmt = conn.prepare(&query)?;
            let rows = stmt
                .query_map(params![platform], record_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        rows.into_iter().map(finish_record).collect()
    }

    // ===== Lifecycle =====

    fn close(&self) -> StorageResult<()> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| StorageError::Backend("connection lock poisoned".to_string()))?;
        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, e)| StorageError::Sqlite(e))?;
        }
        Ok(())
    }
}
