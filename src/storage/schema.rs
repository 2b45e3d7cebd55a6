//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Gamecha database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Latest catalog snapshot per platform
CREATE TABLE IF NOT EXISTS catalog (
    platform TEXT NOT NULL,
    id INTEGER NOT NULL,
    name TEXT NOT NULL,
    PRIMARY KEY (platform, id)
);

-- Harvested detail records
CREATE TABLE IF NOT EXISTS records (
    platform TEXT NOT NULL,
    sub_id TEXT NOT NULL,
    id INTEGER NOT NULL,
    name TEXT NOT NULL,
    required_age INTEGER NOT NULL,
    description TEXT NOT NULL,
    about TEXT NOT NULL,
    short_description TEXT NOT NULL,
    languages TEXT NOT NULL,
    developers TEXT NOT NULL,
    publishers TEXT NOT NULL,
    is_free INTEGER NOT NULL,
    header_image TEXT NOT NULL,
    website TEXT,
    release_date TEXT,
    fetched_at TEXT NOT NULL,
    PRIMARY KEY (platform, sub_id)
);

CREATE INDEX IF NOT EXISTS idx_records_platform_id ON records(platform, id);
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
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
