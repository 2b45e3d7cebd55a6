//! Storage traits and error types
//!
//! This module defines the capability set the seekers and the query tool
//! need from a storage backend, and the associated error type.

use crate::storage::{Catalog, DetailRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store is closed")]
    Closed,

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Catalogs and records are namespaced by platform name. Methods take `&self`
/// so one store can be shared as `Arc<dyn GameStore>` between the seeker's
/// result sink and concurrent readers; implementations synchronize internally.
pub trait GameStore: Send + Sync {
    // ===== Catalog =====

    /// Loads the persisted catalog of a platform (empty if never saved)
    fn get_catalog(&self, platform: &str) -> StorageResult<Catalog>;

    /// Atomically replaces the persisted catalog of a platform
    fn save_catalog(&self, platform: &str, catalog: &Catalog) -> StorageResult<()>;

    // ===== Records =====

    /// Inserts or replaces one detail record
    ///
    /// # Arguments
    ///
    /// * `platform` - Platform namespace (e.g. "steam")
    /// * `sub_id` - Stringified platform id of the title
    /// * `record` - The parsed detail record
    fn save_record(&self, platform: &str, sub_id: &str, record: &DetailRecord)
        -> StorageResult<()>;

    /// Gets one detail record
    fn get_record(&self, platform: &str, sub_id: &str) -> StorageResult<Option<DetailRecord>>;

    /// Lists every stored record of a platform, ordered by numeric id
    fn list_records(&self, platform: &str) -> StorageResult<Vec<(String, DetailRecord)>>;

    // ===== Lifecycle =====

    /// Releases the backend; later calls fail with `StorageError::Closed`
    fn close(&self) -> StorageResult<()>;
}
