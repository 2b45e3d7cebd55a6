//! Storage module for persisting harvested data
//!
//! This module handles all persistence for the seekers, including:
//! - Per-platform catalog snapshots (id → name)
//! - Detail records keyed by platform and stringified id
//! - Backend selection (embedded SQLite file or in-memory)

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{GameStore, StorageError, StorageResult};

use crate::config::StoreConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Numeric title id as assigned by the platform
pub type TitleId = u32;

/// Full id → name listing of a platform at one point in time
pub type Catalog = HashMap<TitleId, String>;

/// Parsed per-title metadata
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DetailRecord {
    pub id: TitleId,
    pub name: String,
    pub required_age: u32,
    pub description: String,
    pub about: String,
    pub short_description: String,
    pub languages: String,
    pub developers: Vec<String>,
    pub publishers: Vec<String>,
    pub is_free: bool,
    pub header_image: String,
    pub website: Option<String>,
    pub release_date: Option<String>,
}

impl DetailRecord {
    /// One-line summary used by listings
    pub fn summary_line(&self) -> String {
        format!("{}\t{}\t{}", self.id, self.name, self.developers.join(", "))
    }
}

/// Available storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// File-backed embedded database
    Embedded,
    /// Process-local maps, nothing survives a restart
    Memory,
}

impl StoreKind {
    /// Parses the `store.type` config value
    pub fn from_config_str(s: &str) -> Option<Self> {
        match s {
            "bolt" | "sqlite" => Some(Self::Embedded),
            "memory" | "dummy" => Some(Self::Memory),
            _ => None,
        }
    }
}

/// Opens the backend selected by the store configuration
///
/// # Arguments
///
/// * `config` - The `[store]` configuration section
///
/// # Returns
///
/// * `Ok(Arc<dyn GameStore>)` - Opened store, shareable between tasks
/// * `Err(StorageError)` - Unknown backend or failed to open
pub fn open_store(config: &StoreConfig) -> StorageResult<Arc<dyn GameStore>> {
    match StoreKind::from_config_str(&config.kind) {
        Some(StoreKind::Embedded) => {
            let store = SqliteStore::new(Path::new(&config.path))?;
            tracing::info!("Embedded store opened at {}", config.path);
            Ok(Arc::new(store))
        }
        Some(StoreKind::Memory) => {
            tracing::info!("In-memory store created, nothing will be persisted");
            Ok(Arc::new(MemoryStore::new()))
        }
        None => Err(StorageError::Backend(format!(
            "unknown store type '{}'",
            config.kind
        ))),
    }
}
