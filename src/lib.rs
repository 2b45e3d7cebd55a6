//! Gamecha: incremental storefront metadata harvester
//!
//! This crate fetches the full title catalog of a storefront platform, diffs it
//! against the catalog persisted by the previous run, and fetches detail
//! metadata only for titles it has never seen before.

pub mod config;
pub mod query;
pub mod seeker;
pub mod storage;

use thiserror::Error;

/// Main error type for Gamecha operations
#[derive(Debug, Error)]
pub enum GamechaError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Seeker error: {0}")]
    Seeker(#[from] seeker::SeekerError),

    #[error("Record not found: {platform}/{sub_id}")]
    RecordNotFound { platform: String, sub_id: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Gamecha operations
pub type Result<T> = std::result::Result<T, GamechaError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use seeker::{SeekSummary, SeekerError, SeekerState, SteamSeeker};
pub use storage::{DetailRecord, GameStore, StorageError};
