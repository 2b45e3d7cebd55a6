use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Gamecha
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub seeker: SeekerConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// Per-platform seeker sections
///
/// A platform without a section is simply not harvested.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeekerConfig {
    pub steam: Option<SteamConfig>,
}

/// Steam seeker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SteamConfig {
    /// Base URL of the Web API serving the app list
    pub portal: String,

    /// Web API key
    pub key: String,

    /// Number of detail workers
    #[serde(default = "default_worker")]
    pub worker: usize,

    /// Fixed delay between two attempts for the same id
    #[serde(default = "default_retry_interval", with = "humantime_serde")]
    pub retry_interval: Duration,

    /// Counted retries per id before it is skipped (0 = unlimited)
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Base URL of the store serving `/api/appdetails`
    #[serde(default = "default_store_portal")]
    pub store_portal: String,

    /// Extra time workers get to drain after cancellation
    #[serde(default = "default_grace_period", with = "humantime_serde")]
    pub grace_period: Duration,
}

/// Storage backend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Backend kind: "bolt" (alias "sqlite") or "memory" (alias "dummy")
    #[serde(rename = "type", default = "default_store_type")]
    pub kind: String,

    /// Database file for the embedded backend
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: default_store_type(),
            path: default_store_path(),
        }
    }
}

fn default_worker() -> usize {
    10
}

fn default_retry_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_retry_count() -> u32 {
    5
}

fn default_store_portal() -> String {
    "https://store.steampowered.com".to_string()
}

fn default_grace_period() -> Duration {
    Duration::from_secs(3)
}

fn default_store_type() -> String {
    "bolt".to_string()
}

fn default_store_path() -> String {
    "gamecha.db".to_string()
}

impl SteamConfig {
    /// Builds a config with every optional field at its default
    pub fn new(portal: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            portal: portal.into(),
            key: key.into(),
            worker: default_worker(),
            retry_interval: default_retry_interval(),
            retry_count: default_retry_count(),
            store_portal: default_store_portal(),
            grace_period: default_grace_period(),
        }
    }
}
