//! Seekers harvest storefront metadata into storage
//!
//! This module handles:
//! - Catalog refresh and diff against the persisted catalog
//! - Bounded-concurrency detail fetching with retry and rate-limit recovery
//! - Lifecycle and graceful shutdown of a run

pub mod catalog;
pub mod detail;
pub mod http;
pub mod retry;
pub mod steam;
pub mod worker;

pub use catalog::{diff_catalogs, parse_app_list, CatalogDiff, CatalogEntry};
pub use detail::{normalize_required_age, DetailClient, FailureKind, FetchError};
pub use retry::{RetryOutcome, RetryPolicy, RetryState};
pub use steam::{SeekSummary, SeekerState, SteamSeeker};

use crate::config::SeekerConfig;
use crate::storage::{GameStore, StorageError};
use http::TransportError;
use reqwest::StatusCode;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors that end a seeker run
#[derive(Debug, Error)]
pub enum SeekerError {
    #[error("Failed to build HTTP client or request: {0}")]
    Client(reqwest::Error),

    #[error("Failed to fetch catalog: {0}")]
    CatalogTransport(reqwest::Error),

    #[error("Catalog request returned status {0}")]
    CatalogStatus(StatusCode),

    #[error("Failed to parse catalog: {0}")]
    CatalogParse(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("{platform} seeker grace quit timed out ({finished}/{total} workers finished)")]
    QuitTimeout {
        platform: String,
        finished: usize,
        total: usize,
    },

    #[error("Cancelled")]
    Cancelled,

    #[error("Seeker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<TransportError> for SeekerError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Http(e) => SeekerError::CatalogTransport(e),
            TransportError::Task(e) => SeekerError::Task(e),
            TransportError::Cancelled => SeekerError::Cancelled,
        }
    }
}

/// Runs every configured platform seeker to completion
///
/// # Arguments
///
/// * `cancel` - Cancellation signal, typically fired on interrupt
/// * `config` - The `[seeker]` configuration section
/// * `store` - Storage collaborator shared by all platforms
///
/// # Returns
///
/// * `Ok(Some(SeekSummary))` - The Steam seeker finished
/// * `Ok(None)` - No platform is configured, or the run was interrupted
///   before the catalog was fetched
/// * `Err(SeekerError)` - A platform run failed or timed out while quitting
pub async fn run(
    cancel: &CancellationToken,
    config: &SeekerConfig,
    store: Arc<dyn GameStore>,
) -> Result<Option<SeekSummary>, SeekerError> {
    let Some(steam) = config.steam.clone() else {
        tracing::warn!("No seeker configured, nothing to do");
        return Ok(None);
    };

    let seeker = match SteamSeeker::start(cancel, steam, store).await {
        Ok(seeker) => seeker,
        Err(SeekerError::Cancelled) => {
            tracing::info!("Interrupted before the catalog was fetched");
            return Ok(None);
        }
        Err(err) => return Err(err),
    };
    let summary = seeker.wait_until_done().await?;
    Ok(Some(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SteamConfig;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn test_run_without_platforms() {
        let result = run(
            &CancellationToken::new(),
            &SeekerConfig::default(),
            Arc::new(MemoryStore::new()),
        )
        .await
        .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_interrupt_before_catalog_is_not_an_error() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let config = SeekerConfig {
            steam: Some(SteamConfig::new("http://127.0.0.1:9", "KEY")),
        };
        let store = Arc::new(MemoryStore::new());

        let result = run(&cancel, &config, store.clone()).await.unwrap();
        assert!(result.is_none());
        assert!(store.get_catalog("steam").unwrap().is_empty());
    }

    #[test]
    fn test_quit_timeout_message() {
        let err = SeekerError::QuitTimeout {
            platform: "steam".to_string(),
            finished: 3,
            total: 10,
        };
        assert_eq!(
            err.to_string(),
            "steam seeker grace quit timed out (3/10 workers finished)"
        );
    }

    #[test]
    fn test_transport_cancel_maps_to_cancelled() {
        assert!(matches!(
            SeekerError::from(TransportError::Cancelled),
            SeekerError::Cancelled
        ));
    }
}
