//! Catalog fetching and diffing
//!
//! This module turns "what the platform lists now" versus "what we persisted
//! last time" into the work queue for the detail workers:
//! - Streaming parse of the (very large) app-list response
//! - Diff of current against persisted ids
//! - Catalog replace in storage
//! - Seeding the bounded work queue on its own task

use crate::seeker::http::http_do;
use crate::seeker::SeekerError;
use crate::storage::{Catalog, GameStore, TitleId};
use reqwest::{Client, Request};
use serde::de::{Deserializer, SeqAccess, Visitor};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Path of the app-list endpoint, relative to the configured portal
pub const PATH_GET_APP_LIST: &str = "/ISteamApps/GetAppList/v2";

/// One catalog row travelling through the work queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: TitleId,
    pub name: String,
}

/// Ids present in the current catalog but absent from the persisted one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogDiff {
    entries: Vec<CatalogEntry>,
}

impl CatalogDiff {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> Vec<TitleId> {
        self.entries.iter().map(|entry| entry.id).collect()
    }

    pub fn into_entries(self) -> Vec<CatalogEntry> {
        self.entries
    }
}

#[derive(Deserialize)]
struct AppListResponse {
    applist: AppListBody,
}

#[derive(Deserialize)]
struct AppListBody {
    #[serde(deserialize_with = "deserialize_apps")]
    apps: Catalog,
}

struct AppsVisitor;

impl<'de> Visitor<'de> for AppsVisitor {
    type Value = Catalog;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an array of {appid, name} objects")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Catalog, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut catalog = Catalog::with_capacity(seq.size_hint().unwrap_or(0));
        // Each element is read loosely so one odd entry never fails the listing.
        while let Some(app) = seq.next_element::<Value>()? {
            let id = app
                .get("appid")
                .and_then(Value::as_u64)
                .and_then(|id| TitleId::try_from(id).ok());
            match id {
                Some(id) => {
                    let name = app.get("name").and_then(Value::as_str).unwrap_or_default();
                    catalog.insert(id, name.to_string());
                }
                None => tracing::trace!("Skipping app-list entry without a usable appid"),
            }
        }
        Ok(catalog)
    }
}

// Entries go straight into the map as they are read; no intermediate Vec.
fn deserialize_apps<'de, D>(deserializer: D) -> Result<Catalog, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_seq(AppsVisitor)
}

/// Parses an app-list response body into a catalog
///
/// Duplicate ids keep the last name seen. Entries without a numeric id are
/// skipped; unknown fields are ignored.
pub fn parse_app_list(body: &[u8]) -> Result<Catalog, serde_json::Error> {
    let response: AppListResponse = serde_json::from_slice(body)?;
    Ok(response.applist.apps)
}

/// Computes the ids of `current` that `persisted` does not know
///
/// The result is sorted by id so seeding order is reproducible.
pub fn diff_catalogs(persisted: &Catalog, current: &Catalog) -> CatalogDiff {
    let mut entries: Vec<CatalogEntry> = current
        .iter()
        .filter(|(id, _)| !persisted.contains_key(id))
        .map(|(id, name)| CatalogEntry {
            id: *id,
            name: name.clone(),
        })
        .collect();
    entries.sort_by_key(|entry| entry.id);
    CatalogDiff { entries }
}

/// Fetches the current catalog, diffs it and replaces the persisted one
///
/// The diff is computed against the persisted snapshot before anything is
/// written. The persisted catalog is only overwritten when the diff is
/// non-empty.
///
/// # Arguments
///
/// * `cancel` - Cancellation signal of the run
/// * `client` - HTTP client
/// * `request` - Prepared app-list request
/// * `store` - Storage holding the persisted catalog
/// * `platform` - Platform namespace in storage
///
/// # Returns
///
/// * `Ok(CatalogDiff)` - Newly seen entries
/// * `Err(SeekerError)` - Transport, status, parse or storage failure; all fatal
pub async fn refresh_catalog(
    cancel: &CancellationToken,
    client: &Client,
    request: Request,
    store: &Arc<dyn GameStore>,
    platform: &str,
) -> Result<CatalogDiff, SeekerError> {
    tracing::debug!("Getting app list from {}", request.url().path());
    let response = http_do(cancel, request, Some(client)).await?;
    if !response.status.is_success() {
        return Err(SeekerError::CatalogStatus(response.status));
    }

    let current = parse_app_list(&response.body)?;

    // Catalogs run to hundreds of thousands of rows; keep the storage round
    // trip off the async workers.
    let store = Arc::clone(store);
    let platform = platform.to_string();
    tokio::task::spawn_blocking(move || -> Result<CatalogDiff, SeekerError> {
        let persisted = store.get_catalog(&platform)?;
        tracing::debug!(
            "Persisted catalog: {} titles, current catalog: {} titles",
            persisted.len(),
            current.len()
        );

        let diff = diff_catalogs(&persisted, &current);
        if !diff.is_empty() {
            store.save_catalog(&platform, &current)?;
        }
        Ok(diff)
    })
    .await?
}

/// Feeds `entries` into the work queue on a separate task
///
/// The queue is closed (by dropping `queue`) once every entry is sent, or as
/// soon as `cancel` fires.
pub fn seed_queue(
    cancel: CancellationToken,
    entries: Vec<CatalogEntry>,
    queue: mpsc::Sender<CatalogEntry>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let total = entries.len();
        for entry in entries {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("Seeding interrupted by cancellation");
                    return;
                }
                sent = queue.send(entry) => {
                    if sent.is_err() {
                        tracing::debug!("Work queue receiver dropped, stop seeding");
                        return;
                    }
                }
            }
        }
        tracing::debug!("Seeded {} ids, closing work queue", total);
    })
}
