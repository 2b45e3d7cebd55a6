//! Per-title detail fetching and parsing
//!
//! One call of [`DetailClient::fetch`] is one attempt for one id. Whether a
//! failed attempt is retried is decided by [`FetchError::kind`], the retry
//! loop itself lives in the retry module.

use crate::seeker::http::{http_do, TransportError};
use crate::storage::{DetailRecord, TitleId};
use reqwest::{Client, Request, StatusCode};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Path of the detail endpoint, relative to the configured store portal
pub const PATH_APP_DETAILS: &str = "/api/appdetails";

/// Failure of one detail attempt
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(reqwest::Error),

    #[error("unexpected status {0}")]
    Status(StatusCode),

    #[error("rate limited by upstream")]
    RateLimited,

    #[error("upstream reported the title as unsuccessful")]
    Unsuccessful,

    #[error("expected exactly one entry in detail response, got {0}")]
    UnexpectedShape(usize),

    #[error("malformed detail body: {0}")]
    MalformedBody(#[from] serde_json::Error),

    #[error("cannot interpret required_age {0}")]
    RequiredAge(String),

    #[error("request task failed: {0}")]
    Task(tokio::task::JoinError),

    #[error("cancelled")]
    Cancelled,
}

/// How the retry policy treats a [`FetchError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Wait and retry without consuming the retry budget
    RateLimited,
    /// Wait and retry, consuming one unit of the budget
    Retryable,
    /// Give up on this id immediately
    Fatal,
    /// The run is shutting down
    Cancelled,
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::RateLimited => FailureKind::RateLimited,
            FetchError::Transport(_)
            | FetchError::Status(_)
            | FetchError::Unsuccessful
            | FetchError::Task(_) => FailureKind::Retryable,
            FetchError::UnexpectedShape(_)
            | FetchError::MalformedBody(_)
            | FetchError::RequiredAge(_) => FailureKind::Fatal,
            FetchError::Cancelled => FailureKind::Cancelled,
        }
    }
}

impl From<TransportError> for FetchError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Http(e) => FetchError::Transport(e),
            TransportError::Task(e) => FetchError::Task(e),
            TransportError::Cancelled => FetchError::Cancelled,
        }
    }
}

// Steam sends `null` for several string and list fields of delisted titles.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Deserialize)]
struct DetailEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<DetailData>,
}

#[derive(Debug, Deserialize)]
struct DetailData {
    #[serde(default, deserialize_with = "null_as_default")]
    name: String,
    #[serde(default)]
    steam_appid: Option<u64>,
    #[serde(default)]
    required_age: Value,
    #[serde(default, deserialize_with = "null_as_default")]
    is_free: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    detailed_description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    about_the_game: String,
    #[serde(default, deserialize_with = "null_as_default")]
    short_description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    supported_languages: String,
    #[serde(default, deserialize_with = "null_as_default")]
    header_image: String,
    #[serde(default)]
    website: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    developers: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    publishers: Vec<String>,
    #[serde(default)]
    release_date: Option<ReleaseDate>,
}

#[derive(Debug, Deserialize)]
struct ReleaseDate {
    #[serde(default)]
    date: Option<String>,
}

/// Normalizes the `required_age` field to a non-negative integer
///
/// The field arrives as an integer, a numeric string or a float depending on
/// the title. Floats are truncated. Anything else is an error.
pub fn normalize_required_age(value: &Value) -> Result<u32, FetchError> {
    let invalid = || FetchError::RequiredAge(value.to_string());

    match value {
        Value::Number(n) => {
            if let Some(age) = n.as_u64() {
                u32::try_from(age).map_err(|_| invalid())
            } else if let Some(age) = n.as_f64() {
                if age.is_finite() && age >= 0.0 && age <= f64::from(u32::MAX) {
                    Ok(age.trunc() as u32)
                } else {
                    Err(invalid())
                }
            } else {
                Err(invalid())
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|age| u32::try_from(age).ok())
            .ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

/// Parses a detail response body
///
/// The body must be an object with exactly one key (the requested id) whose
/// value reports `success: true` and carries `data`.
///
/// # Arguments
///
/// * `body` - Raw response body
/// * `requested` - The id that was asked for, used when the payload names none
pub fn parse_app_detail(body: &[u8], requested: TitleId) -> Result<DetailRecord, FetchError> {
    if std::str::from_utf8(body).map(str::trim) == Ok("null") {
        return Err(FetchError::RateLimited);
    }

    let mut response: HashMap<String, DetailEnvelope> = serde_json::from_slice(body)?;
    if response.len() != 1 {
        return Err(FetchError::UnexpectedShape(response.len()));
    }
    let Some((key, envelope)) = response.drain().next() else {
        return Err(FetchError::UnexpectedShape(0));
    };

    let data = match envelope {
        DetailEnvelope {
            success: true,
            data: Some(data),
        } => data,
        _ => return Err(FetchError::Unsuccessful),
    };

    let required_age = normalize_required_age(&data.required_age)?;
    let id = data
        .steam_appid
        .and_then(|id| TitleId::try_from(id).ok())
        .or_else(|| key.parse().ok())
        .unwrap_or(requested);

    Ok(DetailRecord {
        id,
        name: data.name,
        required_age,
        description: data.detailed_description,
        about: data.about_the_game,
        short_description: data.short_description,
        languages: data.supported_languages,
        developers: data.developers,
        publishers: data.publishers,
        is_free: data.is_free,
        header_image: data.header_image,
        website: data.website.filter(|site| !site.is_empty()),
        release_date: data
            .release_date
            .and_then(|release| release.date)
            .filter(|date| !date.is_empty()),
    })
}

/// Issues detail requests against the store portal
#[derive(Debug, Clone)]
pub struct DetailClient {
    client: Client,
    store_portal: String,
}

impl DetailClient {
    pub fn new(client: Client, store_portal: &str) -> Self {
        Self {
            client,
            store_portal: store_portal.trim_end_matches('/').to_string(),
        }
    }

    /// Builds the detail request for one id
    pub fn request(&self, id: TitleId) -> Result<Request, reqwest::Error> {
        self.client
            .get(format!("{}{}", self.store_portal, PATH_APP_DETAILS))
            .query(&[("appids", id.to_string())])
            .build()
    }

    /// Performs one detail attempt for `id`
    ///
    /// # Returns
    ///
    /// * `Ok(DetailRecord)` - Parsed record
    /// * `Err(FetchError)` - Classify with [`FetchError::kind`]
    pub async fn fetch(
        &self,
        cancel: &CancellationToken,
        id: TitleId,
    ) -> Result<DetailRecord, FetchError> {
        let request = self.request(id).map_err(FetchError::Transport)?;
        let response = http_do(cancel, request, Some(&self.client)).await?;

        if response.status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }
        if !response.status.is_success() {
            return Err(FetchError::Status(response.status));
        }

        parse_app_detail(&response.body, id)
    }
}
