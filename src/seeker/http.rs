//! HTTP transport for the seekers
//!
//! This module handles:
//! - Building the shared HTTP client
//! - Executing one request on its own task, raced against cancellation

use reqwest::{Client, Request, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors from a single cancellable request
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Request task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Status and fully read body of a completed request
#[derive(Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

/// Builds the HTTP client shared by every request of a seeker
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!("gamecha/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(60))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Executes `request` without letting blocking network I/O delay cancellation
///
/// The request (send and body read) runs on a spawned task. Control returns
/// as soon as either that task finishes or `cancel` fires. On cancellation
/// the task is detached and its eventual result discarded.
///
/// # Arguments
///
/// * `cancel` - Cancellation signal of the current run
/// * `request` - A fully prepared request
/// * `client` - Client to execute with, or `None` for a default client
///
/// # Returns
///
/// * `Ok(HttpResponse)` - The request completed, whatever its status code
/// * `Err(TransportError::Cancelled)` - `cancel` fired first
/// * `Err(TransportError)` - Transport failure
pub async fn http_do(
    cancel: &CancellationToken,
    request: Request,
    client: Option<&Client>,
) -> Result<HttpResponse, TransportError> {
    let client = client.cloned().unwrap_or_default();

    let task = tokio::spawn(async move {
        let response = client.execute(request).await?;
        let status = response.status();
        let body = response.bytes().await?;
        Ok::<_, reqwest::Error>(HttpResponse {
            status,
            body: body.to_vec(),
        })
    });

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TransportError::Cancelled),
        joined = task => Ok(joined??),
    }
}
