//! Retrying HTTP downloader for per-symbol upstream requests
//!
//! [`RetryingDownloader`] issues one GET per call and folds every outcome into
//! either a [`DownloadOutcome`] or a cancellation:
//!
//! | Result of an attempt          | Action                                        |
//! |-------------------------------|-----------------------------------------------|
//! | 2xx                           | parse body as a JSON object, return it        |
//! | 429 / 5xx, attempts left      | warn, back off `unit * 2^attempt`, try again  |
//! | 429 / 5xx, last attempt       | warn, then error, return an empty outcome     |
//! | other status                  | error with response body, empty outcome       |
//! | transport or body error       | error, empty outcome, no retry                |
//! | cancellation token fired      | `Err(Error::Cancelled)`                       |
//!
//! An empty payload means "no usable data" and is not an error; callers check
//! [`DownloadOutcome::is_empty`].

use crate::config::{IbkrApiSettings, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::{IsRetryable, RetryPolicy};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Result envelope for one symbol's download
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DownloadOutcome {
    /// Symbol the request was made for
    pub symbol: String,
    /// Top-level JSON object of the response; empty when nothing usable came back
    pub payload: Map<String, Value>,
}

impl DownloadOutcome {
    /// Outcome carrying no data
    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            payload: Map::new(),
        }
    }

    /// Whether the payload holds no data
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Capability to fetch one symbol's data from a path relative to the upstream base URL
#[async_trait]
pub trait SymbolDownloader: Send + Sync {
    /// Download `path` on behalf of `symbol`
    ///
    /// Only cancellation is reported as an error; every other failure yields
    /// an empty outcome.
    async fn download(
        &self,
        symbol: &str,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<DownloadOutcome>;
}

/// HTTP implementation of [`SymbolDownloader`] with status-based retries
#[derive(Clone, Debug)]
pub struct RetryingDownloader {
    client: Client,
    base_url: Url,
    policy: RetryPolicy,
}

impl RetryingDownloader {
    /// Build a downloader with its own HTTP client from upstream and retry settings
    pub fn new(api: &IbkrApiSettings, retry: &RetryConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let accept = HeaderValue::from_str(&api.accept)
            .map_err(|e| Error::config("ibkr.accept", format!("invalid Accept header: {e}")))?;
        headers.insert(ACCEPT, accept);

        let client = Client::builder()
            .user_agent(api.user_agent.as_str())
            .default_headers(headers)
            .danger_accept_invalid_certs(api.bypass_ssl)
            .timeout(Duration::from_secs(api.request_timeout_secs))
            .build()?;

        if api.bypass_ssl {
            tracing::warn!("TLS certificate validation is disabled for upstream requests");
        }

        Ok(Self::with_client(
            client,
            parse_base_url(&api.base_url)?,
            RetryPolicy::from(retry),
        ))
    }

    /// Use an existing client
    pub fn with_client(client: Client, base_url: Url, policy: RetryPolicy) -> Self {
        Self {
            client,
            base_url,
            policy,
        }
    }

    fn cancelled(symbol: &str) -> Error {
        tracing::warn!(symbol, "Download cancelled");
        Error::Cancelled
    }
}

#[async_trait]
impl SymbolDownloader for RetryingDownloader {
    async fn download(
        &self,
        symbol: &str,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<DownloadOutcome> {
        let url = match self.base_url.join(path) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(symbol, path, error = %e, "Invalid request path");
                return Ok(DownloadOutcome::empty(symbol));
            }
        };
        let max_attempts = self.policy.max_attempts();

        for attempt in 1..=max_attempts {
            tracing::info!(symbol, attempt, path, "Requesting data");

            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Self::cancelled(symbol)),
                sent = self.client.get(url.clone()).send() => sent,
            };
            let response = match sent {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(symbol, attempt, error = %e, "Request failed");
                    return Ok(DownloadOutcome::empty(symbol));
                }
            };

            let status = response.status();
            if status.is_success() {
                let body = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Self::cancelled(symbol)),
                    body = response.text() => body,
                };
                let payload = match body {
                    Ok(body) => parse_payload(&body),
                    Err(e) => Err(ParseFailure::Body(e)),
                };
                return match payload {
                    Ok(payload) => {
                        tracing::info!(symbol, fields = payload.len(), "Download succeeded");
                        Ok(DownloadOutcome {
                            symbol: symbol.to_string(),
                            payload,
                        })
                    }
                    Err(e) => {
                        tracing::error!(symbol, attempt, error = %e, "Unreadable response body");
                        Ok(DownloadOutcome::empty(symbol))
                    }
                };
            }

            if status.is_retryable() {
                tracing::warn!(
                    symbol,
                    status = status.as_u16(),
                    attempt,
                    max_attempts,
                    "Retryable upstream status"
                );

                if attempt == max_attempts {
                    tracing::error!(
                        symbol,
                        status = status.as_u16(),
                        attempts = max_attempts,
                        "Download failed after all retry attempts"
                    );
                    return Ok(DownloadOutcome::empty(symbol));
                }

                if self.policy.backoff(attempt, cancel).await.is_err() {
                    return Err(Self::cancelled(symbol));
                }
                continue;
            }

            let text = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Self::cancelled(symbol)),
                text = response.text() => text.unwrap_or_default(),
            };
            tracing::error!(
                symbol,
                status = status.as_u16(),
                body = %text,
                "Non-retryable upstream status"
            );
            return Ok(DownloadOutcome::empty(symbol));
        }

        Ok(DownloadOutcome::empty(symbol))
    }
}

#[derive(Debug, thiserror::Error)]
enum ParseFailure {
    #[error("failed to read body: {0}")]
    Body(reqwest::Error),
    #[error("body is not a JSON object: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parse a success body; blank and `null` bodies give an empty map
fn parse_payload(body: &str) -> std::result::Result<Map<String, Value>, ParseFailure> {
    if body.trim().is_empty() {
        return Ok(Map::new());
    }
    let parsed: Option<Map<String, Value>> = serde_json::from_str(body)?;
    Ok(parsed.unwrap_or_default())
}

/// Parse the base URL, making sure relative paths are appended rather than replacing the last segment
fn parse_base_url(raw: &str) -> Result<Url> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized)
        .map_err(|e| Error::config("ibkr.base_url", format!("invalid base URL '{raw}': {e}")))
}
