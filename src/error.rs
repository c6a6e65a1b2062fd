//! Error types for marketdata-hub
//!
//! This module provides the error handling used across the crate, including:
//! - The main [`Error`] type and its [`Result`] alias
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for marketdata-hub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error produced by a caller-supplied work item
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for marketdata-hub
///
/// Cancellation is a distinct variant rather than a failure flavour: callers
/// awaiting a job can tell "stopped" apart from "went wrong".
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_queue_size")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error raised by the HTTP client
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Unknown bar interval
    #[error("invalid bar interval: {0}")]
    InvalidInterval(String),

    /// Input rejected before any work was queued
    #[error("validation error: {0}")]
    Validation(String),

    /// The operation observed its cancellation token
    #[error("operation cancelled")]
    Cancelled,

    /// The work queue has been closed and no longer accepts or hands out items
    #[error("work queue is closed")]
    QueueClosed,

    /// Shutdown in progress - not accepting new downloads
    #[error("shutdown in progress: not accepting new downloads")]
    ShuttingDown,

    /// A work item panicked while a worker was executing it
    #[error("work item panicked: {0}")]
    WorkerPanicked(String),

    /// A work item returned its own error
    #[error("job failed: {0}")]
    Job(#[source] BoxError),

    /// Config file watching error
    #[error("config watch error: {0}")]
    ConfigWatch(String),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap an arbitrary error returned by a work item
    pub fn job<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Job(Box::new(error))
    }

    /// Shorthand for a configuration error tied to a key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Whether this error means the work was stopped rather than failed
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "invalid_interval",
///     "message": "invalid bar interval: 7m"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "invalid_interval", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,
            Error::InvalidInterval(_) => 400,
            Error::Validation(_) => 400,

            // 500 Internal Server Error - Server-side issues
            Error::Io(_) => 500,
            Error::Csv(_) => 500,
            Error::Serialization(_) => 500,
            Error::WorkerPanicked(_) => 500,
            Error::Job(_) => 500,
            Error::ConfigWatch(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            // 502 Bad Gateway - Upstream API errors
            Error::Network(_) => 502,

            // 503 Service Unavailable
            Error::Cancelled => 503,
            Error::QueueClosed => 503,
            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Csv(_) => "csv_error",
            Error::InvalidInterval(_) => "invalid_interval",
            Error::Validation(_) => "validation_error",
            Error::Cancelled => "cancelled",
            Error::QueueClosed => "queue_closed",
            Error::ShuttingDown => "shutting_down",
            Error::WorkerPanicked(_) => "worker_panicked",
            Error::Job(_) => "job_failed",
            Error::ConfigWatch(_) => "config_watch_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({ "key": key })),
            Error::InvalidInterval(interval) => Some(serde_json::json!({
                "interval": interval,
                "supported": crate::types::BarInterval::ALL
                    .iter()
                    .map(|i| i.as_str())
                    .collect::<Vec<_>>(),
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
