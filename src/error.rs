//! Error types for webscraper-client
//!
//! This module provides layered error handling for the library:
//! - [`TransportError`] for a single failed request/response exchange
//! - [`ExportError`] for a failed or rejected bulk export
//! - [`Error`], the crate-wide error returned by every client operation
//!
//! A failed page fetch is always an error value, never confused with the
//! normal "no more pages" end of an export.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for webscraper-client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for webscraper-client
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "base_url")
        key: Option<String>,
    },

    /// Input rejected before any request was issued
    #[error("invalid {field}: {reason}")]
    Validation {
        /// The input that was rejected (e.g., "task name")
        field: String,
        /// Why it was rejected
        reason: String,
    },

    /// A request to the scraper server failed
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A bulk export failed or was rejected
    #[error("export error: {0}")]
    Export(#[from] ExportError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error raised outside a specific endpoint (client construction)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// File collision while writing an artifact
    #[error("file collision at {path}: {reason}")]
    FileCollision {
        /// The path where the collision occurred
        path: PathBuf,
        /// The reason for the collision
        reason: String,
    },

    /// Operation was cancelled through its cancellation token
    #[error("operation cancelled")]
    Cancelled,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a [`Error::Validation`]
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Validation { .. } => "validation_error",
            Error::Transport(e) => e.error_code(),
            Error::Export(e) => e.error_code(),
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::FileCollision { .. } => "file_collision",
            Error::Cancelled => "cancelled",
            Error::Other(_) => "internal_error",
        }
    }
}

/// Failure of a single request/response exchange
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be sent or the response body could not be read
    #[error("request to {endpoint} failed: {source}")]
    Request {
        /// Endpoint the request was sent to
        endpoint: String,
        /// Underlying HTTP client error
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status
    #[error("{endpoint} returned status {status}: {body}")]
    Status {
        /// Endpoint the request was sent to
        endpoint: String,
        /// HTTP status code
        status: u16,
        /// Response body, as far as it could be read
        body: String,
    },

    /// The response body did not have the expected shape
    #[error("malformed response from {endpoint}: {reason}")]
    Malformed {
        /// Endpoint the request was sent to
        endpoint: String,
        /// What was wrong with the body
        reason: String,
    },

    /// The server answered 2xx but reported that the action failed
    #[error("{endpoint} reported failure: {message}")]
    Rejected {
        /// Endpoint the request was sent to
        endpoint: String,
        /// Message reported by the server
        message: String,
    },

    /// The request could not be built
    #[error("invalid request for {endpoint}: {reason}")]
    InvalidRequest {
        /// Action or endpoint the request was meant for
        endpoint: String,
        /// Why it could not be built
        reason: String,
    },
}

impl TransportError {
    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            TransportError::Request { .. } => "request_failed",
            TransportError::Status { .. } => "bad_status",
            TransportError::Malformed { .. } => "malformed_response",
            TransportError::Rejected { .. } => "rejected",
            TransportError::InvalidRequest { .. } => "invalid_request",
        }
    }

    /// HTTP status of the failed exchange, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Request { source, .. } => source.status().map(|s| s.as_u16()),
            TransportError::Malformed { .. }
            | TransportError::Rejected { .. }
            | TransportError::InvalidRequest { .. } => None,
        }
    }
}

/// Bulk export errors
#[derive(Debug, Error)]
pub enum ExportError {
    /// Fetching a page failed; the accumulated pages were discarded
    #[error("fetching page of task {task} at cursor {cursor:?} failed: {source}")]
    Transport {
        /// Task being exported
        task: String,
        /// Cursor of the page that could not be fetched
        cursor: String,
        /// The underlying transport failure
        #[source]
        source: TransportError,
    },

    /// The export was cancelled; the accumulated pages were discarded
    #[error("export of task {task} cancelled")]
    Cancelled {
        /// Task being exported
        task: String,
    },

    /// The session already delivered its artifact
    #[error("export of task {task} was already delivered")]
    AlreadyDelivered {
        /// Task that was exported
        task: String,
    },

    /// The sink rejected the assembled artifact
    #[error("sink failed for export of task {task}: {reason}")]
    Sink {
        /// Task being exported
        task: String,
        /// Why the sink failed
        reason: String,
    },
}

impl ExportError {
    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            ExportError::Transport { .. } => "page_fetch_failed",
            ExportError::Cancelled { .. } => "export_cancelled",
            ExportError::AlreadyDelivered { .. } => "already_delivered",
            ExportError::Sink { .. } => "sink_failed",
        }
    }
}
