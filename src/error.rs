//! Error types for kegg-dl
//!
//! This module provides the error taxonomy of the fetch layer:
//! - Request/configuration errors raised before any network call
//! - Transport and parse errors raised per batch
//! - Aggregation errors (shape mismatch) that abort a whole call
//! - Storage errors from the record stores
//!
//! Which errors abort an orchestration call is decided by position, not by
//! variant: configuration errors and any error of the first batch abort the
//! call, errors of later batches are collected into the batch summary.

use crate::types::Shape;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for kegg-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for kegg-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Request descriptor is missing a parameter its operation requires
    #[error("malformed {operation} request: {message}")]
    MalformedDescriptor {
        /// Operation the descriptor was built for (e.g. "get")
        operation: String,
        /// What is missing or empty
        message: String,
    },

    /// Invalid configuration (batch size, rate, concurrency, store wiring)
    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "batch_size")
        key: Option<String>,
    },

    /// Network call failed or returned a non-success status
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Response body does not match its declared shape
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Batches with different shapes cannot be concatenated
    #[error("cannot concatenate {found} data into {expected} data")]
    ShapeMismatch {
        /// Shape of the collection being built
        expected: Shape,
        /// Shape of the offending batch
        found: Shape,
    },

    /// The call was cancelled before this unit of work was dispatched
    #[error("cancelled before dispatch")]
    Cancelled,

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a configuration error tied to a config key
    pub(crate) fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::InvalidConfiguration {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Machine-readable error code, stable across releases
    ///
    /// Used in batch summaries and events where the error itself cannot be cloned.
    pub fn code(&self) -> &'static str {
        match self {
            Error::MalformedDescriptor { .. } => "malformed_descriptor",
            Error::InvalidConfiguration { .. } => "invalid_configuration",
            Error::Transport(TransportError::Status { .. }) => "http_status",
            Error::Transport(TransportError::Connection(_)) => "connection",
            Error::Transport(TransportError::Timeout { .. }) => "timeout",
            Error::Parse(_) => "parse_error",
            Error::ShapeMismatch { .. } => "shape_mismatch",
            Error::Cancelled => "cancelled",
            Error::Database(_) => "database_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
        }
    }
}

/// Errors reported by a [`Transport`](crate::transport::Transport) or by the
/// status check applied to its response
#[derive(Debug, Error)]
pub enum TransportError {
    /// Remote answered with a non-success status
    #[error("HTTP {status} from {url}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Request URL
        url: String,
        /// Start of the response body, for diagnostics
        message: String,
    },

    /// Connection could not be established or the body could not be read
    #[error("connection failed: {0}")]
    Connection(String),

    /// The call did not complete within the per-call timeout
    #[error("request to {url} timed out after {after:?}")]
    Timeout {
        /// Request URL
        url: String,
        /// Timeout that elapsed
        after: Duration,
    },
}

/// Body/shape mismatches
#[derive(Debug, Error)]
pub enum ParseError {
    /// A text shape received bytes that are not valid UTF-8
    #[error("{shape} body is not valid UTF-8 (at byte {valid_up_to})")]
    InvalidUtf8 {
        /// Declared shape
        shape: Shape,
        /// Length of the valid prefix
        valid_up_to: usize,
    },

    /// A JSON shape received a body that does not parse as JSON
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[source] serde_json::Error),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}
