//! Error types for ecfr-ingest
//!
//! No error in this crate is process-fatal for the pipelines: each one is
//! recorded against the work item that raised it and the sweep continues.

use std::fmt;
use thiserror::Error;

/// Classification of a failed retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Source kept answering "too many requests" until retries ran out
    RateLimited,
    /// Failure expected to clear on its own (connection, timeout, 5xx)
    Transient,
    /// Failure that will not clear by retrying (4xx, bad body)
    Permanent,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FetchErrorKind::RateLimited => "rate limited",
            FetchErrorKind::Transient => "transient",
            FetchErrorKind::Permanent => "permanent",
        };
        f.write_str(name)
    }
}

/// Failed retrieval of one URL
#[derive(Debug, Clone, Error)]
#[error("Fetch {kind} after {attempts} attempt(s) for {url}: {cause}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub url: String,
    pub attempts: u32,
    /// Last underlying cause (status line or transport message)
    pub cause: String,
}

impl FetchError {
    pub fn new(
        kind: FetchErrorKind,
        url: impl Into<String>,
        attempts: u32,
        cause: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            url: url.into(),
            attempts,
            cause: cause.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            FetchErrorKind::Transient | FetchErrorKind::RateLimited
        )
    }
}

/// Batch write failure
///
/// Records in the failed batch are not committed; earlier batches stay.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("No storage id returned for section {0}")]
    MissingSectionId(String),

    #[error("Invalid stored value: {0}")]
    InvalidRow(String),
}

/// Staging file read/write failure
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("Staging IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Staging JSON error on {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Umbrella error for ingestion operations
#[derive(Debug, Error)]
pub enum IngestError {
    /// Document could not be parsed as XML
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Staging(#[from] StagingError),

    /// Source answered with a body that does not match the expected shape
    #[error("Unexpected response from {url}: {message}")]
    UnexpectedResponse { url: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    /// Background task panicked or was aborted
    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error("Common error: {0}")]
    Common(#[from] ecfr_common::Error),
}

impl IngestError {
    /// Short label for summaries and logs
    pub fn kind_label(&self) -> &'static str {
        match self {
            IngestError::MalformedDocument(_) => "malformed_document",
            IngestError::Fetch(e) => match e.kind {
                FetchErrorKind::RateLimited => "fetch_rate_limited",
                FetchErrorKind::Transient => "fetch_transient",
                FetchErrorKind::Permanent => "fetch_permanent",
            },
            IngestError::Persistence(_) => "persistence",
            IngestError::Staging(_) => "staging",
            IngestError::UnexpectedResponse { .. } => "unexpected_response",
            IngestError::Config(_) => "config",
            IngestError::Worker(_) => "worker",
            IngestError::Common(_) => "common",
        }
    }
}

/// Result type for ingestion operations
pub type IngestResult<T> = Result<T, IngestError>;
