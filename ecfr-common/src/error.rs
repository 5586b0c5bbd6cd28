//! Common error types for the eCFR crates

use thiserror::Error;

/// Common result type for eCFR operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors shared by the ingestion crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML file could not be parsed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Issue date string is not `YYYY-MM-DD`
    #[error("Invalid issue date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
