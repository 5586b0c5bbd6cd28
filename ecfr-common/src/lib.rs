//! # eCFR Common Library
//!
//! Shared code for the eCFR ingestion crates:
//! - Error type and result alias
//! - TOML bootstrap configuration and root folder resolution
//! - Issue date helpers
//! - SQLite database bootstrap (sections / section_versions schema)

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod dates;
pub mod error;

pub use error::{Error, Result};
