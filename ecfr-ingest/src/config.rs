//! Configuration for ecfr-ingest
//!
//! Loaded from `ecfr-ingest.toml` (see [`ecfr_common::config::resolve_config_path`]).
//! Every section and key is optional and falls back to a compiled default.
//!
//! ```toml
//! [source]
//! base_url = "https://www.ecfr.gov/api/versioner/v1"
//!
//! [rate_limit]
//! requests_per_second = 2.0
//! burst = 10
//!
//! [retry]
//! max_attempts = 3
//! initial_delay_ms = 1000
//!
//! [pipeline]
//! start_date = "2017-01-03"
//! end_date = "2025-02-13"
//! workers = 4
//! inter_title_pause_ms = 5000
//! excluded_titles = [35]
//!
//! [storage]
//! batch_size = 50
//!
//! [logging]
//! level = "info"
//! ```

use crate::error::{IngestError, IngestResult};
use crate::services::batch_writer::{DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE};
use crate::services::changes::DEFAULT_CHANGE_WORKERS;
use crate::services::ecfr_client::DEFAULT_BASE_URL;
use crate::services::fetcher::RetryPolicy;
use crate::services::pipeline::PipelineSettings;
use chrono::NaiveDate;
use ecfr_common::config::{
    load_toml, resolve_config_path, LoggingConfig, RootFolderInitializer, RootFolderResolver,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Module name used for the default config file
pub const MODULE_NAME: &str = "ecfr-ingest";

/// Environment variable naming the database file
pub const DATABASE_PATH_ENV: &str = "ECFR_DATABASE";

/// First date every title is available from
const DEFAULT_START_DATE: (i32, u32, u32) = (2017, 1, 3);
const DEFAULT_END_DATE: (i32, u32, u32) = (2025, 2, 13);

const DEFAULT_USER_AGENT: &str = concat!("ecfr-ingest/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    pub source: SourceConfig,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    pub pipeline: PipelineConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 120,
            connect_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    pub requests_per_second: f64,
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 2.0,
            burst: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts on HTTP 429, including the first
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Concurrent titles per date
    pub workers: usize,
    /// Concurrent versions per title in change-history runs
    pub change_workers: usize,
    pub inter_title_pause_ms: u64,
    pub first_title: u32,
    pub last_title: u32,
    pub excluded_titles: Vec<u32>,
    /// Lower bound for change-history version lists
    pub changes_since: NaiveDate,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let start = ymd(DEFAULT_START_DATE);
        Self {
            start_date: start,
            end_date: ymd(DEFAULT_END_DATE),
            workers: 4,
            change_workers: DEFAULT_CHANGE_WORKERS,
            inter_title_pause_ms: 5000,
            first_title: 1,
            last_title: 50,
            excluded_titles: vec![35],
            changes_since: start,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub root_folder: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub staging_dir: Option<PathBuf>,
    pub batch_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            database: None,
            staging_dir: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

fn ymd((y, m, d): (i32, u32, u32)) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

/// Resolved on-disk locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub root_folder: PathBuf,
    pub database: PathBuf,
    pub staging_dir: PathBuf,
}

impl IngestConfig {
    /// Load from the resolved config path, or defaults when the file is absent
    pub fn load(cli_path: Option<&Path>) -> IngestResult<Self> {
        let path = resolve_config_path(cli_path, MODULE_NAME);
        let config = load_toml::<IngestConfig>(&path)?.unwrap_or_default();
        Ok(config)
    }

    pub fn validate(&self) -> IngestResult<()> {
        let rate = self.rate_limit.requests_per_second;
        if !(rate.is_finite() && rate > 0.0) {
            return Err(config_error(format!(
                "rate_limit.requests_per_second must be positive, got {}",
                rate
            )));
        }
        if self.rate_limit.burst == 0 {
            return Err(config_error("rate_limit.burst must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(config_error("retry.max_attempts must be at least 1"));
        }
        if self.storage.batch_size == 0 || self.storage.batch_size > MAX_BATCH_SIZE {
            return Err(config_error(format!(
                "storage.batch_size must be between 1 and {}, got {}",
                MAX_BATCH_SIZE, self.storage.batch_size
            )));
        }
        if self.pipeline.start_date > self.pipeline.end_date {
            return Err(config_error(format!(
                "pipeline.start_date {} is after end_date {}",
                self.pipeline.start_date, self.pipeline.end_date
            )));
        }
        if self.pipeline.first_title > self.pipeline.last_title {
            return Err(config_error(format!(
                "pipeline.first_title {} is after last_title {}",
                self.pipeline.first_title, self.pipeline.last_title
            )));
        }
        if self.titles().is_empty() {
            return Err(config_error("no titles left after exclusions"));
        }
        Ok(())
    }

    /// Title universe minus exclusions
    pub fn titles(&self) -> Vec<u32> {
        (self.pipeline.first_title..=self.pipeline.last_title)
            .filter(|t| !self.pipeline.excluded_titles.contains(t))
            .collect()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            workers: self.pipeline.workers,
            inter_title_pause: Duration::from_millis(self.pipeline.inter_title_pause_ms),
            titles: self.titles(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.source.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.source.connect_timeout_secs)
    }

    /// Resolve root folder, database and staging locations
    ///
    /// Database priority: CLI → `ECFR_DATABASE` → TOML → `<root>/ecfr.db`.
    pub fn storage_paths(
        &self,
        cli_root: Option<PathBuf>,
        cli_database: Option<PathBuf>,
    ) -> StoragePaths {
        let root_folder = RootFolderResolver::new()
            .with_cli_arg(cli_root)
            .with_toml_value(self.storage.root_folder.clone())
            .resolve();
        let initializer = RootFolderInitializer::new(root_folder.clone());

        let database = cli_database
            .or_else(|| std::env::var_os(DATABASE_PATH_ENV).map(PathBuf::from))
            .or_else(|| self.storage.database.clone())
            .unwrap_or_else(|| initializer.database_path());

        let staging_dir = self
            .storage
            .staging_dir
            .clone()
            .unwrap_or_else(|| initializer.staging_dir());

        StoragePaths {
            root_folder,
            database,
            staging_dir,
        }
    }
}

fn config_error(message: impl Into<String>) -> IngestError {
    IngestError::Config(message.into())
}
