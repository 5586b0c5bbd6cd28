//! ecfr-ingest library interface
//!
//! Exposes the extraction, fetching and pipeline APIs for the binary and for
//! integration testing.

pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod metrics;
pub mod models;
pub mod services;
pub mod staging;
pub mod types;

pub use crate::error::{IngestError, IngestResult};

use crate::config::IngestConfig;
use crate::extractors::Dialect;
use crate::metrics::{StandardTextMetrics, TextMetrics};
use crate::services::batch_writer::BatchWriter;
use crate::services::changes::ChangeHistoryPipeline;
use crate::services::ecfr_client::SourceClient;
use crate::services::fetcher::{HttpTransport, ReqwestTransport, RetryingFetcher};
use crate::services::pipeline::{extract_blocking, DateTitlePipeline};
use crate::services::rate_limiter::RateLimiter;
use crate::services::start_date::StartDateFinder;
use crate::types::SectionRecord;
use chrono::NaiveDate;
use std::sync::Arc;

/// Shared services for one process
///
/// Every client built from a context shares one rate limiter, so all
/// requests to the source draw from a single budget.
#[derive(Clone)]
pub struct IngestContext {
    pub config: Arc<IngestConfig>,
    pub limiter: Arc<RateLimiter>,
    pub client: SourceClient,
    pub metrics: Arc<dyn TextMetrics>,
}

impl IngestContext {
    /// Build a context talking to the configured source over HTTP
    pub fn new(config: IngestConfig) -> IngestResult<Self> {
        let transport = ReqwestTransport::new(
            &config.source.user_agent,
            config.request_timeout(),
            config.connect_timeout(),
        )
        .map_err(|e| IngestError::Config(format!("HTTP client: {}", e)))?;

        Self::with_transport(config, Arc::new(transport))
    }

    /// Build a context over any transport
    pub fn with_transport(
        config: IngestConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> IngestResult<Self> {
        config.validate()?;

        let limiter = Arc::new(RateLimiter::new(
            config.rate_limit.requests_per_second,
            config.rate_limit.burst,
        )?);
        let fetcher = RetryingFetcher::new(transport, Arc::clone(&limiter), config.retry_policy());
        let client = SourceClient::new(fetcher, config.source.base_url.clone());

        Ok(Self {
            config: Arc::new(config),
            limiter,
            client,
            metrics: Arc::new(StandardTextMetrics),
        })
    }

    pub fn date_title_pipeline(&self, writer: BatchWriter) -> DateTitlePipeline {
        DateTitlePipeline::new(
            self.client.clone(),
            writer,
            Arc::clone(&self.metrics),
            self.config.pipeline_settings(),
        )
    }

    pub fn change_pipeline(&self) -> ChangeHistoryPipeline {
        ChangeHistoryPipeline::new(
            self.client.clone(),
            Arc::clone(&self.metrics),
            self.config.pipeline.change_workers,
        )
    }

    pub fn start_date_finder(&self) -> StartDateFinder {
        StartDateFinder::new(self.client.clone(), self.config.titles())
    }

    /// Fetch and extract one whole title without persisting it
    pub async fn snapshot_title(
        &self,
        issue_date: NaiveDate,
        title: u32,
    ) -> IngestResult<Vec<SectionRecord>> {
        let document = self.client.full_xml(issue_date, title, &[]).await?;
        extract_blocking(
            document,
            issue_date,
            Dialect::Hierarchical,
            Arc::clone(&self.metrics),
        )
        .await
    }
}
