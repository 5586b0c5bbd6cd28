//! Date × title ingestion pipeline
//!
//! **Sweep:** dates run one after another; within a date, titles run through
//! a bounded worker pool (`buffer_unordered`). Each title is one work item:
//!
//! 1. Skip pre-check against storage (no network call when the title's date
//!    was completed by an earlier run)
//! 2. Fetch the whole-title document
//! 3. Extract sections and compute metrics on the blocking pool
//! 4. Persist through the shared [`BatchWriter`], marking the title complete
//!
//! A failing title never affects its siblings or later dates; every outcome
//! lands in the per-date and run summaries.

use crate::error::IngestError;
use crate::extractors::{extract, Dialect};
use crate::metrics::TextMetrics;
use crate::models::{DateSummary, RunSummary, TitleOutcome, TitleResult, WorkState, WorkTracker};
use crate::services::batch_writer::BatchWriter;
use crate::services::ecfr_client::SourceClient;
use crate::types::{IdentityPrefix, SectionRecord, WorkItem};
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Worker pool and pacing settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Requested concurrent titles per date (clamped below the title count)
    pub workers: usize,
    /// Pause a worker observes after each processed (non-skipped) title
    pub inter_title_pause: Duration,
    /// Title numbers swept for every date
    pub titles: Vec<u32>,
}

impl PipelineSettings {
    /// Worker count actually used: `min(workers, titles - 1)`, at least 1
    pub fn effective_workers(&self) -> usize {
        self.workers
            .min(self.titles.len().saturating_sub(1))
            .max(1)
    }
}

/// Fetch → extract → persist over every (date, title)
pub struct DateTitlePipeline {
    client: SourceClient,
    writer: BatchWriter,
    metrics: Arc<dyn TextMetrics>,
    settings: PipelineSettings,
}

impl DateTitlePipeline {
    pub fn new(
        client: SourceClient,
        writer: BatchWriter,
        metrics: Arc<dyn TextMetrics>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            client,
            writer,
            metrics,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run every date in order
    ///
    /// Cancellation is checked between dates; the date in progress always
    /// finishes.
    pub async fn run(&self, dates: &[NaiveDate], cancel: &CancellationToken) -> RunSummary {
        let mut run = RunSummary::default();

        tracing::info!(
            dates = dates.len(),
            titles = self.settings.titles.len(),
            workers = self.settings.effective_workers(),
            "Starting date/title pipeline"
        );

        for (index, &issue_date) in dates.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!(
                    remaining = dates.len() - index,
                    "Cancellation requested; not starting further dates"
                );
                run.cancelled = true;
                break;
            }

            tracing::info!(
                issue_date = %issue_date,
                date_index = index + 1,
                total_dates = dates.len(),
                "Processing date"
            );

            let summary = self.run_date(issue_date).await;
            tracing::info!("{}", summary);
            if !summary.failed.is_empty() {
                let failed: Vec<u32> = summary.failed.iter().map(|f| f.item.title).collect();
                tracing::warn!(issue_date = %issue_date, ?failed, "Titles failed for date");
            }
            run.push(summary);
        }

        tracing::info!(
            done = run.done(),
            skipped = run.skipped(),
            failed = run.failed(),
            persisted = run.sections_persisted(),
            rejected = run.sections_rejected(),
            "Pipeline complete"
        );

        run
    }

    /// Sweep all titles for one date
    pub async fn run_date(&self, issue_date: NaiveDate) -> DateSummary {
        let workers = self.settings.effective_workers();
        let pause = self.settings.inter_title_pause;

        let items = self
            .settings
            .titles
            .iter()
            .map(|&title| WorkItem::new(issue_date, title));

        let results: Vec<TitleResult> = stream::iter(items)
            .map(|item| async move {
                let result = self.process_item(item).await;
                if result.outcome != TitleOutcome::Skipped && !pause.is_zero() {
                    tokio::time::sleep(pause).await;
                }
                result
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        let mut summary = DateSummary::new(issue_date);
        for result in results {
            summary.record(result);
        }
        summary.finish();
        summary
    }

    /// Run one work item to a terminal state
    pub async fn process_item(&self, item: WorkItem) -> TitleResult {
        let mut tracker = WorkTracker::new(item);

        let title = item.title.to_string();
        match self.writer.sink().title_complete(&title, item.issue_date).await {
            Ok(true) => {
                tracker.transition_to(WorkState::Skipped);
                tracing::info!(title = item.title, issue_date = %item.issue_date, "Already stored, skipping");
                return TitleResult::skipped(item);
            }
            Ok(false) => {
                let prefix = IdentityPrefix::title(title.as_str());
                if let Ok(true) = self.writer.sink().exists_for_date(&prefix, item.issue_date).await {
                    tracing::info!(title = item.title, issue_date = %item.issue_date, "Earlier attempt did not finish, ingesting again");
                }
            }
            Err(e) => {
                // Proceed as if nothing is stored
                tracing::warn!(title = item.title, issue_date = %item.issue_date, error = %e, "Skip pre-check failed, processing anyway");
            }
        }

        tracker.transition_to(WorkState::Fetching);
        let document = match self.client.full_xml(item.issue_date, item.title, &[]).await {
            Ok(document) => document,
            Err(e) => return fail(&mut tracker, e),
        };

        tracker.transition_to(WorkState::Extracting);
        let metrics = Arc::clone(&self.metrics);
        let extracted =
            extract_blocking(document, item.issue_date, Dialect::Hierarchical, metrics).await;
        let records = match extracted {
            Ok(records) => records,
            Err(e) => return fail(&mut tracker, e),
        };

        tracker.transition_to(WorkState::Persisting);
        let report = match self.writer.write_title(&title, item.issue_date, &records).await {
            Ok(report) => report,
            Err(e) => return fail(&mut tracker, e.into()),
        };

        tracker.transition_to(WorkState::Done);
        tracing::info!(
            title = item.title,
            issue_date = %item.issue_date,
            sections = records.len(),
            persisted = report.persisted,
            rejected = report.rejected,
            elapsed_ms = tracker.elapsed_ms(),
            "Title processed"
        );

        TitleResult::done(item, records.len(), report.persisted, report.rejected)
    }
}

/// Extract and annotate a document on the blocking pool
pub async fn extract_blocking(
    document: Vec<u8>,
    issue_date: NaiveDate,
    dialect: Dialect,
    metrics: Arc<dyn TextMetrics>,
) -> Result<Vec<SectionRecord>, IngestError> {
    tokio::task::spawn_blocking(move || {
        let mut records = extract(&document, issue_date, &dialect)?;
        for record in &mut records {
            metrics.annotate(record);
        }
        Ok::<_, IngestError>(records)
    })
    .await
    .map_err(|e| IngestError::Worker(format!("extraction task for {}: {}", issue_date, e)))?
}

fn fail(tracker: &mut WorkTracker, error: IngestError) -> TitleResult {
    tracker.transition_to(WorkState::Failed);
    tracing::error!(
        title = tracker.item.title,
        issue_date = %tracker.item.issue_date,
        kind = error.kind_label(),
        error = %error,
        "Title failed"
    );
    TitleResult::failed(tracker.item, error.kind_label(), error.to_string())
}
