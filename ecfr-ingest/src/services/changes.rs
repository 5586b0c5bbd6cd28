//! Per-title change history
//!
//! Lists every version of a title since a date and rebuilds one record per
//! version: resolve its ancestry, fetch the section document narrowed to
//! that ancestry, and extract it with the full-text dialect. When the
//! document cannot be fetched or yields nothing, the version's heading stands
//! in as content.

use crate::error::IngestResult;
use crate::extractors::xml_tree::normalize_whitespace;
use crate::extractors::{extract, Dialect};
use crate::metrics::TextMetrics;
use crate::services::ecfr_client::{ContentVersion, ResolvedAncestry, SourceClient};
use crate::types::SectionRecord;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use std::sync::Arc;

/// Default concurrent versions per title
pub const DEFAULT_CHANGE_WORKERS: usize = 5;

/// A version that could not be rebuilt at all
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedVersion {
    pub identifier: String,
    pub issue_date: NaiveDate,
    pub reason: String,
}

/// Result of one title's change history sweep
#[derive(Debug, Clone, Default)]
pub struct ChangeReport {
    pub title: u32,
    /// Versions listed by the source
    pub versions: usize,
    /// Records in completion order
    pub records: Vec<SectionRecord>,
    /// Records whose content fell back to the version heading
    pub fallbacks: usize,
    pub failed: Vec<FailedVersion>,
}

/// Rebuilds dated section records from a title's version history
pub struct ChangeHistoryPipeline {
    client: SourceClient,
    metrics: Arc<dyn TextMetrics>,
    workers: usize,
}

impl ChangeHistoryPipeline {
    pub fn new(client: SourceClient, metrics: Arc<dyn TextMetrics>, workers: usize) -> Self {
        Self {
            client,
            metrics,
            workers: workers.max(1),
        }
    }

    /// Sweep one title's versions since `since`
    ///
    /// Fails only when the version list itself cannot be retrieved.
    pub async fn run(&self, title: u32, since: Option<NaiveDate>) -> IngestResult<ChangeReport> {
        let versions = self.client.versions(title, since).await?;
        tracing::info!(title, versions = versions.len(), "Processing change history");

        let mut report = ChangeReport {
            title,
            versions: versions.len(),
            ..ChangeReport::default()
        };

        let mut results = stream::iter(versions)
            .map(|version| async move {
                let outcome = self.process_version(title, &version).await;
                (version, outcome)
            })
            .buffer_unordered(self.workers);

        while let Some((version, outcome)) = results.next().await {
            match outcome {
                Ok((record, fell_back)) => {
                    if fell_back {
                        report.fallbacks += 1;
                    }
                    report.records.push(record);
                }
                Err(e) => {
                    tracing::error!(
                        title,
                        identifier = %version.identifier,
                        issue_date = %version.issue_date,
                        error = %e,
                        "Version failed"
                    );
                    report.failed.push(FailedVersion {
                        identifier: version.identifier,
                        issue_date: version.issue_date,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            title,
            records = report.records.len(),
            fallbacks = report.fallbacks,
            failed = report.failed.len(),
            "Change history complete"
        );
        Ok(report)
    }

    /// Rebuild one version; `true` when the heading fallback was used
    async fn process_version(
        &self,
        title: u32,
        version: &ContentVersion,
    ) -> IngestResult<(SectionRecord, bool)> {
        let mut resolved = self
            .client
            .ancestry(
                version.issue_date,
                title,
                &version.part,
                version.subpart.as_deref(),
                &version.identifier,
            )
            .await?;

        if resolved.path.title.is_none() {
            resolved.path.title = Some(version.title.clone());
        }
        if resolved.section.is_none() {
            resolved.section = Some(version.identifier.clone());
        }

        let extracted = self.fetch_section(title, version, &resolved).await;

        let (mut record, fell_back) = match extracted {
            Some(record) => (record, false),
            None => {
                let section = resolved.section.clone().unwrap_or_default();
                let content = normalize_whitespace(&version.name);
                (
                    SectionRecord::new(version.issue_date, &resolved.path, section, content),
                    true,
                )
            }
        };

        self.metrics.annotate(&mut record);
        Ok((record, fell_back))
    }

    async fn fetch_section(
        &self,
        title: u32,
        version: &ContentVersion,
        resolved: &ResolvedAncestry,
    ) -> Option<SectionRecord> {
        let query = resolved.full_text_query();
        let document = match self.client.full_xml(version.issue_date, title, &query).await {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(
                    title,
                    identifier = %version.identifier,
                    error = %e,
                    "Section fetch failed, using version heading"
                );
                return None;
            }
        };

        let dialect = Dialect::FullTextByDate {
            ancestry: resolved.path.clone(),
            section: resolved.section.clone(),
        };

        match extract(&document, version.issue_date, &dialect) {
            Ok(records) => {
                let record = records.into_iter().next();
                if record.is_none() {
                    tracing::warn!(title, identifier = %version.identifier, "Empty section document, using version heading");
                }
                record
            }
            Err(e) => {
                tracing::warn!(
                    title,
                    identifier = %version.identifier,
                    error = %e,
                    "Section document unreadable, using version heading"
                );
                None
            }
        }
    }
}
