//! Batched writes of section records to a [`PersistenceSink`]
//!
//! Records are validated, split into fixed-size batches, and each batch's
//! identity upsert and version insert run while holding one shared commit
//! lock. Two titles' batches therefore never interleave their upsert/insert
//! pairs. The final partial batch is always flushed.
//!
//! [`BatchWriter::write_title`] stores one title's date as a unit: versions
//! left by an earlier unfinished attempt are discarded first, and the title
//! is marked complete only after its last batch commits.

use crate::db::PersistenceSink;
use crate::error::{IngestError, IngestResult, PersistenceError};
use crate::types::{SectionIdentity, SectionRecord};
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Default records per batch
pub const DEFAULT_BATCH_SIZE: usize = 50;
/// Largest accepted batch size
pub const MAX_BATCH_SIZE: usize = 1000;

/// Outcome of one [`BatchWriter::write`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistReport {
    /// Versions stored
    pub persisted: usize,
    /// Records skipped for an incomplete identity
    pub rejected: usize,
    /// Batches committed
    pub batches: usize,
}

impl PersistReport {
    pub fn merge(&mut self, other: PersistReport) {
        self.persisted += other.persisted;
        self.rejected += other.rejected;
        self.batches += other.batches;
    }
}

/// Shared writer; clones use the same sink and commit lock
#[derive(Clone)]
pub struct BatchWriter {
    sink: Arc<dyn PersistenceSink>,
    commit_lock: Arc<Mutex<()>>,
    batch_size: usize,
}

impl BatchWriter {
    pub fn new(sink: Arc<dyn PersistenceSink>, batch_size: usize) -> IngestResult<Self> {
        if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
            return Err(IngestError::Config(format!(
                "batch size must be between 1 and {}, got {}",
                MAX_BATCH_SIZE, batch_size
            )));
        }

        Ok(Self {
            sink,
            commit_lock: Arc::new(Mutex::new(())),
            batch_size,
        })
    }

    pub fn sink(&self) -> &Arc<dyn PersistenceSink> {
        &self.sink
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Persist records in batches
    ///
    /// Records without a complete identity are counted as rejected and never
    /// written. A failing batch is returned as an error; batches committed
    /// before it stay committed.
    pub async fn write(&self, records: &[SectionRecord]) -> Result<PersistReport, PersistenceError> {
        let mut report = PersistReport::default();

        let mut valid: Vec<(SectionIdentity, &SectionRecord)> = Vec::with_capacity(records.len());
        for record in records {
            match record.identity() {
                Some(identity) => valid.push((identity, record)),
                None => report.rejected += 1,
            }
        }

        if report.rejected > 0 {
            tracing::warn!(
                rejected = report.rejected,
                total = records.len(),
                "Skipping records with incomplete identity (title, chapter, part and section are required)"
            );
        }

        for batch in valid.chunks(self.batch_size) {
            let identities: Vec<SectionIdentity> =
                batch.iter().map(|(identity, _)| identity.clone()).collect();

            let _guard = self.commit_lock.lock().await;

            let ids = self.sink.upsert_identities(&identities).await.map_err(|e| {
                tracing::error!(
                    batch = report.batches + 1,
                    size = batch.len(),
                    persisted = report.persisted,
                    error = %e,
                    "Identity upsert failed"
                );
                e
            })?;

            let versions = batch
                .iter()
                .map(|(identity, record)| {
                    ids.get(identity)
                        .map(|id| record.to_version(*id))
                        .ok_or_else(|| PersistenceError::MissingSectionId(identity.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?;

            self.sink.insert_versions(&versions).await.map_err(|e| {
                tracing::error!(
                    batch = report.batches + 1,
                    size = batch.len(),
                    persisted = report.persisted,
                    error = %e,
                    "Version insert failed"
                );
                e
            })?;

            report.persisted += batch.len();
            report.batches += 1;
            tracing::debug!(batch = report.batches, size = batch.len(), "Committed batch");
        }

        Ok(report)
    }

    /// Persist every record of `title` at `issue_date` and mark it complete
    ///
    /// A failure leaves the title unmarked, so the next attempt starts over.
    pub async fn write_title(
        &self,
        title: &str,
        issue_date: NaiveDate,
        records: &[SectionRecord],
    ) -> Result<PersistReport, PersistenceError> {
        let discarded = {
            let _guard = self.commit_lock.lock().await;
            self.sink.discard_unfinished(title, issue_date).await?
        };
        if discarded > 0 {
            tracing::warn!(
                title,
                issue_date = %issue_date,
                discarded,
                "Discarded versions from an unfinished attempt"
            );
        }

        let report = self.write(records).await?;

        let _guard = self.commit_lock.lock().await;
        self.sink
            .mark_title_complete(title, issue_date, report.persisted)
            .await?;

        Ok(report)
    }
}
