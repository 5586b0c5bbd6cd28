//! Persistence of section identities and dated versions

pub mod sections;

pub use sections::SqliteSectionStore;

use crate::error::PersistenceError;
use crate::types::{IdentityPrefix, SectionIdentity, SectionVersion};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use uuid::Uuid;

/// Storage for section identities and their versions
///
/// Identities are upserted (idempotent); versions are append-only except that
/// an unfinished title's versions for a date may be discarded before it is
/// ingested again.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Whether any version exists for sections under `prefix` at `issue_date`
    async fn exists_for_date(
        &self,
        prefix: &IdentityPrefix,
        issue_date: NaiveDate,
    ) -> Result<bool, PersistenceError>;

    /// Store identities not yet present and return the id of every one
    async fn upsert_identities(
        &self,
        identities: &[SectionIdentity],
    ) -> Result<HashMap<SectionIdentity, Uuid>, PersistenceError>;

    /// Append versions; all or none of the batch is stored
    async fn insert_versions(&self, versions: &[SectionVersion]) -> Result<u64, PersistenceError>;

    /// Whether every section of `title` at `issue_date` was stored
    async fn title_complete(
        &self,
        title: &str,
        issue_date: NaiveDate,
    ) -> Result<bool, PersistenceError>;

    /// Remove versions of `title` at `issue_date` left by an unfinished run
    async fn discard_unfinished(
        &self,
        title: &str,
        issue_date: NaiveDate,
    ) -> Result<u64, PersistenceError>;

    /// Record that all `sections` of `title` at `issue_date` are stored
    async fn mark_title_complete(
        &self,
        title: &str,
        issue_date: NaiveDate,
        sections: usize,
    ) -> Result<(), PersistenceError>;
}
