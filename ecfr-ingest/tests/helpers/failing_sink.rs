//! Store wrapper that fails selected version inserts
//!
//! A batch fails when any of its versions contains the trigger text, for a
//! limited number of times; every other call reaches the wrapped store.

use async_trait::async_trait;
use chrono::NaiveDate;
use ecfr_ingest::db::{PersistenceSink, SqliteSectionStore};
use ecfr_ingest::error::PersistenceError;
use ecfr_ingest::types::{IdentityPrefix, SectionIdentity, SectionVersion};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

pub struct FailingSink {
    store: SqliteSectionStore,
    trigger: String,
    remaining: AtomicUsize,
}

impl FailingSink {
    /// Fail the first `times` inserts whose content contains `trigger`
    pub fn new(store: SqliteSectionStore, trigger: &str, times: usize) -> Self {
        Self {
            store,
            trigger: trigger.to_string(),
            remaining: AtomicUsize::new(times),
        }
    }

    pub fn failures_left(&self) -> usize {
        self.remaining.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PersistenceSink for FailingSink {
    async fn exists_for_date(
        &self,
        prefix: &IdentityPrefix,
        issue_date: NaiveDate,
    ) -> Result<bool, PersistenceError> {
        self.store.exists_for_date(prefix, issue_date).await
    }

    async fn upsert_identities(
        &self,
        identities: &[SectionIdentity],
    ) -> Result<HashMap<SectionIdentity, Uuid>, PersistenceError> {
        self.store.upsert_identities(identities).await
    }

    async fn insert_versions(&self, versions: &[SectionVersion]) -> Result<u64, PersistenceError> {
        let triggered = versions.iter().any(|v| v.content.contains(&self.trigger));
        if triggered
            && self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Err(PersistenceError::Database(sqlx::Error::PoolTimedOut));
        }
        self.store.insert_versions(versions).await
    }

    async fn title_complete(
        &self,
        title: &str,
        issue_date: NaiveDate,
    ) -> Result<bool, PersistenceError> {
        self.store.title_complete(title, issue_date).await
    }

    async fn discard_unfinished(
        &self,
        title: &str,
        issue_date: NaiveDate,
    ) -> Result<u64, PersistenceError> {
        self.store.discard_unfinished(title, issue_date).await
    }

    async fn mark_title_complete(
        &self,
        title: &str,
        issue_date: NaiveDate,
        sections: usize,
    ) -> Result<(), PersistenceError> {
        self.store.mark_title_complete(title, issue_date, sections).await
    }
}
