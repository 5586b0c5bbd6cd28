//! Latest "first issue date" across titles
//!
//! Every title has versions from its own first issue date onward. The
//! latest of those dates is the earliest date at which all titles can be
//! fetched, and makes a sensible pipeline start date.

use crate::services::ecfr_client::SourceClient;
use chrono::NaiveDate;

pub struct StartDateFinder {
    client: SourceClient,
    titles: Vec<u32>,
}

impl StartDateFinder {
    pub fn new(client: SourceClient, titles: Vec<u32>) -> Self {
        Self { client, titles }
    }

    /// Maximum over titles of each title's first issue date
    ///
    /// Titles that fail or list no versions are logged and left out.
    /// `None` when no title answered.
    pub async fn find(&self) -> Option<NaiveDate> {
        let mut latest: Option<NaiveDate> = None;

        for &title in &self.titles {
            let first = match self.client.versions(title, None).await {
                Ok(versions) => versions.iter().map(|v| v.issue_date).min(),
                Err(e) => {
                    tracing::warn!(title, error = %e, "Could not list versions");
                    continue;
                }
            };

            match first {
                Some(date) => {
                    tracing::debug!(title, first_issue_date = %date, "First issue date");
                    latest = latest.max(Some(date));
                }
                None => tracing::warn!(title, "Title lists no versions"),
            }
        }

        latest
    }
}
