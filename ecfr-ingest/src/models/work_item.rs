//! Work item lifecycle and run bookkeeping
//!
//! Each (issue date, title) moves through
//! PENDING → FETCHING → EXTRACTING → PERSISTING → DONE,
//! leaving early for SKIPPED (already stored) or FAILED.

use crate::types::WorkItem;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Work item state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkState {
    Pending,
    Fetching,
    Extracting,
    Persisting,
    Done,
    /// Versions for this date were already stored; nothing fetched
    Skipped,
    Failed,
}

impl WorkState {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkState::Done | WorkState::Skipped | WorkState::Failed)
    }

    /// Whether `next` is a legal successor of `self`
    pub fn allows(self, next: WorkState) -> bool {
        use WorkState::*;
        match (self, next) {
            (Pending, Fetching | Skipped | Failed) => true,
            (Fetching, Extracting | Failed) => true,
            (Extracting, Persisting | Failed) => true,
            (Persisting, Done | Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for WorkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkState::Pending => "PENDING",
            WorkState::Fetching => "FETCHING",
            WorkState::Extracting => "EXTRACTING",
            WorkState::Persisting => "PERSISTING",
            WorkState::Done => "DONE",
            WorkState::Skipped => "SKIPPED",
            WorkState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// State transition event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub item: WorkItem,
    pub old_state: WorkState,
    pub new_state: WorkState,
    pub transitioned_at: DateTime<Utc>,
}

/// Tracks one work item through its states
#[derive(Debug, Clone)]
pub struct WorkTracker {
    pub item: WorkItem,
    pub state: WorkState,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl WorkTracker {
    pub fn new(item: WorkItem) -> Self {
        Self {
            item,
            state: WorkState::Pending,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Move to `new_state`, logging the transition
    pub fn transition_to(&mut self, new_state: WorkState) -> StateTransition {
        if !self.state.allows(new_state) {
            tracing::warn!(
                item = %self.item,
                from = %self.state,
                to = %new_state,
                "Unexpected work item transition"
            );
        }

        let transition = StateTransition {
            item: self.item,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        if new_state.is_terminal() {
            self.ended_at = Some(transition.transitioned_at);
        }

        tracing::debug!(
            title = self.item.title,
            issue_date = %self.item.issue_date,
            from = %transition.old_state,
            to = %new_state,
            "Work item transition"
        );

        transition
    }

    pub fn elapsed_ms(&self) -> i64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds()
    }
}

// ============================================================================
// Outcomes and summaries
// ============================================================================

/// Final outcome of one work item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleOutcome {
    Done {
        /// Sections extracted from the document
        sections: usize,
        persisted: usize,
        /// Sections skipped for an incomplete identity
        rejected: usize,
    },
    Skipped,
    Failed {
        /// Error kind label
        kind: &'static str,
        reason: String,
    },
}

/// Outcome of one work item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleResult {
    pub item: WorkItem,
    pub outcome: TitleOutcome,
}

impl TitleResult {
    pub fn done(item: WorkItem, sections: usize, persisted: usize, rejected: usize) -> Self {
        Self {
            item,
            outcome: TitleOutcome::Done {
                sections,
                persisted,
                rejected,
            },
        }
    }

    pub fn skipped(item: WorkItem) -> Self {
        Self {
            item,
            outcome: TitleOutcome::Skipped,
        }
    }

    pub fn failed(item: WorkItem, kind: &'static str, reason: impl Into<String>) -> Self {
        Self {
            item,
            outcome: TitleOutcome::Failed {
                kind,
                reason: reason.into(),
            },
        }
    }
}

/// A failed work item as listed in summaries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    pub item: WorkItem,
    pub kind: &'static str,
    pub reason: String,
}

/// Tally of one date sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateSummary {
    pub issue_date: NaiveDate,
    pub done: Vec<u32>,
    pub skipped: Vec<u32>,
    pub failed: Vec<FailedItem>,
    pub sections_persisted: usize,
    pub sections_rejected: usize,
}

impl DateSummary {
    pub fn new(issue_date: NaiveDate) -> Self {
        Self {
            issue_date,
            done: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            sections_persisted: 0,
            sections_rejected: 0,
        }
    }

    pub fn record(&mut self, result: TitleResult) {
        match result.outcome {
            TitleOutcome::Done {
                persisted,
                rejected,
                ..
            } => {
                self.done.push(result.item.title);
                self.sections_persisted += persisted;
                self.sections_rejected += rejected;
            }
            TitleOutcome::Skipped => self.skipped.push(result.item.title),
            TitleOutcome::Failed { kind, reason } => self.failed.push(FailedItem {
                item: result.item,
                kind,
                reason,
            }),
        }
    }

    /// Sort title lists (completion order is arbitrary)
    pub fn finish(&mut self) {
        self.done.sort_unstable();
        self.skipped.sort_unstable();
        self.failed.sort_by_key(|f| f.item.title);
    }

    pub fn total(&self) -> usize {
        self.done.len() + self.skipped.len() + self.failed.len()
    }
}

impl fmt::Display for DateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} done, {} skipped, {} failed ({} sections persisted, {} rejected)",
            self.issue_date,
            self.done.len(),
            self.skipped.len(),
            self.failed.len(),
            self.sections_persisted,
            self.sections_rejected
        )
    }
}

/// Tally of a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub dates: Vec<DateSummary>,
    /// Stopped before every date was processed
    pub cancelled: bool,
}

impl RunSummary {
    pub fn push(&mut self, date: DateSummary) {
        self.dates.push(date);
    }

    pub fn done(&self) -> usize {
        self.dates.iter().map(|d| d.done.len()).sum()
    }

    pub fn skipped(&self) -> usize {
        self.dates.iter().map(|d| d.skipped.len()).sum()
    }

    pub fn failed(&self) -> usize {
        self.dates.iter().map(|d| d.failed.len()).sum()
    }

    pub fn sections_persisted(&self) -> usize {
        self.dates.iter().map(|d| d.sections_persisted).sum()
    }

    pub fn sections_rejected(&self) -> usize {
        self.dates.iter().map(|d| d.sections_rejected).sum()
    }

    /// Every failed (date, title), in date then title order
    pub fn failed_items(&self) -> Vec<&FailedItem> {
        self.dates.iter().flat_map(|d| d.failed.iter()).collect()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} date(s): {} done, {} skipped, {} failed; {} sections persisted, {} rejected{}",
            self.dates.len(),
            self.done(),
            self.skipped(),
            self.failed(),
            self.sections_persisted(),
            self.sections_rejected(),
            if self.cancelled { " (cancelled)" } else { "" }
        )?;
        for date in &self.dates {
            writeln!(f, "  {}", date)?;
        }
        for failed in self.failed_items() {
            writeln!(f, "  FAILED {} [{}]: {}", failed.item, failed.kind, failed.reason)?;
        }
        Ok(())
    }
}
