//! Core record types for the ingestion pipeline
//!
//! - [`SectionRecord`]: one section at one issue date, as extracted
//! - [`SectionIdentity`]: six-field natural key, independent of time
//! - [`SectionVersion`]: dated snapshot ready for append-only storage
//! - [`AncestryPath`]: hierarchy context built while walking a document
//! - [`WorkItem`]: one (issue date, title) unit of pipeline work

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Section record
// ============================================================================

/// One regulatory section at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionRecord {
    pub issue_date: NaiveDate,
    pub title: String,
    pub chapter: String,
    #[serde(default, alias = "subchap", deserialize_with = "empty_as_none")]
    pub subchapter: Option<String>,
    pub part: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub subpart: Option<String>,
    pub section: String,
    /// Normalized plain text (single-spaced, trimmed)
    pub content: String,
    pub word_count: u32,
    /// Absent when no score could be computed
    #[serde(default)]
    pub readability_score: Option<f64>,
    #[serde(default)]
    pub mandate_count: u32,
}

impl SectionRecord {
    /// Build a record from its ancestry and normalized content
    ///
    /// Derived metrics start empty; see [`crate::metrics::TextMetrics`].
    pub fn new(
        issue_date: NaiveDate,
        ancestry: &AncestryPath,
        section: impl Into<String>,
        content: String,
    ) -> Self {
        let word_count = count_words(&content);
        Self {
            issue_date,
            title: ancestry.title.clone().unwrap_or_default(),
            chapter: ancestry.chapter.clone().unwrap_or_default(),
            subchapter: ancestry.subchapter.clone(),
            part: ancestry.part.clone().unwrap_or_default(),
            subpart: ancestry.subpart.clone(),
            section: section.into(),
            content,
            word_count,
            readability_score: None,
            mandate_count: 0,
        }
    }

    /// Natural key of this record
    ///
    /// Returns `None` when any mandatory level (title, chapter, part,
    /// section) is empty. This is the only place identity completeness is
    /// decided; every persistence path goes through it.
    pub fn identity(&self) -> Option<SectionIdentity> {
        let mandatory = [&self.title, &self.chapter, &self.part, &self.section];
        if mandatory.iter().any(|v| v.trim().is_empty()) {
            return None;
        }

        Some(SectionIdentity {
            title: self.title.clone(),
            chapter: self.chapter.clone(),
            subchapter: self.subchapter.clone().filter(|s| !s.is_empty()),
            part: self.part.clone(),
            subpart: self.subpart.clone().filter(|s| !s.is_empty()),
            section: self.section.clone(),
        })
    }

    /// Version row for this record under a stored section id
    pub fn to_version(&self, section_id: Uuid) -> SectionVersion {
        SectionVersion {
            section_id,
            issue_date: self.issue_date,
            content: self.content.clone(),
            word_count: self.word_count,
            readability_score: self.readability_score,
            mandate_count: self.mandate_count,
        }
    }
}

/// Count whitespace-delimited tokens
pub fn count_words(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

// ============================================================================
// Identity and version
// ============================================================================

/// Six-field natural key of a section
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SectionIdentity {
    pub title: String,
    pub chapter: String,
    pub subchapter: Option<String>,
    pub part: String,
    pub subpart: Option<String>,
    pub section: String,
}

impl fmt::Display for SectionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "title {} ch {}", self.title, self.chapter)?;
        if let Some(subchapter) = &self.subchapter {
            write!(f, " subch {}", subchapter)?;
        }
        write!(f, " part {}", self.part)?;
        if let Some(subpart) = &self.subpart {
            write!(f, " subpart {}", subpart)?;
        }
        write!(f, " {}", self.section)
    }
}

/// Leading fields of the natural key used by the skip pre-check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityPrefix {
    pub title: String,
    pub chapter: Option<String>,
    pub part: Option<String>,
}

impl IdentityPrefix {
    /// Prefix covering a whole title
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            chapter: None,
            part: None,
        }
    }
}

/// Dated snapshot of one section
#[derive(Debug, Clone, PartialEq)]
pub struct SectionVersion {
    pub section_id: Uuid,
    pub issue_date: NaiveDate,
    pub content: String,
    pub word_count: u32,
    pub readability_score: Option<f64>,
    pub mandate_count: u32,
}

// ============================================================================
// Ancestry
// ============================================================================

/// Hierarchy levels enclosing a section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HierarchyLevel {
    Title,
    Chapter,
    Subchapter,
    Part,
    Subpart,
    Section,
}

impl HierarchyLevel {
    /// Subchapter and subpart may be absent
    pub fn is_optional(self) -> bool {
        matches!(self, HierarchyLevel::Subchapter | HierarchyLevel::Subpart)
    }

    /// Type name used by the ancestry API
    pub fn api_type(self) -> &'static str {
        match self {
            HierarchyLevel::Title => "title",
            HierarchyLevel::Chapter => "chapter",
            HierarchyLevel::Subchapter => "subchapter",
            HierarchyLevel::Part => "part",
            HierarchyLevel::Subpart => "subpart",
            HierarchyLevel::Section => "section",
        }
    }
}

/// Ancestry of a section: title, chapter, subchapter?, part, subpart?
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AncestryPath {
    pub title: Option<String>,
    pub chapter: Option<String>,
    pub subchapter: Option<String>,
    pub part: Option<String>,
    pub subpart: Option<String>,
}

impl AncestryPath {
    fn slot(&mut self, level: HierarchyLevel) -> Option<&mut Option<String>> {
        match level {
            HierarchyLevel::Title => Some(&mut self.title),
            HierarchyLevel::Chapter => Some(&mut self.chapter),
            HierarchyLevel::Subchapter => Some(&mut self.subchapter),
            HierarchyLevel::Part => Some(&mut self.part),
            HierarchyLevel::Subpart => Some(&mut self.subpart),
            HierarchyLevel::Section => None,
        }
    }

    /// Enter a level, returning the value it replaces
    pub fn enter(&mut self, level: HierarchyLevel, identifier: Option<String>) -> Option<String> {
        match self.slot(level) {
            Some(slot) => std::mem::replace(slot, identifier.filter(|s| !s.is_empty())),
            None => None,
        }
    }

    /// Leave a level
    ///
    /// Optional levels are cleared. Mandatory levels get back the value that
    /// was current before the level was entered.
    pub fn leave(&mut self, level: HierarchyLevel, previous: Option<String>) {
        if let Some(slot) = self.slot(level) {
            *slot = if level.is_optional() { None } else { previous };
        }
    }

    pub fn get(&self, level: HierarchyLevel) -> Option<&str> {
        match level {
            HierarchyLevel::Title => self.title.as_deref(),
            HierarchyLevel::Chapter => self.chapter.as_deref(),
            HierarchyLevel::Subchapter => self.subchapter.as_deref(),
            HierarchyLevel::Part => self.part.as_deref(),
            HierarchyLevel::Subpart => self.subpart.as_deref(),
            HierarchyLevel::Section => None,
        }
    }
}

// ============================================================================
// Work item
// ============================================================================

/// One (issue date, title number) unit of fetch/extract/persist work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkItem {
    pub issue_date: NaiveDate,
    pub title: u32,
}

impl WorkItem {
    pub fn new(issue_date: NaiveDate, title: u32) -> Self {
        Self { issue_date, title }
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "title {} @ {}", self.title, self.issue_date)
    }
}
