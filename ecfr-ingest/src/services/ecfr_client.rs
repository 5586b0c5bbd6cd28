//! eCFR versioner API client
//!
//! Endpoints (relative to the configured base URL):
//! - `versions/title-{N}.json[?issue_date[gte]=D]`: version history
//! - `ancestry/{date}/title-{N}.json?part&subpart&section`: enclosing levels
//! - `full/{date}/title-{N}.xml[?chapter&subchapter&part&subpart&section]`:
//!   document, whole title or narrowed to one node
//!
//! Every request goes through the shared [`RetryingFetcher`], so all of them
//! draw from the same rate budget.

use crate::error::{FetchError, IngestError, IngestResult};
use crate::services::fetcher::RetryingFetcher;
use crate::types::{AncestryPath, HierarchyLevel};
use chrono::NaiveDate;
use ecfr_common::dates::format_issue_date;
use reqwest::Url;
use serde::{Deserialize, Deserializer};

/// Public eCFR versioner API
pub const DEFAULT_BASE_URL: &str = "https://www.ecfr.gov/api/versioner/v1";

/// One entry of a title's version history
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContentVersion {
    pub issue_date: NaiveDate,
    /// Section identifier
    pub identifier: String,
    /// Section heading ("§ 1.1 Definitions.")
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub part: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub subpart: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub title: String,
}

#[derive(Debug, Deserialize)]
struct VersionsResponse {
    content_versions: Vec<ContentVersion>,
}

#[derive(Debug, Deserialize)]
struct AncestryResponse {
    ancestors: Vec<AncestorNode>,
}

#[derive(Debug, Deserialize)]
struct AncestorNode {
    #[serde(rename = "type")]
    node_type: String,
    #[serde(default)]
    identifier: Option<String>,
}

/// Enclosing levels of one section as reported by the ancestry endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAncestry {
    pub path: AncestryPath,
    pub section: Option<String>,
}

impl ResolvedAncestry {
    /// Query narrowing a full-document request to this section
    ///
    /// Empty levels are omitted.
    pub fn full_text_query(&self) -> Vec<(&'static str, String)> {
        let levels = [
            HierarchyLevel::Chapter,
            HierarchyLevel::Subchapter,
            HierarchyLevel::Part,
            HierarchyLevel::Subpart,
        ];

        let mut query: Vec<(&'static str, String)> = levels
            .iter()
            .filter_map(|&level| {
                self.path
                    .get(level)
                    .filter(|v| !v.is_empty())
                    .map(|v| (level.api_type(), v.to_string()))
            })
            .collect();

        if let Some(section) = self.section.as_deref().filter(|s| !s.is_empty()) {
            query.push((HierarchyLevel::Section.api_type(), section.to_string()));
        }
        query
    }
}

/// Typed access to the versioner API
#[derive(Clone)]
pub struct SourceClient {
    fetcher: RetryingFetcher,
    base_url: String,
}

impl SourceClient {
    pub fn new(fetcher: RetryingFetcher, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ========================================================================
    // URL builders
    // ========================================================================

    pub fn versions_url(&self, title: u32, since: Option<NaiveDate>) -> IngestResult<Url> {
        let base = format!("{}/versions/title-{}.json", self.base_url, title);
        let query: Vec<(&str, String)> = since
            .map(|d| ("issue_date[gte]", format_issue_date(d)))
            .into_iter()
            .collect();
        build_url(&base, &query)
    }

    pub fn ancestry_url(
        &self,
        issue_date: NaiveDate,
        title: u32,
        part: &str,
        subpart: Option<&str>,
        section: &str,
    ) -> IngestResult<Url> {
        let base = format!(
            "{}/ancestry/{}/title-{}.json",
            self.base_url,
            format_issue_date(issue_date),
            title
        );
        let query = [
            ("part", part.to_string()),
            ("subpart", subpart.unwrap_or_default().to_string()),
            ("section", section.to_string()),
        ];
        build_url(&base, &query)
    }

    pub fn full_xml_url(
        &self,
        issue_date: NaiveDate,
        title: u32,
        query: &[(&str, String)],
    ) -> IngestResult<Url> {
        let base = format!(
            "{}/full/{}/title-{}.xml",
            self.base_url,
            format_issue_date(issue_date),
            title
        );
        let query: Vec<(&str, String)> = query
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .cloned()
            .collect();
        build_url(&base, &query)
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Version history of a title, optionally from `since` onward
    pub async fn versions(
        &self,
        title: u32,
        since: Option<NaiveDate>,
    ) -> IngestResult<Vec<ContentVersion>> {
        let url = self.versions_url(title, since)?;
        let body = self.fetcher.fetch(url.as_str()).await?;
        let response: VersionsResponse = parse_json(&url, &body)?;

        tracing::debug!(title, versions = response.content_versions.len(), "Fetched version history");
        Ok(response.content_versions)
    }

    /// Resolve the ancestry of one section at one date
    pub async fn ancestry(
        &self,
        issue_date: NaiveDate,
        title: u32,
        part: &str,
        subpart: Option<&str>,
        section: &str,
    ) -> IngestResult<ResolvedAncestry> {
        let url = self.ancestry_url(issue_date, title, part, subpart, section)?;
        let body = self.fetcher.fetch(url.as_str()).await?;
        let response: AncestryResponse = parse_json(&url, &body)?;

        Ok(resolve_ancestors(&response.ancestors))
    }

    /// Raw document for a title (or a node of it) at one date
    pub async fn full_xml(
        &self,
        issue_date: NaiveDate,
        title: u32,
        query: &[(&str, String)],
    ) -> Result<Vec<u8>, IngestError> {
        let url = self.full_xml_url(issue_date, title, query)?;
        let body = self.fetcher.fetch(url.as_str()).await.map_err(|e: FetchError| {
            tracing::debug!(title, issue_date = %issue_date, error = %e, "Document fetch failed");
            e
        })?;
        Ok(body)
    }
}

fn build_url(base: &str, query: &[(&str, String)]) -> IngestResult<Url> {
    let parsed = if query.is_empty() {
        Url::parse(base)
    } else {
        Url::parse_with_params(base, query.iter().map(|(k, v)| (*k, v.as_str())))
    };
    parsed.map_err(|e| IngestError::Config(format!("invalid source URL {}: {}", base, e)))
}

fn parse_json<T: serde::de::DeserializeOwned>(url: &Url, body: &[u8]) -> IngestResult<T> {
    serde_json::from_slice(body).map_err(|e| IngestError::UnexpectedResponse {
        url: url.to_string(),
        message: e.to_string(),
    })
}

/// First identifier reported for each level type
fn resolve_ancestors(ancestors: &[AncestorNode]) -> ResolvedAncestry {
    let find = |level: HierarchyLevel| {
        ancestors
            .iter()
            .find(|a| a.node_type == level.api_type())
            .and_then(|a| a.identifier.clone())
            .filter(|id| !id.trim().is_empty())
    };

    ResolvedAncestry {
        path: AncestryPath {
            title: find(HierarchyLevel::Title),
            chapter: find(HierarchyLevel::Chapter),
            subchapter: find(HierarchyLevel::Subchapter),
            part: find(HierarchyLevel::Part),
            subpart: find(HierarchyLevel::Subpart),
        },
        section: find(HierarchyLevel::Section),
    }
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Title numbers arrive as either `"7"` or `7`
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected title string or number, got {}",
            other
        ))),
    }
}
