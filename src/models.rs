//! Core data models used throughout Context Switcher.
//!
//! These types represent the records that flow out of the source adapters
//! and into the aggregated context. Wire names are camelCase to match the
//! JSON contract consumed by the front-end.

use serde::{Deserialize, Serialize};

/// The primary issue, fetched exactly once per aggregation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssueRef {
    pub key: String,
    pub summary: String,
    #[serde(rename = "project")]
    pub project_key: String,
    pub status: String,
    #[serde(rename = "issueType")]
    pub issue_type: String,
}

/// A wiki document related to the issue.
///
/// Within one aggregation result `id` is unique; the first occurrence
/// across the search queries wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentRecord {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "lastModified")]
    pub last_modified: Option<String>,
    pub link: String,
}

/// A source-control commit whose message mentions the issue key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitRecord {
    pub id: String,
    pub message: String,
    pub author: String,
    /// Author timestamp in epoch milliseconds, as reported upstream.
    #[serde(rename = "authorTimestamp")]
    pub author_timestamp: i64,
    pub repository: String,
    #[serde(rename = "repoSlug")]
    pub repo_slug: String,
    /// Shortened message attached by the enrichment stage for long commits.
    #[serde(rename = "aiSummary", skip_serializing_if = "Option::is_none")]
    pub ai_summary: Option<String>,
}

/// A linked service-desk ticket derived from the issue's link graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceTicketRecord {
    pub key: String,
    pub summary: String,
    pub status: String,
    #[serde(rename = "issueType")]
    pub issue_type: String,
    pub priority: String,
}

/// The unified result of one aggregation request.
///
/// Assembled once by the aggregator, optionally decorated by the
/// enrichment stage, then read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedContext {
    pub issue: IssueRef,
    #[serde(rename = "confluenceDocs")]
    pub documents: Vec<DocumentRecord>,
    #[serde(rename = "bitbucketCommits")]
    pub commits: Vec<CommitRecord>,
    #[serde(rename = "serviceTickets")]
    pub service_tickets: Vec<ServiceTicketRecord>,
    #[serde(rename = "aiSummary")]
    pub ai_summary: Option<String>,
    #[serde(rename = "aiSuggestions")]
    pub ai_suggestions: Vec<String>,
}
