//! Aggregation of issue context from the three remote sources.
//!
//! Orchestration is a single pass with no retries:
//!
//! 1. Look up the primary issue — a true dependency, since it supplies
//!    the project key the other sources need. If it fails, nothing
//!    downstream runs.
//! 2. Run document search, commit search, and linked-ticket extraction
//!    concurrently and wait for all three (fan-out/fan-in barrier).
//! 3. Absorb any branch failure into an empty list. One branch failing
//!    never suppresses the other two or fails the aggregation.
//!
//! The only failure that crosses this boundary is
//! [`ContextError::IssueNotFound`].

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::bitbucket::BitbucketSource;
use crate::confluence::ConfluenceSource;
use crate::fetch::{Fetcher, Tenant};
use crate::jira::JiraSource;
use crate::models::AggregatedContext;

/// Domain-level aggregation failure.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Issue {0} not found or inaccessible")]
    IssueNotFound(String),
}

/// Orchestrates one aggregation request over a shared [`Fetcher`].
pub struct Aggregator {
    jira: JiraSource,
    confluence: ConfluenceSource,
    bitbucket: BitbucketSource,
}

impl Aggregator {
    pub fn new(fetcher: Arc<dyn Fetcher>, tenant: Tenant) -> Self {
        Self {
            jira: JiraSource::new(fetcher.clone(), tenant.clone()),
            confluence: ConfluenceSource::new(fetcher.clone(), tenant.clone()),
            bitbucket: BitbucketSource::new(fetcher, tenant),
        }
    }

    /// Gather all context for one issue.
    ///
    /// Returns a fully-formed [`AggregatedContext`] with possibly-empty
    /// source lists, or [`ContextError::IssueNotFound`] if the primary
    /// issue cannot be located. Enrichment is a separate stage — the
    /// AI fields come back unset here.
    pub async fn get_issue_context(
        &self,
        issue_key: &str,
    ) -> Result<AggregatedContext, ContextError> {
        info!(issue = issue_key, "gathering context");

        let issue = self.jira.get_issue(issue_key).await?;

        let (documents, commits, service_tickets) = tokio::join!(
            self.confluence
                .search_documents(issue_key, &issue.project_key),
            self.bitbucket.search_commits(issue_key, &issue.project_key),
            self.jira.get_linked_service_tickets(issue_key),
        );

        let documents = or_empty("documents", documents);
        let commits = or_empty("commits", commits);
        let service_tickets = or_empty("service_tickets", service_tickets);

        info!(
            issue = issue_key,
            documents = documents.len(),
            commits = commits.len(),
            service_tickets = service_tickets.len(),
            "context assembled"
        );

        Ok(AggregatedContext {
            issue,
            documents,
            commits,
            service_tickets,
            ai_summary: None,
            ai_suggestions: Vec::new(),
        })
    }
}

/// Map a failed branch to an empty result so it cannot poison the barrier.
fn or_empty<T>(branch: &'static str, result: anyhow::Result<Vec<T>>) -> Vec<T> {
    match result {
        Ok(items) => items,
        Err(e) => {
            warn!(branch, error = %e, "branch failed, substituting empty result");
            Vec::new()
        }
    }
}
