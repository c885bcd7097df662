//! Bitbucket source adapter: commit search.
//!
//! Lists the project's repositories, then fans out concurrently over the
//! first few to fetch their recent commits. Only commits whose message
//! mentions the issue key (case-insensitive) are kept. Results are
//! concatenated in repository listing order — never completion order —
//! and capped. A failing repository contributes zero commits; a failing
//! repository listing yields an empty result.

use anyhow::Result;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::fetch::{Fetcher, Tenant};
use crate::models::CommitRecord;

/// How many of the project's repositories are searched.
const MAX_REPOS: usize = 3;
/// Commits requested per repository.
const COMMIT_PAGE_LIMIT: u32 = 50;
/// Cap on the combined commit list.
const MAX_COMMITS: usize = 15;

pub struct BitbucketSource {
    fetcher: Arc<dyn Fetcher>,
    tenant: Tenant,
}

impl BitbucketSource {
    pub fn new(fetcher: Arc<dyn Fetcher>, tenant: Tenant) -> Self {
        Self { fetcher, tenant }
    }

    /// Search the project's repositories for commits mentioning the issue.
    pub async fn search_commits(
        &self,
        issue_key: &str,
        project_key: &str,
    ) -> Result<Vec<CommitRecord>> {
        let repos_url = self.tenant.repos_url(project_key);
        let repos_json = match self.fetcher.get_json(&repos_url, &[]).await {
            Ok(json) => json,
            Err(e) => {
                warn!(project = project_key, error = %e, "repository listing failed");
                return Ok(Vec::new());
            }
        };

        let repos = list_repos(&repos_json);

        let fetches = repos.iter().map(|(_, slug)| {
            let url = self.tenant.commits_url(project_key, slug);
            async move {
                let params = [("limit", COMMIT_PAGE_LIMIT.to_string())];
                self.fetcher.get_json(&url, &params).await
            }
        });

        // Fan-in preserves repository listing order.
        let responses = join_all(fetches).await;

        let mut commits = Vec::new();
        for ((name, slug), response) in repos.iter().zip(responses) {
            match response {
                Ok(json) => {
                    commits.extend(filter_repo_commits(issue_key, name, slug, &json));
                }
                Err(e) => {
                    warn!(repo = %slug, error = %e, "commit fetch failed");
                }
            }
        }

        commits.truncate(MAX_COMMITS);
        Ok(commits)
    }
}

/// Extract up to [`MAX_REPOS`] `(name, slug)` pairs from the repository
/// listing, in listing order.
fn list_repos(json: &Value) -> Vec<(String, String)> {
    json.get("values")
        .and_then(|v| v.as_array())
        .map(|values| {
            values
                .iter()
                .filter_map(|repo| {
                    let slug = repo.get("slug")?.as_str()?.to_string();
                    let name = repo
                        .get("name")
                        .and_then(|n| n.as_str())
                        .unwrap_or(&slug)
                        .to_string();
                    Some((name, slug))
                })
                .take(MAX_REPOS)
                .collect()
        })
        .unwrap_or_default()
}

/// Keep the commits whose message contains the issue key, preserving the
/// upstream commit order.
fn filter_repo_commits(
    issue_key: &str,
    repo_name: &str,
    repo_slug: &str,
    json: &Value,
) -> Vec<CommitRecord> {
    let values = match json.get("values").and_then(|v| v.as_array()) {
        Some(values) => values,
        None => return Vec::new(),
    };

    let needle = issue_key.to_uppercase();
    let mut commits = Vec::new();

    for commit in values {
        let id = match commit.get("id").and_then(|i| i.as_str()) {
            Some(id) => id.to_string(),
            None => continue,
        };

        let message = commit
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("")
            .to_string();

        if !message.to_uppercase().contains(&needle) {
            continue;
        }

        commits.push(CommitRecord {
            id,
            author: commit
                .pointer("/author/displayName")
                .and_then(|a| a.as_str())
                .unwrap_or("Unknown")
                .to_string(),
            author_timestamp: commit
                .get("authorTimestamp")
                .and_then(|t| t.as_i64())
                .unwrap_or(0),
            message,
            repository: repo_name.to_string(),
            repo_slug: repo_slug.to_string(),
            ai_summary: None,
        });
    }

    commits
}
