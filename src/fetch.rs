//! Remote fetcher for the tenant-scoped Atlassian REST APIs.
//!
//! Defines the [`Fetcher`] trait and its production implementation
//! [`HttpFetcher`], plus the [`Tenant`] endpoint builder.
//!
//! Every lookup is a single HTTP GET with bearer auth, a bounded timeout,
//! and **no retries**. Outcomes are normalized into three cases so callers
//! can tell "no data" apart from "the source is broken":
//!
//! | Upstream | Result |
//! |----------|--------|
//! | 2xx | `Ok(json)` |
//! | 404 | `Err(FetchError::NotFound)` |
//! | other status | `Err(FetchError::Upstream(status))` |
//! | connect/timeout/decode | `Err(FetchError::Transport(..))` |
//!
//! The trait seam exists so the adapters and the aggregator can be tested
//! against an in-memory fake without a live network.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Outcome taxonomy for a single remote lookup.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Upstream answered 404 — an explicit "absent", not a failure.
    #[error("resource not found")]
    NotFound,
    /// The request never produced a usable response (connect, timeout, body decode).
    #[error("transport error: {0}")]
    Transport(String),
    /// Upstream answered with a non-2xx, non-404 status.
    #[error("upstream error: status {0}")]
    Upstream(u16),
}

/// A single JSON GET against a fully-qualified endpoint.
///
/// Implementations must be `Send + Sync`; the adapters fan requests out
/// across concurrent tasks.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get_json(&self, url: &str, params: &[(&str, String)]) -> Result<Value, FetchError>;
}

/// Production [`Fetcher`] backed by reqwest.
///
/// Holds the per-request bearer token and a client with the configured
/// timeout applied to every call.
pub struct HttpFetcher {
    client: reqwest::Client,
    token: String,
}

impl HttpFetcher {
    /// Build a fetcher for one request's credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(token: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            token: token.into(),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get_json(&self, url: &str, params: &[(&str, String)]) -> Result<Value, FetchError> {
        let resp = self
            .client
            .get(url)
            .query(params)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                error!(endpoint = url, error = %e, "request failed");
                FetchError::Transport(e.to_string())
            })?;

        let status = resp.status();

        if status.is_success() {
            let json = resp.json::<Value>().await.map_err(|e| {
                error!(endpoint = url, error = %e, "response body was not valid JSON");
                FetchError::Transport(e.to_string())
            })?;
            debug!(endpoint = url, "fetch ok");
            return Ok(json);
        }

        if status.as_u16() == 404 {
            warn!(endpoint = url, "resource not found");
            return Err(FetchError::NotFound);
        }

        error!(endpoint = url, status = status.as_u16(), "API request failed");
        Err(FetchError::Upstream(status.as_u16()))
    }
}

/// Builds the tenant-scoped endpoint URLs of the form
/// `<base>/ex/<service>/<cloudId>/rest/...`.
#[derive(Debug, Clone)]
pub struct Tenant {
    pub base_url: String,
    pub cloud_id: String,
}

impl Tenant {
    pub fn new(base_url: impl Into<String>, cloud_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            cloud_id: cloud_id.into(),
        }
    }

    pub fn issue_url(&self, issue_key: &str) -> String {
        format!(
            "{}/ex/jira/{}/rest/api/3/issue/{}",
            self.base_url, self.cloud_id, issue_key
        )
    }

    pub fn document_search_url(&self) -> String {
        format!(
            "{}/ex/confluence/{}/rest/api/content/search",
            self.base_url, self.cloud_id
        )
    }

    pub fn repos_url(&self, project_key: &str) -> String {
        format!(
            "{}/ex/bitbucket/{}/rest/api/1.0/projects/{}/repos",
            self.base_url, self.cloud_id, project_key
        )
    }

    pub fn commits_url(&self, project_key: &str, repo_slug: &str) -> String {
        format!(
            "{}/ex/bitbucket/{}/rest/api/1.0/projects/{}/repos/{}/commits",
            self.base_url, self.cloud_id, project_key, repo_slug
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Json, Router};

    /// Serve canned responses on an ephemeral local port.
    async fn spawn_upstream() -> String {
        let app = Router::new()
            .route(
                "/ok",
                get(|| async { Json(serde_json::json!({ "ok": true })) }),
            )
            .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
            .route("/fail", get(|| async { StatusCode::BAD_GATEWAY }))
            .route("/text", get(|| async { "not json at all" }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_success_returns_json() {
        let base = spawn_upstream().await;
        let fetcher = HttpFetcher::new("tok", Duration::from_secs(5)).unwrap();

        let json = fetcher
            .get_json(&format!("{}/ok", base), &[])
            .await
            .unwrap();
        assert_eq!(json["ok"], true);
    }

    #[tokio::test]
    async fn test_404_maps_to_not_found() {
        let base = spawn_upstream().await;
        let fetcher = HttpFetcher::new("tok", Duration::from_secs(5)).unwrap();

        let result = fetcher.get_json(&format!("{}/missing", base), &[]).await;
        assert!(matches!(result, Err(FetchError::NotFound)));
    }

    #[tokio::test]
    async fn test_non_2xx_maps_to_upstream_status() {
        let base = spawn_upstream().await;
        let fetcher = HttpFetcher::new("tok", Duration::from_secs(5)).unwrap();

        let result = fetcher.get_json(&format!("{}/fail", base), &[]).await;
        assert!(matches!(result, Err(FetchError::Upstream(502))));
    }

    #[tokio::test]
    async fn test_non_json_body_maps_to_transport() {
        let base = spawn_upstream().await;
        let fetcher = HttpFetcher::new("tok", Duration::from_secs(5)).unwrap();

        let result = fetcher.get_json(&format!("{}/text", base), &[]).await;
        assert!(matches!(result, Err(FetchError::Transport(_))));
    }

    #[tokio::test]
    async fn test_connection_failure_maps_to_transport() {
        // Nothing listens on this port.
        let fetcher = HttpFetcher::new("tok", Duration::from_secs(5)).unwrap();
        let result = fetcher.get_json("http://127.0.0.1:1/ok", &[]).await;
        assert!(matches!(result, Err(FetchError::Transport(_))));
    }

    #[test]
    fn test_tenant_urls() {
        let tenant = Tenant::new("https://api.atlassian.com", "cloud-1");

        assert_eq!(
            tenant.issue_url("ABC-1"),
            "https://api.atlassian.com/ex/jira/cloud-1/rest/api/3/issue/ABC-1"
        );
        assert_eq!(
            tenant.document_search_url(),
            "https://api.atlassian.com/ex/confluence/cloud-1/rest/api/content/search"
        );
        assert_eq!(
            tenant.repos_url("ABC"),
            "https://api.atlassian.com/ex/bitbucket/cloud-1/rest/api/1.0/projects/ABC/repos"
        );
        assert_eq!(
            tenant.commits_url("ABC", "backend"),
            "https://api.atlassian.com/ex/bitbucket/cloud-1/rest/api/1.0/projects/ABC/repos/backend/commits"
        );
    }
}
