//! HTTP transport shim over the aggregation core.
//!
//! A thin axum layer: it parses the per-request credentials, invokes the
//! aggregator, runs optional AI enrichment, and serializes the result.
//! No aggregation logic lives here.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Service info |
//! | `GET`  | `/health` | Health check for deployment probes |
//! | `GET`  | `/api/context/{issue_key}` | Aggregate context for one issue |
//! | `POST` | `/api/summarize` | Summarize arbitrary text (AI required) |
//!
//! # Authentication
//!
//! `/api/context/{issue_key}` requires two headers supplied by the
//! front-end per request: `Authorization: Bearer <token>` and
//! `X-Cloud-Id: <tenant>`. The service holds no credentials of its own
//! and is stateless across requests.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "Issue ABC-1 not found or inaccessible" } }
//! ```
//!
//! Error codes: `unauthorized` (401), `not_found` (404), `timeout` (408),
//! `ai_disabled` (503), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the embedded
//! front-end panel can call the API cross-origin.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, warn};

use crate::aggregate::{Aggregator, ContextError};
use crate::ai::AiService;
use crate::config::Config;
use crate::fetch::{HttpFetcher, Tenant};
use crate::models::AggregatedContext;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    ai: Arc<AiService>,
}

/// Starts the HTTP server.
///
/// Binds to `[server].bind` and serves until the process is terminated.
/// If the configured AI provider cannot be initialized (for example a
/// missing API key), the server starts anyway with enrichment disabled.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let ai = match AiService::from_config(&config.ai) {
        Ok(ai) => ai,
        Err(e) => {
            warn!(error = %e, "AI provider unavailable, continuing without enrichment");
            AiService::disabled()
        }
    };

    let bind_addr = config.server.bind.clone();
    let state = AppState {
        config: Arc::new(config.clone()),
        ai: Arc::new(ai),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/api/context/{issue_key}", get(handle_context))
        .route("/api/summarize", post(handle_summarize))
        .layer(cors)
        .with_state(state);

    println!("Context Switcher API listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn unauthorized(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn timeout_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::REQUEST_TIMEOUT,
        code: "timeout".to_string(),
        message: message.into(),
    }
}

fn ai_disabled(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        code: "ai_disabled".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Pull the bearer token and tenant id out of the request headers.
fn extract_auth(headers: &HeaderMap) -> Result<(String, String), AppError> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start_matches("Bearer ").to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| unauthorized("Missing authentication headers"))?;

    let cloud_id = headers
        .get("x-cloud-id")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| unauthorized("Missing authentication headers"))?;

    Ok((token, cloud_id))
}

// ============ GET / and GET /health ============

#[derive(Serialize)]
struct InfoResponse {
    message: String,
    status: String,
    #[serde(rename = "aiEnabled")]
    ai_enabled: bool,
    timestamp: String,
}

async fn handle_root(State(state): State<AppState>) -> Json<InfoResponse> {
    Json(InfoResponse {
        message: "Context Switcher API".to_string(),
        status: "running".to_string(),
        ai_enabled: state.ai.is_enabled(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    service: String,
    #[serde(rename = "aiEnabled")]
    ai_enabled: bool,
    timestamp: String,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "context-switcher-api".to_string(),
        ai_enabled: state.ai.is_enabled(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

// ============ GET /api/context/{issue_key} ============

/// Wire shape of a successful context response: the aggregated context
/// plus request metadata.
#[derive(Serialize)]
struct ContextResponse {
    #[serde(flatten)]
    context: AggregatedContext,
    #[serde(rename = "lastUpdated")]
    last_updated: String,
    #[serde(rename = "aiEnabled")]
    ai_enabled: bool,
}

async fn handle_context(
    State(state): State<AppState>,
    Path(issue_key): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ContextResponse>, AppError> {
    let (token, cloud_id) = extract_auth(&headers)?;

    let fetcher = HttpFetcher::new(
        token,
        Duration::from_secs(state.config.atlassian.timeout_secs),
    )
    .map_err(|e| {
        error!(error = %e, "could not build HTTP client");
        internal("Internal server error")
    })?;

    let tenant = Tenant::new(state.config.atlassian.base_url.clone(), cloud_id);
    let aggregator = Aggregator::new(Arc::new(fetcher), tenant);

    let work = async {
        let context = aggregator.get_issue_context(&issue_key).await?;
        Ok::<_, ContextError>(state.ai.enrich(context).await)
    };

    let deadline = state
        .config
        .server
        .request_timeout_secs
        .map(Duration::from_secs);
    let context = with_deadline(deadline, &issue_key, work).await?;

    Ok(Json(ContextResponse {
        context,
        last_updated: Utc::now().to_rfc3339(),
        ai_enabled: state.ai.is_enabled(),
    }))
}

/// Run the aggregation future under the optional whole-request deadline
/// and map its outcome to the HTTP error contract: deadline elapsed →
/// 408, issue not found → 404.
async fn with_deadline<F>(
    deadline: Option<Duration>,
    issue_key: &str,
    work: F,
) -> Result<AggregatedContext, AppError>
where
    F: std::future::Future<Output = Result<AggregatedContext, ContextError>>,
{
    let result = match deadline {
        Some(limit) => tokio::time::timeout(limit, work).await.map_err(|_| {
            timeout_error(format!("Context aggregation for {} timed out", issue_key))
        })?,
        None => work.await,
    };

    result.map_err(|e| match e {
        ContextError::IssueNotFound(_) => not_found(e.to_string()),
    })
}

// ============ POST /api/summarize ============

#[derive(Deserialize)]
struct SummarizeRequest {
    content: String,
    #[serde(default = "default_max_length")]
    max_length: u32,
}

fn default_max_length() -> u32 {
    100
}

#[derive(Serialize)]
struct SummarizeResponse {
    summary: String,
}

async fn handle_summarize(
    State(state): State<AppState>,
    Json(request): Json<SummarizeRequest>,
) -> Result<Json<SummarizeResponse>, AppError> {
    if !state.ai.is_enabled() {
        return Err(ai_disabled("AI service not configured"));
    }

    let summary = state
        .ai
        .summarize_text(&request.content, request.max_length)
        .await
        .map_err(|e| {
            error!(error = %e, "summarization failed");
            internal(format!("Summarization failed: {}", e))
        })?;

    Ok(Json(SummarizeResponse { summary }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IssueRef;

    fn empty_context() -> AggregatedContext {
        AggregatedContext {
            issue: IssueRef {
                key: "ABC-1".to_string(),
                summary: "Fix login crash".to_string(),
                project_key: "ABC".to_string(),
                status: "Open".to_string(),
                issue_type: "Bug".to_string(),
            },
            documents: Vec::new(),
            commits: Vec::new(),
            service_tickets: Vec::new(),
            ai_summary: None,
            ai_suggestions: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_deadline_elapsed_maps_to_timeout() {
        let stalled = std::future::pending::<Result<AggregatedContext, ContextError>>();
        let err = with_deadline(Some(Duration::from_millis(10)), "ABC-1", stalled)
            .await
            .unwrap_err();

        assert_eq!(err.status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(err.code, "timeout");
        assert!(err.message.contains("ABC-1"));
    }

    #[tokio::test]
    async fn test_no_deadline_passes_result_through() {
        let context = with_deadline(None, "ABC-1", async { Ok(empty_context()) })
            .await
            .unwrap();
        assert_eq!(context.issue.key, "ABC-1");
    }

    #[tokio::test]
    async fn test_not_found_maps_to_404_under_deadline() {
        let work = async { Err(ContextError::IssueNotFound("ABC-9".to_string())) };
        let err = with_deadline(Some(Duration::from_secs(5)), "ABC-9", work)
            .await
            .unwrap_err();

        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, "not_found");
    }

    #[test]
    fn test_extract_auth() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer tok-123".parse().unwrap());
        headers.insert("x-cloud-id", "cloud-1".parse().unwrap());

        let (token, cloud_id) = extract_auth(&headers).unwrap();
        assert_eq!(token, "tok-123");
        assert_eq!(cloud_id, "cloud-1");
    }

    #[test]
    fn test_extract_auth_missing_headers() {
        let mut headers = HeaderMap::new();
        assert!(extract_auth(&headers).is_err());

        headers.insert("authorization", "Bearer tok-123".parse().unwrap());
        let err = extract_auth(&headers).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }
}
