//! Optional AI enrichment of an assembled context.
//!
//! Defines the [`TextGenerator`] capability trait and its OpenAI-backed
//! implementation, plus [`AiService`] which layers three enrichments onto
//! an [`AggregatedContext`]:
//!
//! - a short prose summary of the issue and what was found,
//! - up to three suggested next actions,
//! - shortened messages for the first few long commits.
//!
//! Enrichment is strictly best-effort. When the capability is not
//! configured, the summary is set to the [`NOT_CONFIGURED`] sentinel and
//! everything else is left untouched. When a call fails, only the field
//! it was producing degrades; the primary context is never invalidated
//! and this stage never returns an error.
//!
//! There are no retries against the model API — a single bounded call
//! per field.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::warn;

use crate::config::AiConfig;
use crate::models::AggregatedContext;

/// Summary sentinel used when no generator is configured.
pub const NOT_CONFIGURED: &str = "AI summarization is not configured";

/// Suggestions kept from the model's output.
const MAX_SUGGESTIONS: usize = 3;
/// Commit messages longer than this get a shortened variant.
const LONG_COMMIT_THRESHOLD: usize = 100;
/// How many long commits are shortened per request.
const MAX_SHORTENED_COMMITS: usize = 3;

/// A text-generation capability: role-tagged prompt in, plain text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String>;
}

/// [`TextGenerator`] backed by the OpenAI chat-completions API.
///
/// Requires the `OPENAI_API_KEY` environment variable. One bounded call
/// per invocation, no retries.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiGenerator {
    pub fn new(config: &AiConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "max_tokens": max_tokens,
            "temperature": temperature,
        });

        let resp = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = resp.json().await?;
        let content = json
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))?;

        Ok(content.trim().to_string())
    }
}

/// The enrichment stage. Holds the generator capability, or nothing when
/// AI is disabled.
pub struct AiService {
    generator: Option<Box<dyn TextGenerator>>,
    config: AiConfig,
}

impl AiService {
    /// Build the service from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an enabled provider cannot be initialized
    /// (unknown provider name or missing API key).
    pub fn from_config(config: &AiConfig) -> Result<Self> {
        let generator: Option<Box<dyn TextGenerator>> = match config.provider.as_str() {
            "disabled" => None,
            "openai" => Some(Box::new(OpenAiGenerator::new(config)?)),
            other => bail!("Unknown AI provider: {}", other),
        };

        Ok(Self {
            generator,
            config: config.clone(),
        })
    }

    /// A service with no generator; enrichment degrades to placeholders.
    pub fn disabled() -> Self {
        Self {
            generator: None,
            config: AiConfig::default(),
        }
    }

    /// Build the service around an explicit generator. Used by tests and
    /// custom binaries that bring their own model client.
    pub fn with_generator(generator: Box<dyn TextGenerator>, config: AiConfig) -> Self {
        Self {
            generator: Some(generator),
            config,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.generator.is_some()
    }

    /// Attach AI fields to an assembled context.
    ///
    /// Never fails; every model error degrades only the field it was
    /// producing.
    pub async fn enrich(&self, mut context: AggregatedContext) -> AggregatedContext {
        let generator = match &self.generator {
            Some(generator) => generator,
            None => {
                context.ai_summary = Some(NOT_CONFIGURED.to_string());
                context.ai_suggestions = Vec::new();
                return context;
            }
        };

        let overview = format!(
            "Issue {}: {}\nStatus: {} | Type: {}\nRelated material: {} wiki documents, {} commits, {} linked service tickets.",
            context.issue.key,
            context.issue.summary,
            context.issue.status,
            context.issue.issue_type,
            context.documents.len(),
            context.commits.len(),
            context.service_tickets.len(),
        );

        match generator
            .complete(
                "You are a concise assistant for software teams. Summarize the state of an issue in two or three sentences.",
                &overview,
                self.config.max_tokens,
                self.config.temperature,
            )
            .await
        {
            Ok(summary) => context.ai_summary = Some(summary),
            Err(e) => warn!(error = %e, "summary generation failed"),
        }

        match generator
            .complete(
                "Propose the most useful next actions for the developer picking up this issue. Answer with at most 3 short suggestions, one per line.",
                &overview,
                self.config.max_tokens,
                self.config.temperature,
            )
            .await
        {
            Ok(text) => context.ai_suggestions = parse_suggestions(&text),
            Err(e) => warn!(error = %e, "suggestion generation failed"),
        }

        let long_commits = context
            .commits
            .iter_mut()
            .filter(|c| c.message.chars().count() > LONG_COMMIT_THRESHOLD)
            .take(MAX_SHORTENED_COMMITS);

        for commit in long_commits {
            let shortened = generator
                .complete(
                    "Shorten this commit message to a single line of at most 100 characters. Keep the issue key.",
                    &commit.message,
                    60,
                    0.3,
                )
                .await;

            commit.ai_summary = Some(match shortened {
                Ok(text) => text,
                Err(e) => {
                    warn!(commit = %commit.id, error = %e, "commit shortening failed, truncating");
                    truncate_message(&commit.message, LONG_COMMIT_THRESHOLD)
                }
            });
        }

        context
    }

    /// Summarize arbitrary text, for the standalone summarize endpoint.
    ///
    /// # Errors
    ///
    /// Fails when the capability is disabled or the model call fails.
    pub async fn summarize_text(&self, content: &str, max_length: u32) -> Result<String> {
        let generator = match &self.generator {
            Some(generator) => generator,
            None => bail!("AI service not configured"),
        };

        let system = format!(
            "Summarize the following content in at most {} words.",
            max_length
        );
        generator
            .complete(&system, content, self.config.max_tokens, self.config.temperature)
            .await
    }
}

/// Split model output into suggestions: non-empty lines with leading
/// bullet markers stripped, capped at [`MAX_SUGGESTIONS`].
fn parse_suggestions(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(['-', '•', '*'])
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .take(MAX_SUGGESTIONS)
        .collect()
}

/// Hard-truncate a message to `limit` characters with an ellipsis.
fn truncate_message(message: &str, limit: usize) -> String {
    let truncated: String = message.chars().take(limit).collect();
    format!("{}...", truncated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommitRecord, IssueRef};

    struct ScriptedGenerator {
        summary: &'static str,
        suggestions: &'static str,
        fail_shorten: bool,
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn complete(
            &self,
            system: &str,
            _user: &str,
            _max_tokens: u32,
            _temperature: f32,
        ) -> Result<String> {
            if system.starts_with("Shorten") {
                if self.fail_shorten {
                    bail!("model unavailable");
                }
                return Ok("ABC-1 short form".to_string());
            }
            if system.starts_with("Propose") {
                return Ok(self.suggestions.to_string());
            }
            Ok(self.summary.to_string())
        }
    }

    fn context_with_commits(commits: Vec<CommitRecord>) -> AggregatedContext {
        AggregatedContext {
            issue: IssueRef {
                key: "ABC-1".to_string(),
                summary: "Fix login crash".to_string(),
                project_key: "ABC".to_string(),
                status: "Open".to_string(),
                issue_type: "Bug".to_string(),
            },
            documents: Vec::new(),
            commits,
            service_tickets: Vec::new(),
            ai_summary: None,
            ai_suggestions: Vec::new(),
        }
    }

    fn commit(id: &str, message: String) -> CommitRecord {
        CommitRecord {
            id: id.to_string(),
            message,
            author: "Dana".to_string(),
            author_timestamp: 0,
            repository: "Backend".to_string(),
            repo_slug: "backend".to_string(),
            ai_summary: None,
        }
    }

    #[test]
    fn test_parse_suggestions_strips_bullets_and_caps() {
        let text = "- Review the stack trace\n\n• Add a regression test\n* Ship a hotfix\n- One too many";
        let suggestions = parse_suggestions(text);
        assert_eq!(
            suggestions,
            vec![
                "Review the stack trace",
                "Add a regression test",
                "Ship a hotfix"
            ]
        );
    }

    #[test]
    fn test_parse_suggestions_plain_lines() {
        assert_eq!(parse_suggestions("do the thing"), vec!["do the thing"]);
        assert!(parse_suggestions("\n   \n").is_empty());
    }

    #[test]
    fn test_truncate_message_char_safe() {
        let message = "å".repeat(150);
        let truncated = truncate_message(&message, 100);
        assert_eq!(truncated.chars().count(), 103);
        assert!(truncated.ends_with("..."));
    }

    #[tokio::test]
    async fn test_disabled_service_sets_sentinel_only() {
        let service = AiService::disabled();
        let before = context_with_commits(vec![commit("c1", "x".repeat(150))]);
        let commits_before = before.commits.clone();

        let after = service.enrich(before).await;

        assert_eq!(after.ai_summary.as_deref(), Some(NOT_CONFIGURED));
        assert!(after.ai_suggestions.is_empty());
        assert_eq!(after.commits, commits_before);
        assert!(!service.is_enabled());
    }

    #[tokio::test]
    async fn test_enrich_attaches_summary_and_suggestions() {
        let service = AiService::with_generator(
            Box::new(ScriptedGenerator {
                summary: "The issue is close to done.",
                suggestions: "- Write tests\n- Merge the fix",
                fail_shorten: false,
            }),
            AiConfig::default(),
        );

        let long = commit("c1", format!("ABC-1 {}", "y".repeat(140)));
        let short = commit("c2", "ABC-1 tiny".to_string());
        let after = service.enrich(context_with_commits(vec![long, short])).await;

        assert_eq!(after.ai_summary.as_deref(), Some("The issue is close to done."));
        assert_eq!(after.ai_suggestions, vec!["Write tests", "Merge the fix"]);
        assert_eq!(after.commits[0].ai_summary.as_deref(), Some("ABC-1 short form"));
        assert_eq!(after.commits[1].ai_summary, None);
    }

    #[tokio::test]
    async fn test_shorten_failure_falls_back_to_truncation() {
        let service = AiService::with_generator(
            Box::new(ScriptedGenerator {
                summary: "s",
                suggestions: "s",
                fail_shorten: true,
            }),
            AiConfig::default(),
        );

        let message = format!("ABC-1 {}", "z".repeat(140));
        let after = service
            .enrich(context_with_commits(vec![commit("c1", message.clone())]))
            .await;

        let shortened = after.commits[0].ai_summary.as_deref().unwrap();
        assert!(shortened.ends_with("..."));
        assert_eq!(shortened.chars().count(), 103);
        // The commit itself is never dropped.
        assert_eq!(after.commits[0].message, message);
    }

    #[tokio::test]
    async fn test_only_first_three_long_commits_shortened() {
        let service = AiService::with_generator(
            Box::new(ScriptedGenerator {
                summary: "s",
                suggestions: "s",
                fail_shorten: false,
            }),
            AiConfig::default(),
        );

        let commits = (0..5)
            .map(|i| commit(&format!("c{}", i), format!("ABC-1 {}", "m".repeat(140))))
            .collect();
        let after = service.enrich(context_with_commits(commits)).await;

        let shortened: Vec<bool> = after.commits.iter().map(|c| c.ai_summary.is_some()).collect();
        assert_eq!(shortened, vec![true, true, true, false, false]);
    }

    #[tokio::test]
    async fn test_summarize_text_disabled_errors() {
        let service = AiService::disabled();
        assert!(service.summarize_text("hello", 100).await.is_err());
    }
}
