//! Jira source adapter: issue lookup and linked-ticket extraction.
//!
//! The issue lookup is the prerequisite for every other source — it
//! supplies the project key the document and commit searches need. The
//! linked-ticket extractor refetches the same issue with its link field
//! populated and keeps only linked issues whose type looks like a
//! service-desk ticket.

use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::aggregate::ContextError;
use crate::fetch::{Fetcher, Tenant};
use crate::models::{IssueRef, ServiceTicketRecord};

/// Issue-type keywords that mark a linked issue as a service ticket.
const SERVICE_KEYWORDS: [&str; 4] = ["service", "request", "incident", "problem"];

pub struct JiraSource {
    fetcher: Arc<dyn Fetcher>,
    tenant: Tenant,
}

impl JiraSource {
    pub fn new(fetcher: Arc<dyn Fetcher>, tenant: Tenant) -> Self {
        Self { fetcher, tenant }
    }

    /// Fetch the primary issue by key.
    ///
    /// Any fetch failure — absence or transport — surfaces as
    /// [`ContextError::IssueNotFound`]; this adapter does not distinguish
    /// the two for the caller.
    pub async fn get_issue(&self, issue_key: &str) -> Result<IssueRef, ContextError> {
        let url = self.tenant.issue_url(issue_key);
        let json = self
            .fetcher
            .get_json(&url, &[])
            .await
            .map_err(|_| ContextError::IssueNotFound(issue_key.to_string()))?;

        parse_issue(issue_key, &json)
            .ok_or_else(|| ContextError::IssueNotFound(issue_key.to_string()))
    }

    /// Derive service tickets from the issue's link graph.
    ///
    /// Refetches the issue with only the link fields selected. Returns an
    /// empty list if the issue has no links or the refetch fails.
    pub async fn get_linked_service_tickets(
        &self,
        issue_key: &str,
    ) -> Result<Vec<ServiceTicketRecord>> {
        let url = self.tenant.issue_url(issue_key);
        let params = [("fields", "issuelinks,project".to_string())];

        let json = match self.fetcher.get_json(&url, &params).await {
            Ok(json) => json,
            Err(e) => {
                warn!(issue = issue_key, error = %e, "link refetch failed");
                return Ok(Vec::new());
            }
        };

        Ok(extract_service_tickets(&json))
    }
}

/// Map the issue response schema onto an [`IssueRef`].
///
/// Returns `None` when the expected fields are missing, which the caller
/// treats the same as an absent issue.
fn parse_issue(issue_key: &str, json: &Value) -> Option<IssueRef> {
    let fields = json.get("fields")?;

    Some(IssueRef {
        key: issue_key.to_string(),
        summary: fields.get("summary")?.as_str()?.to_string(),
        project_key: fields.get("project")?.get("key")?.as_str()?.to_string(),
        status: fields.get("status")?.get("name")?.as_str()?.to_string(),
        issue_type: fields.get("issuetype")?.get("name")?.as_str()?.to_string(),
    })
}

/// Walk the issue's link list and keep service-desk-looking linked issues.
///
/// An issue link is directional: exactly one of `outwardIssue` or
/// `inwardIssue` is present and denotes the other side. Order follows the
/// upstream link list.
fn extract_service_tickets(json: &Value) -> Vec<ServiceTicketRecord> {
    let links = json
        .pointer("/fields/issuelinks")
        .and_then(|l| l.as_array())
        .map(|a| a.as_slice())
        .unwrap_or(&[]);

    let mut tickets = Vec::new();

    for link in links {
        let linked = match link.get("outwardIssue").or_else(|| link.get("inwardIssue")) {
            Some(issue) => issue,
            None => continue,
        };

        let type_name = linked
            .pointer("/fields/issuetype/name")
            .and_then(|n| n.as_str())
            .unwrap_or("");

        let lowered = type_name.to_lowercase();
        if !SERVICE_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
            continue;
        }

        let key = match linked.get("key").and_then(|k| k.as_str()) {
            Some(key) => key.to_string(),
            None => continue,
        };

        tickets.push(ServiceTicketRecord {
            key,
            summary: linked
                .pointer("/fields/summary")
                .and_then(|s| s.as_str())
                .unwrap_or("")
                .to_string(),
            status: linked
                .pointer("/fields/status/name")
                .and_then(|s| s.as_str())
                .unwrap_or("")
                .to_string(),
            issue_type: type_name.to_string(),
            priority: linked
                .pointer("/fields/priority/name")
                .and_then(|p| p.as_str())
                .unwrap_or("Not set")
                .to_string(),
        });
    }

    tickets
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn linked_issue(key: &str, issue_type: &str) -> Value {
        json!({
            "key": key,
            "fields": {
                "summary": format!("Summary of {}", key),
                "status": { "name": "Open" },
                "issuetype": { "name": issue_type },
                "priority": { "name": "High" }
            }
        })
    }

    #[test]
    fn test_parse_issue() {
        let json = json!({
            "fields": {
                "summary": "Fix login crash",
                "project": { "key": "ABC" },
                "status": { "name": "In Progress" },
                "issuetype": { "name": "Bug" }
            }
        });

        let issue = parse_issue("ABC-1", &json).unwrap();
        assert_eq!(issue.key, "ABC-1");
        assert_eq!(issue.summary, "Fix login crash");
        assert_eq!(issue.project_key, "ABC");
        assert_eq!(issue.status, "In Progress");
        assert_eq!(issue.issue_type, "Bug");
    }

    #[test]
    fn test_parse_issue_missing_fields() {
        assert!(parse_issue("ABC-1", &json!({})).is_none());
        assert!(parse_issue("ABC-1", &json!({ "fields": { "summary": "x" } })).is_none());
    }

    #[test]
    fn test_service_keyword_filter_is_case_insensitive() {
        let json = json!({
            "fields": {
                "issuelinks": [
                    { "outwardIssue": linked_issue("SD-1", "Service Request") },
                    { "outwardIssue": linked_issue("ABC-2", "Bug") },
                    { "inwardIssue": linked_issue("SD-2", "INCIDENT") },
                    { "outwardIssue": linked_issue("SD-3", "Problem Ticket") }
                ]
            }
        });

        let tickets = extract_service_tickets(&json);
        let keys: Vec<&str> = tickets.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, ["SD-1", "SD-2", "SD-3"]);
        assert_eq!(tickets[0].priority, "High");
    }

    #[test]
    fn test_inward_side_resolves_to_linked_issue() {
        let json = json!({
            "fields": {
                "issuelinks": [
                    { "inwardIssue": linked_issue("SD-9", "Incident") }
                ]
            }
        });

        let tickets = extract_service_tickets(&json);
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].key, "SD-9");
        assert_eq!(tickets[0].issue_type, "Incident");
    }

    #[test]
    fn test_missing_priority_defaults() {
        let json = json!({
            "fields": {
                "issuelinks": [
                    {
                        "outwardIssue": {
                            "key": "SD-4",
                            "fields": {
                                "summary": "No priority",
                                "status": { "name": "Open" },
                                "issuetype": { "name": "Service Request" }
                            }
                        }
                    }
                ]
            }
        });

        let tickets = extract_service_tickets(&json);
        assert_eq!(tickets[0].priority, "Not set");
    }

    #[test]
    fn test_no_links_yields_empty() {
        assert!(extract_service_tickets(&json!({ "fields": {} })).is_empty());
        assert!(extract_service_tickets(&json!({})).is_empty());
    }
}
