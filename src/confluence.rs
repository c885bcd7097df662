//! Confluence source adapter: document search.
//!
//! Three CQL queries run concurrently per request — an exact issue-key
//! phrase, a "mentions" variant, and a bare project-key match. Their
//! results are flattened in query order, deduplicated by document id
//! (first occurrence wins), and capped. A failing query contributes an
//! empty list; the adapter itself never fails.

use anyhow::Result;
use futures::future::join_all;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

use crate::fetch::{Fetcher, Tenant};
use crate::models::DocumentRecord;

/// Cap on the merged, deduplicated document list.
const MAX_DOCUMENTS: usize = 8;
/// Per-query page size requested from the search API.
const SEARCH_PAGE_LIMIT: u32 = 10;

pub struct ConfluenceSource {
    fetcher: Arc<dyn Fetcher>,
    tenant: Tenant,
}

impl ConfluenceSource {
    pub fn new(fetcher: Arc<dyn Fetcher>, tenant: Tenant) -> Self {
        Self { fetcher, tenant }
    }

    /// Search for documents related to the issue.
    ///
    /// Worst case — all three queries failing — yields an empty list.
    pub async fn search_documents(
        &self,
        issue_key: &str,
        project_key: &str,
    ) -> Result<Vec<DocumentRecord>> {
        let queries = [
            format!("\"{}\"", issue_key),
            format!("~\"{}\"", issue_key),
            project_key.to_string(),
        ];

        let url = self.tenant.document_search_url();
        let fetches = queries.iter().map(|query| {
            let url = url.clone();
            let cql = format!("text ~ \"{}\"", query);
            async move {
                let params = [("cql", cql), ("limit", SEARCH_PAGE_LIMIT.to_string())];
                self.fetcher.get_json(&url, &params).await
            }
        });

        // Combined in query order, not completion order, so dedup and
        // truncation stay deterministic.
        let responses: Vec<Option<Value>> = join_all(fetches)
            .await
            .into_iter()
            .zip(queries.iter())
            .map(|(result, query)| match result {
                Ok(json) => Some(json),
                Err(e) => {
                    warn!(query = %query, error = %e, "document query failed");
                    None
                }
            })
            .collect();

        Ok(collect_documents(&responses))
    }
}

/// Flatten the per-query responses, dedup by id keeping the first
/// occurrence, and cap the result.
fn collect_documents(responses: &[Option<Value>]) -> Vec<DocumentRecord> {
    let mut seen = HashSet::new();
    let mut docs = Vec::new();

    for response in responses.iter().flatten() {
        let results = match response.get("results").and_then(|r| r.as_array()) {
            Some(results) => results,
            None => continue,
        };

        for doc in results {
            let record = match parse_document(doc) {
                Some(record) => record,
                None => continue,
            };
            if seen.insert(record.id.clone()) {
                docs.push(record);
            }
        }
    }

    docs.truncate(MAX_DOCUMENTS);
    docs
}

fn parse_document(doc: &Value) -> Option<DocumentRecord> {
    // Content ids come back as strings or numbers depending on API version.
    let id = match doc.get("id")? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    let link = doc
        .pointer("/_links/webui")
        .or_else(|| doc.pointer("/_links/self"))
        .and_then(|l| l.as_str())
        .unwrap_or("")
        .to_string();

    Some(DocumentRecord {
        id,
        title: doc.get("title")?.as_str()?.to_string(),
        kind: doc
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or("")
            .to_string(),
        last_modified: doc
            .pointer("/version/when")
            .and_then(|w| w.as_str())
            .map(|w| w.to_string()),
        link,
    })
}
