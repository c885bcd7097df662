//! # Context Switcher
//!
//! Concurrent context aggregation for issue-tracker tickets.
//!
//! Given an issue key and per-request tenant credentials, Context Switcher
//! queries three independent REST sources — the Jira issue API, Confluence
//! content search, and Bitbucket commit history — merges the results into
//! one context object, and optionally layers AI enrichment (summary,
//! suggested next actions, shortened commit messages) on top.
//!
//! ## Architecture
//!
//! ```text
//!                    ┌────────────────┐
//!    issue key ─────▶│  Issue Lookup  │ (prerequisite: yields project key)
//!                    └───────┬────────┘
//!              ┌─────────────┼─────────────┐
//!              ▼             ▼             ▼
//!       ┌────────────┐ ┌────────────┐ ┌────────────┐
//!       │  Document  │ │   Commit   │ │   Linked   │   concurrent,
//!       │   Search   │ │   Search   │ │  Tickets   │   failures isolated
//!       └──────┬─────┘ └──────┬─────┘ └──────┬─────┘
//!              └─────────────┬┴──────────────┘
//!                            ▼
//!                    ┌────────────────┐     ┌────────────────┐
//!                    │   Aggregator   │────▶│ AI Enrichment  │ (optional)
//!                    └────────────────┘     └────────────────┘
//! ```
//!
//! Failure isolation is the core property: a secondary source failing
//! degrades its slice of the result to empty, never the whole request.
//! Only "the issue itself does not exist" fails an aggregation.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`fetch`] | Remote fetcher trait and reqwest implementation |
//! | [`jira`] | Issue lookup and linked-ticket extraction |
//! | [`confluence`] | Document search (3-query fan-out, dedup) |
//! | [`bitbucket`] | Commit search (repository fan-out, filtering) |
//! | [`aggregate`] | Orchestration and per-branch failure isolation |
//! | [`ai`] | Optional AI enrichment stage |
//! | [`server`] | HTTP API shim |

pub mod aggregate;
pub mod ai;
pub mod bitbucket;
pub mod config;
pub mod confluence;
pub mod fetch;
pub mod jira;
pub mod models;
pub mod server;
