//! Data models shared by the resolver, the fetcher and the JSON output.
//!
//! - [`ResolutionRequest`]: everything one resolution needs, fixed for its duration
//! - [`FetchedContent`]: what a successful fetch hands back
//! - [`FetchReport`]: the JSON document the demo binary writes

use crate::config::ResolverConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One URL to resolve, plus the knobs every strategy reads.
///
/// Built once per `resolve` call and only ever borrowed by the strategies.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionRequest {
    /// The URL as the caller gave it.
    pub url: String,
    /// Per-request HTTP / navigation timeout. The overall deadline is enforced
    /// by the orchestrator on top of this.
    pub timeout: Duration,
    pub user_agent: String,
    pub verbose: bool,
}

impl ResolutionRequest {
    pub fn new(url: impl Into<String>, config: &ResolverConfig) -> Self {
        Self {
            url: url.into(),
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
            verbose: config.verbose,
        }
    }
}

/// Article content for a resolved URL.
///
/// Only ever built complete: a failed or empty acquisition yields no
/// `FetchedContent` at all.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FetchedContent {
    /// The URL the content was fetched from (the resolver's output).
    pub final_url: String,
    /// Markdown of the whole page minus navigation, footers and ads.
    pub markdown_raw: String,
    /// Markdown blocks that passed the relevance filter.
    pub markdown_filtered: String,
    /// Raw page HTML as the browser rendered it.
    pub html: String,
}

/// A fetch result together with what was asked for and when.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FetchReport {
    pub requested_url: String,
    pub query: Option<String>,
    pub fetched_at: DateTime<Utc>,
    #[serde(flatten)]
    pub content: FetchedContent,
}

impl FetchReport {
    pub fn new(requested_url: &str, query: Option<&str>, content: FetchedContent) -> Self {
        Self {
            requested_url: requested_url.to_string(),
            query: query.map(str::to_string),
            fetched_at: Utc::now(),
            content,
        }
    }
}
