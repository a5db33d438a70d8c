//! Command-line interface for the `news_fetcher` demo binary.
//!
//! Options given here override values from the optional YAML config file.

use clap::Parser;
use news_fetcher::FetcherConfig;
use std::path::PathBuf;

/// Resolve a news link to its publisher URL and save the article as JSON.
///
/// # Examples
///
/// ```sh
/// # Fetch an aggregator link and write output.json
/// news_fetcher "https://news.google.com/rss/articles/CBMi..."
///
/// # Only print where a short link leads
/// news_fetcher --resolve-only https://bit.ly/xyz
///
/// # Relevance query, custom output, quieter logs
/// news_fetcher -q "election results" -o ./out/story.json --quiet https://t.co/abc
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Link to resolve and fetch
    pub url: String,

    /// Query used to keep only relevant markdown blocks
    #[arg(short, long)]
    pub query: Option<String>,

    /// Where to write the JSON report
    #[arg(short, long, default_value = "output.json")]
    pub output: PathBuf,

    /// Optional path to config.yaml file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Timeout in seconds for resolution and for page acquisition
    #[arg(long, env = "NEWS_FETCHER_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Maximum number of concurrent fetches
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// User agent sent by the HTTP client and the browser
    #[arg(long, env = "NEWS_FETCHER_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Demote per-strategy diagnostics to debug level
    #[arg(long)]
    pub quiet: bool,

    /// Resolve the link and print the final URL without fetching content
    #[arg(long)]
    pub resolve_only: bool,
}

impl Cli {
    /// Layer the command-line overrides on top of `config`.
    pub fn apply(&self, mut config: FetcherConfig) -> FetcherConfig {
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(user_agent) = &self.user_agent {
            config.user_agent = user_agent.clone();
        }
        if self.quiet {
            config.verbose = false;
        }
        config
    }
}
