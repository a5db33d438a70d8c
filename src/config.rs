//! Construction-time configuration for the resolver and the fetcher.
//!
//! Every struct here deserializes with `#[serde(default)]`, so a YAML file only
//! needs to carry the keys it wants to override:
//!
//! ```yaml
//! concurrency: 8
//! timeout_secs: 20
//! verbose: false
//! browser:
//!   executable: /usr/bin/chromium
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, instrument};

/// Desktop Chrome signature sent by the resolver and the crawler.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36";

/// Host serving aggregator article links.
pub const DEFAULT_AGGREGATOR_HOST: &str = "news.google.com";

/// Batch-RPC endpoint the aggregator's interstitial page talks to.
pub const DEFAULT_BATCH_URL: &str = "https://news.google.com/_/DotsSplashUi/data/batchexecute";

/// Where the aggregator strategy sends its requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorEndpoints {
    /// Hostname whose `/rss/articles/...` links get the aggregator treatment.
    pub host: String,
    /// Full URL of the batch-RPC endpoint.
    pub batch_url: String,
}

impl Default for AggregatorEndpoints {
    fn default() -> Self {
        Self {
            host: DEFAULT_AGGREGATOR_HOST.to_string(),
            batch_url: DEFAULT_BATCH_URL.to_string(),
        }
    }
}

impl AggregatorEndpoints {
    /// Scheme, host and port of the batch endpoint, used for the `Origin` and
    /// `Referer` headers. `https://{host}` if the batch URL does not parse.
    pub fn origin(&self) -> String {
        match url::Url::parse(&self.batch_url) {
            Ok(batch) => batch.origin().ascii_serialization(),
            Err(_) => format!("https://{}", self.host),
        }
    }
}

/// How to obtain a headless Chromium.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Explicit Chrome/Chromium binary. Autodetected when absent.
    pub executable: Option<PathBuf>,
    /// Attach to an already running browser instead of launching one.
    /// Falls back to `CHROMIUM_REMOTE_DEBUGGING_URL`.
    pub remote_debugging_url: Option<String>,
    /// Keep the Chromium sandbox on (off by default, containers rarely allow it).
    pub sandbox: bool,
}

impl BrowserSettings {
    pub fn remote_url(&self) -> Option<String> {
        self.remote_debugging_url
            .clone()
            .or_else(|| std::env::var("CHROMIUM_REMOTE_DEBUGGING_URL").ok())
            .filter(|u| !u.trim().is_empty())
    }
}

/// Settings for a [`RedirectResolver`](crate::resolver::RedirectResolver).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Overall deadline for one resolution, in seconds.
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Emit per-strategy diagnostic lines at info/warn instead of debug.
    pub verbose: bool,
    pub aggregator: AggregatorEndpoints,
    pub browser: BrowserSettings,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            verbose: true,
            aggregator: AggregatorEndpoints::default(),
            browser: BrowserSettings::default(),
        }
    }
}

impl ResolverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings for a [`NewsContentFetcher`](crate::fetcher::NewsContentFetcher).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Maximum number of in-flight fetches.
    pub concurrency: usize,
    /// Resolution deadline and acquisition timeout, in seconds.
    pub timeout_secs: u64,
    pub user_agent: String,
    pub verbose: bool,
    /// Minimum BM25 score for a markdown block to survive relevance filtering.
    pub relevance_threshold: f32,
    pub aggregator: AggregatorEndpoints,
    pub browser: BrowserSettings,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            verbose: true,
            relevance_threshold: 0.7,
            aggregator: AggregatorEndpoints::default(),
            browser: BrowserSettings::default(),
        }
    }
}

impl FetcherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Permit pool size. Zero would deadlock every fetch, so it is clamped to one.
    pub fn permits(&self) -> usize {
        self.concurrency.max(1)
    }

    /// The resolver settings this fetcher hands to its [`RedirectResolver`](crate::resolver::RedirectResolver).
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            timeout_secs: self.timeout_secs,
            user_agent: self.user_agent.clone(),
            verbose: self.verbose,
            aggregator: self.aggregator.clone(),
            browser: self.browser.clone(),
        }
    }
}

/// Load a [`FetcherConfig`] from a YAML file.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read and
/// [`ConfigError::Yaml`] if it is not a valid config document.
#[instrument(level = "info")]
pub fn load_config(path: &str) -> Result<FetcherConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })?;
    let config: FetcherConfig = serde_yaml::from_str(&raw)?;
    info!(
        concurrency = config.concurrency,
        timeout_secs = config.timeout_secs,
        verbose = config.verbose,
        "Loaded fetcher configuration"
    );
    Ok(config)
}
