//! Error types.
//!
//! None of these ever reach a caller of `resolve` or `fetch`; they exist so the
//! inner functions can use `?` and so the degrade-to-fallback points can log
//! what actually went wrong.

use thiserror::Error;

/// Why the aggregator's interstitial page or batch-RPC response did not yield
/// a publisher URL.
#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("no c-wiz[data-p] container in interstitial page")]
    MissingContainer,
    #[error("data-p attribute is empty")]
    EmptyBlob,
    #[error("data blob is not valid JSON: {0}")]
    MalformedBlob(#[source] serde_json::Error),
    #[error("unexpected JSON shape: {0}")]
    UnexpectedShape(&'static str),
    #[error("batch response carries no article URL")]
    NoArticleUrl,
}

/// Failures of the headless browser layer.
#[derive(Error, Debug)]
pub enum BrowserError {
    /// No usable browser binary or remote endpoint. Callers treat this as "skip".
    #[error("headless browser unavailable: {0}")]
    Unavailable(String),
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("browser protocol error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
}

/// Anything a single resolution strategy can trip over.
#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("aggregator payload: {0}")]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    Browser(#[from] BrowserError),
}

/// Failures inside the content acquisition adapter.
#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error("page acquisition timed out")]
    Timeout,
    #[error("invalid excluded-element selector: {0}")]
    Selector(String),
    #[error("markdown conversion failed: {0}")]
    Markdown(String),
}

impl From<chromiumoxide::error::CdpError> for AcquisitionError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        AcquisitionError::Browser(BrowserError::Cdp(e))
    }
}

/// Failures loading a YAML config file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
