//! Resolution strategies.
//!
//! Each strategy turns a [`ResolutionRequest`] into an optional candidate URL.
//! Strategies swallow their own errors (logging them) and return `None`; the
//! orchestrator decides whether a candidate is good enough.
//!
//! | Strategy | Module | Cost |
//! |----------|--------|------|
//! | Aggregator batch-RPC | [`google_news`] | 1-3 HTTP requests, aggregator links only |
//! | HTTP redirect chain | [`http`] | 1 HTTP request |
//! | HTML inspection | [`html`] | 1 HTTP request + parse |
//! | Headless browser | [`browser`] | browser launch + navigation |

use crate::models::ResolutionRequest;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::HeaderMap;
use reqwest::redirect::Policy;

pub mod browser;
pub mod google_news;
pub mod html;
pub mod http;

pub use browser::HeadlessBrowserStrategy;
pub use google_news::GoogleNewsStrategy;
pub use html::HtmlInspectionStrategy;
pub use http::HttpRedirectStrategy;

/// Redirect hops followed before a chain is abandoned.
pub(crate) const MAX_REDIRECTS: usize = 10;

/// One way of finding where a URL really leads.
///
/// The resolver calls [`applies_to`](Self::applies_to) first and skips the
/// strategy when it returns `false`. Candidates returned by
/// [`attempt`](Self::attempt) still have to pass the acceptance filter.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use news_fetcher::models::ResolutionRequest;
/// use news_fetcher::resolver::ResolveStrategy;
///
/// /// Rewrites one mirror host to the publisher's own.
/// struct MirrorStrategy;
///
/// #[async_trait]
/// impl ResolveStrategy for MirrorStrategy {
///     fn name(&self) -> &'static str {
///         "mirror"
///     }
///
///     fn applies_to(&self, url: &str) -> bool {
///         url.starts_with("https://mirror.example.net/")
///     }
///
///     async fn attempt(&self, request: &ResolutionRequest) -> Option<String> {
///         Some(request.url.replace("mirror.example.net", "www.publisher.com"))
///     }
/// }
/// ```
#[async_trait]
pub trait ResolveStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether this strategy should run for `url` at all.
    ///
    /// Defaults to `true`. Override it for strategies that only make sense
    /// for some hosts, so the cascade does not spend a request on them.
    fn applies_to(&self, _url: &str) -> bool {
        true
    }

    /// Try to produce a final URL.
    ///
    /// # Arguments
    ///
    /// * `request` - The URL plus the user agent, timeout and verbosity to use
    ///
    /// # Returns
    ///
    /// A candidate URL, or `None` on any failure. Errors are logged by the
    /// strategy itself and never returned.
    async fn attempt(&self, request: &ResolutionRequest) -> Option<String>;
}

/// A fresh client owned by one strategy attempt: follows redirects, carries
/// the request's user agent and timeout, keeps cookies for the attempt.
pub(crate) fn http_client(
    request: &ResolutionRequest,
    headers: HeaderMap,
) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(request.user_agent.as_str())
        .default_headers(headers)
        .timeout(request.timeout)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .cookie_store(true)
        .build()
}
