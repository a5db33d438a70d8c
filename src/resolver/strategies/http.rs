//! Plain HTTP redirect following.
//!
//! Issues one GET with automatic redirect following and reports where the
//! chain landed. Cheapest strategy after the aggregator special case, and the
//! one that settles most shortener links.

use super::{ResolveStrategy, http_client};
use crate::models::ResolutionRequest;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use tracing::{debug, instrument};

/// Follows HTTP 3xx redirects and reports the final URL.
///
/// Up to [`MAX_REDIRECTS`](super::MAX_REDIRECTS) hops are followed with the
/// request's user agent and timeout. An error status at the end of the chain
/// counts as a failure, so the cascade moves on to the next strategy.
///
/// # Examples
///
/// ```no_run
/// use news_fetcher::resolver::HttpRedirectStrategy;
/// use news_fetcher::{RedirectResolver, ResolverConfig};
///
/// # async fn run() {
/// let resolver = RedirectResolver::with_strategies(
///     ResolverConfig::default(),
///     vec![Box::new(HttpRedirectStrategy)],
/// );
/// let landed = resolver.resolve("https://bit.ly/3xYzAbc").await;
/// # }
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpRedirectStrategy;

impl HttpRedirectStrategy {
    async fn follow(&self, request: &ResolutionRequest) -> Result<String, reqwest::Error> {
        let client = http_client(request, HeaderMap::new())?;
        let response = client.get(&request.url).send().await?.error_for_status()?;
        debug!(status = %response.status(), landed = %response.url(), "Redirect chain finished");
        Ok(response.url().to_string())
    }
}

#[async_trait]
impl ResolveStrategy for HttpRedirectStrategy {
    fn name(&self) -> &'static str {
        "http"
    }

    #[instrument(level = "debug", skip_all, fields(url = %request.url))]
    async fn attempt(&self, request: &ResolutionRequest) -> Option<String> {
        match self.follow(request).await {
            Ok(landed) => Some(landed),
            Err(e) => {
                crate::diag_warn!(request.verbose, error = %e, "HTTP resolve failed");
                None
            }
        }
    }
}
