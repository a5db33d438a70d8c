//! Redirect resolution.
//!
//! [`RedirectResolver::resolve`] runs an ordered list of strategies, cheapest
//! first, under one overall deadline:
//!
//! 1. [`GoogleNewsStrategy`] (aggregator article links only)
//! 2. [`HttpRedirectStrategy`]
//! 3. [`HtmlInspectionStrategy`]
//! 4. [`HeadlessBrowserStrategy`]
//!
//! Strategies run strictly one after another. The first candidate that passes
//! [`domains::is_acceptable`] wins; if none does, or the deadline passes, the
//! input URL comes back unchanged. `resolve` never fails.

use crate::config::ResolverConfig;
use crate::models::ResolutionRequest;
use std::fmt;
use tokio::time::timeout;
use tracing::{debug, instrument};

pub mod domains;
pub mod strategies;

pub use strategies::{
    GoogleNewsStrategy, HeadlessBrowserStrategy, HtmlInspectionStrategy, HttpRedirectStrategy,
    ResolveStrategy,
};

pub struct RedirectResolver {
    config: ResolverConfig,
    strategies: Vec<Box<dyn ResolveStrategy>>,
}

impl fmt::Debug for RedirectResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedirectResolver")
            .field("config", &self.config)
            .field(
                "strategies",
                &self.strategies.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Default for RedirectResolver {
    fn default() -> Self {
        Self::new(ResolverConfig::default())
    }
}

impl RedirectResolver {
    /// Resolver with the standard four-strategy cascade.
    pub fn new(config: ResolverConfig) -> Self {
        let strategies = default_strategies(&config);
        Self { config, strategies }
    }

    /// Resolver with a caller-supplied cascade, run in the given order.
    pub fn with_strategies(config: ResolverConfig, strategies: Vec<Box<dyn ResolveStrategy>>) -> Self {
        Self { config, strategies }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve `url` to the publisher URL behind it.
    ///
    /// URLs that do not look like redirects are returned untouched. Otherwise
    /// the strategies run one after another under the overall deadline and
    /// the first candidate that passes the acceptance filter wins.
    ///
    /// # Arguments
    ///
    /// * `url` - A feed link, shortener link or plain article URL
    ///
    /// # Returns
    ///
    /// The resolved URL, or `url` itself when nothing was accepted or the
    /// deadline passed. Never fails.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use news_fetcher::{RedirectResolver, ResolverConfig};
    ///
    /// # async fn run() {
    /// let resolver = RedirectResolver::new(ResolverConfig::default());
    /// let url = resolver.resolve("https://bit.ly/3xYzAbc").await;
    /// println!("{url}");
    /// # }
    /// ```
    #[instrument(level = "info", skip(self))]
    pub async fn resolve(&self, url: &str) -> String {
        let verbose = self.config.verbose;
        crate::diag_info!(verbose, %url, "Resolving");

        if !domains::needs_resolution(url, verbose) {
            crate::diag_info!(verbose, "No redirect resolution needed, returning original URL");
            return url.to_string();
        }

        let request = ResolutionRequest::new(url, &self.config);
        match timeout(self.config.timeout(), self.run_cascade(&request)).await {
            Ok(Some(resolved)) => resolved,
            Ok(None) => {
                crate::diag_warn!(verbose, "All resolution methods failed, returning original URL");
                url.to_string()
            }
            Err(_) => {
                crate::diag_warn!(
                    verbose,
                    timeout_secs = self.config.timeout_secs,
                    "Overall timeout, returning original URL"
                );
                url.to_string()
            }
        }
    }

    async fn run_cascade(&self, request: &ResolutionRequest) -> Option<String> {
        for strategy in &self.strategies {
            let name = strategy.name();
            if !strategy.applies_to(&request.url) {
                debug!(strategy = name, "Strategy does not apply");
                continue;
            }

            match strategy.attempt(request).await {
                Some(candidate) if domains::is_acceptable(&candidate) => {
                    crate::diag_info!(request.verbose, strategy = name, resolved = %candidate, "Resolved");
                    return Some(candidate);
                }
                Some(candidate) => {
                    crate::diag_info!(
                        request.verbose,
                        strategy = name,
                        %candidate,
                        "Candidate still on a redirect domain, moving on"
                    );
                }
                None => debug!(strategy = name, "Strategy produced no candidate"),
            }
        }
        None
    }
}

/// The standard cascade, cheapest first.
pub fn default_strategies(config: &ResolverConfig) -> Vec<Box<dyn ResolveStrategy>> {
    vec![
        Box::new(GoogleNewsStrategy::new(config.aggregator.clone())),
        Box::new(HttpRedirectStrategy),
        Box::new(HtmlInspectionStrategy),
        Box::new(HeadlessBrowserStrategy::new(config.browser.clone())),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Returns a fixed answer and counts how often it was asked.
    struct Scripted {
        name: &'static str,
        answer: Option<&'static str>,
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn new(name: &'static str, answer: Option<&'static str>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let strategy = Self {
                name,
                answer,
                delay: Duration::ZERO,
                calls: Arc::clone(&calls),
            };
            (strategy, calls)
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl ResolveStrategy for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn attempt(&self, _request: &ResolutionRequest) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.answer.map(str::to_string)
        }
    }

    fn quiet_config(timeout_secs: u64) -> ResolverConfig {
        ResolverConfig {
            timeout_secs,
            verbose: false,
            ..ResolverConfig::default()
        }
    }

    #[test]
    fn test_default_cascade_order() {
        let names: Vec<_> = default_strategies(&ResolverConfig::default())
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(names, vec!["google_news", "http", "html", "chromium"]);
    }

    #[tokio::test]
    async fn test_first_accepted_candidate_short_circuits() {
        let (http, http_calls) = Scripted::new("http", Some("https://www.publisher.com/story"));
        let (html, html_calls) = Scripted::new("html", Some("https://elsewhere.com/"));
        let (chromium, chromium_calls) = Scripted::new("chromium", Some("https://elsewhere.com/"));

        let resolver = RedirectResolver::with_strategies(
            quiet_config(15),
            vec![Box::new(http), Box::new(html), Box::new(chromium)],
        );

        let resolved = resolver.resolve("https://bit.ly/abc").await;
        assert_eq!(resolved, "https://www.publisher.com/story");
        assert_eq!(http_calls.load(Ordering::SeqCst), 1);
        assert_eq!(html_calls.load(Ordering::SeqCst), 0);
        assert_eq!(chromium_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_redirector_candidates_are_never_accepted() {
        let (http, _) = Scripted::new("http", Some("https://t.co/still-short"));
        let (html, _) = Scripted::new("html", Some("https://amp.news.google.com/x"));
        let (chromium, chromium_calls) = Scripted::new("chromium", Some("https://www.bbc.com/news/1"));

        let resolver = RedirectResolver::with_strategies(
            quiet_config(15),
            vec![Box::new(http), Box::new(html), Box::new(chromium)],
        );

        assert_eq!(
            resolver.resolve("https://bit.ly/abc").await,
            "https://www.bbc.com/news/1"
        );
        assert_eq!(chromium_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_cascade_returns_input() {
        let (http, _) = Scripted::new("http", None);
        let (html, _) = Scripted::new("html", Some(""));
        let (chromium, _) = Scripted::new("chromium", Some("https://bit.ly/again"));

        let resolver = RedirectResolver::with_strategies(
            quiet_config(15),
            vec![Box::new(http), Box::new(html), Box::new(chromium)],
        );

        let url = "https://bit.ly/abc?utm_source=x";
        assert_eq!(resolver.resolve(url).await, url);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_returns_input_and_abandons_cascade() {
        let (slow, slow_calls) = Scripted::new("http", Some("https://www.publisher.com/"));
        let slow = slow.slow(Duration::from_secs(60));
        let (after, after_calls) = Scripted::new("html", Some("https://www.publisher.com/"));

        let resolver = RedirectResolver::with_strategies(
            quiet_config(2),
            vec![Box::new(slow), Box::new(after)],
        );

        let url = "https://bit.ly/slow";
        assert_eq!(resolver.resolve(url).await, url);
        assert_eq!(slow_calls.load(Ordering::SeqCst), 1);
        assert_eq!(after_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_strategy_that_does_not_apply_is_skipped() {
        let google = GoogleNewsStrategy::new(Default::default());
        let (http, http_calls) = Scripted::new("http", Some("https://www.publisher.com/"));

        let resolver =
            RedirectResolver::with_strategies(quiet_config(15), vec![Box::new(google), Box::new(http)]);

        // not an aggregator article link, so no network is touched by the first strategy
        assert_eq!(
            resolver.resolve("https://bit.ly/abc").await,
            "https://www.publisher.com/"
        );
        assert_eq!(http_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_cascade_returns_input() {
        let resolver = RedirectResolver::with_strategies(quiet_config(15), Vec::new());
        assert_eq!(resolver.resolve("not a url").await, "not a url");
    }
}
