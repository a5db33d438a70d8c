//! Article content fetching.
//!
//! [`NewsContentFetcher`] resolves a link through the redirect cascade, then
//! hands the resolved URL to a [`ContentAcquirer`] and keeps the first crawled
//! page that produced markdown. At most `concurrency` fetches run at once.

use crate::config::FetcherConfig;
use crate::error::AcquisitionError;
use crate::models::FetchedContent;
use crate::resolver::RedirectResolver;
use futures::stream::{self, StreamExt};
use std::fmt;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{error, instrument};

pub mod acquisition;
pub mod relevance;

pub use acquisition::{BrowserAcquirer, ContentAcquirer, CrawlRequest, CrawlUnit, MarkdownOutput};

pub struct NewsContentFetcher {
    config: FetcherConfig,
    resolver: RedirectResolver,
    acquirer: Box<dyn ContentAcquirer>,
    permits: Semaphore,
}

impl fmt::Debug for NewsContentFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewsContentFetcher")
            .field("config", &self.config)
            .field("resolver", &self.resolver)
            .field("available_permits", &self.permits.available_permits())
            .finish()
    }
}

impl Default for NewsContentFetcher {
    fn default() -> Self {
        Self::new(FetcherConfig::default())
    }
}

impl NewsContentFetcher {
    /// Fetcher with the standard resolver cascade and a shared headless browser.
    pub fn new(config: FetcherConfig) -> Self {
        let resolver = RedirectResolver::new(config.resolver_config());
        let acquirer = Box::new(BrowserAcquirer::new(&config));
        Self::with_parts(config, resolver, acquirer)
    }

    pub fn with_parts(
        config: FetcherConfig,
        resolver: RedirectResolver,
        acquirer: Box<dyn ContentAcquirer>,
    ) -> Self {
        let permits = Semaphore::new(config.permits());
        Self {
            config,
            resolver,
            acquirer,
            permits,
        }
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    pub fn resolver(&self) -> &RedirectResolver {
        &self.resolver
    }

    /// Resolve `url` and fetch the article behind it.
    ///
    /// Waits for a free permit, resolves `url` through the redirect cascade,
    /// then crawls the resolved page under the configured timeout.
    ///
    /// # Arguments
    ///
    /// * `url` - The link to follow, usually straight from a feed
    /// * `query` - Relevance query for the filtered markdown. Derived from the
    ///   page's own title and description when `None`.
    ///
    /// # Returns
    ///
    /// The first crawled page that produced markdown, or `None` when the page
    /// could not be acquired or produced none. Acquisition errors are logged,
    /// never returned.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use news_fetcher::{FetcherConfig, NewsContentFetcher};
    ///
    /// # async fn run() {
    /// let fetcher = NewsContentFetcher::new(FetcherConfig::default());
    /// if let Some(content) = fetcher.fetch("https://bit.ly/3xYzAbc", Some("election")).await {
    ///     println!("{}: {}", content.final_url, content.markdown_filtered);
    /// }
    /// fetcher.shutdown().await;
    /// # }
    /// ```
    #[instrument(level = "info", skip(self))]
    pub async fn fetch(&self, url: &str, query: Option<&str>) -> Option<FetchedContent> {
        // only fails once the semaphore is closed, which never happens here
        let _permit = self.permits.acquire().await.ok()?;
        let verbose = self.config.verbose;

        let final_url = self.resolver.resolve(url).await;
        crate::diag_info!(verbose, %final_url, "Fetching content");

        let request = CrawlRequest::single_page(&final_url, query, self.config.relevance_threshold);
        let crawled = timeout(self.config.timeout(), self.acquirer.crawl(&request))
            .await
            .unwrap_or_else(|_| Err(AcquisitionError::Timeout));

        match crawled {
            Ok(units) => {
                let content = first_with_markdown(units, &final_url);
                if content.is_none() {
                    crate::diag_warn!(verbose, %final_url, "No markdown content extracted");
                }
                content
            }
            Err(e) => {
                error!(%final_url, error = %e, "Error fetching content");
                None
            }
        }
    }

    /// Fetch many links, at most `concurrency` at a time.
    ///
    /// # Arguments
    ///
    /// * `urls` - Links to fetch
    /// * `query` - Relevance query shared by every fetch, see [`fetch`](Self::fetch)
    ///
    /// # Returns
    ///
    /// One entry per input URL, in input order, whatever order the fetches
    /// finished in.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use news_fetcher::{FetcherConfig, NewsContentFetcher};
    ///
    /// # async fn run() {
    /// let fetcher = NewsContentFetcher::new(FetcherConfig { concurrency: 3, ..FetcherConfig::default() });
    /// let urls = vec!["https://bit.ly/a".to_string(), "https://t.co/b".to_string()];
    /// let fetched = fetcher.fetch_all(&urls, None).await;
    /// assert_eq!(fetched.len(), urls.len());
    /// # }
    /// ```
    pub async fn fetch_all(&self, urls: &[String], query: Option<&str>) -> Vec<Option<FetchedContent>> {
        stream::iter(urls)
            .map(|url| self.fetch(url, query))
            .buffered(self.config.permits())
            .collect()
            .await
    }

    /// Tear down the acquirer's browser, if one was started.
    pub async fn shutdown(&self) {
        self.acquirer.shutdown().await;
    }
}

fn first_with_markdown(units: Vec<CrawlUnit>, final_url: &str) -> Option<FetchedContent> {
    units.into_iter().find_map(|unit| {
        let markdown = unit.markdown?;
        Some(FetchedContent {
            final_url: final_url.to_string(),
            markdown_raw: markdown.raw_markdown,
            markdown_filtered: markdown.fit_markdown,
            html: unit.html,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(html: &str, markdown: Option<(&str, &str)>) -> CrawlUnit {
        CrawlUnit {
            url: "https://www.publisher.com/landed".to_string(),
            html: html.to_string(),
            markdown: markdown.map(|(raw, fit)| MarkdownOutput {
                raw_markdown: raw.to_string(),
                fit_markdown: fit.to_string(),
            }),
        }
    }

    #[test]
    fn test_first_unit_with_markdown_wins() {
        let units = vec![
            unit("<p>empty</p>", None),
            unit("<p>one</p>", Some(("one", "one"))),
            unit("<p>two</p>", Some(("two", "two"))),
        ];
        let content = first_with_markdown(units, "https://www.publisher.com/story").unwrap();
        assert_eq!(content.html, "<p>one</p>");
        assert_eq!(content.markdown_raw, "one");
        assert_eq!(content.final_url, "https://www.publisher.com/story");
    }

    #[test]
    fn test_no_markdown_anywhere_is_none() {
        assert_eq!(first_with_markdown(vec![unit("<p/>", None)], "https://x.com/"), None);
        assert_eq!(first_with_markdown(Vec::new(), "https://x.com/"), None);
    }
}
