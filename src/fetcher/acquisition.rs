//! Content acquisition: render a page and turn it into markdown.
//!
//! [`ContentAcquirer`] is the seam between the fetcher and whatever actually
//! loads pages. The default [`BrowserAcquirer`] renders pages in one headless
//! Chromium shared by every fetch, launched on first use and kept until
//! [`ContentAcquirer::shutdown`].

use super::relevance::{RelevanceFilter, derive_query};
use crate::browser::BrowserSession;
use crate::config::{BrowserSettings, FetcherConfig};
use crate::error::{AcquisitionError, BrowserError};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Page chrome stripped before markdown conversion.
pub const EXCLUDED_SELECTOR: &str = "nav, footer, header, aside, .navbar, .footer, .header, \
     .sidebar, .ads, #navbar, #footer, [role='navigation'], [role='banner'], [role='contentinfo']";

/// Never content, whatever the caller excludes.
const NON_CONTENT: &str = "script, style, noscript, template";

#[derive(Debug, Clone, PartialEq)]
pub struct CrawlRequest {
    pub url: String,
    /// Relevance query. Derived from the page's own metadata when absent.
    pub query: Option<String>,
    pub excluded_selector: String,
    pub relevance_threshold: f32,
    /// Link-following depth. Zero means the page itself only.
    pub max_depth: usize,
}

impl CrawlRequest {
    /// Single-page crawl with the standard exclusions.
    pub fn single_page(url: &str, query: Option<&str>, relevance_threshold: f32) -> Self {
        Self {
            url: url.to_string(),
            query: query.map(str::to_string),
            excluded_selector: EXCLUDED_SELECTOR.to_string(),
            relevance_threshold,
            max_depth: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkdownOutput {
    pub raw_markdown: String,
    pub fit_markdown: String,
}

/// One crawled page.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlUnit {
    /// Where the page ended up after rendering.
    pub url: String,
    pub html: String,
    /// `None` when the page had no convertible content.
    pub markdown: Option<MarkdownOutput>,
}

#[async_trait]
pub trait ContentAcquirer: Send + Sync {
    async fn crawl(&self, request: &CrawlRequest) -> Result<Vec<CrawlUnit>, AcquisitionError>;

    /// Release long-lived resources. Crawling after shutdown is allowed and
    /// starts them up again.
    async fn shutdown(&self) {}
}

/// A lazily launched resource shared by concurrent users.
///
/// A cached value that fails the health check is replaced on the next
/// [`get_or_launch`](SharedSlot::get_or_launch). Users still holding the old
/// `Arc` keep it until they finish.
pub(crate) struct SharedSlot<T> {
    inner: Mutex<Option<Arc<T>>>,
}

impl<T> SharedSlot<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    pub(crate) async fn get_or_launch<F, Fut, E>(
        &self,
        healthy: impl Fn(&T) -> bool,
        launch: F,
    ) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut slot = self.inner.lock().await;
        if let Some(current) = slot.as_ref() {
            if healthy(current) {
                return Ok(Arc::clone(current));
            }
            warn!("Cached session is no longer healthy; relaunching");
        }

        // a failed launch leaves the slot empty so the next caller retries
        *slot = None;
        let fresh = Arc::new(launch().await?);
        *slot = Some(Arc::clone(&fresh));
        Ok(fresh)
    }

    /// Forget `stale` if it is still the cached value.
    pub(crate) async fn evict(&self, stale: &Arc<T>) -> bool {
        let mut slot = self.inner.lock().await;
        if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, stale)) {
            *slot = None;
            return true;
        }
        false
    }

    pub(crate) async fn take(&self) -> Option<Arc<T>> {
        self.inner.lock().await.take()
    }
}

/// Renders pages in a shared headless Chromium.
pub struct BrowserAcquirer {
    settings: BrowserSettings,
    user_agent: String,
    request_timeout: Duration,
    session: SharedSlot<BrowserSession>,
}

impl BrowserAcquirer {
    pub fn new(config: &FetcherConfig) -> Self {
        Self {
            settings: config.browser.clone(),
            user_agent: config.user_agent.clone(),
            request_timeout: config.timeout(),
            session: SharedSlot::new(),
        }
    }

    async fn session(&self) -> Result<Arc<BrowserSession>, BrowserError> {
        self.session
            .get_or_launch(BrowserSession::is_alive, || async {
                info!("Launching shared browser for content acquisition");
                BrowserSession::launch(&self.settings, &self.user_agent, self.request_timeout).await
            })
            .await
    }

    async fn render(&self, session: &BrowserSession, url: &str) -> Result<(String, String), AcquisitionError> {
        // the guard closes the tab on early returns and cancellation too
        let page = session.new_page().await?;
        page.set_user_agent(self.user_agent.as_str()).await?;
        page.goto(url).await?;

        let landed = page.url().await?.unwrap_or_else(|| url.to_string());
        let html = page.content().await?;
        page.close().await;
        Ok((landed, html))
    }
}

#[async_trait]
impl ContentAcquirer for BrowserAcquirer {
    #[instrument(level = "debug", skip_all, fields(url = %request.url))]
    async fn crawl(&self, request: &CrawlRequest) -> Result<Vec<CrawlUnit>, AcquisitionError> {
        let session = self.session().await?;
        let (landed, html) = match self.render(&session, &request.url).await {
            Ok(rendered) => rendered,
            Err(e) => {
                if !session.is_alive() && self.session.evict(&session).await {
                    warn!(error = %e, "Shared browser died during crawl; dropped it");
                }
                return Err(e);
            }
        };
        let markdown = to_markdown(&html, request)?;
        debug!(%landed, html_len = html.len(), has_markdown = markdown.is_some(), "Page rendered");

        Ok(vec![CrawlUnit {
            url: landed,
            html,
            markdown,
        }])
    }

    async fn shutdown(&self) {
        let Some(session) = self.session.take().await else {
            return;
        };
        match Arc::try_unwrap(session) {
            Ok(session) => {
                session.close().await;
                info!("Shared browser closed");
            }
            // a crawl still holds it; the last clone's drop tears it down
            Err(_) => warn!("Browser still in use at shutdown, leaving teardown to drop"),
        }
    }
}

/// Convert rendered HTML to raw and relevance-filtered markdown.
///
/// Elements matching the request's excluded selector are removed first.
/// Returns `Ok(None)` when nothing convertible is left.
pub fn to_markdown(html: &str, request: &CrawlRequest) -> Result<Option<MarkdownOutput>, AcquisitionError> {
    let cleaned = strip_elements(html, &request.excluded_selector)?;
    let cleaned = strip_elements(&cleaned, NON_CONTENT)?;

    let raw = htmd::convert(&cleaned).map_err(|e| AcquisitionError::Markdown(e.to_string()))?;
    let raw = raw.trim().to_string();
    if raw.is_empty() {
        return Ok(None);
    }

    let query = request
        .query
        .clone()
        .filter(|q| !q.trim().is_empty())
        .or_else(|| derive_query(&Html::parse_document(html)));
    let fit = match query {
        Some(query) => RelevanceFilter::new(request.relevance_threshold).filter(&raw, &query),
        None => raw.clone(),
    };

    Ok(Some(MarkdownOutput {
        raw_markdown: raw,
        fit_markdown: fit,
    }))
}

fn strip_elements(html: &str, selector: &str) -> Result<String, AcquisitionError> {
    if selector.trim().is_empty() {
        return Ok(html.to_string());
    }
    let selector = Selector::parse(selector).map_err(|e| AcquisitionError::Selector(e.to_string()))?;

    let mut document = Html::parse_document(html);
    let doomed: Vec<_> = document.select(&selector).map(|el| el.id()).collect();
    for id in doomed {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
    Ok(document.html())
}
