//! Headless browser navigation, the last and most expensive strategy.
//!
//! Catches redirects that only happen client-side (script-driven, delayed
//! meta refreshes, consent interstitials). Every attempt launches its own
//! browser and tears it down before returning, or on drop if the overall
//! deadline cancels it mid-navigation.

use super::ResolveStrategy;
use crate::browser::BrowserSession;
use crate::config::BrowserSettings;
use crate::error::{BrowserError, StrategyError};
use crate::models::ResolutionRequest;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, instrument};

/// How many times the current URL is re-read after navigation.
pub const SETTLE_POLLS: usize = 5;
/// Pause between two reads.
pub const SETTLE_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Default)]
pub struct HeadlessBrowserStrategy {
    settings: BrowserSettings,
}

impl HeadlessBrowserStrategy {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    async fn navigate(&self, request: &ResolutionRequest) -> Result<Option<String>, StrategyError> {
        let session =
            BrowserSession::launch(&self.settings, &request.user_agent, request.timeout).await?;
        let landed = Self::settle(&session, request).await;
        session.close().await;
        landed
    }

    async fn settle(
        session: &BrowserSession,
        request: &ResolutionRequest,
    ) -> Result<Option<String>, StrategyError> {
        let page = session.new_page().await?;
        page.set_user_agent(request.user_agent.as_str())
            .await
            .map_err(BrowserError::from)?;
        page.goto(request.url.as_str())
            .await
            .map_err(BrowserError::from)?;

        let landed = settle_url(|| page.url()).await.map_err(BrowserError::from)?;
        page.close().await;
        Ok(landed)
    }
}

/// Watch the current URL until it changes or the polls run out.
///
/// `read` is called once up front and then after each of the
/// [`SETTLE_POLLS`] pauses of [`SETTLE_INTERVAL`]. The first value that
/// differs from the previous read wins. Otherwise the last read is returned,
/// so this never waits longer than `SETTLE_POLLS * SETTLE_INTERVAL`.
pub(crate) async fn settle_url<F, Fut, E>(mut read: F) -> Result<Option<String>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<String>, E>>,
{
    let mut current = read().await?;
    for poll in 1..=SETTLE_POLLS {
        let before = current.clone();
        sleep(SETTLE_INTERVAL).await;
        current = read().await?;
        if current != before {
            debug!(poll, from = ?before, to = ?current, "Client-side redirect observed");
            break;
        }
    }
    Ok(current)
}

#[async_trait]
impl ResolveStrategy for HeadlessBrowserStrategy {
    fn name(&self) -> &'static str {
        "chromium"
    }

    #[instrument(level = "debug", skip_all, fields(url = %request.url))]
    async fn attempt(&self, request: &ResolutionRequest) -> Option<String> {
        match self.navigate(request).await {
            Ok(landed) => landed,
            Err(StrategyError::Browser(BrowserError::Unavailable(reason))) => {
                crate::diag_warn!(request.verbose, %reason, "Headless browser not available, skipping");
                None
            }
            Err(e) => {
                crate::diag_warn!(request.verbose, error = %e, "Chromium resolve failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    /// Serves `urls` in order, repeating the last one.
    fn scripted_reads<'a>(
        urls: &'a [&'a str],
        reads: &'a AtomicUsize,
    ) -> impl FnMut() -> std::future::Ready<Result<Option<String>, ()>> + 'a {
        move || {
            let n = reads.fetch_add(1, Ordering::SeqCst);
            let url = urls[n.min(urls.len() - 1)];
            std::future::ready(Ok(Some(url.to_string())))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_url_gives_up_after_all_polls() {
        let reads = AtomicUsize::new(0);
        let started = Instant::now();

        let landed = settle_url(scripted_reads(&["https://www.publisher.com/a"], &reads)).await;

        assert_eq!(landed, Ok(Some("https://www.publisher.com/a".to_string())));
        assert_eq!(reads.load(Ordering::SeqCst), SETTLE_POLLS + 1);
        assert_eq!(started.elapsed(), SETTLE_INTERVAL * SETTLE_POLLS as u32);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_url_stops_at_first_change() {
        let reads = AtomicUsize::new(0);
        let started = Instant::now();
        let urls = [
            "https://news.example.com/wrapper",
            "https://news.example.com/wrapper",
            "https://www.publisher.com/story",
            "https://www.publisher.com/other",
        ];

        let landed = settle_url(scripted_reads(&urls, &reads)).await;

        assert_eq!(landed, Ok(Some("https://www.publisher.com/story".to_string())));
        assert_eq!(reads.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), SETTLE_INTERVAL * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_url_propagates_read_errors() {
        let reads = AtomicUsize::new(0);
        let landed = settle_url(|| {
            let n = reads.fetch_add(1, Ordering::SeqCst);
            std::future::ready(if n == 0 {
                Ok(Some("about:blank".to_string()))
            } else {
                Err("target closed")
            })
        })
        .await;

        assert_eq!(landed, Err("target closed"));
        assert_eq!(reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_browser_binary_is_skipped() {
        let strategy = HeadlessBrowserStrategy::new(BrowserSettings {
            executable: Some("/nonexistent/chromium".into()),
            remote_debugging_url: None,
            sandbox: false,
        });
        let request = ResolutionRequest::new("https://bit.ly/abc", &ResolverConfig::default());

        assert!(matches!(
            strategy.navigate(&request).await,
            Err(StrategyError::Browser(BrowserError::Unavailable(_) | BrowserError::Launch(_)))
        ));
        assert_eq!(strategy.attempt(&request).await, None);
    }
}
