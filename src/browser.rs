//! Headless Chromium sessions with guaranteed teardown.
//!
//! A [`BrowserSession`] owns a `chromiumoxide` browser plus the task driving
//! its CDP event handler. Close it explicitly with [`BrowserSession::close`]
//! when done; if it is dropped instead (an error path, or a deadline
//! cancelling the future that owns it) the handler task is aborted and the
//! launched Chromium process is killed by `Browser`'s own drop.
//!
//! Tabs get the same treatment through [`PageGuard`]: closed explicitly on the
//! happy path, closed by a spawned task when the guard is dropped early.

use crate::config::BrowserSettings;
use crate::error::BrowserError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::ops::Deref;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct BrowserSession {
    browser: Option<Browser>,
    handler: JoinHandle<()>,
    /// False when attached to a remote browser we must not shut down.
    owned: bool,
}

impl BrowserSession {
    /// Launch (or attach to) a headless browser.
    ///
    /// # Errors
    ///
    /// [`BrowserError::Unavailable`] when no Chromium binary can be found,
    /// [`BrowserError::Launch`] when one is found but fails to start or the
    /// remote endpoint refuses the connection.
    pub async fn launch(
        settings: &BrowserSettings,
        user_agent: &str,
        request_timeout: Duration,
    ) -> Result<Self, BrowserError> {
        let (browser, mut handler, owned) = match settings.remote_url() {
            Some(url) => {
                info!(%url, "Connecting to remote Chrome instance");
                let (browser, handler) = Browser::connect(url.as_str())
                    .await
                    .map_err(|e| BrowserError::Launch(format!("connect to {url}: {e}")))?;
                (browser, handler, false)
            }
            None => {
                let mut builder = BrowserConfig::builder()
                    .request_timeout(request_timeout)
                    .arg("--disable-gpu")
                    .arg("--disable-dev-shm-usage")
                    .arg(format!("--user-agent={user_agent}"));
                if !settings.sandbox {
                    builder = builder.no_sandbox();
                }
                if let Some(path) = &settings.executable {
                    builder = builder.chrome_executable(path);
                }
                // build() fails when no executable can be located
                let config = builder.build().map_err(BrowserError::Unavailable)?;
                let (browser, handler) = Browser::launch(config)
                    .await
                    .map_err(|e| BrowserError::Launch(e.to_string()))?;
                (browser, handler, true)
            }
        };

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "Browser handler event error");
                }
            }
        });

        Ok(Self {
            browser: Some(browser),
            handler,
            owned,
        })
    }

    /// Open a blank tab, closed again when the returned guard goes away.
    pub async fn new_page(&self) -> Result<PageGuard, BrowserError> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| BrowserError::Launch("session already closed".to_string()))?;
        Ok(PageGuard::new(browser.new_page("about:blank").await?))
    }

    /// False once the CDP connection is gone (browser crashed, killed or
    /// closed), at which point every further command would fail.
    pub fn is_alive(&self) -> bool {
        self.browser.is_some() && !self.handler.is_finished()
    }

    /// Shut the browser down and stop the handler task.
    pub async fn close(mut self) {
        if let Some(mut browser) = self.browser.take() {
            if self.owned {
                if let Err(e) = browser.close().await {
                    warn!(error = %e, "Failed to close browser cleanly");
                }
                if let Err(e) = browser.wait().await {
                    warn!(error = %e, "Failed waiting for browser process to exit");
                }
            }
        }
        self.handler.abort();
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if self.browser.is_some() {
            debug!("Browser session dropped without close; tearing down");
        }
        self.handler.abort();
    }
}

/// An open tab that is closed on every exit path.
///
/// Prefer [`PageGuard::close`]. Dropping the guard instead (an early `?`, or a
/// timeout cancelling the future that owns it) sends the close from a
/// background task, so a long-lived shared browser does not pile up tabs.
pub struct PageGuard {
    page: Page,
    closed: bool,
}

impl PageGuard {
    pub fn new(page: Page) -> Self {
        Self { page, closed: false }
    }

    /// Close the tab now, logging instead of failing.
    pub async fn close(mut self) {
        self.closed = true;
        if let Err(e) = self.page.clone().close().await {
            debug!(error = %e, "Failed to close page");
        }
    }
}

impl Deref for PageGuard {
    type Target = Page;

    fn deref(&self) -> &Page {
        &self.page
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let page = self.page.clone();
        match Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = page.close().await {
                        debug!(error = %e, "Failed to close dropped page");
                    }
                });
            }
            Err(_) => warn!("Page dropped outside a runtime; tab left open"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Open tabs other than the one Chromium starts with.
    async fn open_tabs(session: &BrowserSession) -> usize {
        let browser = session.browser.as_ref().unwrap();
        browser.pages().await.unwrap().len()
    }

    #[tokio::test]
    async fn test_dropped_page_guard_closes_its_tab() {
        let settings = BrowserSettings::default();
        let session = match BrowserSession::launch(&settings, "news_fetcher_test/1.0", Duration::from_secs(10)).await {
            Ok(session) => session,
            // nothing to check without a local Chromium
            Err(BrowserError::Unavailable(_) | BrowserError::Launch(_)) => return,
            Err(e) => panic!("unexpected launch error: {e}"),
        };
        assert!(session.is_alive());
        let baseline = open_tabs(&session).await;

        let page = session.new_page().await.unwrap();
        assert_eq!(open_tabs(&session).await, baseline + 1);
        drop(page);

        let mut remaining = baseline + 1;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            remaining = open_tabs(&session).await;
            if remaining == baseline {
                break;
            }
        }
        assert_eq!(remaining, baseline);

        session.close().await;
    }
}
