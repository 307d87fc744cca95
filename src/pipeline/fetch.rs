//! Stage 1: headless-browser page fetching.
//!
//! Galleries assemble their image lists with JavaScript, so a plain HTTP GET
//! of the page URL returns a skeleton document. This stage drives a headless
//! Chromium over CDP, gives scripts a bounded window to run, and hands the
//! settled DOM to the extractor.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use tracing::{debug, warn};

use crate::error::StageError;

/// How long the CDP event handler gets to drain after `Browser::close`.
const HANDLER_SHUTDOWN: Duration = Duration::from_secs(5);

/// Source of rendered gallery HTML.
///
/// The default implementation drives headless Chromium via
/// [`ChromiumFetcher`]; tests substitute canned HTML through
/// [`JobConfigBuilder::fetcher`](crate::JobConfigBuilder::fetcher).
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url` and return the page HTML after scripts have run.
    ///
    /// Implementations wait up to `wait` for the page to settle and then
    /// capture whatever has rendered; an expired wait is not an error.
    async fn fetch_rendered(&self, url: &str, wait: Duration) -> Result<String, StageError>;
}

/// [`PageFetcher`] backed by a throwaway headless Chromium session.
///
/// Every call launches a fresh browser and tears it down before returning,
/// so a hung page in one job cannot poison later jobs.
#[derive(Debug, Default)]
pub struct ChromiumFetcher;

impl ChromiumFetcher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PageFetcher for ChromiumFetcher {
    async fn fetch_rendered(&self, url: &str, wait: Duration) -> Result<String, StageError> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-dev-shm-usage")
            .build()
            .map_err(|e| fetch_error(url, format!("browser config: {e}")))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| fetch_error(url, format!("browser launch: {e}")))?;

        // The handler stream must be polled for the whole browser lifetime;
        // it ends on its own once the browser process goes away.
        let mut handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let result = render_page(&browser, url, wait).await;

        if let Err(e) = browser.close().await {
            warn!("Error closing browser for {url}: {e}");
        }
        if tokio::time::timeout(HANDLER_SHUTDOWN, &mut handler_task)
            .await
            .is_err()
        {
            handler_task.abort();
        }

        result
    }
}

/// Navigate, wait for the page to settle, and capture the DOM.
async fn render_page(browser: &Browser, url: &str, wait: Duration) -> Result<String, StageError> {
    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| fetch_error(url, format!("new page: {e}")))?;

    page.goto(url)
        .await
        .map_err(|e| fetch_error(url, format!("navigation: {e}")))?;

    // An expired wait only means the page never signalled load completion;
    // the DOM captured below is whatever had rendered by then.
    match tokio::time::timeout(wait, page.wait_for_navigation()).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => return Err(fetch_error(url, format!("load wait: {e}"))),
        Err(_) => debug!(
            "Load wait expired for {url} after {}s, capturing as-is",
            wait.as_secs()
        ),
    }

    page.content()
        .await
        .map_err(|e| fetch_error(url, format!("content capture: {e}")))
}

fn fetch_error(url: &str, detail: String) -> StageError {
    StageError::FetchFailed {
        url: url.to_string(),
        detail,
    }
}
