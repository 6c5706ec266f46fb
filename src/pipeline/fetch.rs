//! Page fetching: drive a headless browser and return the rendered HTML.
//!
//! The verification page is JavaScript-rendered — a plain HTTP GET returns an
//! empty shell — so this stage launches an isolated Chromium, navigates, and
//! waits for DOM-content-loaded. Deliberately *not* network idle: the page
//! embeds slow analytics subresources that would stall every extraction, and
//! the data table is present as soon as the initial DOM is built.
//!
//! ## Resource discipline
//!
//! The browser process is the one scoped resource in this crate. Acquisition
//! and release are paired in [`fetch_html`]: whatever `navigate_and_capture`
//! returns — success, navigation failure, or timeout — the browser is closed,
//! its process awaited, and the CDP handler task aborted before the result
//! propagates. No exit path leaks a Chromium process.

use crate::config::FetchConfig;
use crate::error::ExtractError;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::EventDomContentEventFired;
use futures::StreamExt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Navigate to `url` in a fresh headless browser context and return the
/// serialized HTML once the DOM's initial content has loaded.
///
/// This is the single implementation of the fetch stage; the blocking mode
/// is [`fetch_html_sync`], a thin runtime adapter around it. Both guarantee
/// browser teardown on every exit path.
pub async fn fetch_html(url: &str, config: &FetchConfig) -> Result<String, ExtractError> {
    let mut builder = BrowserConfig::builder();
    if !config.headless {
        builder = builder.with_head();
    }
    let browser_config = builder.build().map_err(|reason| ExtractError::Navigation {
        url: url.to_string(),
        reason,
    })?;

    info!("Launching browser for {}", url);
    let (mut browser, mut handler) =
        Browser::launch(browser_config)
            .await
            .map_err(|e| ExtractError::Navigation {
                url: url.to_string(),
                reason: format!("browser launch failed: {e}"),
            })?;

    // The handler drives the CDP websocket; it must be polled for the
    // browser to make progress, and stops when the connection drops.
    let handler_task = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }
    });

    let outcome = navigate_and_capture(&browser, url, config.timeout_ms).await;

    // Unconditional teardown, regardless of `outcome`.
    if let Err(e) = browser.close().await {
        warn!("Browser close failed: {e}");
    }
    if let Err(e) = browser.wait().await {
        warn!("Browser process wait failed: {e}");
    }
    handler_task.abort();
    debug!("Browser context released for {}", url);

    outcome
}

/// The navigation itself, separated out so [`fetch_html`] can pair it with
/// teardown without `?` skipping the release.
async fn navigate_and_capture(
    browser: &Browser,
    url: &str,
    timeout_ms: u64,
) -> Result<String, ExtractError> {
    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| ExtractError::Navigation {
            url: url.to_string(),
            reason: format!("page creation failed: {e}"),
        })?;

    // Subscribe before navigating so the event cannot be missed.
    let mut dom_ready = page
        .event_listener::<EventDomContentEventFired>()
        .await
        .map_err(|e| ExtractError::Navigation {
            url: url.to_string(),
            reason: format!("event subscription failed: {e}"),
        })?;

    page.goto(url).await.map_err(|e| ExtractError::Navigation {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    tokio::time::timeout(Duration::from_millis(timeout_ms), dom_ready.next())
        .await
        .map_err(|_| ExtractError::NavigationTimeout {
            url: url.to_string(),
            ms: timeout_ms,
        })?;
    debug!("DOM content loaded for {}", url);

    let html = page.content().await.map_err(|e| ExtractError::Navigation {
        url: url.to_string(),
        reason: format!("content retrieval failed: {e}"),
    })?;

    Ok(html)
}

/// Blocking adapter around [`fetch_html`].
///
/// Creates a temporary tokio runtime internally. Must not be called from
/// within an async context.
pub fn fetch_html_sync(url: &str, config: &FetchConfig) -> Result<String, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(fetch_html(url, config))
}
