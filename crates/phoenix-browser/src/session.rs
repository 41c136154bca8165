//! Stealth Chromium session over CDP.
//!
//! One browser, one page, one logical thread of control. The session owns
//! launch and teardown; the resolver only sees the `PageSession` seam.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures::StreamExt;
use phoenix_core::session::{PageSession, SessionError};
use rand::Rng;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Spoofed desktop profile, kept consistent for the whole session.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// Mask the webdriver property before any page script runs.
const WEBDRIVER_MASK: &str =
    "Object.defineProperty(navigator, 'webdriver', {get: () => undefined})";

/// How often `match_first` re-queries the page while waiting.
const MATCH_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub headless: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { headless: true }
    }
}

pub struct StealthSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    page: Page,
}

impl StealthSession {
    /// Launch Chromium with automation fingerprints suppressed and open a
    /// blank page.
    pub async fn launch(options: SessionOptions) -> Result<Self, SessionError> {
        info!(headless = options.headless, "launching stealth browser");

        let mut config = BrowserConfig::builder()
            .no_sandbox()
            .window_size(1920, 1080)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars");
        if !options.headless {
            config = config.with_head();
        }
        // Support custom Chrome path via CHROME_BIN environment variable
        if let Ok(chrome_bin) = std::env::var("CHROME_BIN") {
            info!("Using custom Chrome binary: {}", chrome_bin);
            config = config.chrome_executable(chrome_bin);
        }

        let (browser, mut handler) = Browser::launch(config.build().map_err(SessionError::Browser)?)
            .await
            .map_err(|e| SessionError::Browser(format!("failed to launch browser: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if let Err(e) = h {
                    error!("browser handler error (ignoring): {}", e);
                    continue;
                }
            }
            info!("browser handler task ended");
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| SessionError::Browser(format!("failed to create page: {e}")))?;

        page.set_user_agent(USER_AGENT)
            .await
            .map_err(|e| SessionError::Browser(e.to_string()))?;
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(WEBDRIVER_MASK))
            .await
            .map_err(|e| SessionError::Browser(e.to_string()))?;

        Ok(Self {
            browser,
            handler_task,
            page,
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub async fn goto(&self, url: &str) -> Result<(), SessionError> {
        info!("Navigating to: {}", url);
        self.page
            .goto(url)
            .await
            .map_err(|e| SessionError::Browser(e.to_string()))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| SessionError::Browser(e.to_string()))?;
        Ok(())
    }

    pub async fn url(&self) -> Result<String, SessionError> {
        self.page
            .url()
            .await
            .map_err(|e| SessionError::Browser(e.to_string()))
            .map(Option::unwrap_or_default)
    }

    /// All elements currently matching `selector`, in document order. List
    /// extraction for missions; single-element lookups go through the
    /// resolver instead so they can heal.
    pub async fn find_all(&self, selector: &str) -> Result<Vec<Element>, SessionError> {
        self.page
            .find_elements(selector)
            .await
            .map_err(|e| SessionError::Browser(e.to_string()))
    }

    pub async fn screenshot(&self) -> Result<Vec<u8>, SessionError> {
        self.page
            .screenshot(ScreenshotParams::builder().build())
            .await
            .map_err(|e| SessionError::Browser(e.to_string()))
    }

    /// Human-pacing jitter between actions.
    pub async fn random_delay(&self, min: Duration, max: Duration) {
        let span = max.saturating_sub(min).as_millis() as u64;
        let jitter = rand::rng().random_range(0..=span);
        tokio::time::sleep(min + Duration::from_millis(jitter)).await;
    }

    pub async fn close(mut self) -> Result<(), SessionError> {
        self.browser
            .close()
            .await
            .map_err(|e| SessionError::Browser(format!("error closing browser: {e}")))?;
        self.handler_task
            .await
            .map_err(|e| SessionError::Browser(format!("error awaiting handler: {e}")))?;
        info!("stealth browser stopped");
        Ok(())
    }
}

#[async_trait]
impl PageSession for StealthSession {
    type Handle = Element;

    /// Poll for the first matching element (querySelector document order)
    /// until the caller's deadline expires.
    async fn match_first(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Element, SessionError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.page.find_element(selector).await {
                Ok(element) => return Ok(element),
                Err(_) if tokio::time::Instant::now() < deadline => {
                    tokio::time::sleep(MATCH_POLL_INTERVAL).await;
                }
                Err(_) => {
                    return Err(SessionError::NotFound {
                        selector: selector.to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
            }
        }
    }

    async fn content(&self) -> Result<String, SessionError> {
        self.page
            .content()
            .await
            .map_err(|e| SessionError::Browser(e.to_string()))
    }
}
