//! Chrome-backed automation over a remote DevTools endpoint.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::handler::HandlerConfig;
use chromiumoxide::Browser;
use futures::StreamExt;
use tracing::{debug, info};

use super::{is_finished_download, AutomationError, DownloadAutomation, DOWNLOAD_BUTTON_SELECTORS};

/// Connection settings for [`ChromeAutomation`].
#[derive(Debug, Clone)]
pub struct ChromeAutomationConfig {
    /// DevTools endpoint, e.g. `ws://localhost:9222` or `http://localhost:9222`.
    pub remote_url: String,
    /// Upper bound for navigation plus the download itself.
    pub timeout: Duration,
    /// How often the download directory is checked.
    pub poll_interval: Duration,
}

impl Default for ChromeAutomationConfig {
    fn default() -> Self {
        Self {
            remote_url: "http://localhost:9222".to_string(),
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Drives a remote Chrome to click a page's download button.
pub struct ChromeAutomation {
    config: ChromeAutomationConfig,
}

impl ChromeAutomation {
    pub fn new(config: ChromeAutomationConfig) -> Self {
        Self { config }
    }

    /// Resolve the WebSocket debugger URL from the `/json/version` endpoint.
    async fn websocket_url(&self) -> Result<String, AutomationError> {
        let http_url = self
            .config
            .remote_url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .send()
            .await
            .map_err(|e| AutomationError::Unavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| AutomationError::Unavailable(e.to_string()))?;

        resp.get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| AutomationError::Unavailable("no webSocketDebuggerUrl".to_string()))
    }

    async fn wait_for_file(&self, dir: &Path, started: Instant) -> Result<PathBuf, AutomationError> {
        loop {
            let mut entries = tokio::fs::read_dir(dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_file() && is_finished_download(&path) {
                    return Ok(path);
                }
            }
            if started.elapsed() >= self.config.timeout {
                return Err(AutomationError::Timeout(self.config.timeout));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

#[async_trait]
impl DownloadAutomation for ChromeAutomation {
    fn name(&self) -> &str {
        "chrome"
    }

    async fn acquire(&self, url: &str, download_dir: &Path) -> Result<PathBuf, AutomationError> {
        let started = Instant::now();
        tokio::fs::create_dir_all(download_dir).await?;

        let ws_url = self.websocket_url().await?;
        info!("Connecting to remote browser at {}", ws_url);

        let handler_config = HandlerConfig {
            request_timeout: self.config.timeout,
            ..Default::default()
        };
        let (browser, mut handler) = Browser::connect_with_config(ws_url, handler_config)
            .await
            .map_err(|e| AutomationError::Browser(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let result = async {
            let behavior = SetDownloadBehaviorParams::builder()
                .behavior(SetDownloadBehaviorBehavior::Allow)
                .download_path(download_dir.to_string_lossy().to_string())
                .build()
                .map_err(AutomationError::Browser)?;
            browser
                .execute(behavior)
                .await
                .map_err(|e| AutomationError::Browser(e.to_string()))?;

            let page = browser
                .new_page(url)
                .await
                .map_err(|e| AutomationError::Browser(e.to_string()))?;
            let _ = page.wait_for_navigation().await;

            let mut clicked = false;
            for selector in DOWNLOAD_BUTTON_SELECTORS {
                if let Ok(element) = page.find_element(*selector).await {
                    debug!("Clicking download affordance {}", selector);
                    if element.click().await.is_ok() {
                        clicked = true;
                        break;
                    }
                }
            }
            if !clicked {
                let _ = page.close().await;
                return Err(AutomationError::NoAffordance(url.to_string()));
            }

            let landed = self.wait_for_file(download_dir, started).await;
            let _ = page.close().await;
            landed
        }
        .await;

        handler_task.abort();
        result
    }
}
