//! Interactive download automation.
//!
//! Some share pages only hand out a file after a script-driven click. This
//! module defines the capability the share-link chain uses as its last
//! resort. The Chrome implementation is compiled with the `browser` feature
//! and driven over the DevTools protocol; without it, no automation exists
//! and the chain simply ends one strategy earlier.

#[cfg(feature = "browser")]
mod chrome;

#[cfg(feature = "browser")]
pub use chrome::{ChromeAutomation, ChromeAutomationConfig};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Selectors tried, in order, when looking for something to click.
pub const DOWNLOAD_BUTTON_SELECTORS: &[&str] = &[
    r#"[data-automationid="downloadButton"]"#,
    r#"button[aria-label*="Download"]"#,
    "a[download]",
    r#"[title*="Download"]"#,
];

/// Errors from an automation run.
#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Automation unavailable: {0}")]
    Unavailable(String),
    #[error("No download affordance found on {0}")]
    NoAffordance(String),
    #[error("No file appeared within {0:?}")]
    Timeout(Duration),
    #[error("Browser error: {0}")]
    Browser(String),
    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reach a download affordance on a page, activate it, and report where the file landed.
#[async_trait]
pub trait DownloadAutomation: Send + Sync {
    fn name(&self) -> &str;

    /// Save the file behind `url` into `download_dir`, returning its path.
    async fn acquire(&self, url: &str, download_dir: &Path) -> Result<PathBuf, AutomationError>;
}

/// Automation connected to the DevTools endpoint at `url`.
#[cfg(feature = "browser")]
pub fn automation_for_url(url: &str) -> Option<Arc<dyn DownloadAutomation>> {
    tracing::debug!("Browser automation enabled via {}", url);
    Some(Arc::new(ChromeAutomation::new(ChromeAutomationConfig {
        remote_url: url.to_string(),
        ..ChromeAutomationConfig::default()
    })))
}

#[cfg(not(feature = "browser"))]
pub fn automation_for_url(url: &str) -> Option<Arc<dyn DownloadAutomation>> {
    tracing::warn!(
        "Browser URL {} configured but browser support not compiled. Rebuild with: cargo build --features browser",
        url
    );
    None
}

/// Whether `path` looks like a finished download rather than a browser temp file.
pub fn is_finished_download(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    !(name.starts_with('.') || name.ends_with(".crdownload") || name.ends_with(".part"))
}
