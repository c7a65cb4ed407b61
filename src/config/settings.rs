//! Application settings.

use std::path::PathBuf;
use std::time::Duration;

use crate::browser::automation_for_url;
use crate::http_client::HttpClient;
use crate::providers::google_drive::DEFAULT_DRIVE_BASE;
use crate::providers::onedrive::DEFAULT_API_BASE;
use crate::providers::{
    DirectResolver, DriveFileResolver, DriveFolderResolver, ResolverRegistry, ShareLinkResolver,
};
use crate::services::download::{BatchOptions, DEFAULT_MAX_CONCURRENCY};

/// Default archive subdirectory name.
const CHARTS_SUBDIR: &str = "charts";

/// Application settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Directory archives are written to.
    pub dest_dir: PathBuf,
    pub max_concurrency: usize,
    /// Hard per-item deadline in seconds.
    pub item_timeout_secs: u64,
    /// Connect/read timeout in seconds.
    pub request_timeout_secs: u64,
    /// Pause between concurrency groups in milliseconds.
    pub group_delay_ms: u64,
    pub overwrite: bool,
    pub organize_by_source: bool,
    /// `None` uses the built-in user agent.
    pub user_agent: Option<String>,
    /// Remote DevTools endpoint, enables interactive share-link automation.
    pub browser_url: Option<String>,
    pub drive_base_url: String,
    pub onedrive_api_base: String,
}

impl Default for Settings {
    fn default() -> Self {
        // Default to ~/Documents/chartfetch/charts
        // Falls back gracefully: Documents dir -> Home dir -> Current dir
        let dest_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chartfetch")
            .join(CHARTS_SUBDIR);

        Self {
            dest_dir,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            item_timeout_secs: 300,
            request_timeout_secs: 30,
            group_delay_ms: 1000,
            overwrite: false,
            organize_by_source: false,
            user_agent: None,
            browser_url: None,
            drive_base_url: DEFAULT_DRIVE_BASE.to_string(),
            onedrive_api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

impl Settings {
    /// Apply `CHARTFETCH_DEST_DIR` and `BROWSER_URL` from the environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup("CHARTFETCH_DEST_DIR").filter(|s| !s.trim().is_empty()) {
            self.dest_dir = PathBuf::from(shellexpand::tilde(&dir).as_ref());
        }
        if let Some(url) = lookup("BROWSER_URL").filter(|s| !s.trim().is_empty()) {
            self.browser_url = Some(url);
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Batch options for these settings.
    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            dest_dir: self.dest_dir.clone(),
            max_concurrency: self.max_concurrency,
            item_timeout: Duration::from_secs(self.item_timeout_secs),
            overwrite: self.overwrite,
            organize_by_source: self.organize_by_source,
            group_delay: Duration::from_millis(self.group_delay_ms),
        }
    }

    /// HTTP client for these settings.
    pub fn http_client(&self) -> Result<HttpClient, reqwest::Error> {
        let mut builder = HttpClient::builder(self.request_timeout());
        if let Some(ref ua) = self.user_agent {
            builder = builder.user_agent(ua);
        }
        builder.build()
    }

    /// Resolvers pointed at the configured hosts, with browser automation
    /// when a browser URL is set and support is compiled in.
    pub fn resolver_registry(&self, client: &HttpClient) -> ResolverRegistry {
        let mut share = ShareLinkResolver::new(client.clone()).with_api_base(&self.onedrive_api_base);
        if let Some(automation) = self.browser_url.as_deref().and_then(automation_for_url) {
            share = share.with_automation(automation);
        }

        ResolverRegistry::new()
            .register(DirectResolver)
            .register(DriveFileResolver::new(client.clone()).with_base_url(&self.drive_base_url))
            .register(DriveFolderResolver)
            .register(share)
    }
}
