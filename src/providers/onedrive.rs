//! OneDrive share links (`1drv.ms`, `onedrive.live.com`).
//!
//! Share links are opaque redirectors. They are tried through an ordered
//! chain of strategies, each attempted once:
//! 1. `direct-with-flag`: append `download=1` and walk the redirect chain by hand
//! 2. `api-encoding`: encode the link into a shares-API token and request its content
//! 3. `html-parse`: scrape the share page for a download affordance
//! 4. `interactive-automation`: hand the page to a browser collaborator, if one is configured

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{ResolutionOutcome, Resolver};
use crate::browser::{AutomationError, DownloadAutomation};
use crate::error::ErrorKind;
use crate::http_client::{HttpClient, MAX_REDIRECTS};
use crate::models::ProviderCategory;

/// Public shares API host.
pub const DEFAULT_API_BASE: &str = "https://api.onedrive.com";

const TOKEN_PREFIX: &str = "u!";

/// Selectors for elements that trigger a download on share pages.
const DOWNLOAD_AFFORDANCES: &[&str] = &[
    r#"[data-automationid="downloadButton"]"#,
    "a[download]",
    r#"[aria-label*="Download"]"#,
    r#"[title*="Download"]"#,
];

/// Attributes that carry the affordance's target, in preference order.
const TARGET_ATTRIBUTES: &[&str] = &["href", "data-href", "formaction", "data-url"];

static AUTOMATION_RUN: AtomicU64 = AtomicU64::new(0);

/// Encode a share URL into a shares-API token.
///
/// `"u!"` + base64 of the URL, padding stripped, `/` as `_` and `+` as `-`.
pub fn encode_share_url(url: &str) -> String {
    let encoded = STANDARD.encode(url.as_bytes());
    format!(
        "{}{}",
        TOKEN_PREFIX,
        encoded
            .trim_end_matches('=')
            .replace('/', "_")
            .replace('+', "-")
    )
}

/// Reverse [`encode_share_url`]. Returns `None` for anything it did not produce.
pub fn decode_share_token(token: &str) -> Option<String> {
    let body = token.strip_prefix(TOKEN_PREFIX)?;
    let mut standard = body.replace('_', "/").replace('-', "+");
    while standard.len() % 4 != 0 {
        standard.push('=');
    }
    let bytes = STANDARD.decode(standard).ok()?;
    String::from_utf8(bytes).ok()
}

/// Content URL for a share link under `api_base`.
pub fn share_api_url(api_base: &str, share_url: &str) -> String {
    format!(
        "{}/v1.0/shares/{}/root/content",
        api_base.trim_end_matches('/'),
        encode_share_url(share_url)
    )
}

/// Append the force-download flag unless it is already present.
pub fn with_download_flag(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) => {
            if !parsed.query_pairs().any(|(k, v)| k == "download" && v == "1") {
                parsed.query_pairs_mut().append_pair("download", "1");
            }
            parsed.to_string()
        }
        Err(_) if url.contains('?') => format!("{}&download=1", url),
        Err(_) => format!("{}?download=1", url),
    }
}

/// Find a download affordance in a share page and resolve its target.
pub fn find_download_target(html: &str, page_url: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let base = url::Url::parse(page_url).ok();

    for selector_str in DOWNLOAD_AFFORDANCES {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        for element in document.select(&selector) {
            let el = element.value();
            let Some(target) = TARGET_ATTRIBUTES
                .iter()
                .filter_map(|attr| el.attr(attr))
                .map(str::trim)
                .find(|t| !t.is_empty() && *t != "#" && !t.starts_with("javascript:"))
            else {
                continue;
            };

            let resolved = match &base {
                Some(base) => base.join(target).map(|u| u.to_string()).ok(),
                None => url::Url::parse(target).map(|u| u.to_string()).ok(),
            };
            if resolved.is_some() {
                return resolved;
            }
        }
    }

    None
}

/// Why a single strategy did not produce a fetchable URL.
#[derive(Error, Debug)]
enum ResolveError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("redirect loop at {0}")]
    RedirectLoop(String),
    #[error("redirect without Location from {0}")]
    MissingLocation(String),
    #[error("more than {0} redirects")]
    TooManyRedirects(usize),
    #[error("HTTP {status} ({content_type}) from {url}")]
    NotBinary {
        status: u16,
        content_type: String,
        url: String,
    },
    #[error("no download affordance on share page")]
    NoAffordance,
    #[error("automation failed: {0}")]
    Automation(#[from] AutomationError),
    #[error("automation returned unusable path {0}")]
    UnusablePath(String),
}

impl ResolveError {
    fn not_binary(response: &crate::http_client::HttpResponse, url: &str) -> Self {
        Self::NotBinary {
            status: response.status.as_u16(),
            content_type: response
                .content_type()
                .unwrap_or("no content type")
                .to_string(),
            url: url.to_string(),
        }
    }
}

/// Strategies in the order they are attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    DirectWithFlag,
    ApiEncoding,
    HtmlParse,
    InteractiveAutomation,
}

impl Strategy {
    fn name(&self) -> &'static str {
        match self {
            Self::DirectWithFlag => "direct-with-flag",
            Self::ApiEncoding => "api-encoding",
            Self::HtmlParse => "html-parse",
            Self::InteractiveAutomation => "interactive-automation",
        }
    }
}

/// Resolver for share links.
#[derive(Clone)]
pub struct ShareLinkResolver {
    client: HttpClient,
    api_base: String,
    automation: Option<Arc<dyn DownloadAutomation>>,
    automation_dir: PathBuf,
}

impl ShareLinkResolver {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            automation: None,
            automation_dir: std::env::temp_dir().join("chartfetch-automation"),
        }
    }

    /// Override the shares API host.
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    /// Enable the final, browser-driven strategy.
    pub fn with_automation(mut self, automation: Arc<dyn DownloadAutomation>) -> Self {
        self.automation = Some(automation);
        self
    }

    /// Directory the automation collaborator saves into (one subdirectory per run).
    pub fn with_automation_dir(mut self, dir: PathBuf) -> Self {
        self.automation_dir = dir;
        self
    }

    fn strategies(&self) -> Vec<Strategy> {
        let mut strategies = vec![
            Strategy::DirectWithFlag,
            Strategy::ApiEncoding,
            Strategy::HtmlParse,
        ];
        if self.automation.is_some() {
            strategies.push(Strategy::InteractiveAutomation);
        }
        strategies
    }

    async fn run(&self, strategy: Strategy, url: &str) -> Result<String, ResolveError> {
        match strategy {
            Strategy::DirectWithFlag => self.direct_with_flag(url).await,
            Strategy::ApiEncoding => self.api_encoding(url).await,
            Strategy::HtmlParse => self.html_parse(url).await,
            Strategy::InteractiveAutomation => self.interactive(url).await,
        }
    }

    async fn direct_with_flag(&self, url: &str) -> Result<String, ResolveError> {
        let mut current = with_download_flag(url);
        let mut visited = HashSet::new();

        for _ in 0..=MAX_REDIRECTS {
            if !visited.insert(current.clone()) {
                return Err(ResolveError::RedirectLoop(current));
            }

            let response = self.client.get_manual(&current).await?;

            if response.is_redirect() {
                let location = response
                    .location()
                    .ok_or_else(|| ResolveError::MissingLocation(current.clone()))?;
                debug!("Share redirect: {} -> {}", current, location);
                current = location;
                continue;
            }

            if response.is_binary() {
                return Ok(current);
            }
            return Err(ResolveError::not_binary(&response, &current));
        }

        Err(ResolveError::TooManyRedirects(MAX_REDIRECTS))
    }

    async fn api_encoding(&self, url: &str) -> Result<String, ResolveError> {
        let api_url = share_api_url(&self.api_base, url);
        let response = self.client.get(&api_url).await?;
        if response.is_binary() {
            Ok(api_url)
        } else {
            Err(ResolveError::not_binary(&response, &api_url))
        }
    }

    async fn html_parse(&self, url: &str) -> Result<String, ResolveError> {
        let response = self.client.get(url).await?;
        if !response.is_success() || !response.is_html() {
            return Err(ResolveError::not_binary(&response, url));
        }
        let page_url = response.final_url.clone();
        let html = response.text().await?;
        find_download_target(&html, &page_url).ok_or(ResolveError::NoAffordance)
    }

    async fn interactive(&self, url: &str) -> Result<String, ResolveError> {
        let Some(automation) = &self.automation else {
            return Err(AutomationError::Unavailable("not configured".to_string()).into());
        };
        let run = AUTOMATION_RUN.fetch_add(1, Ordering::Relaxed);
        let dir = self
            .automation_dir
            .join(format!("{}-{}", std::process::id(), run));

        debug!("Handing {} to {} automation", url, automation.name());
        let path = automation.acquire(url, &dir).await?;
        let path = std::path::absolute(&path).map_err(AutomationError::Io)?;
        url::Url::from_file_path(&path)
            .map(|u| u.to_string())
            .map_err(|_| ResolveError::UnusablePath(path.display().to_string()))
    }
}

#[async_trait]
impl Resolver for ShareLinkResolver {
    fn name(&self) -> &'static str {
        "share-link"
    }

    fn category(&self) -> ProviderCategory {
        ProviderCategory::ShareLink
    }

    async fn resolve(&self, url: &str) -> ResolutionOutcome {
        let url = url.trim();
        let mut attempted = Vec::new();
        let mut last_error = String::new();

        for strategy in self.strategies() {
            attempted.push(strategy.name().to_string());
            match self.run(strategy, url).await {
                Ok(resolved) => {
                    info!("Share link resolved via {}: {}", strategy.name(), url);
                    return ResolutionOutcome::Resolved(resolved);
                }
                Err(e) => {
                    debug!("Share strategy {} failed for {}: {}", strategy.name(), url, e);
                    last_error = e.to_string();
                }
            }
        }

        warn!("All share-link strategies failed for {}", url);
        ResolutionOutcome::failed(
            ErrorKind::AllStrategiesExhausted { attempted },
            last_error,
        )
    }
}
