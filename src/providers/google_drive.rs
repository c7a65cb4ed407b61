//! Google Drive file and folder links.
//!
//! Large files are gated behind a "can't scan for viruses" interstitial. The
//! file resolver first tries the canonical download endpoint; only when Drive
//! answers with that page (or redirects toward a `confirm` URL) does it scrape
//! the confirmation token and try exactly once more.
//!
//! Folder links are never resolved: a folder holds an unknown number of files
//! with no reliable mapping to one chart.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

use super::{ResolutionOutcome, Resolver};
use crate::error::ErrorKind;
use crate::http_client::{HttpClient, MAX_REDIRECTS};
use crate::models::ProviderCategory;

/// Public Drive host.
pub const DEFAULT_DRIVE_BASE: &str = "https://drive.google.com";

/// Reason attached to every folder outcome.
pub const FOLDER_MANUAL_REASON: &str = "folder links require manual selection";

/// Ordered id patterns: path segment, then `?id=`, then `&id=`.
static FILE_ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"/d/([a-zA-Z0-9_-]+)", r"\?id=([a-zA-Z0-9_-]+)", r"&id=([a-zA-Z0-9_-]+)"]
        .iter()
        .map(|p| Regex::new(p).expect("valid file id regex"))
        .collect()
});

static CONFIRM_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"confirm=([0-9A-Za-z_-]+)").expect("valid confirm regex"));

/// Extract file ID from a Google Drive file URL.
///
/// Handles formats:
/// - https://drive.google.com/file/d/FILE_ID/view
/// - https://drive.google.com/uc?id=FILE_ID
/// - https://drive.google.com/uc?export=download&id=FILE_ID
/// - https://drive.google.com/open?id=FILE_ID
pub fn extract_file_id(url: &str) -> Option<String> {
    FILE_ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(url))
        .map(|c| c[1].to_string())
}

/// Canonical download endpoint for a file id.
pub fn file_download_url(base: &str, file_id: &str) -> String {
    format!(
        "{}/uc?export=download&id={}",
        base.trim_end_matches('/'),
        file_id
    )
}

/// Build the token-bearing URL from an interstitial page.
///
/// Prefers the page's download form (action plus every named input, which
/// carries `confirm` and `uuid` on current Drive pages). Falls back to a bare
/// `confirm=` token anywhere in the markup, rebuilt against `base`.
pub fn confirmation_url(html: &str, page_url: &str, base: &str, file_id: &str) -> Option<String> {
    if let Some(url) = confirmation_url_from_form(html, page_url, base, file_id) {
        return Some(url);
    }

    let token = CONFIRM_TOKEN.captures(html)?.get(1)?.as_str().to_string();
    Some(format!(
        "{}/uc?export=download&confirm={}&id={}",
        base.trim_end_matches('/'),
        token,
        file_id
    ))
}

fn confirmation_url_from_form(
    html: &str,
    page_url: &str,
    base: &str,
    file_id: &str,
) -> Option<String> {
    let document = Html::parse_document(html);
    let form_selector = Selector::parse("form").ok()?;
    let input_selector = Selector::parse("input[name]").ok()?;

    for form in document.select(&form_selector) {
        let params: Vec<(String, String)> = form
            .select(&input_selector)
            .filter_map(|input| {
                let el = input.value();
                let name = el.attr("name")?;
                Some((name.to_string(), el.attr("value").unwrap_or("").to_string()))
            })
            .collect();

        if !params.iter().any(|(name, value)| name == "confirm" && !value.is_empty()) {
            continue;
        }

        let default_action = format!("{}/uc", base.trim_end_matches('/'));
        let action = form
            .value()
            .attr("action")
            .filter(|a| !a.trim().is_empty())
            .unwrap_or(&default_action);

        let mut target = match url::Url::parse(page_url).and_then(|p| p.join(action)) {
            Ok(u) => u,
            Err(_) => url::Url::parse(action).ok()?,
        };

        {
            let mut query = target.query_pairs_mut();
            for (name, value) in &params {
                query.append_pair(name, value);
            }
            if !params.iter().any(|(name, _)| name == "id") {
                query.append_pair("id", file_id);
            }
        }

        return Some(target.to_string());
    }

    None
}

/// What the download endpoint said on one attempt.
enum Probe {
    Binary,
    /// Interstitial reached; `html` is set when the page body was already read.
    NeedsConfirmation {
        page_url: String,
        html: Option<String>,
    },
    Failed(ErrorKind, String),
}

/// Resolver for single Drive files.
#[derive(Clone)]
pub struct DriveFileResolver {
    client: HttpClient,
    base_url: String,
}

impl DriveFileResolver {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            base_url: DEFAULT_DRIVE_BASE.to_string(),
        }
    }

    /// Point the canonical endpoint at another host (mirrors, tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Request `url` without auto-redirects, walking plain redirects by hand
    /// and stopping at anything that points toward a confirmation.
    async fn probe(&self, url: &str) -> Probe {
        let mut current = url.to_string();

        for hop in 0..=MAX_REDIRECTS {
            let response = match self.client.get_manual(&current).await {
                Ok(r) => r,
                Err(e) => return Probe::Failed(ErrorKind::Network, e.to_string()),
            };

            if response.is_redirect() {
                let Some(location) = response.location() else {
                    return Probe::Failed(
                        ErrorKind::HttpError(response.status.as_u16()),
                        format!("redirect without Location from {}", current),
                    );
                };
                if location.contains("confirm") {
                    debug!("Drive redirected toward confirmation: {}", location);
                    return Probe::NeedsConfirmation {
                        page_url: location,
                        html: None,
                    };
                }
                debug!("Drive redirect hop {}: {}", hop + 1, location);
                current = location;
                continue;
            }

            if response.is_binary() {
                return Probe::Binary;
            }

            if !response.is_success() {
                return Probe::Failed(
                    ErrorKind::HttpError(response.status.as_u16()),
                    format!("HTTP {} from {}", response.status, current),
                );
            }

            let page_url = response.final_url.clone();
            return match response.text().await {
                Ok(html) => Probe::NeedsConfirmation {
                    page_url,
                    html: Some(html),
                },
                Err(e) => Probe::Failed(ErrorKind::Network, e.to_string()),
            };
        }

        Probe::Failed(
            ErrorKind::Network,
            format!("more than {} redirects from {}", MAX_REDIRECTS, url),
        )
    }

    /// Read the interstitial, or discover that the confirm URL already serves the file.
    async fn load_confirmation_page(&self, page_url: &str) -> Result<Option<String>, String> {
        let response = self
            .client
            .get(page_url)
            .await
            .map_err(|e| e.to_string())?;

        if response.is_binary() {
            return Ok(None);
        }
        if !response.is_success() {
            return Err(format!("HTTP {} from confirmation page", response.status));
        }
        response.text().await.map(Some).map_err(|e| e.to_string())
    }
}

#[async_trait]
impl Resolver for DriveFileResolver {
    fn name(&self) -> &'static str {
        "google-drive-file"
    }

    fn category(&self) -> ProviderCategory {
        ProviderCategory::CloudFile
    }

    async fn resolve(&self, url: &str) -> ResolutionOutcome {
        let Some(file_id) = extract_file_id(url) else {
            return ResolutionOutcome::failed(
                ErrorKind::InvalidUrl,
                format!("no Drive file id in {}", url),
            );
        };

        let direct_url = file_download_url(&self.base_url, &file_id);
        debug!("Trying direct Drive download for {}", file_id);

        let (page_url, html) = match self.probe(&direct_url).await {
            Probe::Binary => {
                info!("Drive file {} downloadable without confirmation", file_id);
                return ResolutionOutcome::Resolved(direct_url);
            }
            Probe::Failed(kind, detail) => return ResolutionOutcome::failed(kind, detail),
            Probe::NeedsConfirmation { page_url, html } => (page_url, html),
        };

        let html = match html {
            Some(html) => html,
            None => match self.load_confirmation_page(&page_url).await {
                // The confirm redirect itself served the archive.
                Ok(None) => return ResolutionOutcome::Resolved(page_url),
                Ok(Some(html)) => html,
                Err(e) => {
                    warn!("Drive confirmation page failed for {}: {}", file_id, e);
                    return ResolutionOutcome::failed(ErrorKind::ConfirmationFlowFailed, e);
                }
            },
        };

        let Some(token_url) = confirmation_url(&html, &page_url, &self.base_url, &file_id) else {
            warn!("No confirmation token on Drive interstitial for {}", file_id);
            return ResolutionOutcome::failed(
                ErrorKind::ConfirmationFlowFailed,
                format!("no confirmation token found for {}", file_id),
            );
        };

        debug!("Retrying Drive download with confirmation token: {}", token_url);
        match self.probe(&token_url).await {
            Probe::Binary => {
                info!("Drive file {} resolved via confirmation flow", file_id);
                ResolutionOutcome::Resolved(token_url)
            }
            Probe::NeedsConfirmation { .. } => ResolutionOutcome::failed(
                ErrorKind::ConfirmationFlowFailed,
                format!("Drive still asks for confirmation on {}", token_url),
            ),
            Probe::Failed(kind @ ErrorKind::HttpError(_), detail) => {
                ResolutionOutcome::failed(kind, detail)
            }
            Probe::Failed(_, detail) => {
                ResolutionOutcome::failed(ErrorKind::ConfirmationFlowFailed, detail)
            }
        }
    }
}

/// Folder links always require a human.
#[derive(Debug, Default, Clone)]
pub struct DriveFolderResolver;

#[async_trait]
impl Resolver for DriveFolderResolver {
    fn name(&self) -> &'static str {
        "google-drive-folder"
    }

    fn category(&self) -> ProviderCategory {
        ProviderCategory::CloudFolder
    }

    async fn resolve(&self, url: &str) -> ResolutionOutcome {
        ResolutionOutcome::ManualActionRequired {
            reason: FOLDER_MANUAL_REASON.to_string(),
            original_url: url.trim().to_string(),
        }
    }
}
