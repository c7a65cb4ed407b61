//! Classify → skip check → resolve → fetch for a single chart record.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use tracing::{debug, info, warn};

use super::fetcher::ByteFetcher;
use super::types::{BatchOptions, DownloadEvent, DownloadResult, DownloadStatus, ProgressSink};
use crate::error::{ErrorKind, FetchError};
use crate::models::{ChartRecord, ProviderCategory};
use crate::providers::{classify, ResolutionOutcome, ResolverRegistry};
use crate::utils::{chart_filename, sanitize_filename};

/// Keys (chart ids, destination paths) held by an item currently in
/// flight. One set per batch.
#[derive(Debug, Default)]
pub(super) struct InFlight(Mutex<HashSet<String>>);

impl InFlight {
    fn claim(&self, id: &str) -> bool {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string())
    }

    fn release(&self, id: &str) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }
}

/// Everything an item needs, borrowed from the batch.
pub(super) struct ItemContext<'a> {
    pub fetcher: &'a ByteFetcher,
    pub registry: &'a ResolverRegistry,
    pub progress: &'a dyn ProgressSink,
    pub options: &'a BatchOptions,
    pub active: &'a InFlight,
    pub destinations: &'a InFlight,
}

impl ItemContext<'_> {
    /// Run the pipeline for the record at `index`. Never fails; every
    /// problem ends up in the returned result.
    pub async fn process(&self, index: usize, record: &ChartRecord) -> DownloadResult {
        if !self.active.claim(&record.id) {
            warn!("Chart {} is already downloading in this batch", record.id);
            let result = DownloadResult::failed(
                record,
                ErrorKind::DuplicateRequest,
                "chart already in flight",
            );
            self.emit_outcome(index, &result);
            return result;
        }

        let result = self.run(index, record).await;
        self.active.release(&record.id);
        self.emit_outcome(index, &result);
        result
    }

    async fn run(&self, index: usize, record: &ChartRecord) -> DownloadResult {
        let Some(link) = record.download_link() else {
            debug!("Chart {} has no download link", record.id);
            return DownloadResult::failed(record, ErrorKind::MissingSource, "no download link");
        };

        let deadline = Instant::now() + self.options.item_timeout;

        // Folder and unknown links resolve without I/O, and have no
        // destination of their own until they do.
        let category = classify(link);
        let mut resolved = None;
        if matches!(category, ProviderCategory::CloudFolder | ProviderCategory::Unknown) {
            match self.resolve(link, deadline).await {
                Ok(url) => resolved = Some(url),
                Err(unresolved) => return unresolved.into_result(record),
            }
        }

        let dir = self.destination_dir(record);
        let path = dir.join(chart_filename(&record.title, &record.artist));
        let key = path.to_string_lossy().into_owned();
        if !self.destinations.claim(&key) {
            warn!(
                "Chart {} targets {}, which another chart in flight is writing",
                record.id,
                path.display()
            );
            return DownloadResult::failed(
                record,
                ErrorKind::DuplicateRequest,
                &format!("destination {} already in use", path.display()),
            );
        }

        let target = Target {
            link,
            category,
            resolved,
            deadline,
            dir: &dir,
            path: &path,
        };
        let result = self.acquire(index, record, target).await;
        self.destinations.release(&key);
        result
    }

    async fn acquire(
        &self,
        index: usize,
        record: &ChartRecord,
        target: Target<'_>,
    ) -> DownloadResult {
        let Target {
            link,
            category,
            resolved,
            deadline,
            dir,
            path,
        } = target;

        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            return DownloadResult::failed(
                record,
                ErrorKind::FilesystemError,
                &format!("{}: {}", dir.display(), e),
            );
        }

        if !self.options.overwrite && tokio::fs::try_exists(path).await.unwrap_or(false) {
            debug!("Skipping {}, {} exists", record.id, path.display());
            return DownloadResult::skipped(record, path.to_path_buf());
        }

        let url = match resolved {
            Some(url) => url,
            None => match self.resolve(link, deadline).await {
                Ok(url) => url,
                Err(unresolved) => return unresolved.into_result(record),
            },
        };
        debug!("Chart {} {} link resolved to {}", record.id, category, url);

        self.progress.emit(DownloadEvent::Started {
            index,
            chart_id: record.id.clone(),
            url: url.clone(),
            filename: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        });

        let start = Instant::now();
        let report = |downloaded: u64, total: Option<u64>| {
            self.progress.emit(DownloadEvent::Progress {
                index,
                downloaded,
                total,
            })
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        let fetched = if remaining.is_zero() {
            Err(FetchError::Timeout(self.options.item_timeout))
        } else {
            self.fetcher.fetch(&url, path, remaining, &report).await
        };
        match fetched {
            Ok(size) => {
                DownloadResult::downloaded(record, path.to_path_buf(), size, start.elapsed())
            }
            Err(FetchError::Timeout(_)) => DownloadResult::failed(
                record,
                ErrorKind::Timeout,
                &format!("no complete download within {:?}", self.options.item_timeout),
            ),
            Err(e) => DownloadResult::failed(record, e.kind(), &fetch_detail(&e)),
        }
    }

    /// Resolve `link` before `deadline`.
    async fn resolve(&self, link: &str, deadline: Instant) -> Result<String, Unresolved> {
        let resolved = tokio::time::timeout_at(deadline.into(), self.registry.resolve(link)).await;
        let Ok((category, outcome)) = resolved else {
            warn!("Resolving {} ran past the item deadline", link);
            return Err(Unresolved::Failed(
                ErrorKind::Timeout,
                format!("link not resolved within {:?}", self.options.item_timeout),
            ));
        };
        debug!("Link {} classified as {}", link, category);

        match outcome {
            ResolutionOutcome::Resolved(url) => Ok(url),
            ResolutionOutcome::ManualActionRequired {
                reason,
                original_url,
            } => Err(Unresolved::Manual {
                reason,
                original_url,
            }),
            ResolutionOutcome::ResolutionFailed { kind, detail } => {
                Err(Unresolved::Failed(kind, detail))
            }
        }
    }

    fn destination_dir(&self, record: &ChartRecord) -> PathBuf {
        let base = self.options.dest_dir.clone();
        if !self.options.organize_by_source {
            return base;
        }
        match record.source_name() {
            Some(source) => base.join(sanitize_filename(&source)),
            None => base,
        }
    }

    fn emit_outcome(&self, index: usize, result: &DownloadResult) {
        let chart_id = result.chart.id.clone();
        let event = match &result.status {
            DownloadStatus::Downloaded => DownloadEvent::Completed {
                index,
                chart_id,
                size: result.size.unwrap_or(0),
                elapsed: result.elapsed.unwrap_or_default(),
            },
            DownloadStatus::SkippedExisting => DownloadEvent::Skipped { index, chart_id },
            DownloadStatus::ManualActionRequired { folder_url } => DownloadEvent::ManualAction {
                index,
                chart_id,
                folder_url: folder_url.clone(),
            },
            DownloadStatus::Failed { .. } => DownloadEvent::Failed {
                index,
                chart_id,
                error: result.error.clone().unwrap_or_default(),
            },
        };
        self.progress.emit(event);
    }
}

/// Where one item's bytes come from and go to.
struct Target<'a> {
    link: &'a str,
    category: ProviderCategory,
    resolved: Option<String>,
    deadline: Instant,
    dir: &'a Path,
    path: &'a Path,
}

/// A link that did not resolve to a fetchable URL.
enum Unresolved {
    Manual { reason: String, original_url: String },
    Failed(ErrorKind, String),
}

impl Unresolved {
    fn into_result(self, record: &ChartRecord) -> DownloadResult {
        match self {
            Self::Manual {
                reason,
                original_url,
            } => {
                info!("{}: {} ({})", record.display_name(), reason, original_url);
                DownloadResult::manual(record, &original_url)
            }
            Self::Failed(kind, detail) => DownloadResult::failed(record, kind, &detail),
        }
    }
}

/// Detail text that adds to the kind's own message.
fn fetch_detail(e: &FetchError) -> String {
    match e {
        FetchError::HttpStatus(_) => String::new(),
        FetchError::Timeout(after) => format!("no complete response within {:?}", after),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_ids_reject_duplicates() {
        let active = InFlight::default();
        assert!(active.claim("c1"));
        assert!(!active.claim("c1"));
        assert!(active.claim("c2"));
        active.release("c1");
        assert!(active.claim("c1"));
    }

    #[test]
    fn test_fetch_detail() {
        assert_eq!(fetch_detail(&FetchError::HttpStatus(500)), "");
        assert_eq!(
            fetch_detail(&FetchError::TooManyRedirects(10)),
            "Too many redirects (limit 10)"
        );
    }
}
