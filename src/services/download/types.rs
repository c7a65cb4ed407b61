//! Download service types and events.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::{BatchError, ErrorKind};
use crate::models::ChartRecord;

/// Events emitted while a batch runs.
///
/// `index` is the record's position in the batch input.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    /// A fetch is about to start.
    Started {
        index: usize,
        chart_id: String,
        url: String,
        filename: String,
    },
    /// Bytes written so far for the item at `index`.
    Progress {
        index: usize,
        downloaded: u64,
        total: Option<u64>,
    },
    /// Archive written to disk.
    Completed {
        index: usize,
        chart_id: String,
        size: u64,
        elapsed: Duration,
    },
    /// Destination already present and overwrite disabled.
    Skipped { index: usize, chart_id: String },
    /// Folder link handed back to the user.
    ManualAction {
        index: usize,
        chart_id: String,
        folder_url: String,
    },
    /// Item failed.
    Failed {
        index: usize,
        chart_id: String,
        error: String,
    },
}

/// Receiver for [`DownloadEvent`]s. Must never block.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: DownloadEvent);
}

impl ProgressSink for mpsc::UnboundedSender<DownloadEvent> {
    fn emit(&self, event: DownloadEvent) {
        let _ = self.send(event);
    }
}

impl ProgressSink for mpsc::Sender<DownloadEvent> {
    fn emit(&self, event: DownloadEvent) {
        // Progress is lossy when the consumer falls behind.
        let _ = self.try_send(event);
    }
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn emit(&self, _event: DownloadEvent) {}
}

/// Terminal status of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
    Downloaded,
    SkippedExisting,
    ManualActionRequired { folder_url: String },
    Failed { kind: ErrorKind },
}

/// Outcome for one chart record.
#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub chart: ChartRecord,
    pub success: bool,
    pub file_path: Option<PathBuf>,
    pub error: Option<String>,
    pub size: Option<u64>,
    pub elapsed: Option<Duration>,
    pub status: DownloadStatus,
}

impl DownloadResult {
    pub fn downloaded(chart: &ChartRecord, path: PathBuf, size: u64, elapsed: Duration) -> Self {
        Self {
            chart: chart.clone(),
            success: true,
            file_path: Some(path),
            error: None,
            size: Some(size),
            elapsed: Some(elapsed),
            status: DownloadStatus::Downloaded,
        }
    }

    pub fn skipped(chart: &ChartRecord, path: PathBuf) -> Self {
        Self {
            chart: chart.clone(),
            success: true,
            file_path: Some(path),
            error: None,
            size: None,
            elapsed: None,
            status: DownloadStatus::SkippedExisting,
        }
    }

    /// Terminal non-error outcome for folder links.
    pub fn manual(chart: &ChartRecord, folder_url: &str) -> Self {
        Self {
            chart: chart.clone(),
            success: true,
            file_path: None,
            error: Some(format!("Folder URL: {}", folder_url)),
            size: None,
            elapsed: None,
            status: DownloadStatus::ManualActionRequired {
                folder_url: folder_url.to_string(),
            },
        }
    }

    pub fn failed(chart: &ChartRecord, kind: ErrorKind, detail: &str) -> Self {
        let error = if detail.is_empty() {
            kind.to_string()
        } else {
            format!("{}: {}", kind, detail)
        };
        Self {
            chart: chart.clone(),
            success: false,
            file_path: None,
            error: Some(error),
            size: None,
            elapsed: None,
            status: DownloadStatus::Failed { kind },
        }
    }

    /// Failure kind, if this item failed.
    pub fn error_kind(&self) -> Option<&ErrorKind> {
        match &self.status {
            DownloadStatus::Failed { kind } => Some(kind),
            _ => None,
        }
    }
}

/// Per-batch options. Not changed while a batch runs.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub dest_dir: PathBuf,
    pub max_concurrency: usize,
    /// Hard deadline for each item's fetch.
    pub item_timeout: Duration,
    pub overwrite: bool,
    /// Place archives under a subdirectory named after the record's source.
    pub organize_by_source: bool,
    /// Pause between concurrency groups.
    pub group_delay: Duration,
}

pub const DEFAULT_MAX_CONCURRENCY: usize = 3;
pub const DEFAULT_ITEM_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_GROUP_DELAY: Duration = Duration::from_secs(1);

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            dest_dir: PathBuf::from("charts"),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            item_timeout: DEFAULT_ITEM_TIMEOUT,
            overwrite: false,
            organize_by_source: false,
            group_delay: DEFAULT_GROUP_DELAY,
        }
    }
}

impl BatchOptions {
    /// Default options writing into `dest_dir`.
    pub fn new(dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            dest_dir: dest_dir.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), BatchError> {
        if self.max_concurrency == 0 {
            return Err(BatchError::InvalidOptions(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.dest_dir.as_os_str().is_empty() {
            return Err(BatchError::InvalidOptions(
                "dest_dir must not be empty".to_string(),
            ));
        }
        if self.item_timeout.is_zero() {
            return Err(BatchError::InvalidOptions(
                "item_timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
