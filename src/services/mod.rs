//! Service layer for chartfetch business logic.
//!
//! Domain logic separated from UI concerns, usable from the CLI or any
//! other caller.

pub mod download;

pub use download::{
    BatchOptions, BatchSummary, DownloadEvent, DownloadResult, DownloadService, DownloadStatus,
    ProgressSink,
};
