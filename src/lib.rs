//! chartfetch - provider-aware acquisition of chart archives.
//!
//! Takes chart records scraped from community sites, works out which file
//! host each download link points at, resolves it to something fetchable,
//! and downloads the archives under bounded concurrency. Every record ends
//! in exactly one [`DownloadResult`](services::DownloadResult).

pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod http_client;
pub mod models;
pub mod providers;
pub mod services;
pub mod utils;

pub use error::{BatchError, ErrorKind, FetchError};
pub use models::{ChartRecord, ProviderCategory};
pub use providers::{classify, ResolutionOutcome, Resolver, ResolverRegistry};
pub use services::{BatchOptions, BatchSummary, DownloadResult, DownloadService};
