//! Chart archive download service.
//!
//! Runs the item pipeline over a batch of chart records in groups of
//! `max_concurrency`, pausing between groups. Separated from UI concerns:
//! progress is reported through a [`ProgressSink`].

mod fetcher;
mod pipeline;
mod summary;
mod types;

use std::sync::Arc;

use futures::future::join_all;
use tracing::info;

use crate::error::BatchError;
use crate::http_client::HttpClient;
use crate::models::ChartRecord;
use crate::providers::ResolverRegistry;

pub use fetcher::ByteFetcher;
pub use summary::{BatchSummary, FailedItem, ManualGroup};
pub use types::{
    BatchOptions, DownloadEvent, DownloadResult, DownloadStatus, NoProgress, ProgressSink,
    DEFAULT_GROUP_DELAY, DEFAULT_ITEM_TIMEOUT, DEFAULT_MAX_CONCURRENCY,
};

use pipeline::{InFlight, ItemContext};

/// Service for downloading chart archives.
pub struct DownloadService {
    fetcher: ByteFetcher,
    registry: ResolverRegistry,
    progress: Arc<dyn ProgressSink>,
}

impl DownloadService {
    /// Service with the built-in resolvers.
    pub fn new(client: HttpClient) -> Self {
        let registry = ResolverRegistry::with_defaults(client.clone());
        Self::with_registry(client, registry)
    }

    /// Service with a caller-assembled resolver registry.
    pub fn with_registry(client: HttpClient, registry: ResolverRegistry) -> Self {
        Self {
            fetcher: ByteFetcher::new(client),
            registry,
            progress: Arc::new(NoProgress),
        }
    }

    /// Send events to `sink`.
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    pub fn registry(&self) -> &ResolverRegistry {
        &self.registry
    }

    /// Download every record, returning one result per record in input order.
    ///
    /// Only malformed options or an uncreatable destination fail the batch;
    /// item failures are reported in their results.
    pub async fn run_batch(
        &self,
        records: &[ChartRecord],
        options: &BatchOptions,
    ) -> Result<Vec<DownloadResult>, BatchError> {
        options.validate()?;

        tokio::fs::create_dir_all(&options.dest_dir)
            .await
            .map_err(|source| BatchError::DestinationDir {
                path: options.dest_dir.display().to_string(),
                source,
            })?;

        info!(
            "Downloading {} charts to {} ({} at a time)",
            records.len(),
            options.dest_dir.display(),
            options.max_concurrency
        );

        let active = InFlight::default();
        let destinations = InFlight::default();
        let ctx = ItemContext {
            fetcher: &self.fetcher,
            registry: &self.registry,
            progress: self.progress.as_ref(),
            options,
            active: &active,
            destinations: &destinations,
        };

        let mut results = Vec::with_capacity(records.len());
        for (group, chunk) in records.chunks(options.max_concurrency).enumerate() {
            if group > 0 && !options.group_delay.is_zero() {
                tokio::time::sleep(options.group_delay).await;
            }

            let offset = group * options.max_concurrency;
            let items = chunk
                .iter()
                .enumerate()
                .map(|(i, record)| ctx.process(offset + i, record));
            results.extend(join_all(items).await);
        }

        info!("Batch finished: {}", BatchSummary::from_results(&results));
        Ok(results)
    }
}
