//! Batch outcome aggregation.

use std::fmt;
use std::time::Duration;

use super::types::{DownloadResult, DownloadStatus};

/// Charts that share one folder link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualGroup {
    pub folder_url: String,
    /// Display names, in batch order.
    pub charts: Vec<String>,
}

impl ManualGroup {
    pub fn message(&self) -> String {
        format!(
            "{} chart(s) found in folder {}",
            self.charts.len(),
            self.folder_url
        )
    }
}

/// One failed item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    pub chart: String,
    pub error: String,
}

/// Counts and groupings for a finished batch.
///
/// Downloaded, skipped, manual and failed are disjoint buckets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub skipped: usize,
    pub manual: usize,
    pub failed: usize,
    pub total_bytes: u64,
    /// Summed fetch time of downloaded items.
    pub download_time: Duration,
    pub manual_groups: Vec<ManualGroup>,
    pub failures: Vec<FailedItem>,
}

impl BatchSummary {
    pub fn from_results(results: &[DownloadResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };

        for result in results {
            match &result.status {
                DownloadStatus::Downloaded => {
                    summary.successful += 1;
                    summary.total_bytes += result.size.unwrap_or(0);
                    summary.download_time += result.elapsed.unwrap_or_default();
                }
                DownloadStatus::SkippedExisting => summary.skipped += 1,
                DownloadStatus::ManualActionRequired { folder_url } => {
                    summary.manual += 1;
                    let key = folder_key(folder_url);
                    let name = result.chart.display_name();
                    match summary
                        .manual_groups
                        .iter_mut()
                        .find(|g| g.folder_url == key)
                    {
                        Some(group) => group.charts.push(name),
                        None => summary.manual_groups.push(ManualGroup {
                            folder_url: key,
                            charts: vec![name],
                        }),
                    }
                }
                DownloadStatus::Failed { .. } => {
                    summary.failed += 1;
                    summary.failures.push(FailedItem {
                        chart: result.chart.display_name(),
                        error: result.error.clone().unwrap_or_default(),
                    });
                }
            }
        }

        summary
    }

    /// Bytes per second across downloaded items.
    pub fn average_speed(&self) -> f64 {
        let secs = self.download_time.as_secs_f64();
        if secs > 0.0 {
            self.total_bytes as f64 / secs
        } else {
            0.0
        }
    }

    /// "N chart(s) found in folder X" lines.
    pub fn manual_messages(&self) -> Vec<String> {
        self.manual_groups.iter().map(ManualGroup::message).collect()
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} downloaded, {} skipped, {} manual, {} failed of {}",
            self.successful, self.skipped, self.manual, self.failed, self.total
        )
    }
}

/// Folder URL without query, fragment or trailing slash.
fn folder_key(url: &str) -> String {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end].trim_end_matches('/').to_string()
}
