//! Download a batch of chart records.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use console::style;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::cli::progress::{BatchProgress, LiveTally};
use crate::config::Settings;
use crate::models::ChartRecord;
use crate::services::download::{
    BatchSummary, DownloadEvent, DownloadResult, DownloadService, DownloadStatus,
};
use crate::utils::{format_size, format_speed};

/// Download every record in `records_path`.
pub async fn cmd_download(
    settings: &Settings,
    records_path: &Path,
    show_progress: bool,
    report_path: Option<&Path>,
) -> anyhow::Result<()> {
    let records = load_records(records_path).await?;
    if records.is_empty() {
        println!("{} No charts in {}", style("!").yellow(), records_path.display());
        return Ok(());
    }

    println!(
        "{} Downloading {} charts to {} ({} at a time)",
        style("→").cyan(),
        records.len(),
        settings.dest_dir.display(),
        settings.max_concurrency
    );

    let client = settings.http_client()?;
    let registry = settings.resolver_registry(&client);
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<DownloadEvent>();
    let service = DownloadService::with_registry(client, registry).with_progress(Arc::new(event_tx));

    // Set up progress display (UI concern)
    let progress_display = if show_progress {
        Some(Arc::new(BatchProgress::new(
            settings.max_concurrency,
            records.len() as u64,
        )))
    } else {
        None
    };

    // Spawn event handler task (UI layer)
    let progress_clone = progress_display.clone();
    let event_handler = tokio::spawn(async move {
        let mut tally = LiveTally::default();

        while let Some(event) = event_rx.recv().await {
            let Some(ref progress) = progress_clone else {
                if let DownloadEvent::Failed { chart_id, error, .. } = event {
                    eprintln!("{} {}: {}", style("✗").red(), chart_id, error);
                }
                continue;
            };

            tally.record(&event);
            match event {
                DownloadEvent::Started {
                    index, filename, ..
                } => progress.start(index, &filename),
                DownloadEvent::Progress {
                    index,
                    downloaded,
                    total,
                } => progress.update(index, downloaded, total),
                DownloadEvent::Completed { index, .. }
                | DownloadEvent::Skipped { index, .. }
                | DownloadEvent::ManualAction { index, .. } => progress.finish_item(index),
                DownloadEvent::Failed {
                    index,
                    chart_id,
                    error,
                } => {
                    progress.println(&format!("{} {}: {}", style("✗").red(), chart_id, error));
                    progress.finish_item(index);
                }
            }
            progress.set_summary(&tally);
        }
    });

    let started_at = Utc::now();
    let results = service
        .run_batch(&records, &settings.batch_options())
        .await?;

    // Dropping the service closes the event channel
    drop(service);
    if let Err(e) = event_handler.await {
        tracing::warn!("Event handler task failed: {}", e);
    }
    if let Some(ref progress) = progress_display {
        progress.finish();
    }

    let summary = BatchSummary::from_results(&results);
    print_summary(&summary);

    if let Some(path) = report_path {
        write_report(path, started_at, &summary, &results).await?;
        println!("  {} Report written to {}", style("→").dim(), path.display());
    }

    Ok(())
}

async fn load_records(path: &Path) -> anyhow::Result<Vec<ChartRecord>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse chart records in {}", path.display()))
}

fn print_summary(summary: &BatchSummary) {
    println!(
        "{} Downloaded {} charts ({}, avg {})",
        style("✓").green(),
        summary.successful,
        format_size(summary.total_bytes),
        format_speed(summary.average_speed())
    );

    if summary.skipped > 0 {
        println!(
            "  {} {} already present",
            style("→").dim(),
            summary.skipped
        );
    }

    if summary.manual > 0 {
        println!(
            "  {} {} need manual download:",
            style("!").yellow(),
            summary.manual
        );
        for message in summary.manual_messages() {
            println!("    {}", message);
        }
    }

    if summary.failed > 0 {
        println!("  {} {} failed:", style("✗").red(), summary.failed);
        for failure in &summary.failures {
            println!("    {}: {}", failure.chart, failure.error);
        }
    }
}

/// JSON report of a finished batch.
#[derive(Debug, Serialize)]
struct BatchReport<'a> {
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    successful: usize,
    skipped: usize,
    manual: usize,
    failed: usize,
    total_bytes: u64,
    items: Vec<ReportItem<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportItem<'a> {
    id: &'a str,
    title: &'a str,
    artist: &'a str,
    status: &'static str,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_path: Option<&'a PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
}

impl<'a> ReportItem<'a> {
    fn from_result(result: &'a DownloadResult) -> Self {
        let status = match result.status {
            DownloadStatus::Downloaded => "downloaded",
            DownloadStatus::SkippedExisting => "skipped_existing",
            DownloadStatus::ManualActionRequired { .. } => "manual_action_required",
            DownloadStatus::Failed { .. } => "failed",
        };
        Self {
            id: &result.chart.id,
            title: &result.chart.title,
            artist: &result.chart.artist,
            status,
            success: result.success,
            file_path: result.file_path.as_ref(),
            error: result.error.as_deref(),
            size: result.size,
        }
    }
}

async fn write_report(
    path: &Path,
    started_at: DateTime<Utc>,
    summary: &BatchSummary,
    results: &[DownloadResult],
) -> anyhow::Result<()> {
    let report = BatchReport {
        started_at,
        finished_at: Utc::now(),
        successful: summary.successful,
        skipped: summary.skipped,
        manual: summary.manual,
        failed: summary.failed,
        total_bytes: summary.total_bytes,
        items: results.iter().map(ReportItem::from_result).collect(),
    };
    let json = serde_json::to_string_pretty(&report)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    Ok(())
}
