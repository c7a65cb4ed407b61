mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chartfetch::error::{BatchError, ErrorKind};
use chartfetch::models::ChartRecord;
use chartfetch::providers::{DriveFileResolver, ResolverRegistry};
use chartfetch::services::download::{
    BatchOptions, BatchSummary, DownloadEvent, DownloadService, DownloadStatus,
};
use tokio::sync::mpsc;

use common::{archive_bytes, client, serve, zip};

#[derive(Clone, Default)]
struct Counters {
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    requests: Arc<AtomicUsize>,
}

async fn slow_archive(State(c): State<Counters>) -> Response {
    c.requests.fetch_add(1, Ordering::SeqCst);
    let now = c.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    c.max_in_flight.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(150)).await;
    c.in_flight.fetch_sub(1, Ordering::SeqCst);
    zip(archive_bytes(1024))
}

async fn archive(State(c): State<Counters>) -> Response {
    c.requests.fetch_add(1, Ordering::SeqCst);
    zip(archive_bytes(1024))
}

async fn hang(State(c): State<Counters>) -> Response {
    c.requests.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(30)).await;
    zip(archive_bytes(1024))
}

async fn slow_drive(State(c): State<Counters>) -> Response {
    c.requests.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(3)).await;
    zip(archive_bytes(1024))
}

async fn server() -> (String, Counters) {
    let counters = Counters::default();
    let app = Router::new()
        .route("/slow.zip", get(slow_archive))
        .route("/song.zip", get(archive))
        .route("/hang.zip", get(hang))
        .route("/gone.zip", get(|| async { StatusCode::GONE.into_response() }))
        .route("/uc", get(slow_drive))
        .with_state(counters.clone());
    (serve(app).await, counters)
}

fn record(id: &str, url: Option<&str>) -> ChartRecord {
    let record = ChartRecord::new(id, &format!("Song {}", id), "Band", "https://charts.example/c");
    match url {
        Some(url) => record.with_download_url(url),
        None => record,
    }
}

const DRIVE_FILE: &str = "https://drive.google.com/file/d/1AbCdEfGhIjK/view";

/// Service whose cloud-file resolver talks to the local server.
fn drive_service(base: &str) -> DownloadService {
    let registry = ResolverRegistry::with_defaults(client())
        .register(DriveFileResolver::new(client()).with_base_url(base));
    DownloadService::with_registry(client(), registry)
}

fn options(dir: &std::path::Path, max_concurrency: usize) -> BatchOptions {
    BatchOptions {
        max_concurrency,
        group_delay: Duration::ZERO,
        item_timeout: Duration::from_secs(10),
        ..BatchOptions::new(dir)
    }
}

#[tokio::test]
async fn concurrency_never_exceeds_limit() {
    let (base, counters) = server().await;
    let dir = tempfile::tempdir().unwrap();
    let url = format!("{}/slow.zip", base);
    let records: Vec<_> = (0..7).map(|i| record(&i.to_string(), Some(&url))).collect();

    let service = DownloadService::new(client());
    let results = service.run_batch(&records, &options(dir.path(), 3)).await.unwrap();

    assert_eq!(results.len(), 7);
    for (record, result) in records.iter().zip(&results) {
        assert_eq!(result.chart.id, record.id);
        assert_eq!(result.status, DownloadStatus::Downloaded);
        assert!(result.file_path.as_ref().unwrap().exists());
        assert_eq!(result.size, Some(1024));
    }
    assert_eq!(counters.requests.load(Ordering::SeqCst), 7);
    assert!(counters.max_in_flight.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn failures_do_not_abort_siblings() {
    let (base, _) = server().await;
    let dir = tempfile::tempdir().unwrap();
    let records = vec![
        record("ok", Some(&format!("{}/song.zip", base))),
        record("gone", Some(&format!("{}/gone.zip", base))),
        record("none", None),
        record("ftp", Some("ftp://files.example/song.zip")),
        record("folder", Some("https://drive.google.com/drive/folders/1TrGxDGQ")),
    ];

    let service = DownloadService::new(client());
    let results = service.run_batch(&records, &options(dir.path(), 2)).await.unwrap();

    assert_eq!(results.len(), 5);
    assert_eq!(results[0].status, DownloadStatus::Downloaded);
    assert_eq!(results[1].error_kind(), Some(&ErrorKind::HttpError(410)));
    assert!(!results[1].success);
    assert_eq!(results[2].error_kind(), Some(&ErrorKind::MissingSource));
    assert_eq!(results[3].error_kind(), Some(&ErrorKind::UnsupportedUrl));
    assert!(results[4].success);

    let summary = BatchSummary::from_results(&results);
    assert_eq!(summary.successful, 1);
    assert_eq!(summary.failed, 3);
    assert_eq!(summary.manual, 1);
    assert_eq!(summary.total_bytes, 1024);
}

#[tokio::test]
async fn folder_link_reports_manual_action() {
    let dir = tempfile::tempdir().unwrap();
    let records = vec![record("f", Some("https://host/drive/folders/abc"))];

    let service = DownloadService::new(client());
    let results = service.run_batch(&records, &options(dir.path(), 3)).await.unwrap();

    assert_eq!(results.len(), 1);
    assert!(results[0].success);
    assert_eq!(
        results[0].error.as_deref(),
        Some("Folder URL: https://host/drive/folders/abc")
    );
    assert_eq!(
        results[0].status,
        DownloadStatus::ManualActionRequired {
            folder_url: "https://host/drive/folders/abc".to_string()
        }
    );
    assert!(results[0].file_path.is_none());
}

#[tokio::test]
async fn existing_file_is_skipped_without_request() {
    let (base, counters) = server().await;
    let dir = tempfile::tempdir().unwrap();
    let existing = dir.path().join("Song 1 - Band.zip");
    tokio::fs::write(&existing, b"already here").await.unwrap();

    let records = vec![record("1", Some(&format!("{}/song.zip", base)))];
    let service = DownloadService::new(client());
    let results = service.run_batch(&records, &options(dir.path(), 3)).await.unwrap();

    assert!(results[0].success);
    assert_eq!(results[0].status, DownloadStatus::SkippedExisting);
    assert_eq!(results[0].file_path.as_deref(), Some(existing.as_path()));
    assert_eq!(counters.requests.load(Ordering::SeqCst), 0);
    assert_eq!(tokio::fs::read(&existing).await.unwrap(), b"already here");
}

#[tokio::test]
async fn overwrite_replaces_existing_file() {
    let (base, counters) = server().await;
    let dir = tempfile::tempdir().unwrap();
    let existing = dir.path().join("Song 1 - Band.zip");
    tokio::fs::write(&existing, b"stale").await.unwrap();

    let records = vec![record("1", Some(&format!("{}/song.zip", base)))];
    let mut opts = options(dir.path(), 3);
    opts.overwrite = true;
    let results = DownloadService::new(client())
        .run_batch(&records, &opts)
        .await
        .unwrap();

    assert_eq!(results[0].status, DownloadStatus::Downloaded);
    assert_eq!(counters.requests.load(Ordering::SeqCst), 1);
    assert_eq!(tokio::fs::read(&existing).await.unwrap(), archive_bytes(1024));
}

#[tokio::test]
async fn item_timeout_fails_only_that_item() {
    let (base, _) = server().await;
    let dir = tempfile::tempdir().unwrap();
    let records = vec![
        record("hang", Some(&format!("{}/hang.zip", base))),
        record("ok", Some(&format!("{}/song.zip", base))),
    ];
    let mut opts = options(dir.path(), 2);
    opts.item_timeout = Duration::from_millis(300);

    let results = DownloadService::new(client())
        .run_batch(&records, &opts)
        .await
        .unwrap();

    assert_eq!(results[0].error_kind(), Some(&ErrorKind::Timeout));
    assert!(!dir.path().join("Song hang - Band.zip").exists());
    assert!(!dir.path().join("Song hang - Band.zip.part").exists());
    assert_eq!(results[1].status, DownloadStatus::Downloaded);
}

#[tokio::test]
async fn organize_by_source_uses_subdirectories() {
    let (base, _) = server().await;
    let dir = tempfile::tempdir().unwrap();
    let url = format!("{}/song.zip", base);
    let records = vec![
        record("1", Some(&url)).with_source("Chart Archive"),
        record("2", Some(&url)),
    ];
    let mut opts = options(dir.path(), 2);
    opts.organize_by_source = true;

    let results = DownloadService::new(client())
        .run_batch(&records, &opts)
        .await
        .unwrap();

    assert_eq!(
        results[0].file_path.as_deref(),
        Some(dir.path().join("Chart Archive").join("Song 1 - Band.zip").as_path())
    );
    assert_eq!(
        results[1].file_path.as_deref(),
        Some(dir.path().join("charts.example").join("Song 2 - Band.zip").as_path())
    );
}

#[tokio::test]
async fn duplicate_ids_in_flight_are_rejected() {
    let (base, _) = server().await;
    let dir = tempfile::tempdir().unwrap();
    let url = format!("{}/slow.zip", base);
    let mut second = record("same", Some(&url));
    second.title = "Other".to_string();
    let records = vec![record("same", Some(&url)), second];

    let results = DownloadService::new(client())
        .run_batch(&records, &options(dir.path(), 2))
        .await
        .unwrap();

    assert_eq!(results[0].status, DownloadStatus::Downloaded);
    assert_eq!(results[1].error_kind(), Some(&ErrorKind::DuplicateRequest));
}

#[tokio::test]
async fn invalid_options_fail_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let service = DownloadService::new(client());

    let err = service
        .run_batch(&[record("1", None)], &options(dir.path(), 0))
        .await
        .unwrap_err();
    assert!(matches!(err, BatchError::InvalidOptions(_)));

    let err = service
        .run_batch(&[], &BatchOptions::new(""))
        .await
        .unwrap_err();
    assert!(matches!(err, BatchError::InvalidOptions(_)));
}

#[tokio::test]
async fn empty_batch_creates_destination() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("nested").join("charts");

    let results = DownloadService::new(client())
        .run_batch(&[], &options(&dest, 3))
        .await
        .unwrap();

    assert!(results.is_empty());
    assert!(dest.is_dir());
}

#[tokio::test]
async fn progress_events_follow_each_item() {
    let (base, _) = server().await;
    let dir = tempfile::tempdir().unwrap();
    let records = vec![
        record("1", Some(&format!("{}/song.zip", base))),
        record("2", Some(&format!("{}/gone.zip", base))),
    ];
    let (tx, mut rx) = mpsc::unbounded_channel();

    let service = DownloadService::new(client()).with_progress(Arc::new(tx));
    service.run_batch(&records, &options(dir.path(), 2)).await.unwrap();
    drop(service);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    let started = events
        .iter()
        .filter(|e| matches!(e, DownloadEvent::Started { .. }))
        .count();
    assert_eq!(started, 2);
    assert!(events.iter().any(|e| matches!(
        e,
        DownloadEvent::Progress { index: 0, downloaded: 1024, .. }
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        DownloadEvent::Completed { index: 0, size: 1024, .. }
    )));
    assert!(events.iter().any(|e| matches!(e, DownloadEvent::Failed { index: 1, .. })));
}

#[tokio::test]
async fn existing_file_skips_cloud_resolution() {
    let (base, counters) = server().await;
    let dir = tempfile::tempdir().unwrap();
    let existing = dir.path().join("Song 1 - Band.zip");
    tokio::fs::write(&existing, b"already here").await.unwrap();

    let records = vec![record("1", Some(DRIVE_FILE))];
    let results = drive_service(&base)
        .run_batch(&records, &options(dir.path(), 3))
        .await
        .unwrap();

    assert_eq!(results[0].status, DownloadStatus::SkippedExisting);
    assert_eq!(counters.requests.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn item_timeout_covers_resolution() {
    let (base, _) = server().await;
    let dir = tempfile::tempdir().unwrap();
    let records = vec![record("slow", Some(DRIVE_FILE))];
    let mut opts = options(dir.path(), 1);
    opts.item_timeout = Duration::from_millis(300);

    let start = Instant::now();
    let results = drive_service(&base).run_batch(&records, &opts).await.unwrap();

    assert!(start.elapsed() < Duration::from_secs(2), "{:?}", start.elapsed());
    assert_eq!(results[0].error_kind(), Some(&ErrorKind::Timeout));
    assert!(!dir.path().join("Song slow - Band.zip").exists());
}

#[tokio::test]
async fn shared_destination_in_one_group_is_rejected() {
    let (base, counters) = server().await;
    let dir = tempfile::tempdir().unwrap();
    let url = format!("{}/slow.zip", base);
    let records: Vec<_> = ["a", "b", "c"]
        .iter()
        .map(|id| {
            let mut r = record(id, Some(&url));
            r.title = "Same Song".to_string();
            r
        })
        .collect();

    let results = DownloadService::new(client())
        .run_batch(&records, &options(dir.path(), 2))
        .await
        .unwrap();

    let path = dir.path().join("Same Song - Band.zip");
    assert_eq!(results[0].status, DownloadStatus::Downloaded);
    assert_eq!(results[0].file_path.as_deref(), Some(path.as_path()));
    assert_eq!(results[1].error_kind(), Some(&ErrorKind::DuplicateRequest));
    assert!(!results[1].success);
    assert_eq!(results[2].status, DownloadStatus::SkippedExisting);
    assert_eq!(counters.requests.load(Ordering::SeqCst), 1);
    assert_eq!(tokio::fs::read(&path).await.unwrap(), archive_bytes(1024));
}
