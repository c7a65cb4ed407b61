mod common;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chartfetch::error::ErrorKind;
use chartfetch::providers::{DriveFileResolver, ResolutionOutcome, Resolver};
use chartfetch::services::download::ByteFetcher;

use common::{archive_bytes, client, html, serve, zip};

const FILE_URL: &str = "https://drive.google.com/file/d/1AbCdEfGhIjK/view?usp=sharing";

const INTERSTITIAL: &str = r#"<html><body>
<p>Google Drive can't scan this file for viruses.</p>
<form id="download-form" action="/uc" method="get">
  <input type="hidden" name="id" value="1AbCdEfGhIjK">
  <input type="hidden" name="export" value="download">
  <input type="hidden" name="confirm" value="t0k3n">
  <input type="submit" value="Download anyway">
</form></body></html>"#;

#[derive(Clone)]
struct Drive {
    hits: Arc<AtomicUsize>,
    mode: Mode,
}

#[derive(Clone, Copy)]
enum Mode {
    /// Interstitial first, archive once the token is replayed.
    Interstitial,
    /// Archive straight away.
    Direct,
    /// Interstitial even with the token.
    AlwaysInterstitial,
    /// HTML page without any token.
    NoToken,
    /// Redirect to a confirm URL that serves the archive.
    ConfirmRedirect,
}

async fn uc(State(drive): State<Drive>, Query(q): Query<HashMap<String, String>>) -> Response {
    drive.hits.fetch_add(1, Ordering::SeqCst);
    let confirmed = q.get("confirm").map(String::as_str) == Some("t0k3n");
    match drive.mode {
        Mode::Direct => zip(archive_bytes(2048)),
        Mode::Interstitial if confirmed => zip(archive_bytes(2048)),
        Mode::Interstitial | Mode::AlwaysInterstitial => html(INTERSTITIAL),
        Mode::NoToken => html("<html><body>Quota exceeded</body></html>"),
        Mode::ConfirmRedirect if confirmed => zip(archive_bytes(2048)),
        Mode::ConfirmRedirect => (
            axum::http::StatusCode::FOUND,
            [(header::LOCATION, "/uc?export=download&confirm=t0k3n&id=1AbCdEfGhIjK")],
        )
            .into_response(),
    }
}

async fn drive(mode: Mode) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new().route("/uc", get(uc)).with_state(Drive {
        hits: hits.clone(),
        mode,
    });
    (serve(app).await, hits)
}

#[tokio::test]
async fn confirmation_flow_succeeds_after_interstitial() {
    let (base, hits) = drive(Mode::Interstitial).await;
    let resolver = DriveFileResolver::new(client()).with_base_url(&base);

    let outcome = resolver.resolve(FILE_URL).await;
    let url = outcome.resolved_url().expect("resolved").to_string();

    assert!(url.starts_with(&base), "{}", url);
    assert!(url.contains("confirm=t0k3n"), "{}", url);
    assert!(url.contains("id=1AbCdEfGhIjK"), "{}", url);
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("chart.zip");
    let bytes = ByteFetcher::new(client())
        .fetch(&url, &dest, Duration::from_secs(5), &|_, _| {})
        .await
        .unwrap();
    assert_eq!(bytes, 2048);
}

#[tokio::test]
async fn binary_response_skips_confirmation() {
    let (base, hits) = drive(Mode::Direct).await;
    let resolver = DriveFileResolver::new(client()).with_base_url(&base);

    let outcome = resolver.resolve(FILE_URL).await;

    assert_eq!(
        outcome,
        ResolutionOutcome::Resolved(format!("{}/uc?export=download&id=1AbCdEfGhIjK", base))
    );
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn second_interstitial_fails_without_third_attempt() {
    let (base, hits) = drive(Mode::AlwaysInterstitial).await;
    let resolver = DriveFileResolver::new(client()).with_base_url(&base);

    let outcome = resolver.resolve(FILE_URL).await;

    assert!(matches!(
        outcome,
        ResolutionOutcome::ResolutionFailed {
            kind: ErrorKind::ConfirmationFlowFailed,
            ..
        }
    ));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn missing_token_fails_confirmation() {
    let (base, hits) = drive(Mode::NoToken).await;
    let resolver = DriveFileResolver::new(client()).with_base_url(&base);

    let outcome = resolver.resolve("https://drive.google.com/open?id=1AbCdEfGhIjK").await;

    assert!(matches!(
        outcome,
        ResolutionOutcome::ResolutionFailed {
            kind: ErrorKind::ConfirmationFlowFailed,
            ..
        }
    ));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn confirm_redirect_serving_archive_resolves() {
    let (base, _hits) = drive(Mode::ConfirmRedirect).await;
    let resolver = DriveFileResolver::new(client()).with_base_url(&base);

    let outcome = resolver.resolve(FILE_URL).await;

    assert_eq!(
        outcome,
        ResolutionOutcome::Resolved(format!(
            "{}/uc?export=download&confirm=t0k3n&id=1AbCdEfGhIjK",
            base
        ))
    );
}

#[tokio::test]
async fn url_without_id_is_invalid() {
    let resolver = DriveFileResolver::new(client()).with_base_url("http://127.0.0.1:9");
    let outcome = resolver.resolve("https://drive.google.com/file/").await;
    assert!(matches!(
        outcome,
        ResolutionOutcome::ResolutionFailed {
            kind: ErrorKind::InvalidUrl,
            ..
        }
    ));
}
