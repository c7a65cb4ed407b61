//! Local HTTP servers for integration tests.

#![allow(dead_code)]

use std::time::Duration;

use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Router;
use chartfetch::http_client::HttpClient;

/// Serve `app` on an ephemeral localhost port, returning its base URL.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn client() -> HttpClient {
    HttpClient::builder(Duration::from_secs(5)).build().unwrap()
}

/// Fake archive body of `len` bytes.
pub fn archive_bytes(len: usize) -> Vec<u8> {
    let mut body = b"PK\x03\x04".to_vec();
    body.extend((0..len.saturating_sub(4)).map(|i| (i % 251) as u8));
    body
}

pub fn zip(body: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "application/zip")], body).into_response()
}

pub fn html(body: impl Into<String>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        body.into(),
    )
        .into_response()
}
