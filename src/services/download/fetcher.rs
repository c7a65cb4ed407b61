//! Streams a resolved URL to disk.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::FetchError;
use crate::http_client::{HttpClient, MAX_REDIRECTS};
use crate::utils::{format_size, format_speed};

const FILE_CHUNK_SIZE: usize = 64 * 1024;

/// Writes bytes behind an `http(s)://` or `file://` URL to a destination path.
///
/// Bytes land in `<dest>.part` and are renamed into place on success, so a
/// failed or timed-out fetch never leaves a partial archive at `dest`.
#[derive(Clone)]
pub struct ByteFetcher {
    client: HttpClient,
}

impl ByteFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Fetch `url` into `dest` within `timeout`, reporting `(downloaded, total)` after every chunk.
    pub async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        timeout: Duration,
        progress: &(dyn Fn(u64, Option<u64>) + Send + Sync),
    ) -> Result<u64, FetchError> {
        let part = part_path(dest);
        let start = Instant::now();

        let result = match tokio::time::timeout(timeout, self.fetch_to(url, &part, progress)).await
        {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(timeout)),
        };

        let result = match result {
            Ok(bytes) => tokio::fs::rename(&part, dest)
                .await
                .map(|_| bytes)
                .map_err(FetchError::from),
            Err(e) => Err(e),
        };

        match &result {
            Ok(bytes) => {
                let secs = start.elapsed().as_secs_f64();
                let speed = if secs > 0.0 { *bytes as f64 / secs } else { 0.0 };
                info!(
                    "Fetched {} ({}) in {:.1}s at {}",
                    dest.display(),
                    format_size(*bytes),
                    secs,
                    format_speed(speed)
                );
            }
            Err(e) => {
                warn!("Fetch of {} failed: {}", url, e);
                remove_partial(&part).await;
            }
        }
        result
    }

    async fn fetch_to(
        &self,
        url: &str,
        part: &Path,
        progress: &(dyn Fn(u64, Option<u64>) + Send + Sync),
    ) -> Result<u64, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))?;
        match parsed.scheme() {
            "file" => {
                let source = parsed
                    .to_file_path()
                    .map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
                copy_local(&source, part, progress).await
            }
            "http" | "https" => self.fetch_http(url, part, progress).await,
            other => Err(FetchError::InvalidUrl(format!(
                "unsupported scheme {}: {}",
                other, url
            ))),
        }
    }

    async fn fetch_http(
        &self,
        url: &str,
        part: &Path,
        progress: &(dyn Fn(u64, Option<u64>) + Send + Sync),
    ) -> Result<u64, FetchError> {
        let mut current = url.to_string();

        for _ in 0..=MAX_REDIRECTS {
            let response = self.client.get_manual(&current).await?;

            if response.is_redirect() {
                let location = response
                    .location()
                    .ok_or_else(|| FetchError::MissingLocation(current.clone()))?;
                debug!("Redirect: {} -> {}", current, location);
                current = location;
                continue;
            }

            if response.status != reqwest::StatusCode::OK {
                return Err(FetchError::HttpStatus(response.status.as_u16()));
            }

            let total = response.content_length();
            let mut file = File::create(part).await?;
            let mut stream = response.into_response().bytes_stream();
            let mut downloaded: u64 = 0;

            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                downloaded += chunk.len() as u64;
                progress(downloaded, total);
            }

            file.flush().await?;
            return Ok(downloaded);
        }

        Err(FetchError::TooManyRedirects(MAX_REDIRECTS))
    }
}

/// Stream a local file (automation output) into place.
async fn copy_local(
    source: &Path,
    part: &Path,
    progress: &(dyn Fn(u64, Option<u64>) + Send + Sync),
) -> Result<u64, FetchError> {
    let mut input = File::open(source).await?;
    let total = input.metadata().await.ok().map(|m| m.len());
    let mut output = File::create(part).await?;
    let mut buf = vec![0u8; FILE_CHUNK_SIZE];
    let mut copied: u64 = 0;

    loop {
        let n = input.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        output.write_all(&buf[..n]).await?;
        copied += n as u64;
        progress(copied, total);
    }

    output.flush().await?;
    Ok(copied)
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial file {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial file {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_path() {
        assert_eq!(
            part_path(Path::new("/tmp/out/Song - Band.zip")),
            PathBuf::from("/tmp/out/Song - Band.zip.part")
        );
    }

    #[tokio::test]
    async fn test_file_url_is_copied() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("landed.zip");
        tokio::fs::write(&source, b"PK\x03\x04archive").await.unwrap();
        let dest = dir.path().join("out.zip");

        let fetcher = ByteFetcher::new(HttpClient::builder(Duration::from_secs(1)).build().unwrap());
        let url = Url::from_file_path(&source).unwrap().to_string();
        let bytes = fetcher
            .fetch(&url, &dest, Duration::from_secs(5), &|_, _| {})
            .await
            .unwrap();

        assert_eq!(bytes, 11);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"PK\x03\x04archive");
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_unsupported_scheme() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.zip");
        let fetcher = ByteFetcher::new(HttpClient::builder(Duration::from_secs(1)).build().unwrap());
        let err = fetcher
            .fetch("ftp://example.com/a.zip", &dest, Duration::from_secs(1), &|_, _| {})
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
        assert!(!dest.exists());
    }
}
