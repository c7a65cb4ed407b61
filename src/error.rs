//! Error taxonomy shared by resolvers, the fetcher and the batch manager.

use std::fmt;

use thiserror::Error;

/// Provider-aware classification of why an item did not complete.
///
/// `ManualActionRequired` is intentionally absent: folder links end in a
/// terminal, non-error outcome that is carried by `DownloadStatus` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// No file identifier could be extracted from the URL.
    InvalidUrl,
    /// The interstitial token flow did not end in a binary response.
    ConfirmationFlowFailed,
    /// Every share-link strategy was tried without success.
    AllStrategiesExhausted { attempted: Vec<String> },
    /// Terminal HTTP status that is neither 200 nor a redirect.
    HttpError(u16),
    /// Per-item deadline elapsed.
    Timeout,
    /// Creating, writing or removing a file failed.
    FilesystemError,
    /// Connection-level failure (DNS, TLS, reset).
    Network,
    /// The record never had a download link.
    MissingSource,
    /// The link matched no known provider shape.
    UnsupportedUrl,
    /// The same chart is already being downloaded in this batch.
    DuplicateRequest,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InvalidUrl => write!(f, "invalid url"),
            ErrorKind::ConfirmationFlowFailed => write!(f, "confirmation flow failed"),
            ErrorKind::AllStrategiesExhausted { attempted } => {
                write!(f, "all strategies exhausted ({})", attempted.join(", "))
            }
            ErrorKind::HttpError(status) => write!(f, "HTTP {}", status),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::FilesystemError => write!(f, "filesystem error"),
            ErrorKind::Network => write!(f, "network error"),
            ErrorKind::MissingSource => write!(f, "no download source"),
            ErrorKind::UnsupportedUrl => write!(f, "unsupported url"),
            ErrorKind::DuplicateRequest => write!(f, "duplicate request"),
        }
    }
}

/// Errors produced by the byte fetcher.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    HttpStatus(u16),
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("Too many redirects (limit {0})")]
    TooManyRedirects(usize),
    #[error("Redirect without Location header from {0}")]
    MissingLocation(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Map onto the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::HttpStatus(status) => ErrorKind::HttpError(*status),
            FetchError::Timeout(_) => ErrorKind::Timeout,
            FetchError::TooManyRedirects(_) | FetchError::MissingLocation(_) => {
                ErrorKind::Network
            }
            FetchError::InvalidUrl(_) => ErrorKind::InvalidUrl,
            FetchError::Network(e) if e.is_timeout() => ErrorKind::Timeout,
            FetchError::Network(_) => ErrorKind::Network,
            FetchError::Io(_) => ErrorKind::FilesystemError,
        }
    }
}

/// Errors that abort a whole batch. Only raised for malformed options.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Invalid batch options: {0}")]
    InvalidOptions(String),
    #[error("Failed to create destination directory {path}: {source}")]
    DestinationDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
