//! Provider classification and per-provider resolution.
//!
//! Every link is first mapped to a [`ProviderCategory`] by [`classify`], then
//! handed to the [`Resolver`] registered for that category. Resolvers never
//! download the archive; they only work out where it can be fetched from.

mod classify;
mod direct;
pub mod google_drive;
pub mod onedrive;
mod registry;

pub use classify::classify;
pub use direct::DirectResolver;
pub use google_drive::{DriveFileResolver, DriveFolderResolver, FOLDER_MANUAL_REASON};
pub use onedrive::{decode_share_token, encode_share_url, share_api_url, ShareLinkResolver};
pub use registry::ResolverRegistry;

use async_trait::async_trait;

use crate::error::ErrorKind;
use crate::models::ProviderCategory;

/// Result of one resolution attempt. Exactly one variant per attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// Directly fetchable URL (`http(s)://` or, from automation, `file://`).
    Resolved(String),
    /// A human has to finish this one.
    ManualActionRequired { reason: String, original_url: String },
    ResolutionFailed { kind: ErrorKind, detail: String },
}

impl ResolutionOutcome {
    pub(crate) fn failed(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self::ResolutionFailed {
            kind,
            detail: detail.into(),
        }
    }

    /// Resolved URL, if any.
    pub fn resolved_url(&self) -> Option<&str> {
        match self {
            Self::Resolved(url) => Some(url),
            _ => None,
        }
    }
}

/// Turns a classified link into a [`ResolutionOutcome`].
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Category this resolver handles.
    fn category(&self) -> ProviderCategory;

    async fn resolve(&self, url: &str) -> ResolutionOutcome;
}
