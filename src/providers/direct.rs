//! Plain HTTP links need no resolution.

use async_trait::async_trait;

use super::{ResolutionOutcome, Resolver};
use crate::models::ProviderCategory;

/// Passes direct links through unchanged; the fetcher handles redirects.
#[derive(Debug, Default, Clone)]
pub struct DirectResolver;

#[async_trait]
impl Resolver for DirectResolver {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn category(&self) -> ProviderCategory {
        ProviderCategory::DirectHttp
    }

    async fn resolve(&self, url: &str) -> ResolutionOutcome {
        ResolutionOutcome::Resolved(url.trim().to_string())
    }
}
