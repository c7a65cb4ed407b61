//! Category → resolver lookup.

use std::collections::HashMap;
use std::sync::Arc;

use super::{
    classify, DirectResolver, DriveFileResolver, DriveFolderResolver, ResolutionOutcome,
    Resolver, ShareLinkResolver,
};
use crate::error::ErrorKind;
use crate::http_client::HttpClient;
use crate::models::ProviderCategory;

/// Maps each [`ProviderCategory`] to the resolver that handles it.
///
/// `Unknown` never has a resolver; looking it up yields an `UnsupportedUrl`
/// failure without any I/O.
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    resolvers: HashMap<ProviderCategory, Arc<dyn Resolver>>,
}

impl ResolverRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in resolvers, all sharing `client`.
    pub fn with_defaults(client: HttpClient) -> Self {
        Self::new()
            .register(DirectResolver)
            .register(DriveFileResolver::new(client.clone()))
            .register(DriveFolderResolver)
            .register(ShareLinkResolver::new(client))
    }

    /// Register (or replace) the resolver for its category.
    pub fn register<R: Resolver + 'static>(self, resolver: R) -> Self {
        self.register_arc(Arc::new(resolver))
    }

    /// Register an already-shared resolver.
    pub fn register_arc(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolvers.insert(resolver.category(), resolver);
        self
    }

    /// Resolver registered for `category`.
    pub fn get(&self, category: ProviderCategory) -> Option<&Arc<dyn Resolver>> {
        self.resolvers.get(&category)
    }

    /// Classify and resolve in one step.
    pub async fn resolve(&self, url: &str) -> (ProviderCategory, ResolutionOutcome) {
        let category = classify(url);
        match self.get(category) {
            Some(resolver) => (category, resolver.resolve(url).await),
            None => (
                category,
                ResolutionOutcome::failed(
                    ErrorKind::UnsupportedUrl,
                    format!("no resolver for {} link: {}", category, url),
                ),
            ),
        }
    }
}
