//! Federation engine
//!
//! Fans a listing out over every configured source, merges duplicates
//! into one entry per identity, and resolves which adapter instance should
//! serve follow-up requests for a standalone entry.

mod merge;
mod resolve;

pub use merge::EntryMerger;
pub use resolve::ResolutionCache;

use crate::adapter::{AdapterInstance, AdapterRegistry, Args, Operation};
use crate::catalog::{CatalogEntry, EntryKind, OwnerRef};
use crate::config::FederationConfig;
use crate::error::{FedError, FedResult};
use crate::pipeline::HttpClient;
use crate::source::SourceDescriptor;
use futures::future::join_all;
use resolve::Resolved;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

pub struct Federation {
    registry: Arc<AdapterRegistry>,
    http: HttpClient,
    sources: Vec<Arc<AdapterInstance>>,
    resolved: ResolutionCache,
    languages: RwLock<Vec<String>>,
}

impl Federation {
    pub fn new(registry: Arc<AdapterRegistry>, http: HttpClient) -> Self {
        Self {
            registry,
            http,
            sources: Vec::new(),
            resolved: ResolutionCache::new(),
            languages: RwLock::new(Vec::new()),
        }
    }

    /// Build every configured source, in order.
    pub fn from_config(
        config: &FederationConfig,
        registry: Arc<AdapterRegistry>,
        http: HttpClient,
    ) -> FedResult<Self> {
        let mut federation = Self::new(registry, http);
        federation.set_languages(config.languages.clone());
        for descriptor in &config.sources {
            federation.add_source(descriptor.clone())?;
        }
        Ok(federation)
    }

    /// Add a source. Its priority is its position: earlier sources win
    /// ties when merging.
    pub fn add_source(&mut self, descriptor: SourceDescriptor) -> FedResult<Arc<AdapterInstance>> {
        let kind = self.registry.get(&descriptor.provider).ok_or_else(|| {
            FedError::validation(format!(
                "source {} uses unknown adapter kind `{}`",
                descriptor.uri, descriptor.provider
            ))
        })?;
        if self.source(&descriptor.uri).is_some() {
            return Err(FedError::validation(format!(
                "source {} is configured twice",
                descriptor.uri
            )));
        }
        let instance = AdapterInstance::new(kind, descriptor, self.http.clone())?
            .with_priority(self.sources.len())
            .with_languages(self.preferred_languages());
        let instance = Arc::new(instance);
        self.sources.push(Arc::clone(&instance));
        Ok(instance)
    }

    pub fn sources(&self) -> &[Arc<AdapterInstance>] {
        &self.sources
    }

    pub fn source(&self, uri: &str) -> Option<&Arc<AdapterInstance>> {
        self.sources.iter().find(|s| s.uri() == uri)
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Set preferred languages on every source, including ones resolved later.
    pub fn set_languages(&self, preferred: Vec<String>) {
        for source in &self.sources {
            source.set_languages(preferred.clone());
        }
        *self.languages.write().unwrap_or_else(|e| e.into_inner()) = preferred;
    }

    fn preferred_languages(&self) -> Vec<String> {
        self.languages
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// List entries of `kind` from every source that supports it and merge
    /// duplicates. A failing source is logged and left out.
    pub async fn list(&self, kind: EntryKind, args: Args) -> Vec<CatalogEntry> {
        let operation = Operation::listing_for(kind);
        let calls = self.sources.iter().map(|source| {
            let source = Arc::clone(source);
            let args = args.clone();
            async move {
                match source.capabilities().await {
                    Ok(caps) if caps.supports(operation.capability()) && source.kind().implements(operation) => {}
                    Ok(_) => return None,
                    Err(err) => {
                        warn!(source = %source.uri(), error = %err, "source unavailable, skipping");
                        return None;
                    }
                }
                match source.call(operation, args).await {
                    Ok(result) => Some((source, result.items)),
                    Err(err) => {
                        warn!(
                            source = %source.uri(),
                            operation = operation.name(),
                            error = %err,
                            "source failed, skipping its results"
                        );
                        None
                    }
                }
            }
        });

        let mut merger = EntryMerger::new();
        for (source, items) in join_all(calls).await.into_iter().flatten() {
            for item in items {
                merger.add(item, &source);
            }
        }
        debug!(kind = %kind, entries = merger.len(), "federated listing merged");
        merger.into_entries()
    }

    /// Merged scheme list. Each owner also learns the schemes it serves.
    pub async fn schemes(&self) -> Vec<CatalogEntry> {
        let schemes = self.list(EntryKind::Scheme, Args::new()).await;
        for scheme in &schemes {
            if let Some(owner) = scheme.owner() {
                owner.add_known_scheme(scheme.clone());
            }
        }
        schemes
    }

    /// Find the instance that should serve `entry`, building and caching
    /// one from its API hints if needed. Sets the entry's owner.
    pub fn resolve_owner(
        &self,
        entry: &mut CatalogEntry,
        data_type: EntryKind,
    ) -> Option<Arc<AdapterInstance>> {
        if let Some(owner) = entry.owner() {
            return Some(owner);
        }

        let priority = self.sources.len() + self.resolved.len();
        let hints = entry.api.clone();
        for hint in &hints {
            let resolved = self
                .resolved
                .get_or_build(hint, || self.build_for_hint(&hint.protocol_type, &hint.url, data_type, entry, priority));
            let instance = match resolved {
                Some(Resolved::Hit(instance)) => {
                    debug!(url = %hint.url, source = %instance.uri(), "owner resolved from cache");
                    instance.add_known_scheme(entry.clone());
                    instance
                }
                Some(Resolved::Built(instance)) => {
                    debug!(url = %hint.url, kind = instance.kind().name(), "built adapter for endpoint");
                    instance
                }
                None => continue,
            };
            entry.owner = Some(OwnerRef::new(&instance));
            return Some(instance);
        }

        debug!(uri = %entry.uri, "no adapter kind can serve entry");
        None
    }

    fn build_for_hint(
        &self,
        protocol_type: &str,
        url: &str,
        data_type: EntryKind,
        entry: &CatalogEntry,
        priority: usize,
    ) -> Option<Arc<AdapterInstance>> {
        for kind in self.registry.serving(protocol_type, data_type) {
            let Some(descriptor) = kind.descriptor_for_endpoint(url, entry) else {
                continue;
            };
            match AdapterInstance::new(Arc::clone(&kind), descriptor, self.http.clone()) {
                Ok(instance) => {
                    let instance = instance
                        .with_priority(priority)
                        .with_languages(self.preferred_languages());
                    return Some(Arc::new(instance));
                }
                Err(err) => {
                    debug!(kind = kind.name(), url, error = %err, "adapter kind could not serve endpoint");
                }
            }
        }
        None
    }
}
