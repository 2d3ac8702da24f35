//! Cache of adapter instances built for discovered API endpoints

use crate::adapter::AdapterInstance;
use crate::catalog::ApiHint;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Instances keyed by `(protocol type, url)`.
#[derive(Default)]
pub struct ResolutionCache {
    instances: DashMap<(String, String), Arc<AdapterInstance>>,
}

/// Outcome of a cache lookup.
pub enum Resolved {
    Hit(Arc<AdapterInstance>),
    Built(Arc<AdapterInstance>),
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached instance for `hint`, or run `build` and cache its
    /// result. Concurrent lookups of the same key build at most once.
    /// `build` must not touch this cache.
    pub fn get_or_build(
        &self,
        hint: &ApiHint,
        build: impl FnOnce() -> Option<Arc<AdapterInstance>>,
    ) -> Option<Resolved> {
        let key = (hint.protocol_type.clone(), hint.url.clone());
        match self.instances.entry(key) {
            Entry::Occupied(hit) => Some(Resolved::Hit(Arc::clone(hit.get()))),
            Entry::Vacant(slot) => {
                let instance = build()?;
                slot.insert(Arc::clone(&instance));
                Some(Resolved::Built(instance))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
