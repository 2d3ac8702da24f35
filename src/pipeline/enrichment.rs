//! Result enrichment hooks
//!
//! Enrichments run on every non-finalized entry an adapter returns, after
//! the owner back-reference is set. They add derived data without
//! touching adapters.

use crate::catalog::{CatalogEntry, EntryKind, OwnerRef};
use std::collections::HashSet;
use std::sync::Arc;

/// A post-processing step applied to returned entries.
pub trait Enrichment: Send + Sync {
    /// Stable identifier used for deduplication.
    fn id(&self) -> &str;

    /// Entry kinds this enrichment cares about.
    fn applies_to(&self, kind: EntryKind) -> bool;

    fn enrich(&self, entry: &mut CatalogEntry, owner: &OwnerRef);
}

/// Ordered set of enrichments, deduplicated by `id()`.
pub struct EnrichmentRegistry {
    enrichments: Vec<Arc<dyn Enrichment>>,
}

impl EnrichmentRegistry {
    pub fn new(enrichments: Vec<Arc<dyn Enrichment>>) -> Self {
        let mut seen = HashSet::new();
        let deduped: Vec<_> = enrichments
            .into_iter()
            .filter(|e| seen.insert(e.id().to_string()))
            .collect();

        Self {
            enrichments: deduped,
        }
    }

    pub fn empty() -> Self {
        Self {
            enrichments: Vec::new(),
        }
    }

    /// Built-in enrichments.
    pub fn with_defaults() -> Self {
        Self::new(vec![Arc::new(NestedOwnerLinks)])
    }

    pub fn enrichments(&self) -> &[Arc<dyn Enrichment>] {
        &self.enrichments
    }

    /// Set the owner on a returned entry and run the applicable enrichments.
    /// Finalized entries are left alone.
    pub fn apply(&self, entry: &mut CatalogEntry, owner: &OwnerRef) {
        if entry.finalized {
            return;
        }
        entry.owner = Some(owner.clone());
        for enrichment in &self.enrichments {
            if enrichment.applies_to(entry.kind) {
                enrichment.enrich(entry, owner);
            }
        }
    }
}

impl Default for EnrichmentRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Gives nested children and parents the same owner as their container,
/// so lazy accessors work on them too.
pub struct NestedOwnerLinks;

impl Enrichment for NestedOwnerLinks {
    fn id(&self) -> &str {
        "nested-owner-links"
    }

    fn applies_to(&self, kind: EntryKind) -> bool {
        matches!(kind, EntryKind::Scheme | EntryKind::Concept)
    }

    fn enrich(&self, entry: &mut CatalogEntry, owner: &OwnerRef) {
        link_nested(entry, owner);
    }
}

fn link_nested(entry: &mut CatalogEntry, owner: &OwnerRef) {
    for nested in entry
        .children
        .iter_mut()
        .chain(entry.parents.iter_mut())
        .flatten()
    {
        if nested.finalized || nested.owner.is_some() || nested.uri.is_empty() {
            continue;
        }
        nested.kind = EntryKind::Concept;
        nested.owner = Some(owner.clone());
        link_nested(nested, owner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CountingEnrichment {
        id: String,
        seen: Mutex<Vec<String>>,
    }

    impl CountingEnrichment {
        fn new(id: &str) -> Self {
            Self {
                id: id.to_string(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl Enrichment for CountingEnrichment {
        fn id(&self) -> &str {
            &self.id
        }

        fn applies_to(&self, kind: EntryKind) -> bool {
            kind == EntryKind::Concept
        }

        fn enrich(&self, entry: &mut CatalogEntry, _owner: &OwnerRef) {
            self.seen.lock().unwrap().push(entry.uri.clone());
        }
    }

    #[test]
    fn registry_deduplicates_by_id() {
        let a = Arc::new(CountingEnrichment::new("shared")) as Arc<dyn Enrichment>;
        let b = Arc::new(CountingEnrichment::new("shared")) as Arc<dyn Enrichment>;
        let c = Arc::new(CountingEnrichment::new("other")) as Arc<dyn Enrichment>;

        let registry = EnrichmentRegistry::new(vec![a, b, c]);
        assert_eq!(registry.enrichments().len(), 2);
    }

    #[test]
    fn finalized_entries_are_skipped() {
        let counting = Arc::new(CountingEnrichment::new("count"));
        let registry = EnrichmentRegistry::new(vec![counting.clone() as Arc<dyn Enrichment>]);
        let owner = OwnerRef::dangling();

        let mut done = CatalogEntry::concept("http://example.org/c1");
        done.finalized = true;
        registry.apply(&mut done, &owner);
        assert!(done.owner.is_none());

        let mut fresh = CatalogEntry::concept("http://example.org/c2");
        registry.apply(&mut fresh, &owner);
        assert!(fresh.owner.is_some());
        assert_eq!(*counting.seen.lock().unwrap(), vec!["http://example.org/c2".to_string()]);
    }

    #[test]
    fn nested_entries_inherit_owner() {
        let registry = EnrichmentRegistry::with_defaults();
        let owner = OwnerRef::dangling();
        let mut entry = CatalogEntry::concept("http://example.org/c")
            .with_children(vec![CatalogEntry::concept("http://example.org/c1"), CatalogEntry::default()]);

        registry.apply(&mut entry, &owner);

        let children = entry.children.as_ref().unwrap();
        assert!(children[0].owner.is_some());
        assert!(children[1].owner.is_none(), "placeholders stay unowned");
    }
}
