//! Merging duplicate entries returned by several sources
//!
//! Entries are duplicates when they share any URI or alias. For each
//! duplicate group the winner is the contribution with the most complete
//! child list; ties go to the source with the lower priority number. The
//! winner keeps its fields and becomes the owner; losers only fill gaps,
//! higher-ranked losers first.

use crate::adapter::AdapterInstance;
use crate::catalog::{CatalogEntry, OwnerRef};
use std::cmp::Reverse;
use std::sync::Arc;

/// Rank of one contribution: higher wins.
type Rank = (u8, Reverse<usize>);

struct Contribution {
    entry: CatalogEntry,
    source: Arc<AdapterInstance>,
    rank: Rank,
}

/// Contributions sharing an identity.
struct Group {
    contributions: Vec<Contribution>,
}

impl Group {
    fn matches(&self, entry: &CatalogEntry) -> bool {
        self.contributions.iter().any(|c| c.entry.same_as(entry))
    }

    fn merge(mut self) -> Option<CatalogEntry> {
        // Stable sort: equal ranks keep arrival order.
        self.contributions.sort_by(|a, b| b.rank.cmp(&a.rank));
        let mut contributions = self.contributions.into_iter();
        let winner = contributions.next()?;
        let mut entry = winner.entry;
        for loser in contributions {
            entry.absorb(loser.entry);
        }
        entry.owner = Some(OwnerRef::new(&winner.source));
        Some(entry)
    }
}

/// Accumulates entries from several sources into deduplicated entries.
///
/// The merged fields and owner do not depend on the order entries are
/// added in.
#[derive(Default)]
pub struct EntryMerger {
    groups: Vec<Group>,
}

impl EntryMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one source's entry. An entry sharing ids with several groups
    /// joins them into one.
    pub fn add(&mut self, entry: CatalogEntry, source: &Arc<AdapterInstance>) {
        let contribution = Contribution {
            rank: (entry.child_completeness(), Reverse(source.priority())),
            entry,
            source: Arc::clone(source),
        };

        let mut matching = self
            .groups
            .iter()
            .enumerate()
            .filter(|(_, g)| g.matches(&contribution.entry))
            .map(|(i, _)| i)
            .collect::<Vec<_>>()
            .into_iter();
        let Some(first) = matching.next() else {
            self.groups.push(Group {
                contributions: vec![contribution],
            });
            return;
        };

        // Remove later matches back to front so indices stay valid.
        let absorbed: Vec<Group> = matching.rev().map(|i| self.groups.remove(i)).collect();
        let group = &mut self.groups[first];
        for other in absorbed.into_iter().rev() {
            group.contributions.extend(other.contributions);
        }
        group.contributions.push(contribution);
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Merged entries in first-seen order.
    pub fn into_entries(self) -> Vec<CatalogEntry> {
        self.groups.into_iter().filter_map(Group::merge).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MemoryKind;
    use crate::pipeline::HttpClient;
    use crate::source::SourceDescriptor;
    use crate::transport::MockTransport;

    fn source(uri: &str, priority: usize) -> Arc<AdapterInstance> {
        let http = HttpClient::new(Arc::new(MockTransport::new()));
        let instance = AdapterInstance::new(
            Arc::new(MemoryKind),
            SourceDescriptor::new(uri, "memory"),
            http,
        )
        .unwrap()
        .with_priority(priority);
        Arc::new(instance)
    }

    fn merge(contributions: &[(CatalogEntry, Arc<AdapterInstance>)]) -> Vec<CatalogEntry> {
        let mut merger = EntryMerger::new();
        for (entry, source) in contributions {
            merger.add(entry.clone(), source);
        }
        merger.into_entries()
    }

    fn child_uris(entry: &CatalogEntry) -> Vec<String> {
        entry
            .children
            .iter()
            .flatten()
            .map(|c| c.uri.clone())
            .collect()
    }

    // === Scenario: the more complete contribution owns the entry ===

    #[test]
    fn completeness_wins_in_either_order() {
        let a = source("urn:a", 0);
        let b = source("urn:b", 1);
        let from_a = (
            CatalogEntry::scheme("s1").with_label("en", "Scheme").with_children(vec![]),
            a.clone(),
        );
        let from_b = (
            CatalogEntry::scheme("s1")
                .with_label("de", "Schema")
                .with_children(vec![CatalogEntry::concept("c1")]),
            b.clone(),
        );

        for order in [
            vec![from_a.clone(), from_b.clone()],
            vec![from_b.clone(), from_a.clone()],
        ] {
            let merged = merge(&order);
            assert_eq!(merged.len(), 1);
            let entry = &merged[0];
            assert_eq!(entry.uri, "s1");
            assert_eq!(child_uris(entry), vec!["c1"]);
            assert!(entry.owner.as_ref().unwrap().is(&b));
            assert_eq!(entry.pref_label["en"], "Scheme");
            assert_eq!(entry.pref_label["de"], "Schema");
        }
    }

    // === Scenario: losers fill gaps by rank, not arrival ===

    #[test]
    fn three_way_merge_is_order_independent() {
        let a = source("urn:a", 0);
        let b = source("urn:b", 1);
        let c = source("urn:c", 2);
        let from_a = (CatalogEntry::scheme("s1").with_label("en", "From A"), a);
        let from_b = (
            CatalogEntry::scheme("s1")
                .with_label("en", "From B")
                .with_label("de", "Von B"),
            b,
        );
        let from_c = (
            CatalogEntry::scheme("s1").with_children(vec![CatalogEntry::concept("c1")]),
            c.clone(),
        );

        let permutations = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        let all = [from_a, from_b, from_c];
        for order in permutations {
            let contributions: Vec<_> = order.iter().map(|&i| all[i].clone()).collect();
            let merged = merge(&contributions);
            assert_eq!(merged.len(), 1, "{order:?}");
            let entry = &merged[0];
            assert!(entry.owner.as_ref().unwrap().is(&c), "{order:?}");
            assert_eq!(entry.pref_label["en"], "From A", "{order:?}");
            assert_eq!(entry.pref_label["de"], "Von B", "{order:?}");
            assert_eq!(child_uris(entry), vec!["c1"]);
        }
    }

    #[test]
    fn bridging_entry_joins_groups() {
        let a = source("urn:a", 0);
        let x = (CatalogEntry::scheme("x"), a.clone());
        let y = (CatalogEntry::scheme("y"), a.clone());
        let bridge = (CatalogEntry::scheme("x").with_identifier("y"), a);

        for order in [
            vec![x.clone(), y.clone(), bridge.clone()],
            vec![bridge.clone(), x.clone(), y.clone()],
        ] {
            let merged = merge(&order);
            assert_eq!(merged.len(), 1);
            let ids: Vec<&str> = merged[0].ids().collect();
            assert!(ids.contains(&"x") && ids.contains(&"y"));
        }
    }

    #[test]
    fn distinct_entries_stay_separate_in_first_seen_order() {
        let a = source("urn:a", 0);
        let merged = merge(&[
            (CatalogEntry::scheme("s2"), a.clone()),
            (CatalogEntry::scheme("s1"), a),
        ]);
        let uris: Vec<&str> = merged.iter().map(|e| e.uri.as_str()).collect();
        assert_eq!(uris, vec!["s2", "s1"]);
    }
}
