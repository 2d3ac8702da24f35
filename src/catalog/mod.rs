//! Normalized catalog entries
//!
//! Schemes, concepts, mappings and annotations share one JSKOS-shaped
//! record. Two entries are "the same" when they share any URI or alias
//! identifier; object identity plays no role.

mod merge;
mod normalize;

pub use normalize::normalize_label;

use crate::adapter::AdapterInstance;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

/// Language tag → label
pub type LanguageMap = BTreeMap<String, String>;

/// Language tag → list of labels or notes
pub type LanguageListMap = BTreeMap<String, Vec<String>>;

/// What a catalog entry describes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Scheme,
    #[default]
    Concept,
    Mapping,
    Annotation,
    Concordance,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Scheme => "scheme",
            Self::Concept => "concept",
            Self::Mapping => "mapping",
            Self::Annotation => "annotation",
            Self::Concordance => "concordance",
        };
        f.write_str(name)
    }
}

/// A hint on where an entry can be served from (JSKOS `API` field).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApiHint {
    /// Protocol type URI, e.g. `http://bartoc.org/api-type/jskos`
    #[serde(rename = "type")]
    pub protocol_type: String,
    pub url: String,
}

impl ApiHint {
    pub fn new(protocol_type: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            protocol_type: protocol_type.into(),
            url: url.into(),
        }
    }
}

/// Non-owning back-reference from an entry to the adapter instance
/// that serves follow-up requests about it.
#[derive(Clone)]
pub struct OwnerRef(Weak<AdapterInstance>);

impl OwnerRef {
    pub fn new(instance: &Arc<AdapterInstance>) -> Self {
        Self(Arc::downgrade(instance))
    }

    /// A reference that never upgrades.
    pub fn dangling() -> Self {
        Self(Weak::new())
    }

    pub fn upgrade(&self) -> Option<Arc<AdapterInstance>> {
        self.0.upgrade()
    }

    pub fn is(&self, instance: &Arc<AdapterInstance>) -> bool {
        std::ptr::eq(self.0.as_ptr(), Arc::as_ptr(instance))
    }
}

impl std::fmt::Debug for OwnerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.upgrade() {
            Some(instance) => write!(f, "OwnerRef({})", instance.uri()),
            None => f.write_str("OwnerRef(<dropped>)"),
        }
    }
}

/// A normalized scheme, concept, mapping or annotation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(skip)]
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uri: String,
    /// Alias identifiers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notation: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pref_label: LanguageMap,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub alt_label: LanguageListMap,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub definition: LanguageListMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub in_scheme: Vec<CatalogEntry>,
    /// Top concepts of a scheme or narrower concepts of a concept.
    /// `None` means unknown, `Some(vec![])` means known to be empty.
    #[serde(
        default,
        alias = "topConcepts",
        alias = "narrower",
        deserialize_with = "entry_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub children: Option<Vec<CatalogEntry>>,
    #[serde(
        default,
        alias = "broader",
        deserialize_with = "entry_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub parents: Option<Vec<CatalogEntry>>,
    #[serde(default, rename = "API", skip_serializing_if = "Vec::is_empty")]
    pub api: Vec<ApiHint>,
    /// Fields this crate does not interpret (mapping members, dates, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(skip)]
    pub owner: Option<OwnerRef>,
    /// Finalized entries are never enriched again.
    #[serde(skip)]
    pub finalized: bool,
}

/// JSKOS uses `[null]` for "has members, not loaded". Null members become
/// empty placeholder entries so the list still counts as populated.
fn entry_list<'de, D>(deserializer: D) -> Result<Option<Vec<CatalogEntry>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<Option<CatalogEntry>>> = Option::deserialize(deserializer)?;
    Ok(raw.map(|items| items.into_iter().map(Option::unwrap_or_default).collect()))
}

impl CatalogEntry {
    pub fn new(kind: EntryKind, uri: impl Into<String>) -> Self {
        Self {
            kind,
            uri: uri.into(),
            ..Self::default()
        }
    }

    pub fn scheme(uri: impl Into<String>) -> Self {
        Self::new(EntryKind::Scheme, uri)
    }

    pub fn concept(uri: impl Into<String>) -> Self {
        Self::new(EntryKind::Concept, uri)
    }

    pub fn mapping(uri: impl Into<String>) -> Self {
        Self::new(EntryKind::Mapping, uri)
    }

    pub fn with_label(mut self, language: impl Into<String>, label: impl Into<String>) -> Self {
        self.pref_label.insert(language.into(), label.into());
        self
    }

    pub fn with_identifier(mut self, id: impl Into<String>) -> Self {
        self.identifier.push(id.into());
        self
    }

    pub fn with_notation(mut self, notation: impl Into<String>) -> Self {
        self.notation.push(notation.into());
        self
    }

    pub fn with_children(mut self, children: Vec<CatalogEntry>) -> Self {
        self.children = Some(children);
        self
    }

    pub fn with_api(mut self, hint: ApiHint) -> Self {
        self.api.push(hint);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Parse a JSON value into an entry of the given kind.
    pub fn from_json(kind: EntryKind, value: Value) -> Result<Self, serde_json::Error> {
        let mut entry: CatalogEntry = serde_json::from_value(value)?;
        entry.kind = kind;
        Ok(entry)
    }

    /// Primary URI followed by alias identifiers.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.uri.as_str())
            .filter(|uri| !uri.is_empty())
            .chain(self.identifier.iter().map(String::as_str))
    }

    /// Identifier equality: any shared URI or alias.
    pub fn same_as(&self, other: &CatalogEntry) -> bool {
        self.ids().any(|id| other.ids().any(|o| o == id))
    }

    /// 0 = unknown, 1 = known empty, 2 = populated.
    pub fn child_completeness(&self) -> u8 {
        match &self.children {
            None => 0,
            Some(children) if children.is_empty() => 1,
            Some(_) => 2,
        }
    }

    /// The adapter instance serving this entry, if resolved and alive.
    pub fn owner(&self) -> Option<Arc<AdapterInstance>> {
        self.owner.as_ref().and_then(OwnerRef::upgrade)
    }

    pub fn label(&self, languages: &[String]) -> Option<&str> {
        languages
            .iter()
            .find_map(|lang| self.pref_label.get(lang))
            .or_else(|| self.pref_label.values().next())
            .map(String::as_str)
    }
}

/// Items returned by one operation, with paging metadata.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub items: Vec<CatalogEntry>,
    /// Total number of matches at the source, not only in `items`
    pub total_count: u64,
    /// Canonical URL of the request that produced the items
    pub url: String,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn first(&self) -> Option<&CatalogEntry> {
        self.items.first()
    }

    pub fn uris(&self) -> Vec<&str> {
        self.items.iter().map(|e| e.uri.as_str()).collect()
    }
}

impl IntoIterator for ResultSet {
    type Item = CatalogEntry;
    type IntoIter = std::vec::IntoIter<CatalogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
