//! Operation vocabulary and call arguments

use crate::capability::{Action, Capability};
use crate::catalog::{CatalogEntry, EntryKind};
use crate::error::{FedError, FedResult};
use crate::pipeline::RequestKey;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

/// Every operation an adapter may implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    GetSchemes,
    GetTop,
    GetConcepts,
    GetNarrower,
    GetAncestors,
    Search,
    Suggest,
    GetTypes,
    GetMappings,
    GetMapping,
    PostMapping,
    PutMapping,
    DeleteMapping,
    GetAnnotations,
    PostAnnotation,
    DeleteAnnotation,
    GetConcordances,
}

impl Operation {
    pub const ALL: [Operation; 17] = [
        Operation::GetSchemes,
        Operation::GetTop,
        Operation::GetConcepts,
        Operation::GetNarrower,
        Operation::GetAncestors,
        Operation::Search,
        Operation::Suggest,
        Operation::GetTypes,
        Operation::GetMappings,
        Operation::GetMapping,
        Operation::PostMapping,
        Operation::PutMapping,
        Operation::DeleteMapping,
        Operation::GetAnnotations,
        Operation::PostAnnotation,
        Operation::DeleteAnnotation,
        Operation::GetConcordances,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::GetSchemes => "getSchemes",
            Self::GetTop => "getTop",
            Self::GetConcepts => "getConcepts",
            Self::GetNarrower => "getNarrower",
            Self::GetAncestors => "getAncestors",
            Self::Search => "search",
            Self::Suggest => "suggest",
            Self::GetTypes => "getTypes",
            Self::GetMappings => "getMappings",
            Self::GetMapping => "getMapping",
            Self::PostMapping => "postMapping",
            Self::PutMapping => "putMapping",
            Self::DeleteMapping => "deleteMapping",
            Self::GetAnnotations => "getAnnotations",
            Self::PostAnnotation => "postAnnotation",
            Self::DeleteAnnotation => "deleteAnnotation",
            Self::GetConcordances => "getConcordances",
        }
    }

    /// Capability a source must declare for this operation.
    pub fn capability(&self) -> Capability {
        match self {
            Self::GetSchemes => Capability::Schemes,
            Self::GetTop => Capability::Top,
            Self::GetConcepts => Capability::Data,
            Self::GetNarrower => Capability::Narrower,
            Self::GetAncestors => Capability::Ancestors,
            Self::Search => Capability::Search,
            Self::Suggest => Capability::Suggest,
            Self::GetTypes => Capability::Types,
            Self::GetMappings
            | Self::GetMapping
            | Self::PostMapping
            | Self::PutMapping
            | Self::DeleteMapping => Capability::Mappings,
            Self::GetAnnotations | Self::PostAnnotation | Self::DeleteAnnotation => {
                Capability::Annotations
            }
            Self::GetConcordances => Capability::Concordances,
        }
    }

    pub fn action(&self) -> Action {
        match self {
            Self::PostMapping | Self::PostAnnotation => Action::Create,
            Self::PutMapping => Action::Update,
            Self::DeleteMapping | Self::DeleteAnnotation => Action::Delete,
            _ => Action::Read,
        }
    }

    /// Kind of the entries this operation returns.
    pub fn entry_kind(&self) -> EntryKind {
        match self.capability() {
            Capability::Schemes => EntryKind::Scheme,
            Capability::Mappings => EntryKind::Mapping,
            Capability::Annotations => EntryKind::Annotation,
            Capability::Concordances => EntryKind::Concordance,
            _ => EntryKind::Concept,
        }
    }

    /// The listing operation for an entry kind, used by federated listing.
    pub fn listing_for(kind: EntryKind) -> Operation {
        match kind {
            EntryKind::Scheme => Self::GetSchemes,
            EntryKind::Concept => Self::GetConcepts,
            EntryKind::Mapping => Self::GetMappings,
            EntryKind::Annotation => Self::GetAnnotations,
            EntryKind::Concordance => Self::GetConcordances,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Arguments of one operation call.
///
/// `entry` is the subject (concept, scheme, mapping); `entries` is used by
/// batch lookups; `params` carries everything else (`search`, `limit`,
/// `offset`, filters).
#[derive(Debug, Clone, Default, Serialize)]
pub struct Args {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<CatalogEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<CatalogEntry>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Value>,
    #[serde(skip)]
    pub cancel: Option<CancellationToken>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_entry(entry: CatalogEntry) -> Self {
        Self {
            entry: Some(entry),
            ..Self::default()
        }
    }

    pub fn for_entries(entries: Vec<CatalogEntry>) -> Self {
        Self {
            entries,
            ..Self::default()
        }
    }

    pub fn with_entry(mut self, entry: CatalogEntry) -> Self {
        self.entry = Some(entry);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// A parameter rendered as a query string value.
    pub fn param_str(&self, key: &str) -> Option<String> {
        self.params.get(key).and_then(query_value)
    }

    /// All non-empty parameters rendered as query string values.
    pub fn query_params(&self) -> BTreeMap<String, String> {
        self.params
            .iter()
            .filter_map(|(key, value)| query_value(value).map(|v| (key.clone(), v)))
            .collect()
    }

    /// The subject entry, or a validation error naming the operation.
    pub fn require_entry(&self, operation: Operation) -> FedResult<&CatalogEntry> {
        self.entry
            .as_ref()
            .filter(|entry| !entry.uri.is_empty())
            .ok_or_else(|| FedError::validation(format!("{operation} requires an entry with a URI")))
    }

    /// A non-empty string parameter, or a validation error.
    pub fn require_param(&self, operation: Operation, key: &str) -> FedResult<String> {
        self.param_str(key)
            .ok_or_else(|| FedError::validation(format!("{operation} requires the `{key}` parameter")))
    }

    /// Check the arguments an operation cannot run without. Runs before
    /// initialization or any network call.
    pub fn validate(&self, operation: Operation) -> FedResult<()> {
        match operation {
            Operation::GetTop
            | Operation::GetNarrower
            | Operation::GetAncestors
            | Operation::GetTypes
            | Operation::GetMapping
            | Operation::PutMapping
            | Operation::DeleteMapping
            | Operation::DeleteAnnotation => self.require_entry(operation).map(|_| ()),
            Operation::Search | Operation::Suggest => self.require_param(operation, "search").map(|_| ()),
            Operation::GetConcepts => {
                let any = self
                    .entries
                    .iter()
                    .chain(self.entry.iter())
                    .any(|e| !e.uri.is_empty());
                if any {
                    Ok(())
                } else {
                    Err(FedError::validation(format!("{operation} requires at least one entry")))
                }
            }
            Operation::PostMapping | Operation::PostAnnotation => match self.entry {
                Some(_) => Ok(()),
                None => Err(FedError::validation(format!("{operation} requires an entry"))),
            },
            Operation::GetSchemes
            | Operation::GetMappings
            | Operation::GetAnnotations
            | Operation::GetConcordances => Ok(()),
        }
    }

    /// Dedup identity: operation plus arguments with empty values dropped.
    pub fn request_key(&self, operation: Operation) -> FedResult<RequestKey> {
        let mut normalized = self.clone();
        normalized.params.retain(|_, value| !is_empty_value(value));
        let args = serde_json::to_string(&normalized)?;
        Ok(RequestKey::new(operation.name(), args))
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Strings as-is, scalars via `to_string`, arrays joined by `|`.
fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(query_value).collect();
            (!parts.is_empty()).then(|| parts.join("|"))
        }
        Value::Object(_) => Some(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn every_operation_maps_to_its_capability() {
        assert_eq!(Operation::GetConcepts.capability(), Capability::Data);
        assert_eq!(Operation::DeleteMapping.capability(), Capability::Mappings);
        assert_eq!(Operation::DeleteMapping.action(), Action::Delete);
        assert_eq!(Operation::GetTop.entry_kind(), EntryKind::Concept);
        assert_eq!(Operation::GetSchemes.entry_kind(), EntryKind::Scheme);
        for op in Operation::ALL {
            assert!(!op.name().is_empty());
        }
    }

    #[test]
    fn request_key_ignores_empty_params() {
        let a = Args::new().with_param("search", "music").with_param("voc", Value::Null);
        let b = Args::new().with_param("search", "music").with_param("offset", "");
        assert_eq!(
            a.request_key(Operation::Search).unwrap(),
            b.request_key(Operation::Search).unwrap()
        );

        let c = Args::new().with_param("search", "dance");
        assert_ne!(
            a.request_key(Operation::Search).unwrap(),
            c.request_key(Operation::Search).unwrap()
        );
        assert_ne!(
            a.request_key(Operation::Search).unwrap(),
            a.request_key(Operation::Suggest).unwrap()
        );
    }

    #[test]
    fn query_params_render_values() {
        let args = Args::new()
            .with_param("limit", 10)
            .with_param("uri", json!(["a", "b"]))
            .with_param("empty", "");
        let params = args.query_params();
        assert_eq!(params["limit"], "10");
        assert_eq!(params["uri"], "a|b");
        assert!(!params.contains_key("empty"));
    }

    #[test]
    fn missing_entry_is_a_validation_error() {
        let err = Args::new().require_entry(Operation::GetNarrower).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.message().contains("getNarrower"));
    }

    #[test]
    fn validate_checks_required_arguments() {
        let concept = CatalogEntry::concept("http://example.org/c");

        assert!(Args::new().validate(Operation::GetSchemes).is_ok());
        assert!(Args::new().validate(Operation::GetNarrower).is_err());
        assert!(Args::for_entry(concept.clone()).validate(Operation::GetNarrower).is_ok());

        let search = Args::new().with_param("search", "").validate(Operation::Search).unwrap_err();
        assert_eq!(search.kind(), ErrorKind::Validation);
        assert!(Args::new().with_param("search", "music").validate(Operation::Suggest).is_ok());

        assert!(Args::new().validate(Operation::GetConcepts).is_err());
        assert!(Args::for_entries(vec![concept]).validate(Operation::GetConcepts).is_ok());
        assert!(Args::new().validate(Operation::PostMapping).is_err());
    }
}
