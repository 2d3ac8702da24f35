//! Local, in-memory mapping and annotation store
//!
//! Served synchronously from process memory but exposed through the same
//! pipeline as remote sources, so callers cannot tell the difference.

use super::context::CallContext;
use super::operation::{Args, Operation};
use super::traits::{Adapter, AdapterKind, Fetched};
use crate::capability::{ActionPermissions, Capability, CapabilitySet, CapabilityValue};
use crate::catalog::{CatalogEntry, EntryKind};
use crate::error::{ErrorKind, FedError, FedResult};
use crate::source::SourceDescriptor;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const OPERATIONS: [Operation; 8] = [
    Operation::GetMappings,
    Operation::GetMapping,
    Operation::PostMapping,
    Operation::PutMapping,
    Operation::DeleteMapping,
    Operation::GetAnnotations,
    Operation::PostAnnotation,
    Operation::DeleteAnnotation,
];

pub struct MemoryKind;

impl AdapterKind for MemoryKind {
    fn name(&self) -> &str {
        "memory"
    }

    fn data_types(&self) -> &[EntryKind] {
        &[EntryKind::Mapping, EntryKind::Annotation]
    }

    fn operations(&self) -> &[Operation] {
        &OPERATIONS
    }

    fn capabilities(&self, _descriptor: &SourceDescriptor) -> CapabilitySet {
        let mut set = CapabilitySet::new()
            .with(Capability::Mappings, CapabilityValue::Actions(ActionPermissions::open()))
            .with(Capability::Annotations, CapabilityValue::Actions(ActionPermissions::open()));
        set.mark_offline(EntryKind::Mapping);
        set.mark_offline(EntryKind::Annotation);
        set
    }

    fn build(&self, _descriptor: &SourceDescriptor) -> FedResult<Arc<dyn Adapter>> {
        Ok(Arc::new(MemoryAdapter::default()))
    }
}

#[derive(Default)]
pub struct MemoryAdapter {
    mappings: Mutex<Vec<CatalogEntry>>,
    annotations: Mutex<Vec<CatalogEntry>>,
}

fn not_found(kind: EntryKind, uri: &str) -> FedError {
    FedError::new(ErrorKind::Client, format!("{kind} {uri} not found")).with_status(404)
}

/// True if `uri` appears as a string anywhere inside `value`.
fn mentions(value: &Value, uri: &str) -> bool {
    match value {
        Value::String(s) => s == uri,
        Value::Array(items) => items.iter().any(|v| mentions(v, uri)),
        Value::Object(map) => map.values().any(|v| mentions(v, uri)),
        _ => false,
    }
}

fn matches_field(entry: &CatalogEntry, field: &str, wanted: Option<&String>) -> bool {
    match wanted {
        None => true,
        Some(uri) => entry.extra.get(field).is_some_and(|v| mentions(v, uri)),
    }
}

/// Stamp a new record with a URI and creation time.
fn stamp_new(mut entry: CatalogEntry, kind: EntryKind) -> CatalogEntry {
    entry.kind = kind;
    entry.owner = None;
    if entry.uri.is_empty() {
        entry.uri = format!("urn:uuid:{}", Uuid::new_v4());
    }
    entry
        .extra
        .entry("created")
        .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
    entry
}

impl MemoryAdapter {
    fn insert(store: &Mutex<Vec<CatalogEntry>>, entry: CatalogEntry) -> FedResult<CatalogEntry> {
        let mut items = store.lock().unwrap_or_else(|e| e.into_inner());
        if items.iter().any(|existing| existing.same_as(&entry)) {
            return Err(FedError::new(
                ErrorKind::Client,
                format!("{} {} already exists", entry.kind, entry.uri),
            )
            .with_status(409));
        }
        items.push(entry.clone());
        Ok(entry)
    }

    fn remove(store: &Mutex<Vec<CatalogEntry>>, entry: &CatalogEntry) -> FedResult<()> {
        let mut items = store.lock().unwrap_or_else(|e| e.into_inner());
        let pos = items
            .iter()
            .position(|existing| existing.same_as(entry))
            .ok_or_else(|| not_found(entry.kind, &entry.uri))?;
        items.remove(pos);
        Ok(())
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    async fn get_mappings(&self, args: &Args, _cx: &CallContext) -> FedResult<Fetched> {
        let params = args.query_params();
        let items: Vec<CatalogEntry> = self
            .mappings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|m| matches_field(m, "from", params.get("from")))
            .filter(|m| matches_field(m, "to", params.get("to")))
            .cloned()
            .collect();
        Ok(Fetched::many(items))
    }

    async fn get_mapping(&self, args: &Args, _cx: &CallContext) -> FedResult<Fetched> {
        let wanted = args.require_entry(Operation::GetMapping)?;
        self.mappings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|m| m.same_as(wanted))
            .cloned()
            .map(Fetched::one)
            .ok_or_else(|| not_found(EntryKind::Mapping, &wanted.uri))
    }

    async fn post_mapping(&self, args: &Args, _cx: &CallContext) -> FedResult<Fetched> {
        let entry = args
            .entry
            .clone()
            .ok_or_else(|| FedError::validation("postMapping requires a mapping"))?;
        let saved = Self::insert(&self.mappings, stamp_new(entry, EntryKind::Mapping))?;
        Ok(Fetched::one(saved))
    }

    async fn put_mapping(&self, args: &Args, _cx: &CallContext) -> FedResult<Fetched> {
        let entry = args.require_entry(Operation::PutMapping)?;
        let mut items = self.mappings.lock().unwrap_or_else(|e| e.into_inner());
        let existing = items
            .iter_mut()
            .find(|m| m.same_as(entry))
            .ok_or_else(|| not_found(EntryKind::Mapping, &entry.uri))?;

        let created = existing.extra.get("created").cloned();
        let mut updated = entry.clone();
        updated.kind = EntryKind::Mapping;
        updated.owner = None;
        if let Some(created) = created {
            updated.extra.insert("created".to_string(), created);
        }
        updated
            .extra
            .insert("modified".to_string(), Value::String(Utc::now().to_rfc3339()));
        *existing = updated.clone();
        Ok(Fetched::one(updated))
    }

    async fn delete_mapping(&self, args: &Args, _cx: &CallContext) -> FedResult<Fetched> {
        let entry = args.require_entry(Operation::DeleteMapping)?;
        Self::remove(&self.mappings, entry)?;
        Ok(Fetched::empty())
    }

    async fn get_annotations(&self, args: &Args, _cx: &CallContext) -> FedResult<Fetched> {
        let params = args.query_params();
        let items: Vec<CatalogEntry> = self
            .annotations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|a| matches_field(a, "target", params.get("target")))
            .cloned()
            .collect();
        Ok(Fetched::many(items))
    }

    async fn post_annotation(&self, args: &Args, _cx: &CallContext) -> FedResult<Fetched> {
        let entry = args
            .entry
            .clone()
            .ok_or_else(|| FedError::validation("postAnnotation requires an annotation"))?;
        let saved = Self::insert(&self.annotations, stamp_new(entry, EntryKind::Annotation))?;
        Ok(Fetched::one(saved))
    }

    async fn delete_annotation(&self, args: &Args, _cx: &CallContext) -> FedResult<Fetched> {
        let entry = args.require_entry(Operation::DeleteAnnotation)?;
        Self::remove(&self.annotations, entry)?;
        Ok(Fetched::empty())
    }
}
