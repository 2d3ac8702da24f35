//! JSKOS API adapter
//!
//! Speaks the JSKOS API (`/status`, `/voc`, `/data`, `/narrower`, ...).
//! Endpoint URLs come from the descriptor, then from the status document,
//! then from `api` plus the conventional path.

use super::cache::BoundedCache;
use super::context::CallContext;
use super::operation::{Args, Operation};
use super::traits::{Adapter, AdapterKind, Fetched, Payload};
use crate::capability::{ActionPermissions, ActionRule, Capability, CapabilitySet, CapabilityValue};
use crate::catalog::{CatalogEntry, EntryKind};
use crate::error::{ErrorKind, FedError, FedResult};
use crate::source::{SourceDescriptor, StatusDocument};
use crate::transport::{HttpRequest, HttpResponse, Method};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Protocol-type identifier of JSKOS API endpoints in API hints.
pub const JSKOS_API_TYPE: &str = "http://bartoc.org/api-type/jskos";

const OPERATIONS: [Operation; 15] = [
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
    Operation::GetConcordances,
];

pub struct JskosKind;

impl AdapterKind for JskosKind {
    fn name(&self) -> &str {
        "jskos"
    }

    fn protocol_types(&self) -> &[&str] {
        &[JSKOS_API_TYPE]
    }

    fn data_types(&self) -> &[EntryKind] {
        &[
            EntryKind::Scheme,
            EntryKind::Concept,
            EntryKind::Mapping,
            EntryKind::Annotation,
            EntryKind::Concordance,
        ]
    }

    fn operations(&self) -> &[Operation] {
        &OPERATIONS
    }

    fn capabilities(&self, _descriptor: &SourceDescriptor) -> CapabilitySet {
        let mappings = ActionPermissions {
            read: Some(ActionRule::open()),
            create: Some(ActionRule::authenticated()),
            update: Some(ActionRule::authenticated()),
            delete: Some(ActionRule::authenticated()),
            anonymous: false,
        };
        let annotations = ActionPermissions {
            read: Some(ActionRule::open()),
            ..ActionPermissions::default()
        };
        CapabilitySet::with_flags(&[
            Capability::Schemes,
            Capability::Top,
            Capability::Data,
            Capability::Narrower,
            Capability::Ancestors,
            Capability::Search,
            Capability::Suggest,
            Capability::Types,
            Capability::Concordances,
        ])
        .with(Capability::Mappings, CapabilityValue::Actions(mappings))
        .with(Capability::Annotations, CapabilityValue::Actions(annotations))
    }

    fn descriptor_for_endpoint(&self, url: &str, entry: &CatalogEntry) -> Option<SourceDescriptor> {
        if url.trim().is_empty() {
            return None;
        }
        let mut scheme = entry.clone();
        scheme.owner = None;
        Some(
            SourceDescriptor::new(url, self.name())
                .with_api(url)
                .with_schemes(vec![scheme]),
        )
    }

    fn build(&self, descriptor: &SourceDescriptor) -> FedResult<Arc<dyn Adapter>> {
        if descriptor.api.is_none() && descriptor.endpoints.is_empty() {
            return Err(FedError::validation(format!(
                "jskos source {} needs an `api` base URL or explicit endpoints",
                descriptor.uri
            )));
        }
        Ok(Arc::new(JskosAdapter::default()))
    }
}

/// Adapter for one JSKOS API. Caches concept details.
#[derive(Default)]
pub struct JskosAdapter {
    details: Mutex<BoundedCache<String, CatalogEntry>>,
}

impl JskosAdapter {
    fn endpoint(cx: &CallContext, capability: Capability, path: &str) -> FedResult<String> {
        cx.endpoint(capability, path).ok_or_else(|| {
            FedError::validation(format!(
                "source {} has no `{capability}` endpoint",
                cx.descriptor().uri
            ))
        })
    }

    async fn list(
        &self,
        cx: &CallContext,
        capability: Capability,
        path: &str,
        params: BTreeMap<String, String>,
        kind: EntryKind,
    ) -> FedResult<Fetched> {
        let mut request = HttpRequest::get(Self::endpoint(cx, capability, path)?);
        request.params = params;
        let response = cx.send(request).await?;
        let items = parse_entries(&response.body, kind)?;
        Ok(Fetched::from_response(&response, Payload::Many(items)))
    }

    /// Params with the subject entry's URI under `uri`.
    fn subject_params(args: &Args, operation: Operation) -> FedResult<BTreeMap<String, String>> {
        let entry = args.require_entry(operation)?;
        let mut params = args.query_params();
        params.insert("uri".to_string(), entry.uri.clone());
        Ok(params)
    }

    fn cached(&self, uri: &str) -> Option<CatalogEntry> {
        self.details
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&uri.to_string())
            .cloned()
    }

    fn remember(&self, entries: &[CatalogEntry]) {
        let mut cache = self.details.lock().unwrap_or_else(|e| e.into_inner());
        for entry in entries.iter().filter(|e| !e.uri.is_empty()) {
            cache.insert(entry.uri.clone(), entry.clone());
        }
    }

    /// Mapping URIs served by this API live under the mappings endpoint.
    fn mapping_url(cx: &CallContext, args: &Args, operation: Operation) -> FedResult<String> {
        let entry = args.require_entry(operation)?;
        let base = Self::endpoint(cx, Capability::Mappings, "mappings")?;
        let prefix = format!("{}/", base.trim_end_matches('/'));
        if entry.uri.starts_with(&prefix) {
            Ok(entry.uri.clone())
        } else {
            Err(FedError::validation(format!(
                "mapping {} does not belong to {}",
                entry.uri, base
            )))
        }
    }

    fn single(response: &HttpResponse, kind: EntryKind) -> FedResult<Fetched> {
        let entry = CatalogEntry::from_json(kind, response.body.clone())?;
        Ok(Fetched::from_response(response, Payload::One(entry)))
    }
}

fn parse_entries(body: &Value, kind: EntryKind) -> FedResult<Vec<CatalogEntry>> {
    match body {
        Value::Array(items) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(|item| CatalogEntry::from_json(kind, item.clone()).map_err(FedError::from))
            .collect(),
        Value::Null => Ok(Vec::new()),
        _ => Err(FedError::new(
            ErrorKind::Generic,
            "expected a JSON array of entries",
        )),
    }
}

/// OpenSearch suggestions: `[query, [labels], [descriptions], [uris]]`.
fn parse_suggestions(body: &Value) -> Option<Vec<CatalogEntry>> {
    let parts = body.as_array()?;
    if parts.len() < 4 || !parts[0].is_string() {
        return None;
    }
    let labels = parts[1].as_array()?;
    let uris = parts[3].as_array()?;
    Some(
        labels
            .iter()
            .zip(uris)
            .filter_map(|(label, uri)| {
                let uri = uri.as_str()?;
                let mut entry = CatalogEntry::concept(uri);
                if let Some(label) = label.as_str() {
                    entry.pref_label.insert("und".to_string(), label.to_string());
                }
                Some(entry)
            })
            .collect(),
    )
}

#[async_trait]
impl Adapter for JskosAdapter {
    async fn probe(&self, cx: &CallContext) -> FedResult<Option<StatusDocument>> {
        let descriptor = cx.descriptor();
        let Some(url) = descriptor
            .status
            .clone()
            .or_else(|| descriptor.api_url("status"))
        else {
            return Ok(None);
        };
        let response = cx.send(HttpRequest::get(url)).await?;
        StatusDocument::from_json(&response.body).map(Some)
    }

    async fn get_schemes(&self, args: &Args, cx: &CallContext) -> FedResult<Fetched> {
        self.list(cx, Capability::Schemes, "voc", args.query_params(), EntryKind::Scheme)
            .await
    }

    async fn get_top(&self, args: &Args, cx: &CallContext) -> FedResult<Fetched> {
        let params = Self::subject_params(args, Operation::GetTop)?;
        self.list(cx, Capability::Top, "voc/top", params, EntryKind::Concept)
            .await
    }

    async fn get_concepts(&self, args: &Args, cx: &CallContext) -> FedResult<Fetched> {
        let requested: Vec<&CatalogEntry> = args
            .entries
            .iter()
            .chain(args.entry.iter())
            .filter(|e| !e.uri.is_empty())
            .collect();
        if requested.is_empty() {
            return Err(FedError::validation("getConcepts requires at least one entry"));
        }

        let mut found = Vec::new();
        let mut missing = Vec::new();
        for entry in requested {
            match self.cached(&entry.uri) {
                Some(hit) => found.push(hit),
                None => missing.push(entry.uri.clone()),
            }
        }
        if missing.is_empty() {
            debug!(count = found.len(), "concept details served from cache");
            return Ok(Fetched::many(found));
        }

        let mut params = args.query_params();
        params.insert("uri".to_string(), missing.join("|"));
        let fetched = self
            .list(cx, Capability::Data, "data", params, EntryKind::Concept)
            .await?;
        let Payload::Many(items) = fetched.payload else {
            return Ok(Fetched::many(found));
        };
        self.remember(&items);
        found.extend(items);
        Ok(Fetched {
            payload: Payload::Many(found),
            total_count: None,
            url: fetched.url,
        })
    }

    async fn get_narrower(&self, args: &Args, cx: &CallContext) -> FedResult<Fetched> {
        let params = Self::subject_params(args, Operation::GetNarrower)?;
        self.list(cx, Capability::Narrower, "narrower", params, EntryKind::Concept)
            .await
    }

    async fn get_ancestors(&self, args: &Args, cx: &CallContext) -> FedResult<Fetched> {
        let params = Self::subject_params(args, Operation::GetAncestors)?;
        self.list(cx, Capability::Ancestors, "ancestors", params, EntryKind::Concept)
            .await
    }

    async fn search(&self, args: &Args, cx: &CallContext) -> FedResult<Fetched> {
        args.require_param(Operation::Search, "search")?;
        let mut params = args.query_params();
        if let Some(scheme) = &args.entry {
            params.insert("voc".to_string(), scheme.uri.clone());
        }
        self.list(cx, Capability::Search, "search", params, EntryKind::Concept)
            .await
    }

    async fn suggest(&self, args: &Args, cx: &CallContext) -> FedResult<Fetched> {
        args.require_param(Operation::Suggest, "search")?;
        let mut params = args.query_params();
        if let Some(scheme) = &args.entry {
            params.insert("voc".to_string(), scheme.uri.clone());
        }
        let mut request = HttpRequest::get(Self::endpoint(cx, Capability::Suggest, "suggest")?);
        request.params = params;
        let response = cx.send(request).await?;
        let items = match parse_suggestions(&response.body) {
            Some(items) => items,
            None => parse_entries(&response.body, EntryKind::Concept)?,
        };
        Ok(Fetched::from_response(&response, Payload::Many(items)))
    }

    async fn get_types(&self, args: &Args, cx: &CallContext) -> FedResult<Fetched> {
        let params = Self::subject_params(args, Operation::GetTypes)?;
        self.list(cx, Capability::Types, "types", params, EntryKind::Concept)
            .await
    }

    async fn get_mappings(&self, args: &Args, cx: &CallContext) -> FedResult<Fetched> {
        self.list(cx, Capability::Mappings, "mappings", args.query_params(), EntryKind::Mapping)
            .await
    }

    async fn get_mapping(&self, args: &Args, cx: &CallContext) -> FedResult<Fetched> {
        let url = Self::mapping_url(cx, args, Operation::GetMapping)?;
        let response = cx.send(HttpRequest::get(url)).await?;
        Self::single(&response, EntryKind::Mapping)
    }

    async fn post_mapping(&self, args: &Args, cx: &CallContext) -> FedResult<Fetched> {
        let entry = args
            .entry
            .as_ref()
            .ok_or_else(|| FedError::validation("postMapping requires a mapping"))?;
        let url = Self::endpoint(cx, Capability::Mappings, "mappings")?;
        let request = HttpRequest::new(Method::Post, url).json(serde_json::to_value(entry)?);
        let response = cx.send(request).await?;
        Self::single(&response, EntryKind::Mapping)
    }

    async fn put_mapping(&self, args: &Args, cx: &CallContext) -> FedResult<Fetched> {
        let url = Self::mapping_url(cx, args, Operation::PutMapping)?;
        let body = serde_json::to_value(args.require_entry(Operation::PutMapping)?)?;
        let response = cx.send(HttpRequest::new(Method::Put, url).json(body)).await?;
        Self::single(&response, EntryKind::Mapping)
    }

    async fn delete_mapping(&self, args: &Args, cx: &CallContext) -> FedResult<Fetched> {
        let url = Self::mapping_url(cx, args, Operation::DeleteMapping)?;
        let response = cx.send(HttpRequest::new(Method::Delete, url)).await?;
        Ok(Fetched::from_response(&response, Payload::Empty))
    }

    async fn get_annotations(&self, args: &Args, cx: &CallContext) -> FedResult<Fetched> {
        self.list(cx, Capability::Annotations, "annotations", args.query_params(), EntryKind::Annotation)
            .await
    }

    async fn get_concordances(&self, args: &Args, cx: &CallContext) -> FedResult<Fetched> {
        self.list(cx, Capability::Concordances, "concordances", args.query_params(), EntryKind::Concordance)
            .await
    }
}
