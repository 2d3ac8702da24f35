//! Adapter contracts
//!
//! An `AdapterKind` describes a family of backends (what protocol it
//! speaks, what it can serve) and builds `Adapter`s for concrete sources.
//! An `Adapter` implements the operations. Every operation defaults to a
//! not-implemented error, so kinds only write what their backend offers.

use super::context::CallContext;
use super::operation::{Args, Operation};
use crate::capability::CapabilitySet;
use crate::catalog::{CatalogEntry, EntryKind};
use crate::error::{FedError, FedResult};
use crate::source::{SourceDescriptor, StatusDocument};
use crate::transport::HttpResponse;
use async_trait::async_trait;
use std::sync::Arc;

/// Shape of an adapter's raw result.
#[derive(Debug, Clone)]
pub enum Payload {
    Many(Vec<CatalogEntry>),
    One(CatalogEntry),
    Empty,
}

/// What an operation fetched, before pipeline normalization.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub payload: Payload,
    /// Backend-reported total (e.g. `X-Total-Count`)
    pub total_count: Option<u64>,
    pub url: Option<String>,
}

impl Fetched {
    pub fn many(items: Vec<CatalogEntry>) -> Self {
        Self {
            payload: Payload::Many(items),
            total_count: None,
            url: None,
        }
    }

    pub fn one(entry: CatalogEntry) -> Self {
        Self {
            payload: Payload::One(entry),
            total_count: None,
            url: None,
        }
    }

    pub fn empty() -> Self {
        Self {
            payload: Payload::Empty,
            total_count: None,
            url: None,
        }
    }

    /// Take URL and `X-Total-Count` from the response.
    pub fn from_response(response: &HttpResponse, payload: Payload) -> Self {
        Self {
            payload,
            total_count: response
                .header("x-total-count")
                .and_then(|v| v.trim().parse().ok()),
            url: Some(response.url.clone()),
        }
    }

    pub fn with_total(mut self, total: u64) -> Self {
        self.total_count = Some(total);
        self
    }
}

/// One backend, bound to one source descriptor.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Fetch the backend's metadata document, if it has one.
    async fn probe(&self, _cx: &CallContext) -> FedResult<Option<StatusDocument>> {
        Ok(None)
    }

    /// Reject arguments an operation cannot run with. Called before
    /// initialization and before any request goes out.
    fn validate(&self, operation: Operation, args: &Args) -> FedResult<()> {
        args.validate(operation)
    }

    async fn get_schemes(&self, _args: &Args, _cx: &CallContext) -> FedResult<Fetched> {
        Err(FedError::not_implemented(Operation::GetSchemes))
    }

    async fn get_top(&self, _args: &Args, _cx: &CallContext) -> FedResult<Fetched> {
        Err(FedError::not_implemented(Operation::GetTop))
    }

    async fn get_concepts(&self, _args: &Args, _cx: &CallContext) -> FedResult<Fetched> {
        Err(FedError::not_implemented(Operation::GetConcepts))
    }

    async fn get_narrower(&self, _args: &Args, _cx: &CallContext) -> FedResult<Fetched> {
        Err(FedError::not_implemented(Operation::GetNarrower))
    }

    async fn get_ancestors(&self, _args: &Args, _cx: &CallContext) -> FedResult<Fetched> {
        Err(FedError::not_implemented(Operation::GetAncestors))
    }

    async fn search(&self, _args: &Args, _cx: &CallContext) -> FedResult<Fetched> {
        Err(FedError::not_implemented(Operation::Search))
    }

    async fn suggest(&self, _args: &Args, _cx: &CallContext) -> FedResult<Fetched> {
        Err(FedError::not_implemented(Operation::Suggest))
    }

    async fn get_types(&self, _args: &Args, _cx: &CallContext) -> FedResult<Fetched> {
        Err(FedError::not_implemented(Operation::GetTypes))
    }

    async fn get_mappings(&self, _args: &Args, _cx: &CallContext) -> FedResult<Fetched> {
        Err(FedError::not_implemented(Operation::GetMappings))
    }

    async fn get_mapping(&self, _args: &Args, _cx: &CallContext) -> FedResult<Fetched> {
        Err(FedError::not_implemented(Operation::GetMapping))
    }

    async fn post_mapping(&self, _args: &Args, _cx: &CallContext) -> FedResult<Fetched> {
        Err(FedError::not_implemented(Operation::PostMapping))
    }

    async fn put_mapping(&self, _args: &Args, _cx: &CallContext) -> FedResult<Fetched> {
        Err(FedError::not_implemented(Operation::PutMapping))
    }

    async fn delete_mapping(&self, _args: &Args, _cx: &CallContext) -> FedResult<Fetched> {
        Err(FedError::not_implemented(Operation::DeleteMapping))
    }

    async fn get_annotations(&self, _args: &Args, _cx: &CallContext) -> FedResult<Fetched> {
        Err(FedError::not_implemented(Operation::GetAnnotations))
    }

    async fn post_annotation(&self, _args: &Args, _cx: &CallContext) -> FedResult<Fetched> {
        Err(FedError::not_implemented(Operation::PostAnnotation))
    }

    async fn delete_annotation(&self, _args: &Args, _cx: &CallContext) -> FedResult<Fetched> {
        Err(FedError::not_implemented(Operation::DeleteAnnotation))
    }

    async fn get_concordances(&self, _args: &Args, _cx: &CallContext) -> FedResult<Fetched> {
        Err(FedError::not_implemented(Operation::GetConcordances))
    }
}

/// Route an operation to the matching adapter method.
pub(crate) async fn dispatch(
    adapter: &dyn Adapter,
    operation: Operation,
    args: &Args,
    cx: &CallContext,
) -> FedResult<Fetched> {
    match operation {
        Operation::GetSchemes => adapter.get_schemes(args, cx).await,
        Operation::GetTop => adapter.get_top(args, cx).await,
        Operation::GetConcepts => adapter.get_concepts(args, cx).await,
        Operation::GetNarrower => adapter.get_narrower(args, cx).await,
        Operation::GetAncestors => adapter.get_ancestors(args, cx).await,
        Operation::Search => adapter.search(args, cx).await,
        Operation::Suggest => adapter.suggest(args, cx).await,
        Operation::GetTypes => adapter.get_types(args, cx).await,
        Operation::GetMappings => adapter.get_mappings(args, cx).await,
        Operation::GetMapping => adapter.get_mapping(args, cx).await,
        Operation::PostMapping => adapter.post_mapping(args, cx).await,
        Operation::PutMapping => adapter.put_mapping(args, cx).await,
        Operation::DeleteMapping => adapter.delete_mapping(args, cx).await,
        Operation::GetAnnotations => adapter.get_annotations(args, cx).await,
        Operation::PostAnnotation => adapter.post_annotation(args, cx).await,
        Operation::DeleteAnnotation => adapter.delete_annotation(args, cx).await,
        Operation::GetConcordances => adapter.get_concordances(args, cx).await,
    }
}

/// A registered family of backends.
pub trait AdapterKind: Send + Sync {
    /// Unique registry name, matched against `SourceDescriptor::provider`
    fn name(&self) -> &str;

    /// Protocol-type identifiers this kind can serve (for owner resolution)
    fn protocol_types(&self) -> &[&str] {
        &[]
    }

    /// Entry kinds this kind can serve
    fn data_types(&self) -> &[EntryKind];

    /// Operations the built adapters implement
    fn operations(&self) -> &[Operation];

    /// Capabilities before descriptor and status overlays
    fn capabilities(&self, descriptor: &SourceDescriptor) -> CapabilitySet;

    /// If true, a failed metadata probe fails initialization.
    fn probe_required(&self) -> bool {
        false
    }

    /// Descriptor for an endpoint discovered on an entry's API hints.
    fn descriptor_for_endpoint(&self, _url: &str, _entry: &CatalogEntry) -> Option<SourceDescriptor> {
        None
    }

    fn build(&self, descriptor: &SourceDescriptor) -> FedResult<Arc<dyn Adapter>>;

    fn implements(&self, operation: Operation) -> bool {
        self.operations().contains(&operation)
    }

    fn serves(&self, protocol_type: &str, data_type: EntryKind) -> bool {
        self.protocol_types().contains(&protocol_type) && self.data_types().contains(&data_type)
    }
}
