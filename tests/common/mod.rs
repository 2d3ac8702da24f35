//! Shared fixtures for federation scenarios
//!
//! A scripted adapter kind whose sources answer from per-source scripts,
//! and a transport that records when each request went out.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use termfed::adapter::{Adapter, AdapterKind, AdapterRegistry, Args, CallContext, Fetched, Operation};
use termfed::capability::{Capability, CapabilitySet};
use termfed::catalog::{CatalogEntry, EntryKind};
use termfed::pipeline::HttpClient;
use termfed::source::SourceDescriptor;
use termfed::transport::{HttpRequest, HttpResponse, Transport, TransportError};
use termfed::{ErrorKind, FedError, FedResult, Federation};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const STUB_API_TYPE: &str = "http://example.org/api-type/stub";
const STUB_PROTOCOLS: [&str; 1] = [STUB_API_TYPE];
const STUB_OPERATIONS: [Operation; 2] = [Operation::GetSchemes, Operation::GetConcepts];

/// How one stub source answers.
#[derive(Clone, Default)]
pub struct Script {
    pub items: Vec<CatalogEntry>,
    pub delay: Duration,
    /// Fail every call with this HTTP status
    pub fail: Option<u16>,
}

impl Script {
    pub fn items(items: Vec<CatalogEntry>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(status: u16) -> Self {
        Self {
            fail: Some(status),
            ..Self::default()
        }
    }
}

/// Adapter kind answering from scripts keyed by source URI.
#[derive(Default)]
pub struct StubKind {
    scripts: Mutex<HashMap<String, Script>>,
    builds: AtomicUsize,
    calls: Arc<AtomicUsize>,
}

impl StubKind {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, uri: &str, script: Script) {
        self.scripts
            .lock()
            .unwrap()
            .insert(uri.to_string(), script);
    }

    /// Adapters built so far
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// Operation calls that reached an adapter
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AdapterKind for StubKind {
    fn name(&self) -> &str {
        "stub"
    }

    fn protocol_types(&self) -> &[&str] {
        &STUB_PROTOCOLS
    }

    fn data_types(&self) -> &[EntryKind] {
        &[EntryKind::Scheme, EntryKind::Concept]
    }

    fn operations(&self) -> &[Operation] {
        &STUB_OPERATIONS
    }

    fn capabilities(&self, _descriptor: &SourceDescriptor) -> CapabilitySet {
        CapabilitySet::with_flags(&[Capability::Schemes, Capability::Data])
    }

    fn descriptor_for_endpoint(&self, url: &str, entry: &CatalogEntry) -> Option<SourceDescriptor> {
        Some(SourceDescriptor::new(url, "stub").with_schemes(vec![entry.clone()]))
    }

    fn build(&self, descriptor: &SourceDescriptor) -> FedResult<Arc<dyn Adapter>> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&descriptor.uri)
            .cloned()
            .unwrap_or_default();
        Ok(Arc::new(StubAdapter {
            script,
            calls: Arc::clone(&self.calls),
        }))
    }
}

struct StubAdapter {
    script: Script,
    calls: Arc<AtomicUsize>,
}

impl StubAdapter {
    async fn answer(&self, kind: EntryKind) -> FedResult<Fetched> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.script.delay.is_zero() {
            tokio::time::sleep(self.script.delay).await;
        }
        if let Some(status) = self.script.fail {
            return Err(FedError::new(ErrorKind::Server, "scripted failure").with_status(status));
        }
        let items = self
            .script
            .items
            .iter()
            .cloned()
            .map(|mut item| {
                item.kind = kind;
                item
            })
            .collect();
        Ok(Fetched::many(items))
    }
}

#[async_trait]
impl Adapter for StubAdapter {
    async fn get_schemes(&self, _args: &Args, _cx: &CallContext) -> FedResult<Fetched> {
        self.answer(EntryKind::Scheme).await
    }

    async fn get_concepts(&self, _args: &Args, _cx: &CallContext) -> FedResult<Fetched> {
        self.answer(EntryKind::Concept).await
    }
}

/// Federation over stub sources, added in the given order.
pub fn federation(kind: &Arc<StubKind>, sources: &[&str], http: HttpClient) -> Federation {
    let mut registry = AdapterRegistry::new();
    registry.register(Arc::clone(kind) as Arc<dyn AdapterKind>).unwrap();
    let mut federation = Federation::new(Arc::new(registry), http);
    for uri in sources {
        federation.add_source(SourceDescriptor::new(*uri, "stub")).unwrap();
    }
    federation
}

/// Transport that answers every request with the same status and
/// records when each attempt arrived.
pub struct RecordingTransport {
    status: u16,
    body: serde_json::Value,
    attempts: Mutex<Vec<Instant>>,
}

impl RecordingTransport {
    pub fn failing(status: u16) -> Self {
        Self {
            status,
            body: serde_json::Value::Null,
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn ok(body: serde_json::Value) -> Self {
        Self {
            status: 200,
            body,
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(
        &self,
        _request: HttpRequest,
        cancel: CancellationToken,
    ) -> Result<HttpResponse, TransportError> {
        self.attempts.lock().unwrap().push(Instant::now());
        tokio::select! {
            _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            _ = tokio::time::sleep(Duration::from_millis(10)) => {}
        }
        if self.status >= 300 {
            return Err(TransportError::Status {
                status: self.status,
                body: String::new(),
            });
        }
        Ok(HttpResponse::json(self.body.clone()))
    }
}
