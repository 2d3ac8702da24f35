//! Adapter instances: one per source
//!
//! An instance binds an adapter kind to a source descriptor and owns the
//! per-source state: the memoized initialization (status probe, endpoint
//! table, capability set), in-flight request table, language priority,
//! credentials, and the known-schemes list. Every operation goes through
//! [`AdapterInstance::call`], which applies the shared pipeline.

use super::context::{Auth, CallContext, Languages};
use super::operation::{Args, Operation};
use super::traits::{dispatch, Adapter, AdapterKind, Fetched, Payload};
use crate::capability::{AuthCheck, CapabilitySet, User};
use crate::catalog::{CatalogEntry, OwnerRef, ResultSet};
use crate::error::{FedError, FedResult};
use crate::pipeline::{EnrichmentRegistry, HttpClient, PendingCall, PendingRequests};
use crate::source::{Endpoints, SourceDescriptor};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome of the one-time initialization.
#[derive(Debug, Clone)]
struct InitState {
    endpoints: Endpoints,
    capabilities: CapabilitySet,
}

pub struct AdapterInstance {
    descriptor: Arc<SourceDescriptor>,
    kind: Arc<dyn AdapterKind>,
    adapter: Arc<dyn Adapter>,
    http: HttpClient,
    priority: usize,
    init: OnceCell<FedResult<InitState>>,
    pending: Arc<PendingRequests<ResultSet>>,
    enrichments: Arc<EnrichmentRegistry>,
    languages: RwLock<Languages>,
    auth: RwLock<Auth>,
    known_schemes: Mutex<Vec<CatalogEntry>>,
}

impl AdapterInstance {
    /// Build the kind's adapter for `descriptor`. No network traffic
    /// happens until the first call.
    pub fn new(
        kind: Arc<dyn AdapterKind>,
        descriptor: SourceDescriptor,
        http: HttpClient,
    ) -> FedResult<Self> {
        let adapter = kind.build(&descriptor)?;
        let known_schemes = descriptor.schemes.clone().unwrap_or_default();
        Ok(Self {
            descriptor: Arc::new(descriptor),
            kind,
            adapter,
            http,
            priority: 0,
            init: OnceCell::new(),
            pending: PendingRequests::new(),
            enrichments: Arc::new(EnrichmentRegistry::with_defaults()),
            languages: RwLock::new(Languages::default()),
            auth: RwLock::new(Auth::default()),
            known_schemes: Mutex::new(known_schemes),
        })
    }

    /// Lower wins when merging equally complete duplicates.
    pub fn with_priority(mut self, priority: usize) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_enrichments(mut self, enrichments: Arc<EnrichmentRegistry>) -> Self {
        self.enrichments = enrichments;
        self
    }

    pub fn with_languages(self, preferred: Vec<String>) -> Self {
        self.set_languages(preferred);
        self
    }

    pub fn uri(&self) -> &str {
        &self.descriptor.uri
    }

    pub fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    pub fn kind(&self) -> &Arc<dyn AdapterKind> {
        &self.kind
    }

    pub fn priority(&self) -> usize {
        self.priority
    }

    pub fn set_languages(&self, preferred: Vec<String>) {
        self.languages
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .set_preferred(preferred);
    }

    /// Effective language priority list.
    pub fn languages(&self) -> Vec<String> {
        self.languages
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .priority()
    }

    pub fn set_auth(&self, auth: Auth) {
        *self.auth.write().unwrap_or_else(|e| e.into_inner()) = auth;
    }

    pub fn auth(&self) -> Auth {
        self.auth.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn known_schemes(&self) -> Vec<CatalogEntry> {
        self.known_schemes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Add a scheme unless an identical one is already known.
    pub fn add_known_scheme(&self, scheme: CatalogEntry) -> bool {
        let mut schemes = self.known_schemes.lock().unwrap_or_else(|e| e.into_inner());
        if schemes.iter().any(|known| known.same_as(&scheme)) {
            return false;
        }
        schemes.push(scheme);
        true
    }

    /// Number of distinct requests currently in flight.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Run initialization if it has not run yet. Concurrent callers share
    /// one run; the outcome (success or error) is memoized.
    pub async fn initialize(&self) -> FedResult<()> {
        self.init_state().await.map(|_| ())
    }

    pub fn is_initialized(&self) -> bool {
        self.init.initialized()
    }

    /// Effective capabilities; initializes first.
    pub async fn capabilities(&self) -> FedResult<CapabilitySet> {
        Ok(self.init_state().await?.capabilities.clone())
    }

    /// True if the kind implements the operation and the initialized
    /// source declares its capability.
    pub async fn supports(&self, operation: Operation) -> bool {
        if !self.kind.implements(operation) {
            return false;
        }
        match self.init_state().await {
            Ok(state) => state.capabilities.supports(operation.capability()),
            Err(_) => false,
        }
    }

    /// Whether `user` may perform `operation` here. False before
    /// initialization has completed successfully.
    pub fn is_authorized(&self, operation: Operation, user: Option<&User>, cross_user: bool) -> bool {
        let Some(Ok(state)) = self.init.get() else {
            return false;
        };
        let mut check = AuthCheck::new(operation.capability(), operation.action());
        if let Some(user) = user {
            check = check.by(user);
        }
        if cross_user {
            check = check.across_users();
        }
        state.capabilities.is_authorized(&check)
    }

    async fn init_state(&self) -> FedResult<&InitState> {
        self.init
            .get_or_init(|| self.run_init())
            .await
            .as_ref()
            .map_err(Clone::clone)
    }

    async fn run_init(&self) -> FedResult<InitState> {
        let cx = self.context(Endpoints::resolve(&self.descriptor, None), CancellationToken::new());
        let status = match self.adapter.probe(&cx).await {
            Ok(status) => status,
            Err(err) if !self.kind.probe_required() => {
                warn!(source = %self.uri(), error = %err, "status probe failed, continuing without it");
                None
            }
            Err(err) => {
                warn!(source = %self.uri(), error = %err, "required status probe failed");
                return Err(err);
            }
        };

        let endpoints = Endpoints::resolve(&self.descriptor, status.as_ref());
        let mut capabilities = self.kind.capabilities(&self.descriptor);
        if let Some(status) = &status {
            capabilities.overlay(&status.config);
        }
        if let Some(config) = &self.descriptor.config {
            capabilities.overlay(config);
        }

        info!(
            source = %self.uri(),
            kind = self.kind.name(),
            endpoints = endpoints.len(),
            capabilities = ?capabilities.enabled(),
            "source initialized"
        );
        Ok(InitState {
            endpoints,
            capabilities,
        })
    }

    fn context(&self, endpoints: Endpoints, cancel: CancellationToken) -> CallContext {
        CallContext::new(Arc::clone(&self.descriptor), endpoints, self.http.clone(), cancel)
            .with_languages(self.languages())
            .with_auth(self.auth())
            .with_known_schemes(self.known_schemes())
    }

    /// Run an operation through the pipeline.
    ///
    /// Operations the kind does not implement and invalid arguments fail
    /// immediately, before initialization. Identical
    /// concurrent calls share one execution. Cancel with
    /// [`PendingCall::cancel`] or a token in `args.cancel`.
    pub fn call(self: &Arc<Self>, operation: Operation, args: Args) -> PendingCall<ResultSet> {
        if !self.kind.implements(operation) {
            return PendingCall::failed(FedError::not_implemented(operation));
        }
        if let Err(err) = self.adapter.validate(operation, &args) {
            return PendingCall::failed(err);
        }
        let key = match args.request_key(operation) {
            Ok(key) => key,
            Err(err) => return PendingCall::failed(err),
        };
        let cancel = args.cancel.clone();
        let this = Arc::clone(self);
        self.pending.join_or_start(key, cancel, move |token| async move {
            this.execute(operation, args, token).await
        })
    }

    async fn execute(
        self: Arc<Self>,
        operation: Operation,
        args: Args,
        token: CancellationToken,
    ) -> FedResult<ResultSet> {
        let state = self.init_state().await?;
        if !state.capabilities.supports(operation.capability()) {
            return Err(FedError::not_implemented(operation));
        }
        debug!(source = %self.uri(), operation = operation.name(), "dispatching");
        let cx = self.context(state.endpoints.clone(), token);
        let fetched = dispatch(self.adapter.as_ref(), operation, &args, &cx).await?;
        Ok(self.finish(fetched))
    }

    /// Normalize a raw result: labels, total count, owner links, enrichments.
    fn finish(self: &Arc<Self>, fetched: Fetched) -> ResultSet {
        let (mut items, default_total) = match fetched.payload {
            Payload::Many(items) => {
                let len = items.len() as u64;
                (items, len)
            }
            Payload::One(entry) => (vec![entry], 1),
            Payload::Empty => (Vec::new(), 0),
        };

        let owner = OwnerRef::new(self);
        for item in &mut items {
            if item.finalized {
                continue;
            }
            item.normalize_labels();
            self.enrichments.apply(item, &owner);
        }

        ResultSet {
            items,
            total_count: fetched.total_count.unwrap_or(default_total),
            url: fetched.url.unwrap_or_default(),
        }
    }

    pub fn get_schemes(self: &Arc<Self>, args: Args) -> PendingCall<ResultSet> {
        self.call(Operation::GetSchemes, args)
    }

    pub fn get_top(self: &Arc<Self>, args: Args) -> PendingCall<ResultSet> {
        self.call(Operation::GetTop, args)
    }

    pub fn get_concepts(self: &Arc<Self>, args: Args) -> PendingCall<ResultSet> {
        self.call(Operation::GetConcepts, args)
    }

    pub fn get_narrower(self: &Arc<Self>, args: Args) -> PendingCall<ResultSet> {
        self.call(Operation::GetNarrower, args)
    }

    pub fn get_ancestors(self: &Arc<Self>, args: Args) -> PendingCall<ResultSet> {
        self.call(Operation::GetAncestors, args)
    }

    pub fn search(self: &Arc<Self>, args: Args) -> PendingCall<ResultSet> {
        self.call(Operation::Search, args)
    }

    pub fn suggest(self: &Arc<Self>, args: Args) -> PendingCall<ResultSet> {
        self.call(Operation::Suggest, args)
    }

    pub fn get_types(self: &Arc<Self>, args: Args) -> PendingCall<ResultSet> {
        self.call(Operation::GetTypes, args)
    }

    pub fn get_mappings(self: &Arc<Self>, args: Args) -> PendingCall<ResultSet> {
        self.call(Operation::GetMappings, args)
    }

    pub fn get_mapping(self: &Arc<Self>, args: Args) -> PendingCall<ResultSet> {
        self.call(Operation::GetMapping, args)
    }

    pub fn post_mapping(self: &Arc<Self>, args: Args) -> PendingCall<ResultSet> {
        self.call(Operation::PostMapping, args)
    }

    pub fn put_mapping(self: &Arc<Self>, args: Args) -> PendingCall<ResultSet> {
        self.call(Operation::PutMapping, args)
    }

    pub fn delete_mapping(self: &Arc<Self>, args: Args) -> PendingCall<ResultSet> {
        self.call(Operation::DeleteMapping, args)
    }

    pub fn get_annotations(self: &Arc<Self>, args: Args) -> PendingCall<ResultSet> {
        self.call(Operation::GetAnnotations, args)
    }

    pub fn post_annotation(self: &Arc<Self>, args: Args) -> PendingCall<ResultSet> {
        self.call(Operation::PostAnnotation, args)
    }

    pub fn delete_annotation(self: &Arc<Self>, args: Args) -> PendingCall<ResultSet> {
        self.call(Operation::DeleteAnnotation, args)
    }

    pub fn get_concordances(self: &Arc<Self>, args: Args) -> PendingCall<ResultSet> {
        self.call(Operation::GetConcordances, args)
    }
}

impl std::fmt::Debug for AdapterInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterInstance")
            .field("uri", &self.descriptor.uri)
            .field("kind", &self.kind.name())
            .field("priority", &self.priority)
            .finish()
    }
}

/// Lazy accessors: follow-up requests routed to the entry's owner.
impl CatalogEntry {
    fn owning_instance(&self) -> FedResult<Arc<AdapterInstance>> {
        self.owner().ok_or_else(|| {
            FedError::validation(format!("entry {} has no owning source", self.uri))
        })
    }

    fn as_subject(&self) -> CatalogEntry {
        let mut subject = self.clone();
        subject.owner = None;
        subject.children = None;
        subject.parents = None;
        subject
    }

    pub async fn load_narrower(&self) -> FedResult<ResultSet> {
        self.owning_instance()?
            .get_narrower(Args::for_entry(self.as_subject()))
            .await
    }

    pub async fn load_ancestors(&self) -> FedResult<ResultSet> {
        self.owning_instance()?
            .get_ancestors(Args::for_entry(self.as_subject()))
            .await
    }

    /// Top concepts of a scheme.
    pub async fn load_top(&self) -> FedResult<ResultSet> {
        self.owning_instance()?
            .get_top(Args::for_entry(self.as_subject()))
            .await
    }

    /// Full record of this entry from its owner.
    pub async fn load_details(&self) -> FedResult<Option<CatalogEntry>> {
        let result = self
            .owning_instance()?
            .get_concepts(Args::for_entries(vec![self.as_subject()]))
            .await?;
        Ok(result.into_iter().find(|entry| entry.same_as(self)))
    }
}
