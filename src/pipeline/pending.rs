//! In-flight request deduplication and cancellable calls
//!
//! Identical concurrent requests (same operation, same normalized
//! arguments) on one adapter instance share a single execution. The
//! execution is spawned when the first caller starts it, so it runs to
//! completion even if every handle is dropped. The shared slot is
//! released when the execution settles or when a caller cancels it, so
//! the next identical call starts fresh.

use crate::error::{ErrorKind, FedError, FedResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio_util::sync::CancellationToken;
use tracing::debug;

type SharedResult<T> = Shared<BoxFuture<'static, FedResult<T>>>;

/// Identity of a request for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    operation: &'static str,
    args: String,
}

impl RequestKey {
    /// `args` must already be normalized (stable key order, no empty values).
    pub fn new(operation: &'static str, args: String) -> Self {
        Self { operation, args }
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

struct Slot<T> {
    generation: u64,
    future: SharedResult<T>,
    cancel: CancellationToken,
}

/// Table of in-flight requests for one adapter instance.
pub struct PendingRequests<T> {
    slots: DashMap<RequestKey, Slot<T>>,
    next_generation: AtomicU64,
}

impl<T> Default for PendingRequests<T> {
    fn default() -> Self {
        Self {
            slots: DashMap::new(),
            next_generation: AtomicU64::new(0),
        }
    }
}

impl<T> PendingRequests<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Join an identical in-flight request, or start `work` under a fresh
    /// slot. `work` receives the token that cancels the shared execution.
    ///
    /// A caller-supplied `cancel` token is only adopted when this call
    /// starts the execution; joiners share the starter's token. Must be
    /// called within a tokio runtime.
    pub fn join_or_start<F, Fut>(
        self: &Arc<Self>,
        key: RequestKey,
        cancel: Option<CancellationToken>,
        work: F,
    ) -> PendingCall<T>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = FedResult<T>> + Send + 'static,
    {
        match self.slots.entry(key.clone()) {
            Entry::Occupied(slot) => {
                debug!(operation = key.operation, "joining in-flight request");
                let slot = slot.get();
                PendingCall {
                    future: slot.future.clone(),
                    cancel: slot.cancel.clone(),
                    release: Some(Release {
                        table: Arc::downgrade(self),
                        key,
                        generation: slot.generation,
                    }),
                }
            }
            Entry::Vacant(vacant) => {
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                let token = cancel.unwrap_or_default();
                let release = Release {
                    table: Arc::downgrade(self),
                    key,
                    generation,
                };

                let inner = work(token.clone());
                let settle = release.clone();
                let watch = token.clone();
                let task = tokio::spawn(async move {
                    let result = tokio::select! {
                        biased;
                        _ = watch.cancelled() => Err(FedError::cancelled()),
                        result = inner => result,
                    };
                    settle.run();
                    result
                });
                let abandoned = release.clone();
                let future = async move {
                    match task.await {
                        Ok(result) => result,
                        Err(err) => {
                            abandoned.run();
                            Err(FedError::new(ErrorKind::Generic, "request task failed").caused_by(err))
                        }
                    }
                }
                .boxed()
                .shared();

                vacant.insert(Slot {
                    generation,
                    future: future.clone(),
                    cancel: token.clone(),
                });
                PendingCall {
                    future,
                    cancel: token,
                    release: Some(release),
                }
            }
        }
    }

    /// Number of requests currently in flight.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn remove(&self, key: &RequestKey, generation: u64) {
        self.slots.remove_if(key, |_, slot| slot.generation == generation);
    }
}

struct Release<T> {
    table: Weak<PendingRequests<T>>,
    key: RequestKey,
    generation: u64,
}

impl<T> Clone for Release<T> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            key: self.key.clone(),
            generation: self.generation,
        }
    }
}

impl<T> Release<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn run(&self) {
        if let Some(table) = self.table.upgrade() {
            table.remove(&self.key, self.generation);
        }
    }
}

/// Handle to a (possibly shared) in-flight request.
///
/// Await it for the result. [`PendingCall::cancel`] aborts the shared
/// execution for every caller awaiting it and frees the dedup slot at once.
#[must_use = "a pending call does nothing unless awaited"]
pub struct PendingCall<T: Clone> {
    future: SharedResult<T>,
    cancel: CancellationToken,
    release: Option<Release<T>>,
}

impl<T> PendingCall<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// A call that failed before reaching any backend.
    pub fn failed(error: FedError) -> Self {
        Self {
            future: futures::future::ready(Err(error)).boxed().shared(),
            cancel: CancellationToken::new(),
            release: None,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
        if let Some(release) = &self.release {
            release.run();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token that cancels this call.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl<T: Clone> Future for PendingCall<T> {
    type Output = FedResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().future).poll(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn key(args: &str) -> RequestKey {
        RequestKey::new("getSchemes", args.to_string())
    }

    fn slow_work(
        counter: Arc<AtomicUsize>,
        value: u32,
    ) -> impl FnOnce(CancellationToken) -> BoxFuture<'static, FedResult<u32>> {
        move |_token| {
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(value)
            }
            .boxed()
        }
    }

    // === Scenario: identical concurrent calls share one execution ===

    #[tokio::test(start_paused = true)]
    async fn identical_requests_execute_once() {
        let pending = PendingRequests::<u32>::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let a = pending.join_or_start(key("{}"), None, slow_work(runs.clone(), 7));
        let b = pending.join_or_start(key("{}"), None, slow_work(runs.clone(), 8));
        assert_eq!(pending.len(), 1);

        let (a, b) = tokio::join!(a, b);
        assert_eq!(a.unwrap(), 7);
        assert_eq!(b.unwrap(), 7);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(pending.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn different_args_do_not_share() {
        let pending = PendingRequests::<u32>::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let a = pending.join_or_start(key(r#"{"limit":1}"#), None, slow_work(runs.clone(), 1));
        let b = pending.join_or_start(key(r#"{"limit":2}"#), None, slow_work(runs.clone(), 2));

        let (a, b) = tokio::join!(a, b);
        assert_eq!((a.unwrap(), b.unwrap()), (1, 2));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn settled_request_frees_slot_for_fresh_call() {
        let pending = PendingRequests::<u32>::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let first = pending.join_or_start(key("{}"), None, slow_work(runs.clone(), 1));
        assert_eq!(first.await.unwrap(), 1);

        let second = pending.join_or_start(key("{}"), None, slow_work(runs.clone(), 2));
        assert_eq!(second.await.unwrap(), 2);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    // === Scenario: cancellation reaches every joined caller ===

    #[tokio::test(start_paused = true)]
    async fn cancel_aborts_shared_execution_and_frees_slot() {
        let pending = PendingRequests::<u32>::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let a = pending.join_or_start(key("{}"), None, slow_work(runs.clone(), 1));
        let b = pending.join_or_start(key("{}"), None, slow_work(runs.clone(), 1));

        a.cancel();
        assert!(pending.is_empty(), "cancel removes the slot immediately");

        let err = b.await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(a.await.unwrap_err().is_cancelled());

        let fresh = pending.join_or_start(key("{}"), None, slow_work(runs.clone(), 3));
        assert_eq!(fresh.await.unwrap(), 3);
    }

    #[tokio::test]
    async fn caller_token_is_adopted_by_starter() {
        let pending = PendingRequests::<u32>::new();
        let token = CancellationToken::new();
        let call = pending.join_or_start(key("{}"), Some(token.clone()), |t| async move {
            t.cancelled().await;
            Ok(0)
        });

        token.cancel();
        assert!(call.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn failed_call_resolves_immediately() {
        let call = PendingCall::<u32>::failed(FedError::validation("missing search"));
        let err = call.await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    // === Scenario: dropped handles still settle their slot ===

    #[tokio::test(start_paused = true)]
    async fn dropped_calls_run_and_release_their_slots() {
        let pending = PendingRequests::<u32>::new();
        let runs = Arc::new(AtomicUsize::new(0));

        for i in 0..10 {
            drop(pending.join_or_start(key(&format!("{{\"from\":\"x{i}\"}}")), None, slow_work(runs.clone(), i)));
        }
        assert_eq!(pending.len(), 10);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(pending.is_empty());
        assert_eq!(runs.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_caller_does_not_leak_slot() {
        let pending = PendingRequests::<u32>::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let call = pending.join_or_start(key("{}"), None, slow_work(runs.clone(), 1));
        let timed_out = tokio::time::timeout(Duration::from_millis(10), call).await;
        assert!(timed_out.is_err());
        assert_eq!(pending.len(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(pending.is_empty());
    }
}
