//! Request pipeline shared by all adapters
//!
//! Everything between an adapter building a request and a caller
//! receiving a normalized result:
//! - `HttpClient`: interceptors, bounded retry with backoff, error classification
//! - `PendingRequests` / `PendingCall`: in-flight deduplication and cancellation
//! - `EnrichmentRegistry`: post-processing of returned entries

mod classify;
mod client;
mod enrichment;
mod pending;
mod retry;

pub use classify::classify;
pub use client::{HttpClient, HttpClientBuilder};
pub use enrichment::{Enrichment, EnrichmentRegistry, NestedOwnerLinks};
pub use pending::{PendingCall, PendingRequests, RequestKey};
pub use retry::{Backoff, RetryPolicy};
