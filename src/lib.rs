//! termfed: federated access to terminology services
//!
//! Uniform adapters over heterogeneous vocabulary backends, a shared
//! request pipeline, and a federation engine that merges what several
//! sources return into one catalog.
//!
//! # Core Concepts
//!
//! - **Sources**: configured backends, each served by an adapter kind
//! - **Catalog entries**: schemes, concepts, mappings, annotations and
//!   concordances, each linked back to the source that serves it
//! - **Pipeline**: retry, classification, dedup, cancellation and
//!   normalization shared by every adapter
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use termfed::{AdapterRegistry, Federation, HttpClient, MockTransport, SourceDescriptor};
//!
//! let http = HttpClient::new(Arc::new(MockTransport::new()));
//! let mut federation = Federation::new(Arc::new(AdapterRegistry::with_defaults()), http);
//! federation.add_source(SourceDescriptor::new("urn:local", "memory")).unwrap();
//! assert_eq!(federation.sources().len(), 1);
//! ```

pub mod adapter;
pub mod capability;
pub mod catalog;
pub mod config;
mod error;
pub mod federation;
pub mod pipeline;
pub mod repeat;
pub mod source;
pub mod transport;

pub use adapter::{
    Adapter, AdapterInstance, AdapterKind, AdapterRegistry, Args, Auth, CallContext, Fetched,
    Operation, Payload,
};
pub use capability::{Action, Capability, CapabilitySet, CapabilityValue, User};
pub use catalog::{ApiHint, CatalogEntry, EntryKind, ResultSet};
pub use config::{ConfigError, FederationConfig};
pub use error::{ErrorKind, FedError, FedResult};
pub use federation::Federation;
pub use pipeline::{HttpClient, PendingCall, RetryPolicy};
pub use repeat::{Repeat, RepeatOptions};
pub use source::{SourceDescriptor, StatusDocument};
pub use transport::{MockTransport, ReqwestTransport, Transport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
