//! Adapter layer
//!
//! Adapter kinds translate the uniform operation vocabulary into
//! backend-specific requests. Each configured (or discovered) source is an
//! `AdapterInstance` wrapping one adapter with the shared request pipeline.

mod cache;
mod context;
mod instance;
pub mod jskos;
pub mod memory;
mod operation;
mod registry;
mod traits;

pub use cache::{BoundedCache, DEFAULT_CACHE_CAPACITY};
pub use context::{Auth, CallContext, Languages, DEFAULT_LANGUAGES};
pub use instance::AdapterInstance;
pub use jskos::{JskosKind, JSKOS_API_TYPE};
pub use memory::MemoryKind;
pub use operation::{Args, Operation};
pub use registry::AdapterRegistry;
pub use traits::{Adapter, AdapterKind, Fetched, Payload};
