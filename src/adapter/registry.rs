//! Adapter kind registry
//!
//! Kinds are looked up by name when building configured sources, and by
//! protocol type and data type when resolving the owner of an entry.

use super::traits::AdapterKind;
use crate::catalog::EntryKind;
use crate::error::{FedError, FedResult};
use crate::source::SourceDescriptor;
use std::sync::Arc;

/// Registered adapter kinds, in registration order.
#[derive(Default)]
pub struct AdapterRegistry {
    kinds: Vec<Arc<dyn AdapterKind>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `jskos` and `memory` kinds.
    pub fn with_defaults() -> Self {
        Self {
            kinds: vec![
                Arc::new(super::jskos::JskosKind),
                Arc::new(super::memory::MemoryKind),
            ],
        }
    }

    /// Register a kind.
    ///
    /// Rejects a kind with an empty or duplicate name, no data types, or a
    /// default capability that none of its operations serves.
    pub fn register(&mut self, kind: Arc<dyn AdapterKind>) -> FedResult<()> {
        let name = kind.name();
        if name.trim().is_empty() {
            return Err(FedError::validation("adapter kind has no name"));
        }
        if self.get(name).is_some() {
            return Err(FedError::validation(format!(
                "adapter kind `{name}` is already registered"
            )));
        }
        if kind.data_types().is_empty() {
            return Err(FedError::validation(format!(
                "adapter kind `{name}` declares no data types"
            )));
        }
        let defaults = kind.capabilities(&SourceDescriptor::default());
        for capability in defaults.enabled() {
            let backed = kind
                .operations()
                .iter()
                .any(|op| op.capability() == capability);
            if !backed {
                return Err(FedError::validation(format!(
                    "adapter kind `{name}` declares `{capability}` but implements no operation for it"
                )));
            }
        }

        self.kinds.push(kind);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn AdapterKind>> {
        self.kinds.iter().find(|k| k.name() == name).cloned()
    }

    pub fn kinds(&self) -> &[Arc<dyn AdapterKind>] {
        &self.kinds
    }

    /// Kinds that speak `protocol_type` and serve `data_type`, in
    /// registration order.
    pub fn serving(&self, protocol_type: &str, data_type: EntryKind) -> Vec<Arc<dyn AdapterKind>> {
        self.kinds
            .iter()
            .filter(|k| k.serves(protocol_type, data_type))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{Adapter, Operation};
    use crate::capability::{Capability, CapabilitySet};
    use crate::error::ErrorKind;
    use async_trait::async_trait;

    struct Inert;

    #[async_trait]
    impl Adapter for Inert {}

    struct TestKind {
        name: &'static str,
        data_types: Vec<EntryKind>,
        operations: Vec<Operation>,
        capabilities: Vec<Capability>,
    }

    impl TestKind {
        fn valid(name: &'static str) -> Self {
            Self {
                name,
                data_types: vec![EntryKind::Scheme],
                operations: vec![Operation::GetSchemes],
                capabilities: vec![Capability::Schemes],
            }
        }
    }

    impl AdapterKind for TestKind {
        fn name(&self) -> &str {
            self.name
        }

        fn protocol_types(&self) -> &[&str] {
            &["urn:test:protocol"]
        }

        fn data_types(&self) -> &[EntryKind] {
            &self.data_types
        }

        fn operations(&self) -> &[Operation] {
            &self.operations
        }

        fn capabilities(&self, _descriptor: &SourceDescriptor) -> CapabilitySet {
            CapabilitySet::with_flags(&self.capabilities)
        }

        fn build(&self, _descriptor: &SourceDescriptor) -> FedResult<Arc<dyn Adapter>> {
            Ok(Arc::new(Inert))
        }
    }

    #[test]
    fn registers_valid_kind() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(TestKind::valid("test"))).unwrap();
        assert!(registry.get("test").is_some());
        assert_eq!(registry.serving("urn:test:protocol", EntryKind::Scheme).len(), 1);
        assert!(registry.serving("urn:test:protocol", EntryKind::Mapping).is_empty());
    }

    #[test]
    fn rejects_duplicate_and_empty_names() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(TestKind::valid("test"))).unwrap();

        let dup = registry.register(Arc::new(TestKind::valid("test"))).unwrap_err();
        assert_eq!(dup.kind(), ErrorKind::Validation);

        let empty = registry.register(Arc::new(TestKind::valid(" "))).unwrap_err();
        assert_eq!(empty.kind(), ErrorKind::Validation);
    }

    #[test]
    fn rejects_kind_without_data_types() {
        let mut kind = TestKind::valid("test");
        kind.data_types.clear();
        let err = AdapterRegistry::new().register(Arc::new(kind)).unwrap_err();
        assert!(err.message().contains("data types"));
    }

    #[test]
    fn rejects_capability_without_operation() {
        let mut kind = TestKind::valid("test");
        kind.capabilities.push(Capability::Search);
        let err = AdapterRegistry::new().register(Arc::new(kind)).unwrap_err();
        assert!(err.message().contains("search"));
    }

    #[test]
    fn built_in_kinds_pass_validation() {
        let mut registry = AdapterRegistry::new();
        for kind in AdapterRegistry::with_defaults().kinds() {
            registry.register(kind.clone()).unwrap();
        }
        assert!(registry.get("jskos").is_some());
        assert!(registry.get("memory").is_some());
    }
}
