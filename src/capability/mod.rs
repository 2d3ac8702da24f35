//! Capability model
//!
//! Every source declares which capabilities it offers. A capability is
//! either a plain flag or a per-action permission object. The set is
//! finalized when the owning adapter instance initializes and is
//! read-only afterwards.

mod auth;

pub use auth::{AuthCheck, User};

use crate::catalog::EntryKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The fixed vocabulary of capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    /// List concept schemes
    Schemes,
    /// List top concepts of a scheme
    Top,
    /// Look up concept details
    Data,
    /// List narrower concepts
    Narrower,
    /// List ancestor concepts
    Ancestors,
    /// Full-text concept search
    Search,
    /// Label suggestions
    Suggest,
    /// Concept types of a scheme
    Types,
    /// Mapping read/write
    Mappings,
    /// Annotation read/write
    Annotations,
    /// Concordance listing
    Concordances,
}

impl Capability {
    pub const ALL: [Capability; 11] = [
        Capability::Schemes,
        Capability::Top,
        Capability::Data,
        Capability::Narrower,
        Capability::Ancestors,
        Capability::Search,
        Capability::Suggest,
        Capability::Types,
        Capability::Mappings,
        Capability::Annotations,
        Capability::Concordances,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Schemes => "schemes",
            Self::Top => "top",
            Self::Data => "data",
            Self::Narrower => "narrower",
            Self::Ancestors => "ancestors",
            Self::Search => "search",
            Self::Suggest => "suggest",
            Self::Types => "types",
            Self::Mappings => "mappings",
            Self::Annotations => "annotations",
            Self::Concordances => "concordances",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What a caller wants to do with a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

/// Whether an action may touch entries created by another user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CrossUser {
    Flag(bool),
    /// Only these user URIs may act across users
    Users(Vec<String>),
}

impl Default for CrossUser {
    fn default() -> Self {
        Self::Flag(false)
    }
}

/// Authorization rule for one action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRule {
    #[serde(default)]
    pub auth: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identities: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_providers: Option<Vec<String>>,
    #[serde(default)]
    pub cross_user: CrossUser,
}

impl ActionRule {
    /// A rule open to everyone.
    pub fn open() -> Self {
        Self::default()
    }

    /// A rule requiring an authenticated caller.
    pub fn authenticated() -> Self {
        Self {
            auth: true,
            ..Self::default()
        }
    }

    pub fn with_identities(mut self, uris: Vec<String>) -> Self {
        self.identities = Some(uris);
        self
    }

    pub fn with_identity_providers(mut self, providers: Vec<String>) -> Self {
        self.identity_providers = Some(providers);
        self
    }

    pub fn with_cross_user(mut self, cross_user: CrossUser) -> Self {
        self.cross_user = cross_user;
        self
    }
}

/// Per-action permissions of a capability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPermissions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<ActionRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create: Option<ActionRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<ActionRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<ActionRule>,
    #[serde(default)]
    pub anonymous: bool,
}

impl ActionPermissions {
    /// Every action allowed without authentication.
    pub fn open() -> Self {
        Self {
            read: Some(ActionRule::open()),
            create: Some(ActionRule::open()),
            update: Some(ActionRule::open()),
            delete: Some(ActionRule::open()),
            anonymous: true,
        }
    }

    pub fn rule(&self, action: Action) -> Option<&ActionRule> {
        match action {
            Action::Read => self.read.as_ref(),
            Action::Create => self.create.as_ref(),
            Action::Update => self.update.as_ref(),
            Action::Delete => self.delete.as_ref(),
        }
    }
}

/// A declared capability: a flag or per-action permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CapabilityValue {
    Flag(bool),
    Actions(ActionPermissions),
}

/// The capabilities of one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    #[serde(flatten)]
    values: BTreeMap<Capability, CapabilityValue>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    offline: BTreeSet<EntryKind>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a set of capabilities as plain `true` flags.
    pub fn with_flags(capabilities: &[Capability]) -> Self {
        let mut set = Self::new();
        for cap in capabilities {
            set.set(*cap, CapabilityValue::Flag(true));
        }
        set
    }

    pub fn set(&mut self, capability: Capability, value: CapabilityValue) {
        self.values.insert(capability, value);
    }

    pub fn with(mut self, capability: Capability, value: CapabilityValue) -> Self {
        self.set(capability, value);
        self
    }

    pub fn get(&self, capability: Capability) -> Option<&CapabilityValue> {
        self.values.get(&capability)
    }

    /// True if the capability is declared in any enabled form.
    pub fn supports(&self, capability: Capability) -> bool {
        matches!(
            self.values.get(&capability),
            Some(CapabilityValue::Flag(true)) | Some(CapabilityValue::Actions(_))
        )
    }

    /// Enabled capabilities in vocabulary order.
    pub fn enabled(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|cap| self.supports(*cap))
            .collect()
    }

    /// Mark a data type as served synchronously from local storage.
    pub fn mark_offline(&mut self, kind: EntryKind) {
        self.offline.insert(kind);
    }

    pub fn is_offline(&self, kind: EntryKind) -> bool {
        self.offline.contains(&kind)
    }

    /// Overlay another set: its declarations replace ours.
    pub fn overlay(&mut self, other: &CapabilitySet) {
        for (cap, value) in &other.values {
            self.values.insert(*cap, value.clone());
        }
        self.offline.extend(other.offline.iter().copied());
    }
}
