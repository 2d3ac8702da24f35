//! Source descriptors and the metadata probe result
//!
//! A descriptor is the configuration record of one backend. It is not
//! modified after an adapter instance is built from it; endpoint URLs
//! the descriptor leaves unset are completed into a separate
//! [`Endpoints`] table when the instance initializes.

use crate::capability::{Capability, CapabilitySet, CapabilityValue};
use crate::catalog::{CatalogEntry, LanguageListMap, LanguageMap};
use crate::error::{FedError, FedResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Configuration record of one source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDescriptor {
    /// Unique identifier of the source
    pub uri: String,
    /// Name of the adapter kind that serves this source
    pub provider: String,
    /// Base URL of the backend API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,
    /// Metadata probe URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Explicit endpoint URLs per capability
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub endpoints: BTreeMap<Capability, String>,
    /// Static list of schemes this source serves
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schemes: Option<Vec<CatalogEntry>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pref_label: LanguageMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notation: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub definition: LanguageListMap,
    /// Capability declarations that override the adapter kind's defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<CapabilitySet>,
}

impl SourceDescriptor {
    pub fn new(uri: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            provider: provider.into(),
            ..Self::default()
        }
    }

    pub fn with_api(mut self, api: impl Into<String>) -> Self {
        self.api = Some(api.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_endpoint(mut self, capability: Capability, url: impl Into<String>) -> Self {
        self.endpoints.insert(capability, url.into());
        self
    }

    pub fn with_schemes(mut self, schemes: Vec<CatalogEntry>) -> Self {
        self.schemes = Some(schemes);
        self
    }

    pub fn with_label(mut self, language: impl Into<String>, label: impl Into<String>) -> Self {
        self.pref_label.insert(language.into(), label.into());
        self
    }

    pub fn with_config(mut self, config: CapabilitySet) -> Self {
        self.config = Some(config);
        self
    }

    /// The `api` base joined with a relative path.
    pub fn api_url(&self, path: &str) -> Option<String> {
        let base = self.api.as_deref()?;
        Some(format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        ))
    }
}

/// Result of the metadata probe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusDocument {
    /// Endpoint URLs announced by the backend
    pub endpoints: BTreeMap<Capability, String>,
    /// Capability declarations announced by the backend
    pub config: CapabilitySet,
}

impl StatusDocument {
    /// Read a status document: top-level capability keys with string values
    /// are endpoints, `config` holds capability declarations. Unknown keys
    /// are ignored.
    pub fn from_json(value: &Value) -> FedResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| FedError::validation("status document is not a JSON object"))?;

        let mut doc = StatusDocument::default();
        for cap in Capability::ALL {
            if let Some(Value::String(url)) = object.get(cap.name()) {
                doc.endpoints.insert(cap, url.clone());
            }
        }
        if let Some(Value::Object(config)) = object.get("config") {
            for cap in Capability::ALL {
                if let Some(raw) = config.get(cap.name()) {
                    let value: CapabilityValue = serde_json::from_value(raw.clone())?;
                    doc.config.set(cap, value);
                }
            }
        }
        Ok(doc)
    }
}

/// Endpoint table of an initialized adapter instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoints(BTreeMap<Capability, String>);

impl Endpoints {
    /// Descriptor endpoints first; the status document fills the gaps.
    pub fn resolve(descriptor: &SourceDescriptor, status: Option<&StatusDocument>) -> Self {
        let mut table = descriptor.endpoints.clone();
        if let Some(status) = status {
            for (cap, url) in &status.endpoints {
                table.entry(*cap).or_insert_with(|| url.clone());
            }
        }
        Self(table)
    }

    pub fn get(&self, capability: Capability) -> Option<&str> {
        self.0.get(&capability).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
