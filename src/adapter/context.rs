//! Per-call context handed to adapter operations

use crate::capability::Capability;
use crate::catalog::CatalogEntry;
use crate::error::FedResult;
use crate::pipeline::HttpClient;
use crate::source::{Endpoints, SourceDescriptor};
use crate::transport::{HttpRequest, HttpResponse};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Languages always appended after the preferred ones.
pub const DEFAULT_LANGUAGES: [&str; 11] = [
    "en", "de", "fr", "es", "nl", "it", "fi", "pl", "ru", "cs", "jp",
];

/// Language priority: preferred languages first, then the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Languages {
    preferred: Vec<String>,
}

impl Languages {
    pub fn new(preferred: Vec<String>) -> Self {
        Self { preferred }
    }

    pub fn set_preferred(&mut self, preferred: Vec<String>) {
        self.preferred = preferred;
    }

    /// Deduplicated priority list; empty entries are dropped.
    pub fn priority(&self) -> Vec<String> {
        let mut list: Vec<String> = Vec::new();
        let candidates = self
            .preferred
            .iter()
            .map(|lang| lang.trim())
            .chain(DEFAULT_LANGUAGES.iter().copied());
        for lang in candidates {
            if !lang.is_empty() && !list.iter().any(|l| l == lang) {
                list.push(lang.to_string());
            }
        }
        list
    }
}

/// Credentials attached to outgoing requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Auth {
    /// Identity key of the signed-in user
    pub key: Option<String>,
    /// Bearer token sent as `Authorization`
    pub bearer: Option<String>,
}

impl Auth {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            key: None,
            bearer: Some(token.into()),
        }
    }
}

/// What an adapter sees during one operation: resolved endpoints, the
/// shared HTTP client, the call's cancellation token, language priority
/// and credentials.
#[derive(Clone)]
pub struct CallContext {
    descriptor: Arc<SourceDescriptor>,
    endpoints: Endpoints,
    http: HttpClient,
    cancel: CancellationToken,
    languages: Vec<String>,
    auth: Auth,
    known_schemes: Vec<CatalogEntry>,
}

impl CallContext {
    pub fn new(
        descriptor: Arc<SourceDescriptor>,
        endpoints: Endpoints,
        http: HttpClient,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            descriptor,
            endpoints,
            http,
            cancel,
            languages: Languages::default().priority(),
            auth: Auth::default(),
            known_schemes: Vec::new(),
        }
    }

    pub fn with_languages(mut self, languages: Vec<String>) -> Self {
        self.languages = languages;
        self
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_known_schemes(mut self, schemes: Vec<CatalogEntry>) -> Self {
        self.known_schemes = schemes;
        self
    }

    pub fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    /// Endpoint URL for a capability, falling back to `api` + `default_path`.
    pub fn endpoint(&self, capability: Capability, default_path: &str) -> Option<String> {
        self.endpoints
            .get(capability)
            .map(str::to_string)
            .or_else(|| self.descriptor.api_url(default_path))
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    pub fn known_schemes(&self) -> &[CatalogEntry] {
        &self.known_schemes
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Send through the shared pipeline with language and auth headers.
    pub async fn send(&self, mut request: HttpRequest) -> FedResult<HttpResponse> {
        if !self.languages.is_empty() {
            request
                .headers
                .entry("accept-language".to_string())
                .or_insert_with(|| self.languages.join(","));
        }
        if let Some(token) = &self.auth.bearer {
            request
                .headers
                .insert("authorization".to_string(), format!("Bearer {token}"));
        }
        self.http.send(request, &self.cancel).await
    }
}
