//! HTTP transport boundary
//!
//! Defines the request/response shapes the pipeline speaks and the
//! transport trait it drives. Two implementations:
//! - `ReqwestTransport`: real HTTP via reqwest (production)
//! - `MockTransport`: scripted replies and a call log (testing)

mod http;
mod mock;

pub use http::ReqwestTransport;
pub use mock::MockTransport;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Head,
    Options,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    /// URL without query parameters
    pub url: String,
    pub params: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            params: BTreeMap::new(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Base URL plus the parameters, sorted by key and percent-encoded.
    pub fn canonical_url(&self) -> String {
        if self.params.is_empty() {
            return self.url.clone();
        }
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.params.iter())
            .finish();
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", self.url, separator, query)
    }
}

/// A successful (2xx) response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are lowercase
    pub headers: BTreeMap<String, String>,
    pub body: Value,
    /// Canonical URL of the request, filled in by the pipeline
    pub url: String,
}

impl HttpResponse {
    pub fn json(body: Value) -> Self {
        Self {
            status: 200,
            headers: BTreeMap::new(),
            body,
            url: String::new(),
        }
    }

    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.insert(key.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(&key.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Transport-level failure, before classification.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    /// The backend answered with a non-2xx status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// The request went out but no response came back
    #[error("no response: {message}")]
    NoResponse { message: String },
    #[error("request aborted")]
    Cancelled,
    /// The request could not be built or the response not read
    #[error("transport error: {message}")]
    Other { message: String },
}

/// Sends requests. Must honor the cancellation token.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: HttpRequest,
        cancel: CancellationToken,
    ) -> Result<HttpResponse, TransportError>;
}

/// Request/response mutation hooks run around every transport call.
pub trait Interceptor: Send + Sync {
    fn on_request(&self, _request: &mut HttpRequest) {}

    fn on_response(&self, _response: &mut HttpResponse) {}
}

/// Ambient connectivity signal used to tell network errors from
/// unavailable backends.
pub trait Connectivity: Send + Sync {
    /// `None` if unknown
    fn is_online(&self) -> Option<bool>;
}

/// No connectivity signal available.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeOnline;

impl Connectivity for AssumeOnline {
    fn is_online(&self) -> Option<bool> {
        None
    }
}

/// A fixed connectivity answer.
#[derive(Debug, Clone, Copy)]
pub struct FixedConnectivity(pub bool);

impl Connectivity for FixedConnectivity {
    fn is_online(&self) -> Option<bool> {
        Some(self.0)
    }
}
