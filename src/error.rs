//! Error taxonomy shared by every adapter, the request pipeline and the
//! federation engine.
//!
//! One error type, tagged by [`ErrorKind`]. Transport failures are
//! classified exactly once at the pipeline boundary; everything above it
//! passes a `FedError` through unchanged.

use crate::adapter::Operation;
use std::sync::Arc;
use thiserror::Error;

/// Classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ErrorKind {
    /// Bad or missing caller-supplied parameter
    #[error("validation error")]
    Validation,
    /// The source does not offer the requested operation
    #[error("not implemented")]
    NotImplemented,
    /// Upstream answered 4xx
    #[error("client error")]
    Client,
    /// Upstream answered 5xx
    #[error("server error")]
    Server,
    /// Request went out but nothing came back while connectivity looked fine
    #[error("backend unavailable")]
    BackendUnavailable,
    /// Request went out but nothing came back and connectivity is absent
    #[error("network error")]
    Network,
    /// The caller cancelled the request
    #[error("cancelled")]
    Cancelled,
    /// Anything else
    #[error("error")]
    Generic,
}

/// The single error type of this crate.
///
/// `Clone` so a deduplicated in-flight result can be handed to every
/// caller that awaited it.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct FedError {
    kind: ErrorKind,
    message: String,
    status: Option<u16>,
    #[source]
    cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

/// Result type for federation operations
pub type FedResult<T> = Result<T, FedError>;

impl FedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            cause: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn not_implemented(operation: Operation) -> Self {
        Self::new(
            ErrorKind::NotImplemented,
            format!("{} is not supported by this source", operation.name()),
        )
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "request was cancelled")
    }

    /// Wrap a foreign error as a generic failure.
    pub fn wrap(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::new(ErrorKind::Generic, err.to_string()).caused_by(err)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn caused_by(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// The original error this one was classified from, if any.
    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }
}

impl From<serde_json::Error> for FedError {
    fn from(err: serde_json::Error) -> Self {
        Self::wrap(err)
    }
}
