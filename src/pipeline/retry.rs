//! Retry policy for idempotent requests

use crate::transport::{Method, TransportError};
use std::sync::Arc;
use std::time::Duration;

/// Delay before a retry, as a function of the retry count (1-based).
#[derive(Clone)]
pub enum Backoff {
    /// Same delay before every retry
    Fixed(Duration),
    /// `initial + increment * (retry - 1)`
    Linear { initial: Duration, increment: Duration },
    /// Caller-supplied; should not decrease with the retry count
    Custom(Arc<dyn Fn(u32) -> Duration + Send + Sync>),
}

impl Backoff {
    pub fn custom(f: impl Fn(u32) -> Duration + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }

    pub fn delay(&self, retry: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Linear { initial, increment } => {
                *initial + increment.saturating_mul(retry.saturating_sub(1))
            }
            Self::Custom(f) => f(retry),
        }
    }
}

impl std::fmt::Debug for Backoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed(delay) => f.debug_tuple("Fixed").field(delay).finish(),
            Self::Linear { initial, increment } => f
                .debug_struct("Linear")
                .field("initial", initial)
                .field("increment", increment)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Which failures are retried, how often, and how far apart.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub methods: Vec<Method>,
    pub statuses: Vec<u16>,
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            methods: vec![Method::Get, Method::Head, Method::Options],
            statuses: vec![429, 502, 503, 504],
            max_retries: 3,
            backoff: Backoff::Linear {
                initial: Duration::from_millis(300),
                increment: Duration::from_millis(300),
            },
        }
    }
}

impl RetryPolicy {
    /// Never retry.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_statuses(mut self, statuses: Vec<u16>) -> Self {
        self.statuses = statuses;
        self
    }

    /// Only upstream status failures on configured method+status pairs.
    pub fn should_retry(&self, method: Method, error: &TransportError) -> bool {
        match error {
            TransportError::Status { status, .. } => {
                self.methods.contains(&method) && self.statuses.contains(status)
            }
            _ => false,
        }
    }
}
