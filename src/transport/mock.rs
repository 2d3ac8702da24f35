//! Scripted transport for tests and offline demos

use super::{HttpRequest, HttpResponse, Method, Transport, TransportError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

type Reply = Result<HttpResponse, TransportError>;

/// Mock transport: replies are scripted per method and URL.
///
/// Replies queued for the same route are returned in order; the last one
/// repeats once the queue is down to it. Unscripted routes answer 404.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    calls: Mutex<Vec<HttpRequest>>,
    latency: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every reply by `latency` (observes cancellation meanwhile).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue a reply for a route.
    pub fn reply(self, method: Method, url: impl Into<String>, reply: Reply) -> Self {
        self.routes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry((method, url.into()))
            .or_default()
            .push_back(reply);
        self
    }

    pub fn ok_json(self, method: Method, url: impl Into<String>, body: Value) -> Self {
        self.reply(method, url, Ok(HttpResponse::json(body)))
    }

    pub fn fail_status(self, method: Method, url: impl Into<String>, status: u16) -> Self {
        self.reply(
            method,
            url,
            Err(TransportError::Status {
                status,
                body: format!("mock status {status}"),
            }),
        )
    }

    /// Every request that reached the transport, in order.
    pub fn calls(&self) -> Vec<HttpRequest> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|req| req.url == url)
            .count()
    }

    fn next_reply(&self, method: Method, url: &str) -> Reply {
        let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
        match routes.get_mut(&(method, url.to_string())) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(not_found),
            Some(queue) => queue.front().cloned().unwrap_or_else(not_found),
            None => not_found(),
        }
    }
}

fn not_found() -> Reply {
    Err(TransportError::Status {
        status: 404,
        body: "no mock reply scripted".to_string(),
    })
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        request: HttpRequest,
        cancel: CancellationToken,
    ) -> Result<HttpResponse, TransportError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        if let Some(latency) = self.latency {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                _ = tokio::time::sleep(latency) => {}
            }
        }
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        self.next_reply(request.method, &request.url)
    }
}
