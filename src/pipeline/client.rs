//! HTTP client: interceptors, retry with backoff, classification

use super::classify::classify;
use super::retry::RetryPolicy;
use crate::error::{FedError, FedResult};
use crate::transport::{AssumeOnline, Connectivity, HttpRequest, HttpResponse, Interceptor, Transport};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

struct ClientInner {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    connectivity: Arc<dyn Connectivity>,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

/// Shared HTTP client used by every adapter. Cheap to clone.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<ClientInner>,
}

/// Builder for [`HttpClient`].
pub struct HttpClientBuilder {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    connectivity: Arc<dyn Connectivity>,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl HttpClientBuilder {
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn connectivity(mut self, connectivity: Arc<dyn Connectivity>) -> Self {
        self.connectivity = connectivity;
        self
    }

    pub fn interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn build(self) -> HttpClient {
        HttpClient {
            inner: Arc::new(ClientInner {
                transport: self.transport,
                retry: self.retry,
                connectivity: self.connectivity,
                interceptors: self.interceptors,
            }),
        }
    }
}

impl HttpClient {
    /// Client with the default retry policy and no connectivity signal.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::builder(transport).build()
    }

    pub fn builder(transport: Arc<dyn Transport>) -> HttpClientBuilder {
        HttpClientBuilder {
            transport,
            retry: RetryPolicy::default(),
            connectivity: Arc::new(AssumeOnline),
            interceptors: Vec::new(),
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.inner.retry
    }

    /// Send a request.
    ///
    /// Retries configured method+status failures with backoff, classifies
    /// the final failure, and stamps the canonical request URL on success.
    pub async fn send(
        &self,
        mut request: HttpRequest,
        cancel: &CancellationToken,
    ) -> FedResult<HttpResponse> {
        for interceptor in &self.inner.interceptors {
            interceptor.on_request(&mut request);
        }
        let url = request.canonical_url();
        let policy = &self.inner.retry;
        let mut retries = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(FedError::cancelled());
            }

            let attempt = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FedError::cancelled()),
                result = self.inner.transport.send(request.clone(), cancel.clone()) => result,
            };

            match attempt {
                Ok(mut response) => {
                    response.url = url;
                    for interceptor in &self.inner.interceptors {
                        interceptor.on_response(&mut response);
                    }
                    return Ok(response);
                }
                Err(err) if retries < policy.max_retries && policy.should_retry(request.method, &err) => {
                    retries += 1;
                    let delay = policy.backoff.delay(retries);
                    warn!(
                        method = %request.method,
                        url = %url,
                        retry = retries,
                        delay_ms = delay.as_millis() as u64,
                        "retrying request: {}",
                        err
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(FedError::cancelled()),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(err) => {
                    debug!(method = %request.method, url = %url, "request failed: {}", err);
                    return Err(classify(err, self.inner.connectivity.as_ref()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::pipeline::Backoff;
    use crate::transport::{Method, MockTransport};
    use serde_json::json;
    use std::time::Duration;

    const VOC: &str = "https://example.org/voc";

    struct TagRequests;

    impl Interceptor for TagRequests {
        fn on_request(&self, request: &mut HttpRequest) {
            request.headers.insert("x-client".into(), "termfed".into());
        }

        fn on_response(&self, response: &mut HttpResponse) {
            response.headers.insert("x-seen".into(), "1".into());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_then_succeeds() {
        let transport = Arc::new(
            MockTransport::new()
                .fail_status(Method::Get, VOC, 503)
                .fail_status(Method::Get, VOC, 503)
                .ok_json(Method::Get, VOC, json!([])),
        );
        let client = HttpClient::new(transport.clone());

        let response = client
            .send(HttpRequest::get(VOC).param("limit", "5"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(transport.call_count(), 3);
        assert_eq!(response.url, "https://example.org/voc?limit=5");
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_propagate_classified_error() {
        let transport = Arc::new(MockTransport::new().fail_status(Method::Get, VOC, 503));
        let client = HttpClient::builder(transport.clone())
            .retry(RetryPolicy::default().with_max_retries(2).with_backoff(Backoff::Fixed(Duration::from_millis(10))))
            .build();

        let err = client
            .send(HttpRequest::get(VOC), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Server);
        assert_eq!(err.status(), Some(503));
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn writes_are_not_retried() {
        let transport = Arc::new(MockTransport::new().fail_status(Method::Post, VOC, 503));
        let client = HttpClient::new(transport.clone());

        let err = client
            .send(HttpRequest::new(Method::Post, VOC), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Server);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn interceptors_see_requests_and_responses() {
        let transport = Arc::new(MockTransport::new().ok_json(Method::Get, VOC, json!([])));
        let client = HttpClient::builder(transport.clone())
            .interceptor(Arc::new(TagRequests))
            .build();

        let response = client
            .send(HttpRequest::get(VOC), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(transport.calls()[0].headers["x-client"], "termfed");
        assert_eq!(response.header("x-seen"), Some("1"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff() {
        let transport = Arc::new(MockTransport::new().fail_status(Method::Get, VOC, 503));
        let client = HttpClient::builder(transport.clone())
            .retry(RetryPolicy::default().with_backoff(Backoff::Fixed(Duration::from_secs(60))))
            .build();
        let token = CancellationToken::new();

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                token.cancel();
            })
        };

        let err = client.send(HttpRequest::get(VOC), &token).await.unwrap_err();
        canceller.await.unwrap();

        assert!(err.is_cancelled());
        assert_eq!(transport.call_count(), 1);
    }
}
