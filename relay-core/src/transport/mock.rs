//! Mock HTTP transport for testing.
//!
//! Provides [`MockTransport`], a configurable [`HttpTransport`] that records
//! every request and replays canned [`MockResponse`]s without a network.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;

use super::{HttpRequest, HttpResponse, HttpTransport};
use crate::provider::ProviderError;

/// A canned response replayed by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: u16,
    status_text: String,
    body: Option<Vec<Result<Vec<u8>, String>>>,
    released: Option<Arc<AtomicUsize>>,
}

impl MockResponse {
    /// A `200 OK` response whose body is `value` serialized as JSON.
    pub fn json(value: &serde_json::Value) -> Self {
        Self::ok(vec![value.to_string()])
    }

    /// A `200 OK` response whose body arrives as the given chunks.
    pub fn ok<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Vec<u8>>,
    {
        Self {
            status: 200,
            status_text: "OK".to_string(),
            body: Some(chunks.into_iter().map(|c| Ok(c.into())).collect()),
            released: None,
        }
    }

    /// A response with the given status line and a single-chunk text body.
    pub fn status(status: u16, status_text: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            body: Some(vec![Ok(body.into().into_bytes())]),
            released: None,
        }
    }

    /// A `200 OK` response with no readable body.
    pub fn without_body() -> Self {
        Self {
            status: 200,
            status_text: "OK".to_string(),
            body: None,
            released: None,
        }
    }

    /// Append a chunk that fails with `message` when read.
    #[must_use]
    pub fn with_body_error(mut self, message: impl Into<String>) -> Self {
        self.body
            .get_or_insert_with(Vec::new)
            .push(Err(message.into()));
        self
    }

    /// Count how many times the body stream is dropped.
    ///
    /// The counter is incremented once when the body stream handed to the
    /// caller is released, whichever path releases it.
    #[must_use]
    pub fn with_release_counter(mut self, counter: Arc<AtomicUsize>) -> Self {
        self.released = Some(counter);
        self
    }

    fn into_response(self) -> HttpResponse {
        let released = self.released;
        let body = self.body.map(|chunks| {
            let chunks: VecDeque<_> = chunks
                .into_iter()
                .map(|c| c.map_err(ProviderError::RequestFailed))
                .collect();
            Box::pin(MockBody {
                chunks,
                _guard: released.map(ReleaseGuard),
            }) as super::ByteStream
        });

        HttpResponse {
            status: self.status,
            status_text: self.status_text,
            body,
        }
    }
}

/// Increments its counter on drop.
struct ReleaseGuard(Arc<AtomicUsize>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockBody {
    chunks: VecDeque<Result<Vec<u8>, ProviderError>>,
    _guard: Option<ReleaseGuard>,
}

impl Stream for MockBody {
    type Item = Result<Vec<u8>, ProviderError>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.chunks.pop_front())
    }
}

/// A mock transport for testing.
///
/// Responses are returned in the order they were added. When none are left,
/// a `503 Service Unavailable` response is returned.
///
/// # Examples
///
/// ```
/// use relay_core::transport::{HttpRequest, HttpTransport, MockResponse, MockTransport};
///
/// # async fn example() {
/// let transport = MockTransport::new()
///     .with_response(MockResponse::json(&serde_json::json!({"choices": []})));
///
/// let request = HttpRequest {
///     url: "http://localhost/chat/completions".to_string(),
///     headers: Vec::new(),
///     body: serde_json::json!({}),
/// };
/// let response = transport.post_json(request).await.unwrap();
/// assert_eq!(response.status, 200);
/// assert_eq!(transport.calls(), 1);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<MockResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    /// Create a mock transport with no predefined responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next call to `post_json`.
    #[must_use]
    pub fn with_response(self, response: MockResponse) -> Self {
        lock(&self.responses).push_back(response);
        self
    }

    /// Number of requests sent so far.
    pub fn calls(&self) -> usize {
        lock(&self.requests).len()
    }

    /// All requests sent so far, oldest first.
    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }
}

/// Lock `mutex`, recovering the guard if a panicking test poisoned it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn post_json(&self, request: HttpRequest) -> Result<HttpResponse, ProviderError> {
        lock(&self.requests).push(request);

        let response = lock(&self.responses).pop_front().unwrap_or_else(|| {
            MockResponse::status(503, "Service Unavailable", "no mock response queued")
        });
        Ok(response.into_response())
    }
}
