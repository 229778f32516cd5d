//! HTTP transport abstraction.
//!
//! The adapter never talks to `reqwest` directly. It hands a fully built
//! [`HttpRequest`] to an [`HttpTransport`] and gets back the status line and
//! the body as a byte stream, the same shape a `fetch` call exposes. This
//! keeps translation and decoding testable without a network.

mod mock;

pub use mock::{MockResponse, MockTransport};

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};

use crate::provider::ProviderError;

/// A response body delivered as a sequence of byte chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, ProviderError>> + Send>>;

/// A JSON POST request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Absolute request URL.
    pub url: String,
    /// Header name/value pairs, sent in order.
    pub headers: Vec<(String, String)>,
    /// JSON request body.
    pub body: serde_json::Value,
}

impl HttpRequest {
    /// Look up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status line and body of an HTTP response.
pub struct HttpResponse {
    /// Numeric status code.
    pub status: u16,
    /// Reason phrase (e.g. `"Not Found"`), empty if unknown.
    pub status_text: String,
    /// The body, or `None` if the transport produced no readable body.
    pub body: Option<ByteStream>,
}

impl HttpResponse {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Read the whole body as text. Invalid UTF-8 is replaced lossily.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by the body stream.
    pub async fn text(self) -> Result<String, ProviderError> {
        let Some(mut body) = self.body else {
            return Ok(String::new());
        };
        let mut bytes = Vec::new();
        while let Some(chunk) = body.next().await {
            bytes.extend_from_slice(&chunk?);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read the whole body and parse it as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidResponse`] if the body is not JSON.
    pub async fn json(self) -> Result<serde_json::Value, ProviderError> {
        let text = self.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ProviderError::InvalidResponse(format!("failed to parse response: {}", e)))
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("status_text", &self.status_text)
            .field("body", &self.body.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Sends JSON POST requests.
///
/// Implementations own timeouts, retries and connection pooling. They must
/// return non-2xx responses as `Ok` so the caller can report the status.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send `request` and return the response head with a streaming body.
    async fn post_json(&self, request: HttpRequest) -> Result<HttpResponse, ProviderError>;
}

/// [`HttpTransport`] backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with a default client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport around an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(&self, request: HttpRequest) -> Result<HttpResponse, ProviderError> {
        let mut builder = self.client.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = builder
            .json(&request.body)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        let status = response.status();
        tracing::debug!(
            url = %request.url,
            status = status.as_u16(),
            "transport: response received"
        );

        let body = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| ProviderError::RequestFailed(e.to_string()))
        });

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            body: Some(Box::pin(body)),
        })
    }
}
