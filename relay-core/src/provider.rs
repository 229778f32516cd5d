//! Content generation abstraction layer.
//!
//! Defines the [`ContentGenerator`] trait that callers program against, the
//! [`ProviderError`] type, and the OpenAI-compatible implementation with its
//! streaming decoder.

mod factory;
mod openai_compat;
mod streaming;

pub use factory::{create_generator, get_api_key};
pub use openai_compat::{
    ChatMessage, ChatRole, CompletionRequestBody, DEFAULT_TEMPERATURE, DEFAULT_TOP_P,
    OpenAiCompatGenerator, build_chat_messages, build_request_body, to_generate_content_response,
};
pub use streaming::{Decoded, FrameError, PartialResponse, PartialResponseStream, SseDecoder};

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::content::{
    CountTokensParameters, CountTokensResponse, EmbedContentParameters, EmbedContentResponse,
    GenerateContentParameters, GenerateContentResponse,
};

/// Error type for provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider answered with a non-success status.
    #[error("HTTP {status} {status_text}: {body}")]
    Http {
        /// Numeric status code.
        status: u16,
        /// Reason phrase.
        status_text: String,
        /// Response body text.
        body: String,
    },

    /// A streaming call succeeded but returned no readable body.
    #[error("response has no body")]
    MissingBody,

    /// The operation is not supported by this adapter.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Request failed due to network or connection issues.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The response body could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// No API key was configured.
    #[error("missing API key: {0}")]
    MissingApiKey(String),
}

/// Stream of partial responses returned by
/// [`ContentGenerator::generate_content_stream`].
pub type ResponseStream =
    Pin<Box<dyn Stream<Item = Result<GenerateContentResponse, ProviderError>> + Send>>;

/// Structured content generation.
///
/// Implementations must be thread-safe (`Send + Sync`) for use in async
/// contexts.
///
/// # Examples
///
/// ```
/// use relay_core::content::GenerateContentParameters;
/// use relay_core::provider::{ContentGenerator, OpenAiCompatGenerator};
/// use relay_core::transport::{MockResponse, MockTransport};
///
/// # async fn example() {
/// let transport = MockTransport::new().with_response(MockResponse::json(&serde_json::json!({
///     "choices": [{"message": {"content": "Hi there"}, "finish_reason": "stop"}]
/// })));
/// let generator = OpenAiCompatGenerator::new(transport, "http://localhost/v1", "key", "model");
///
/// let response = generator
///     .generate_content(GenerateContentParameters::new("Hello"))
///     .await
///     .unwrap();
/// assert_eq!(response.text(), "Hi there");
/// # }
/// ```
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Generate a single complete response.
    ///
    /// # Errors
    ///
    /// [`ProviderError::Http`] on a non-success status,
    /// [`ProviderError::RequestFailed`] if the request could not be sent.
    async fn generate_content(
        &self,
        request: GenerateContentParameters,
    ) -> Result<GenerateContentResponse, ProviderError>;

    /// Generate a response as a lazy stream of partial responses.
    ///
    /// Status errors are returned here, before any byte of the body is
    /// decoded. Dropping the returned stream releases the connection.
    async fn generate_content_stream(
        &self,
        request: GenerateContentParameters,
    ) -> Result<ResponseStream, ProviderError>;

    /// Estimate the token count of some content. Never touches the network.
    async fn count_tokens(
        &self,
        request: CountTokensParameters,
    ) -> Result<CountTokensResponse, ProviderError>;

    /// Compute embeddings.
    async fn embed_content(
        &self,
        request: EmbedContentParameters,
    ) -> Result<EmbedContentResponse, ProviderError>;
}
