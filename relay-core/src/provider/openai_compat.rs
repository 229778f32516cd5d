//! Content generation over OpenAI-compatible Chat Completions APIs.
//!
//! Translates structured content requests into flat chat-completion bodies,
//! maps JSON and SSE responses back into [`GenerateContentResponse`]s, and
//! exposes both through [`OpenAiCompatGenerator`].

pub(crate) mod types;

pub use types::{ChatMessage, ChatRole, CompletionRequestBody, DEFAULT_TEMPERATURE, DEFAULT_TOP_P};

use std::fmt;

use async_trait::async_trait;
use futures::StreamExt;

use self::types::ApiResponse;
use super::streaming::PartialResponseStream;
use super::{ContentGenerator, ProviderError, ResponseStream};
use crate::config::{DEFAULT_REFERER, DEFAULT_TITLE};
use crate::content::{
    Content, Contents, CountTokensParameters, CountTokensResponse, EmbedContentParameters,
    EmbedContentResponse, GenerateContentParameters, GenerateContentResponse, GenerationConfig,
    Role,
};
use crate::tokens::estimate_tokens;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

/// Convert one turn to the wire format.
///
/// `model` turns become `assistant` messages; everything else, including an
/// unset role, is sent as `user`.
fn to_chat_message(turn: &Content) -> ChatMessage {
    let role = match turn.role {
        Some(Role::Model) => ChatRole::Assistant,
        Some(Role::User) | None => ChatRole::User,
    };
    ChatMessage {
        role,
        content: turn.text(),
    }
}

/// Build the wire messages for `contents`, one per turn, in order.
pub fn build_chat_messages(contents: &Contents) -> Vec<ChatMessage> {
    match contents {
        Contents::Text(text) => vec![ChatMessage {
            role: ChatRole::User,
            content: text.clone(),
        }],
        Contents::Turns(turns) => turns.iter().map(to_chat_message).collect(),
    }
}

/// Build a non-streaming request body.
///
/// Missing sampling parameters fall back to [`DEFAULT_TEMPERATURE`] and
/// [`DEFAULT_TOP_P`]; `max_tokens` is omitted when unset. Never fails.
///
/// # Examples
///
/// ```
/// use relay_core::content::Contents;
/// use relay_core::provider::{ChatRole, build_request_body};
///
/// let body = build_request_body("some-model", &Contents::from("hello"), None);
/// assert_eq!(body.messages.len(), 1);
/// assert_eq!(body.messages[0].role, ChatRole::User);
/// assert_eq!(body.messages[0].content, "hello");
/// assert_eq!(body.temperature, 0.7);
/// ```
pub fn build_request_body(
    model: &str,
    contents: &Contents,
    config: Option<&GenerationConfig>,
) -> CompletionRequestBody {
    CompletionRequestBody {
        model: model.to_string(),
        messages: build_chat_messages(contents),
        stream: None,
        temperature: config
            .and_then(|c| c.temperature)
            .unwrap_or(DEFAULT_TEMPERATURE),
        top_p: config.and_then(|c| c.top_p).unwrap_or(DEFAULT_TOP_P),
        max_tokens: config.and_then(|c| c.max_output_tokens),
    }
}

/// Map a complete Chat Completions JSON body to a [`GenerateContentResponse`].
///
/// The primary text is the first choice's message content (empty if absent)
/// and the finish reason is copied verbatim. The raw JSON is kept on
/// [`GenerateContentResponse::raw`].
pub fn to_generate_content_response(raw: serde_json::Value) -> GenerateContentResponse {
    let api_response: ApiResponse = serde_json::from_value(raw.clone()).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "openai_compat: unexpected response shape");
        ApiResponse::default()
    });

    let (text, finish_reason) = match api_response.choices.into_iter().next() {
        Some(choice) => (
            choice
                .message
                .and_then(|m| m.content)
                .unwrap_or_default(),
            choice.finish_reason,
        ),
        None => (String::new(), None),
    };

    GenerateContentResponse {
        raw: Some(raw),
        ..GenerateContentResponse::from_text(text, finish_reason)
    }
}

/// [`ContentGenerator`] for OpenAI-compatible Chat Completions APIs.
///
/// Holds the base URL, API key, model, and the two identification headers
/// sent with every request. Generic over the transport so tests can run
/// without a network.
pub struct OpenAiCompatGenerator<T = ReqwestTransport> {
    transport: T,
    base_url: String,
    api_key: String,
    model: String,
    referer: String,
    title: String,
}

impl<T: HttpTransport> OpenAiCompatGenerator<T> {
    /// Create a generator sending requests through `transport`.
    pub fn new(
        transport: T,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            referer: DEFAULT_REFERER.to_string(),
            title: DEFAULT_TITLE.to_string(),
        }
    }

    /// Override the `HTTP-Referer` and `X-Title` identification headers.
    #[must_use]
    pub fn with_identity(mut self, referer: impl Into<String>, title: impl Into<String>) -> Self {
        self.referer = referer.into();
        self.title = title.into();
        self
    }

    /// The model every request is sent to.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The transport used for requests.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The Chat Completions endpoint URL.
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn headers(&self) -> Vec<(String, String)> {
        vec![
            (
                "Authorization".to_string(),
                format!("Bearer {}", self.api_key),
            ),
            ("Content-Type".to_string(), "application/json".to_string()),
            ("HTTP-Referer".to_string(), self.referer.clone()),
            ("X-Title".to_string(), self.title.clone()),
        ]
    }

    /// POST `body` and fail on any non-2xx status before the body is decoded.
    async fn send(&self, body: &CompletionRequestBody) -> Result<HttpResponse, ProviderError> {
        let endpoint = self.endpoint();
        let body = serde_json::to_value(body)
            .map_err(|e| ProviderError::RequestFailed(format!("failed to encode request: {}", e)))?;

        tracing::debug!(
            endpoint = %endpoint,
            stream = body.get("stream").is_some(),
            "openai_compat: POST request"
        );
        let response = self
            .transport
            .post_json(HttpRequest {
                url: endpoint,
                headers: self.headers(),
                body,
            })
            .await?;

        if !response.is_success() {
            let status = response.status;
            let status_text = response.status_text.clone();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            tracing::warn!(status, status_text = %status_text, "openai_compat: request failed");
            return Err(ProviderError::Http {
                status,
                status_text,
                body,
            });
        }

        Ok(response)
    }
}

impl<T: fmt::Debug> fmt::Debug for OpenAiCompatGenerator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiCompatGenerator")
            .field("transport", &self.transport)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("referer", &self.referer)
            .field("title", &self.title)
            .finish()
    }
}

#[async_trait]
impl<T: HttpTransport> ContentGenerator for OpenAiCompatGenerator<T> {
    async fn generate_content(
        &self,
        request: GenerateContentParameters,
    ) -> Result<GenerateContentResponse, ProviderError> {
        let body = build_request_body(&self.model, &request.contents, request.config.as_ref());
        let response = self.send(&body).await?;
        let raw = response.json().await?;
        Ok(to_generate_content_response(raw))
    }

    async fn generate_content_stream(
        &self,
        request: GenerateContentParameters,
    ) -> Result<ResponseStream, ProviderError> {
        let mut body = build_request_body(&self.model, &request.contents, request.config.as_ref());
        body.stream = Some(true);

        let response = self.send(&body).await?;
        let byte_stream = response.body.ok_or(ProviderError::MissingBody)?;

        tracing::debug!(endpoint = %self.endpoint(), "openai_compat: SSE stream started");
        let stream = PartialResponseStream::new(byte_stream)
            .map(|partial| partial.map(GenerateContentResponse::from));
        Ok(Box::pin(stream))
    }

    async fn count_tokens(
        &self,
        request: CountTokensParameters,
    ) -> Result<CountTokensResponse, ProviderError> {
        Ok(CountTokensResponse {
            total_tokens: estimate_tokens(&request.contents),
        })
    }

    async fn embed_content(
        &self,
        _request: EmbedContentParameters,
    ) -> Result<EmbedContentResponse, ProviderError> {
        Err(ProviderError::Unsupported("embed_content".to_string()))
    }
}
