//! Serde request/response structs for OpenAI-compatible Chat Completions APIs.
//!
//! Response types are partial: every field the adapter reads is optional or
//! defaulted and is checked on its own, so an off-type sibling field or a
//! malformed extra choice never hides a valid `content`. Unknown fields are
//! ignored.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// SSE "[DONE]" marker sent by OpenAI-compatible streaming APIs.
pub(crate) const SSE_DONE_MARKER: &str = "[DONE]";

/// Default sampling temperature when the caller sets none.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Default nucleus sampling mass when the caller sets none.
pub const DEFAULT_TOP_P: f64 = 1.0;

/// Role of a chat message on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// System instructions.
    System,
    /// User input.
    User,
    /// Model output.
    Assistant,
}

/// A single message in the API request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role.
    pub role: ChatRole,
    /// Message content.
    pub content: String,
}

/// Request body for a Chat Completions API call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequestBody {
    /// Model identifier.
    pub model: String,
    /// Conversation messages.
    pub messages: Vec<ChatMessage>,
    /// `Some(true)` for streaming calls, omitted otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Sampling temperature.
    pub temperature: f64,
    /// Nucleus sampling mass.
    pub top_p: f64,
    /// Maximum tokens to generate. Omitted when the caller sets none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Deserialize a field, falling back to its default on a type mismatch.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Deserialize an array element by element.
///
/// A malformed element becomes `T::default()` so positions are kept; a
/// non-array value becomes an empty vector.
fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let values: Vec<serde_json::Value> = lenient(deserializer)?;
    Ok(values
        .into_iter()
        .map(|v| serde_json::from_value(v).unwrap_or_default())
        .collect())
}

/// Response body from a Chat Completions API call.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiResponse {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub(crate) choices: Vec<Choice>,
}

/// A choice in the completion response.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Choice {
    #[serde(default, deserialize_with = "lenient")]
    pub(crate) message: Option<ChoiceMessage>,
    #[serde(default, deserialize_with = "lenient")]
    pub(crate) finish_reason: Option<String>,
}

/// Message content in a completion choice.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ChoiceMessage {
    #[serde(default, deserialize_with = "lenient")]
    pub(crate) content: Option<String>,
}

/// An SSE streaming response chunk.
#[derive(Debug, Deserialize)]
pub(crate) struct StreamChunk {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub(crate) choices: Vec<StreamChoice>,
}

/// A choice in a streaming response chunk.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct StreamChoice {
    #[serde(default, deserialize_with = "lenient")]
    pub(crate) delta: StreamDelta,
    #[serde(default, deserialize_with = "lenient")]
    pub(crate) finish_reason: Option<String>,
}

/// Delta content in a streaming choice.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct StreamDelta {
    #[serde(default, deserialize_with = "lenient")]
    pub(crate) content: Option<String>,
}
