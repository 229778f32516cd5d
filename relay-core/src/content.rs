//! Structured content types presented to callers.
//!
//! Provides [`Role`], [`Part`], [`Content`] (one conversation turn) and the
//! request/response objects exchanged through
//! [`ContentGenerator`](crate::provider::ContentGenerator).

use serde::{Deserialize, Serialize};

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User input.
    User,
    /// Model response.
    Model,
}

/// A single part of a turn.
///
/// Only text parts are forwarded. Any other part (inline data, function
/// calls, file references) is kept verbatim for the caller's benefit but
/// contributes nothing to the outbound request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    /// A text part.
    Text {
        /// The text.
        text: String,
    },
    /// Any non-text part.
    Other(serde_json::Value),
}

impl Part {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Returns the text of this part, or `None` for non-text parts.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Other(_) => None,
        }
    }
}

/// One role-tagged turn of conversation content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    /// The role of this turn. `None` is treated as a user turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// The ordered parts of this turn.
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// Create a turn with the given role and a single text part.
    ///
    /// # Examples
    ///
    /// ```
    /// use relay_core::content::{Content, Role};
    ///
    /// let turn = Content::new(Role::User, "Hello!");
    /// assert_eq!(turn.role, Some(Role::User));
    /// assert_eq!(turn.text(), "Hello!");
    /// ```
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role: Some(role),
            parts: vec![Part::text(text)],
        }
    }

    /// Concatenate all text parts in order. Non-text parts are skipped.
    pub fn text(&self) -> String {
        self.parts.iter().filter_map(Part::as_text).collect()
    }
}

/// Content accepted by the generation operations: either a plain prompt
/// string or an ordered sequence of turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Contents {
    /// A single user prompt.
    Text(String),
    /// A sequence of turns.
    Turns(Vec<Content>),
}

impl Contents {
    /// Concatenate every text part across all turns.
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Turns(turns) => turns.iter().map(Content::text).collect(),
        }
    }
}

impl From<&str> for Contents {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Contents {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<Content>> for Contents {
    fn from(turns: Vec<Content>) -> Self {
        Self::Turns(turns)
    }
}

/// Optional sampling parameters for a generation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling probability mass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Upper bound on generated tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

/// A generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateContentParameters {
    /// The prompt or conversation.
    pub contents: Contents,
    /// Sampling parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<GenerationConfig>,
}

impl GenerateContentParameters {
    /// Create a request with no sampling parameters.
    pub fn new(contents: impl Into<Contents>) -> Self {
        Self {
            contents: contents.into(),
            config: None,
        }
    }

    /// Attach sampling parameters.
    #[must_use]
    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = Some(config);
        self
    }
}

/// One candidate answer in a [`GenerateContentResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// The generated turn (role `model`).
    pub content: Content,
    /// Why generation stopped, copied verbatim from the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    /// Candidate index.
    pub index: u32,
}

/// A complete or partial generation response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    /// Candidate answers. This adapter always produces exactly one.
    pub candidates: Vec<Candidate>,
    /// Function calls requested by the model. Always empty here.
    #[serde(default)]
    pub function_calls: Vec<serde_json::Value>,
    /// Executable code emitted by the model. Always absent here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable_code: Option<String>,
    /// Result of executed code. Always absent here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_execution_result: Option<String>,
    /// The provider's raw JSON, for callers that need provider-specific fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl GenerateContentResponse {
    /// Build a response with a single model candidate carrying `text`.
    pub fn from_text(text: impl Into<String>, finish_reason: Option<String>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Content::new(Role::Model, text),
                finish_reason,
                index: 0,
            }],
            ..Self::default()
        }
    }

    /// The primary text: all text parts of the first candidate.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .map(|c| c.content.text())
            .unwrap_or_default()
    }

    /// The first candidate's finish reason, if any.
    pub fn finish_reason(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
    }
}

/// A token counting request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountTokensParameters {
    /// The content to measure.
    pub contents: Contents,
}

impl CountTokensParameters {
    /// Create a counting request.
    pub fn new(contents: impl Into<Contents>) -> Self {
        Self {
            contents: contents.into(),
        }
    }
}

/// Response of the token counting operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountTokensResponse {
    /// Estimated token count.
    pub total_tokens: u32,
}

/// An embedding request. Accepted only so the operation has a typed
/// signature; embeddings are not supported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedContentParameters {
    /// The content to embed.
    pub contents: Contents,
}

/// An embedding response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbedContentResponse {
    /// One vector per input.
    pub embeddings: Vec<Vec<f32>>,
}
