//! Relay core library.
//!
//! Lets code written against a structured content-generation interface
//! (role-tagged turns made of parts, candidate-based responses) talk to any
//! OpenAI-compatible Chat Completions endpoint. Provides the request and
//! response translators, the incremental SSE decoder, a heuristic token
//! estimator, an injectable HTTP transport and configuration loading.

pub mod config;
pub mod content;
pub mod provider;
pub mod tokens;
pub mod transport;

pub use config::{Config, ConfigError};
pub use content::{
    Candidate, Content, Contents, CountTokensParameters, CountTokensResponse,
    EmbedContentParameters, EmbedContentResponse, GenerateContentParameters,
    GenerateContentResponse, GenerationConfig, Part, Role,
};
pub use provider::{
    ContentGenerator, OpenAiCompatGenerator, PartialResponse, ProviderError, ResponseStream,
    create_generator,
};
pub use tokens::estimate_tokens;
pub use transport::{HttpTransport, ReqwestTransport};
