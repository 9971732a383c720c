//! Unified interface over chat-completion providers
//!
//! Callers speak one canonical data model (OpenAI chat-completion shaped);
//! each backend (`OpenAI`, Anthropic, Gemini, `DeepSeek`, Groq, Mistral,
//! llama.cpp) converts requests out, responses and stream events back in,
//! and classifies its native failures into [`LlmError`].

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod config;
pub mod convert;
pub mod error;
pub mod protocol;
pub mod provider;
pub mod state;
pub mod streaming;
pub mod transport;
pub mod types;

pub use config::{ProviderConfig, ProvidersConfig};
pub use error::{ErrorKind, LlmError, UpstreamError};
pub use provider::{Provider, ProviderCapabilities, ProviderKind};
pub use streaming::{CompletionStream, StreamReconstructor};
pub use types::{
    ChatCompletion, ChatCompletionChunk, CompletionParams, EmbeddingParams, EmbeddingResponse, Message, ModelInfo,
};
