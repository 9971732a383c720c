//! Provider trait and implementations for LLM backends
//!
//! Every backend is constructed explicitly from a [`ProviderConfig`]; there
//! is no global registry. [`ProviderKind`] maps a configuration entry to the
//! matching constructor.

pub mod anthropic;
pub mod deepseek;
pub mod gemini;
pub mod groq;
pub mod llamacpp;
pub mod mistral;
pub mod openai;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::config::ProviderConfig;
use crate::error::{LlmError, UpstreamError};
use crate::streaming::CompletionStream;
use crate::types::{ChatCompletion, CompletionParams, EmbeddingParams, EmbeddingResponse, ModelInfo};

/// Capabilities advertised by a provider
///
/// Fixed at construction; callers consult these before invoking an
/// operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct ProviderCapabilities {
    /// Blocking chat completions
    pub completion: bool,
    /// Streaming chat completions
    pub streaming: bool,
    /// Tool/function calling
    pub tools: bool,
    /// Exposed reasoning or thinking output
    pub reasoning: bool,
    /// Image input
    pub image: bool,
    /// PDF input
    pub pdf: bool,
    /// Embeddings
    pub embedding: bool,
    /// Model listing
    pub list_models: bool,
}

/// Trait implemented by each LLM provider backend
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name
    fn name(&self) -> &str;

    /// Advertised capabilities
    fn capabilities(&self) -> ProviderCapabilities;

    /// Send a blocking completion request
    async fn completion(&self, params: &CompletionParams) -> Result<ChatCompletion, LlmError>;

    /// Start a streaming completion
    ///
    /// Request-building failures are returned here, before any task is
    /// spawned. Everything after that arrives through the returned stream.
    /// Cancelling `cancel` stops the producer and closes both channels.
    /// The producer is spawned on the caller's Tokio runtime; called outside
    /// one, this returns `LlmError::Internal`.
    fn completion_stream(
        &self,
        params: &CompletionParams,
        cancel: CancellationToken,
    ) -> Result<CompletionStream, LlmError>;

    /// Embed one or more inputs
    async fn embedding(&self, _params: &EmbeddingParams) -> Result<EmbeddingResponse, LlmError> {
        Err(LlmError::Unsupported {
            provider: self.name().to_owned(),
            operation: "embedding",
        })
    }

    /// List every model the provider exposes, following pagination
    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        Err(LlmError::Unsupported {
            provider: self.name().to_owned(),
            operation: "list_models",
        })
    }

    /// Map a native failure onto the canonical taxonomy
    fn classify_error(&self, error: UpstreamError) -> LlmError;
}

/// Backend protocol named in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// `OpenAI`
    OpenAi,
    /// Anthropic Messages API
    Anthropic,
    /// Google Gemini
    Gemini,
    /// `DeepSeek`
    DeepSeek,
    /// Groq
    Groq,
    /// Mistral
    Mistral,
    /// Local llama.cpp server
    #[serde(rename = "llamacpp")]
    LlamaCpp,
}

impl ProviderKind {
    /// Construct the provider this kind names
    pub fn build(self, config: &ProviderConfig) -> Result<Box<dyn Provider>, LlmError> {
        Ok(match self {
            Self::OpenAi => Box::new(openai::new(config)?),
            Self::Anthropic => Box::new(anthropic::AnthropicProvider::new(config)?),
            Self::Gemini => Box::new(gemini::GeminiProvider::new(config)?),
            Self::DeepSeek => Box::new(deepseek::new(config)?),
            Self::Groq => Box::new(groq::new(config)?),
            Self::Mistral => Box::new(mistral::new(config)?),
            Self::LlamaCpp => Box::new(llamacpp::new(config)?),
        })
    }
}

/// Build every provider in a configuration, keyed by entry name
pub fn build_all(config: &crate::config::ProvidersConfig) -> Result<Vec<(String, Box<dyn Provider>)>, LlmError> {
    config
        .providers
        .iter()
        .map(|(name, entry)| {
            tracing::debug!(provider = %name, kind = ?entry.kind, "building provider");
            entry.kind.build(&entry.config()).map(|provider| (name.clone(), provider))
        })
        .collect()
}

/// Join `path` onto a base URL without doubling slashes
pub(crate) fn endpoint(base_url: &url::Url, path: &str) -> String {
    let base = base_url.as_str().trim_end_matches('/');
    format!("{base}/{path}")
}
