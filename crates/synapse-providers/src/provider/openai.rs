//! OpenAI-compatible provider implementation
//!
//! `OpenAI`, `DeepSeek`, Groq, Mistral and llama.cpp all speak this protocol;
//! each supplies a [`CompatibleProfile`] describing its defaults and quirks.

use std::borrow::Cow;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{Provider, ProviderCapabilities, endpoint};
use crate::config::ProviderConfig;
use crate::convert::openai::{OpenAiStreamReconstructor, classify_error};
use crate::error::{LlmError, UpstreamError};
use crate::protocol::openai::{
    OpenAiEmbeddingRequest, OpenAiModelList, OpenAiRequest, OpenAiResponse, OpenAiStreamChunk, OpenAiStreamOptions,
};
use crate::streaming::{CompletionStream, spawn_stream};
use crate::transport;
use crate::types::{ChatCompletion, CompletionParams, EmbeddingParams, EmbeddingResponse, ModelInfo};

/// Default `OpenAI` API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Static description of one OpenAI-compatible backend
#[derive(Debug, Clone, Copy)]
pub struct CompatibleProfile {
    /// Provider name used in errors and logs
    pub name: &'static str,
    /// Base URL when none is configured
    pub default_base_url: &'static str,
    /// Environment variables consulted for the key, in order
    pub api_key_env: &'static [&'static str],
    /// Key used when none is configured; `None` makes the key mandatory
    pub fallback_api_key: Option<&'static str>,
    /// Advertised capabilities
    pub capabilities: ProviderCapabilities,
    /// Request rewrite applied before conversion
    pub preprocess: Option<fn(CompletionParams) -> CompletionParams>,
}

/// `OpenAI` itself
pub const PROFILE: CompatibleProfile = CompatibleProfile {
    name: "openai",
    default_base_url: DEFAULT_BASE_URL,
    api_key_env: &["OPENAI_API_KEY"],
    fallback_api_key: None,
    capabilities: ProviderCapabilities {
        completion: true,
        streaming: true,
        tools: true,
        reasoning: true,
        image: true,
        pdf: false,
        embedding: true,
        list_models: true,
    },
    preprocess: None,
};

/// `OpenAI` provider from configuration
pub fn new(config: &ProviderConfig) -> Result<OpenAiCompatibleProvider, LlmError> {
    OpenAiCompatibleProvider::new(PROFILE, config)
}

/// Whether the provider is the canonical OpenAI API (vs a compatible third-party)
fn is_canonical_openai(base_url: &Url) -> bool {
    base_url.host_str().is_some_and(|h| h == "api.openai.com")
}

/// OpenAI-compatible provider
pub struct OpenAiCompatibleProvider {
    profile: CompatibleProfile,
    client: Client,
    base_url: Url,
    api_key: SecretString,
}

impl std::fmt::Debug for OpenAiCompatibleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleProvider")
            .field("name", &self.profile.name)
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl OpenAiCompatibleProvider {
    /// Create from a backend profile and configuration
    ///
    /// # Errors
    ///
    /// Returns `LlmError::MissingApiKey` when the profile requires a key and
    /// none is configured or set in the environment.
    pub fn new(profile: CompatibleProfile, config: &ProviderConfig) -> Result<Self, LlmError> {
        let api_key = match profile.fallback_api_key {
            Some(fallback) => config
                .resolve_api_key(profile.api_key_env)
                .unwrap_or_else(|| SecretString::from(fallback)),
            None => config.require_api_key(profile.name, profile.api_key_env)?,
        };

        Ok(Self {
            profile,
            client: config.http_client()?,
            base_url: config.resolve_base_url(profile.default_base_url)?,
            api_key,
        })
    }

    /// Base URL requests are sent to
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(self.api_key.expose_secret())
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.request(self.client.post(endpoint(&self.base_url, path)))
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.request(self.client.get(endpoint(&self.base_url, path)))
    }

    fn unsupported(&self, operation: &'static str) -> LlmError {
        LlmError::Unsupported {
            provider: self.profile.name.to_owned(),
            operation,
        }
    }

    /// Wire request after the profile's rewrite
    pub(super) fn build_request(&self, params: &CompletionParams, stream: bool) -> Result<OpenAiRequest, LlmError> {
        let params = match self.profile.preprocess {
            Some(preprocess) => Cow::Owned(preprocess(params.clone())),
            None => Cow::Borrowed(params),
        };

        let mut request = OpenAiRequest::try_from(params.as_ref()).map_err(|source| LlmError::InvalidTool {
            provider: self.profile.name.to_owned(),
            source,
        })?;

        if stream {
            request.stream = Some(true);
            // Only the canonical API is known to accept stream_options
            if is_canonical_openai(&self.base_url) {
                request.stream_options = Some(OpenAiStreamOptions { include_usage: true });
            }
        } else {
            request.stream = None;
        }

        Ok(request)
    }
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        self.profile.name
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.profile.capabilities
    }

    async fn completion(&self, params: &CompletionParams) -> Result<ChatCompletion, LlmError> {
        let request = self.build_request(params, false)?;

        let response = transport::send(self.name(), self.post("chat/completions").json(&request))
            .await
            .map_err(|e| self.classify_error(e))?;
        let wire: OpenAiResponse = transport::json(response).await.map_err(|e| self.classify_error(e))?;

        Ok(wire.into())
    }

    fn completion_stream(
        &self,
        params: &CompletionParams,
        cancel: CancellationToken,
    ) -> Result<CompletionStream, LlmError> {
        let request = self.build_request(params, true)?;
        let builder = self.post("chat/completions").json(&request);
        let provider = self.profile.name;

        let connect = async move {
            let response = transport::send(provider, builder)
                .await
                .map_err(|e| classify_error(provider, e))?;
            let events = transport::sse_events::<OpenAiStreamChunk>(provider, response)
                .map(move |event| event.map_err(|e| classify_error(provider, e)));
            Ok::<_, LlmError>(events)
        };

        let reconstructor = OpenAiStreamReconstructor::new(provider, params.model.clone());
        spawn_stream(provider, connect, reconstructor, cancel)
    }

    async fn embedding(&self, params: &EmbeddingParams) -> Result<EmbeddingResponse, LlmError> {
        if !self.profile.capabilities.embedding {
            return Err(self.unsupported("embedding"));
        }

        let request = OpenAiEmbeddingRequest::from(params);
        let response = transport::send(self.name(), self.post("embeddings").json(&request))
            .await
            .map_err(|e| self.classify_error(e))?;

        transport::json(response).await.map_err(|e| self.classify_error(e))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        if !self.profile.capabilities.list_models {
            return Err(self.unsupported("list_models"));
        }

        let mut models = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let mut builder = self.get("models");
            if let Some(cursor) = &after {
                builder = builder.query(&[("after", cursor)]);
            }

            let response = transport::send(self.name(), builder)
                .await
                .map_err(|e| self.classify_error(e))?;
            let page: OpenAiModelList = transport::json(response).await.map_err(|e| self.classify_error(e))?;

            let next = page.last_id.filter(|id| page.has_more && after.as_ref() != Some(id));
            models.extend(page.data.into_iter().map(ModelInfo::from));

            match next {
                Some(cursor) => after = Some(cursor),
                None => break,
            }
        }

        tracing::debug!(provider = %self.name(), count = models.len(), "listed models");
        Ok(models)
    }

    fn classify_error(&self, error: UpstreamError) -> LlmError {
        classify_error(self.profile.name, error)
    }
}
