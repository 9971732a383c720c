//! Anthropic Messages API provider implementation

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{Provider, ProviderCapabilities, endpoint};
use crate::config::ProviderConfig;
use crate::convert::anthropic::{AnthropicStreamReconstructor, classify_error};
use crate::error::{LlmError, UpstreamError};
use crate::protocol::anthropic::{AnthropicRequest, AnthropicResponse, AnthropicStreamEvent};
use crate::streaming::{CompletionStream, spawn_stream};
use crate::transport;
use crate::types::{ChatCompletion, CompletionParams};

/// Provider name used in errors and logs
const NAME: &str = "anthropic";

/// Default Anthropic API base URL
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

const API_KEY_ENV: &[&str] = &["ANTHROPIC_API_KEY"];

const CAPABILITIES: ProviderCapabilities = ProviderCapabilities {
    completion: true,
    streaming: true,
    tools: true,
    reasoning: true,
    image: true,
    pdf: true,
    embedding: false,
    list_models: false,
};

/// Anthropic Messages API provider
pub struct AnthropicProvider {
    client: Client,
    base_url: Url,
    api_key: SecretString,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl AnthropicProvider {
    /// Create from provider configuration
    ///
    /// # Errors
    ///
    /// Returns `LlmError::MissingApiKey` if no key is configured and
    /// `ANTHROPIC_API_KEY` is unset.
    pub fn new(config: &ProviderConfig) -> Result<Self, LlmError> {
        Ok(Self {
            api_key: config.require_api_key(NAME, API_KEY_ENV)?,
            client: config.http_client()?,
            base_url: config.resolve_base_url(DEFAULT_BASE_URL)?,
        })
    }

    /// Build the messages request with auth and version headers
    fn messages_request(&self, request: &AnthropicRequest) -> RequestBuilder {
        self.client
            .post(endpoint(&self.base_url, "messages"))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
    }

    fn build_request(params: &CompletionParams, stream: bool) -> Result<AnthropicRequest, LlmError> {
        let mut request = AnthropicRequest::try_from(params).map_err(|source| LlmError::InvalidTool {
            provider: NAME.to_owned(),
            source,
        })?;
        request.stream = stream.then_some(true);
        Ok(request)
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> ProviderCapabilities {
        CAPABILITIES
    }

    async fn completion(&self, params: &CompletionParams) -> Result<ChatCompletion, LlmError> {
        let request = Self::build_request(params, false)?;

        let response = transport::send(NAME, self.messages_request(&request))
            .await
            .map_err(|e| self.classify_error(e))?;
        let wire: AnthropicResponse = transport::json(response).await.map_err(|e| self.classify_error(e))?;

        Ok(wire.into())
    }

    fn completion_stream(
        &self,
        params: &CompletionParams,
        cancel: CancellationToken,
    ) -> Result<CompletionStream, LlmError> {
        let request = Self::build_request(params, true)?;
        let builder = self.messages_request(&request);

        let connect = async move {
            let response = transport::send(NAME, builder)
                .await
                .map_err(|e| classify_error(NAME, e))?;
            let events = transport::sse_events::<AnthropicStreamEvent>(NAME, response)
                .map(|event| event.map_err(|e| classify_error(NAME, e)));
            Ok::<_, LlmError>(events)
        };

        let reconstructor = AnthropicStreamReconstructor::new(NAME, params.model.clone());
        spawn_stream(NAME, connect, reconstructor, cancel)
    }

    fn classify_error(&self, error: UpstreamError) -> LlmError {
        classify_error(NAME, error)
    }
}
