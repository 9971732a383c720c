//! Google Gemini (Generative Language API) provider implementation

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{Provider, ProviderCapabilities, endpoint};
use crate::config::ProviderConfig;
use crate::convert::gemini::{
    GeminiStreamReconstructor, classify_error, convert_embedding_response, convert_response, embedding_request,
};
use crate::error::{LlmError, UpstreamError};
use crate::protocol::gemini::{GeminiBatchEmbedResponse, GeminiModelList, GeminiRequest, GeminiResponse};
use crate::streaming::{CompletionStream, spawn_stream};
use crate::transport;
use crate::types::{ChatCompletion, CompletionParams, EmbeddingParams, EmbeddingResponse, ModelInfo};

/// Provider name used in errors and logs
const NAME: &str = "gemini";

/// Default Generative Language API base URL
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const API_KEY_ENV: &[&str] = &["GEMINI_API_KEY", "GOOGLE_API_KEY"];

const CAPABILITIES: ProviderCapabilities = ProviderCapabilities {
    completion: true,
    streaming: true,
    tools: true,
    reasoning: true,
    image: true,
    pdf: false,
    embedding: true,
    list_models: true,
};

/// Resource name for a model, accepting both `gemini-x` and `models/gemini-x`
fn model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_owned()
    } else {
        format!("models/{model}")
    }
}

/// Google Gemini provider
pub struct GeminiProvider {
    client: Client,
    base_url: Url,
    api_key: SecretString,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl GeminiProvider {
    /// Create from provider configuration
    ///
    /// # Errors
    ///
    /// Returns `LlmError::MissingApiKey` if no key is configured and neither
    /// `GEMINI_API_KEY` nor `GOOGLE_API_KEY` is set.
    pub fn new(config: &ProviderConfig) -> Result<Self, LlmError> {
        Ok(Self {
            api_key: config.require_api_key(NAME, API_KEY_ENV)?,
            client: config.http_client()?,
            base_url: config.resolve_base_url(DEFAULT_BASE_URL)?,
        })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("x-goog-api-key", self.api_key.expose_secret())
    }

    /// POST to `models/{model}:{method}`
    fn model_call(&self, model: &str, method: &str) -> RequestBuilder {
        let url = endpoint(&self.base_url, &format!("{}:{method}", model_path(model)));
        self.authorized(self.client.post(url))
    }

    fn build_request(params: &CompletionParams) -> Result<GeminiRequest, LlmError> {
        GeminiRequest::try_from(params).map_err(|source| LlmError::InvalidTool {
            provider: NAME.to_owned(),
            source,
        })
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> ProviderCapabilities {
        CAPABILITIES
    }

    async fn completion(&self, params: &CompletionParams) -> Result<ChatCompletion, LlmError> {
        let request = Self::build_request(params)?;

        let response = transport::send(NAME, self.model_call(&params.model, "generateContent").json(&request))
            .await
            .map_err(|e| self.classify_error(e))?;
        let wire: GeminiResponse = transport::json(response).await.map_err(|e| self.classify_error(e))?;

        Ok(convert_response(wire, &params.model))
    }

    fn completion_stream(
        &self,
        params: &CompletionParams,
        cancel: CancellationToken,
    ) -> Result<CompletionStream, LlmError> {
        let request = Self::build_request(params)?;
        let builder = self
            .model_call(&params.model, "streamGenerateContent")
            .query(&[("alt", "sse")])
            .json(&request);

        let connect = async move {
            let response = transport::send(NAME, builder)
                .await
                .map_err(|e| classify_error(NAME, e))?;
            let events = transport::sse_events::<GeminiResponse>(NAME, response)
                .map(|event| event.map_err(|e| classify_error(NAME, e)));
            Ok::<_, LlmError>(events)
        };

        let reconstructor = GeminiStreamReconstructor::new(NAME, params.model.clone());
        spawn_stream(NAME, connect, reconstructor, cancel)
    }

    async fn embedding(&self, params: &EmbeddingParams) -> Result<EmbeddingResponse, LlmError> {
        let model = model_path(&params.model);
        let request = embedding_request(&model, params);

        let response = transport::send(NAME, self.model_call(&params.model, "batchEmbedContents").json(&request))
            .await
            .map_err(|e| self.classify_error(e))?;
        let wire: GeminiBatchEmbedResponse = transport::json(response).await.map_err(|e| self.classify_error(e))?;

        Ok(convert_embedding_response(wire, &params.model))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut builder = self.authorized(self.client.get(endpoint(&self.base_url, "models")));
            if let Some(token) = &page_token {
                builder = builder.query(&[("pageToken", token)]);
            }

            let response = transport::send(NAME, builder).await.map_err(|e| self.classify_error(e))?;
            let page: GeminiModelList = transport::json(response).await.map_err(|e| self.classify_error(e))?;

            models.extend(page.models.into_iter().map(ModelInfo::from));

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) if page_token.as_ref() != Some(&token) => page_token = Some(token),
                _ => break,
            }
        }

        tracing::debug!(provider = NAME, count = models.len(), "listed models");
        Ok(models)
    }

    fn classify_error(&self, error: UpstreamError) -> LlmError {
        classify_error(NAME, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_prefix_is_not_doubled() {
        assert_eq!(model_path("gemini-2.5-flash"), "models/gemini-2.5-flash");
        assert_eq!(model_path("models/gemini-2.5-flash"), "models/gemini-2.5-flash");
    }

    #[test]
    fn google_key_is_second_choice() {
        temp_env::with_vars(
            [("GEMINI_API_KEY", None), ("GOOGLE_API_KEY", Some("g-key"))],
            || {
                let provider = GeminiProvider::new(&ProviderConfig::default()).unwrap();
                assert_eq!(provider.api_key.expose_secret(), "g-key");
            },
        );
    }

    #[test]
    fn missing_key_names_gemini_env_var() {
        temp_env::with_vars_unset(["GEMINI_API_KEY", "GOOGLE_API_KEY"], || {
            let err = GeminiProvider::new(&ProviderConfig::default()).unwrap_err();
            assert_eq!(err.to_string(), "[gemini] missing API key: set GEMINI_API_KEY or configure api_key");
        });
    }

    #[test]
    fn capabilities_exclude_pdf() {
        assert!(!CAPABILITIES.pdf);
        assert!(CAPABILITIES.embedding && CAPABILITIES.list_models && CAPABILITIES.reasoning);
    }
}
