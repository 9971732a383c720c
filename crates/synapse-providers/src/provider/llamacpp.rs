//! llama.cpp server provider
//!
//! The server ignores the key, but the OpenAI wire format expects one, so a
//! placeholder is sent when none is configured.

use super::ProviderCapabilities;
use super::openai::{CompatibleProfile, OpenAiCompatibleProvider};
use crate::config::ProviderConfig;
use crate::error::LlmError;

/// Default llama.cpp server address
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080/v1";

/// Key sent when none is configured
const PLACEHOLDER_API_KEY: &str = "llama-cpp-dummy-key";

/// llama.cpp backend profile
pub const PROFILE: CompatibleProfile = CompatibleProfile {
    name: "llamacpp",
    default_base_url: DEFAULT_BASE_URL,
    api_key_env: &[],
    fallback_api_key: Some(PLACEHOLDER_API_KEY),
    capabilities: ProviderCapabilities {
        completion: true,
        streaming: true,
        tools: false,
        reasoning: false,
        image: false,
        pdf: false,
        embedding: true,
        list_models: true,
    },
    preprocess: None,
};

/// llama.cpp provider from configuration
pub fn new(config: &ProviderConfig) -> Result<OpenAiCompatibleProvider, LlmError> {
    OpenAiCompatibleProvider::new(PROFILE, config)
}
