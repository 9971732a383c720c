//! Groq provider

use super::ProviderCapabilities;
use super::openai::{CompatibleProfile, OpenAiCompatibleProvider};
use crate::config::ProviderConfig;
use crate::error::LlmError;

/// Default Groq API base URL
const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Groq backend profile
pub const PROFILE: CompatibleProfile = CompatibleProfile {
    name: "groq",
    default_base_url: DEFAULT_BASE_URL,
    api_key_env: &["GROQ_API_KEY"],
    fallback_api_key: None,
    capabilities: ProviderCapabilities {
        completion: true,
        streaming: true,
        tools: true,
        reasoning: false,
        image: false,
        pdf: false,
        embedding: false,
        list_models: true,
    },
    preprocess: None,
};

/// Groq provider from configuration
pub fn new(config: &ProviderConfig) -> Result<OpenAiCompatibleProvider, LlmError> {
    OpenAiCompatibleProvider::new(PROFILE, config)
}
