//! Mistral provider
//!
//! OpenAI-compatible, with two request rewrites: a user turn may not follow a
//! tool result directly, and `reasoning_effort` and `user` are rejected.

use super::ProviderCapabilities;
use super::openai::{CompatibleProfile, OpenAiCompatibleProvider};
use crate::config::ProviderConfig;
use crate::error::LlmError;
use crate::types::{CompletionParams, Message, Role};

/// Default Mistral API base URL
const DEFAULT_BASE_URL: &str = "https://api.mistral.ai/v1";

/// Assistant turn inserted between a tool result and a following user turn
const BRIDGE_REPLY: &str = "OK";

/// Mistral backend profile
pub const PROFILE: CompatibleProfile = CompatibleProfile {
    name: "mistral",
    default_base_url: DEFAULT_BASE_URL,
    api_key_env: &["MISTRAL_API_KEY"],
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
    preprocess: Some(adapt_request),
};

/// Mistral provider from configuration
pub fn new(config: &ProviderConfig) -> Result<OpenAiCompatibleProvider, LlmError> {
    OpenAiCompatibleProvider::new(PROFILE, config)
}

fn adapt_request(mut params: CompletionParams) -> CompletionParams {
    params.reasoning_effort = None;
    params.user = None;

    let mut messages = Vec::with_capacity(params.messages.len());
    let mut previous: Option<Role> = None;
    for msg in params.messages {
        if previous == Some(Role::Tool) && msg.role == Role::User {
            messages.push(Message::assistant(BRIDGE_REPLY));
        }
        previous = Some(msg.role);
        messages.push(msg);
    }
    params.messages = messages;

    params
}
