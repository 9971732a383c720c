//! `DeepSeek` provider
//!
//! OpenAI-compatible, but with JSON mode only: schema-constrained requests
//! are degraded before they are sent.

use super::ProviderCapabilities;
use super::openai::{CompatibleProfile, OpenAiCompatibleProvider};
use crate::config::ProviderConfig;
use crate::convert::json_mode::degrade_json_schema;
use crate::error::LlmError;

/// Default `DeepSeek` API base URL
const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";

/// `DeepSeek` backend profile
pub const PROFILE: CompatibleProfile = CompatibleProfile {
    name: "deepseek",
    default_base_url: DEFAULT_BASE_URL,
    api_key_env: &["DEEPSEEK_API_KEY"],
    fallback_api_key: None,
    capabilities: ProviderCapabilities {
        completion: true,
        streaming: true,
        tools: true,
        reasoning: true,
        image: false,
        pdf: false,
        embedding: false,
        list_models: true,
    },
    preprocess: Some(degrade_json_schema),
};

/// `DeepSeek` provider from configuration
pub fn new(config: &ProviderConfig) -> Result<OpenAiCompatibleProvider, LlmError> {
    OpenAiCompatibleProvider::new(PROFILE, config)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::protocol::openai::OpenAiContent;
    use crate::types::{CompletionParams, JsonSchemaFormat, Message, ResponseFormat};

    #[test]
    fn schema_requests_are_sent_as_json_mode() {
        let provider = new(&ProviderConfig::default().with_api_key("sk-test")).unwrap();
        let mut params = CompletionParams::new("deepseek-chat", vec![Message::user("List three colors")]);
        params.response_format = Some(ResponseFormat::JsonSchema {
            json_schema: JsonSchemaFormat {
                name: "colors".to_owned(),
                description: None,
                schema: json!({"type": "array"}),
                strict: None,
            },
        });

        let request = provider.build_request(&params, false).unwrap();

        assert_eq!(request.response_format, Some(json!({"type": "json_object"})));
        let Some(OpenAiContent::Text(text)) = &request.messages[0].content else {
            panic!("expected text content");
        };
        assert!(text.contains("\"type\": \"array\""));
        assert!(text.ends_with("List three colors"));
    }
}
