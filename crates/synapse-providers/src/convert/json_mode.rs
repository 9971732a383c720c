//! Schema-constrained output for providers that only offer JSON mode
//!
//! The schema is moved into the prompt and the format relaxed to
//! `json_object`. Requests that cannot be rewritten pass through untouched.

use crate::types::{CompletionParams, Content, ResponseFormat, Role};

/// Rewrite a `json_schema` request into a `json_object` request
///
/// The last user message is prefixed with the pretty-printed schema. Nothing
/// changes when there is no user message, when that message is multimodal,
/// or when the schema cannot be serialized.
pub fn degrade_json_schema(mut params: CompletionParams) -> CompletionParams {
    let Some(ResponseFormat::JsonSchema { json_schema }) = &params.response_format else {
        return params;
    };

    let Ok(schema) = serde_json::to_string_pretty(&json_schema.schema) else {
        return params;
    };

    let Some(message) = params.messages.iter_mut().rev().find(|m| m.role == Role::User) else {
        return params;
    };

    let Content::Text(original) = &message.content else {
        return params;
    };

    message.content = Content::Text(format!(
        "Please respond with a JSON object that matches the following schema:\n\n{schema}\n\n\
         Return the JSON object only, no other text, do not wrap it in ```json or ```.\n\n{original}"
    ));
    params.response_format = Some(ResponseFormat::JsonObject);

    tracing::debug!(model = %params.model, "json_schema degraded to json_object");
    params
}
