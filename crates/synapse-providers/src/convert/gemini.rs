//! Conversion between canonical types and the Gemini wire format

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{ErrorKind, LlmError, UpstreamError, kind_for_status};
use crate::protocol::gemini::{
    GeminiBatchEmbedRequest, GeminiBatchEmbedResponse, GeminiContent, GeminiEmbedRequest, GeminiErrorDetail,
    GeminiErrorResponse, GeminiFileData, GeminiFunctionCall, GeminiFunctionCallingConfig, GeminiFunctionDeclaration,
    GeminiFunctionResponse, GeminiGenerationConfig, GeminiInlineData, GeminiModel, GeminiPart, GeminiRequest,
    GeminiResponse, GeminiThinkingConfig, GeminiTool, GeminiToolConfig, GeminiUsageMetadata,
};
use crate::state::StreamState;
use crate::streaming::StreamReconstructor;
use crate::types::{
    ChatCompletion, ChatCompletionChunk, Choice, ChoiceMessage, CompletionParams, Content, ContentPart,
    EmbeddingData, EmbeddingParams, EmbeddingResponse, EmbeddingUsage, FinishReason, Message, ModelInfo,
    ReasoningEffort, ResponseFormat, Role, ToolCall, ToolChoice, ToolChoiceMode, ToolDefinition, ToolSchemaError,
    Usage, unix_now,
};

const ROLE_USER: &str = "user";
const ROLE_MODEL: &str = "model";

/// Name used for function responses whose message carries no name
const FALLBACK_FUNCTION_NAME: &str = "function";

/// MIME type assumed for images referenced by URL
const DEFAULT_IMAGE_MIME_TYPE: &str = "image/jpeg";

const ID_PREFIX_COMPLETION: &str = "gemini-";
const ID_PREFIX_TOOL_CALL: &str = "call_";

/// Thinking token budget for each effort tier
const fn thinking_budget(effort: ReasoningEffort) -> Option<u32> {
    match effort {
        ReasoningEffort::None => None,
        ReasoningEffort::Low => Some(1024),
        ReasoningEffort::Medium => Some(8192),
        ReasoningEffort::High => Some(24576),
    }
}

/// Random identifier with the given prefix
fn generate_id(prefix: &str) -> String {
    format!("{prefix}{}", Uuid::new_v4().simple())
}

// -- Request: canonical -> wire --

impl TryFrom<&CompletionParams> for GeminiRequest {
    type Error = ToolSchemaError;

    fn try_from(params: &CompletionParams) -> Result<Self, Self::Error> {
        let tools = params.tools().map(convert_tools).transpose()?;
        let (contents, system_instruction) = convert_messages(&params.messages);

        let mut config = GeminiGenerationConfig {
            temperature: params.temperature,
            top_p: params.top_p,
            max_output_tokens: params.max_tokens,
            stop_sequences: params.stop.clone().filter(|stop| !stop.is_empty()),
            seed: params.seed,
            thinking_config: ReasoningEffort::enabled(params.reasoning_effort)
                .and_then(thinking_budget)
                .map(|thinking_budget| GeminiThinkingConfig {
                    include_thoughts: true,
                    thinking_budget,
                }),
            ..GeminiGenerationConfig::default()
        };
        apply_response_format(&mut config, params.response_format.as_ref());

        Ok(Self {
            contents,
            system_instruction,
            generation_config: (!config.is_empty()).then_some(config),
            tools,
            tool_config: params.tool_choice.as_ref().map(convert_tool_choice),
        })
    }
}

fn convert_tools(tools: &[ToolDefinition]) -> Result<Vec<GeminiTool>, ToolSchemaError> {
    let function_declarations = tools
        .iter()
        .map(|tool| {
            tool.function.required_fields()?;
            Ok(GeminiFunctionDeclaration {
                name: tool.function.name.clone(),
                description: tool.function.description.clone(),
                parameters_json_schema: tool.function.parameters.clone(),
            })
        })
        .collect::<Result<Vec<_>, ToolSchemaError>>()?;

    Ok(vec![GeminiTool { function_declarations }])
}

fn convert_tool_choice(choice: &ToolChoice) -> GeminiToolConfig {
    let (mode, allowed_function_names) = match choice {
        ToolChoice::Mode(ToolChoiceMode::Auto) => ("AUTO", None),
        ToolChoice::Mode(ToolChoiceMode::None) => ("NONE", None),
        ToolChoice::Mode(ToolChoiceMode::Required) => ("ANY", None),
        ToolChoice::Function(func) => ("ANY", Some(vec![func.function.name.clone()])),
    };

    GeminiToolConfig {
        function_calling_config: GeminiFunctionCallingConfig {
            mode: mode.to_owned(),
            allowed_function_names,
        },
    }
}

fn apply_response_format(config: &mut GeminiGenerationConfig, format: Option<&ResponseFormat>) {
    match format {
        Some(ResponseFormat::JsonObject) => {
            config.response_mime_type = Some("application/json".to_owned());
        }
        Some(ResponseFormat::JsonSchema { json_schema }) => {
            config.response_mime_type = Some("application/json".to_owned());
            config.response_json_schema = Some(json_schema.schema.clone());
        }
        Some(ResponseFormat::Text) | None => {}
    }
}

/// Split out the system instruction and map the remaining turns
fn convert_messages(messages: &[Message]) -> (Vec<GeminiContent>, Option<GeminiContent>) {
    let mut system = Vec::new();
    let mut contents = Vec::with_capacity(messages.len());

    for msg in messages {
        match msg.role {
            Role::System => system.push(msg.content.as_text()),
            Role::User => contents.push(GeminiContent::new(ROLE_USER, convert_user_parts(&msg.content))),
            Role::Assistant => contents.extend(convert_assistant_message(msg)),
            Role::Tool => contents.push(convert_tool_message(msg)),
        }
    }

    let system_instruction = (!system.is_empty()).then(|| GeminiContent {
        role: None,
        parts: vec![GeminiPart::text(system.join("\n"))],
    });

    (contents, system_instruction)
}

fn convert_user_parts(content: &Content) -> Vec<GeminiPart> {
    match content {
        Content::Text(text) => vec![GeminiPart::text(text.clone())],
        Content::Parts(parts) => parts
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => GeminiPart::text(text.clone()),
                ContentPart::Image { url, .. } => convert_image_part(url),
            })
            .collect(),
    }
}

/// Valid base64 data URIs are sent inline; anything else as a file reference
fn convert_image_part(url: &str) -> GeminiPart {
    if let Some((mime_type, data)) = ContentPart::parse_data_uri(url)
        && STANDARD.decode(data).is_ok()
    {
        return GeminiPart {
            inline_data: Some(GeminiInlineData {
                mime_type: mime_type.to_owned(),
                data: data.to_owned(),
            }),
            ..GeminiPart::default()
        };
    }

    GeminiPart {
        file_data: Some(GeminiFileData {
            mime_type: DEFAULT_IMAGE_MIME_TYPE.to_owned(),
            file_uri: url.to_owned(),
        }),
        ..GeminiPart::default()
    }
}

/// Assistant text plus function calls; `None` when the turn is empty
fn convert_assistant_message(msg: &Message) -> Option<GeminiContent> {
    let mut parts = Vec::new();

    let text = msg.content.as_text();
    if !text.is_empty() {
        parts.push(GeminiPart::text(text));
    }

    for call in msg.tool_calls.iter().flatten() {
        parts.push(GeminiPart {
            function_call: Some(GeminiFunctionCall {
                name: call.function.name.clone(),
                args: serde_json::from_str(&call.function.arguments).ok(),
            }),
            ..GeminiPart::default()
        });
    }

    (!parts.is_empty()).then(|| GeminiContent::new(ROLE_MODEL, parts))
}

/// Tool results travel as a user turn holding a function response
fn convert_tool_message(msg: &Message) -> GeminiContent {
    let name = msg
        .name
        .clone()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_FUNCTION_NAME.to_owned());

    let content = msg.content.as_text();
    let response = match serde_json::from_str::<Value>(&content) {
        Ok(object @ Value::Object(_)) => object,
        _ => serde_json::json!({ "result": content }),
    };

    GeminiContent::new(
        ROLE_USER,
        vec![GeminiPart {
            function_response: Some(GeminiFunctionResponse { name, response }),
            ..GeminiPart::default()
        }],
    )
}

/// Batch embedding request for `model` (already in `models/...` form)
pub fn embedding_request(model: &str, params: &EmbeddingParams) -> GeminiBatchEmbedRequest {
    GeminiBatchEmbedRequest {
        requests: params
            .input
            .as_vec()
            .into_iter()
            .map(|text| GeminiEmbedRequest {
                model: model.to_owned(),
                content: GeminiContent {
                    role: None,
                    parts: vec![GeminiPart::text(text)],
                },
                output_dimensionality: params.dimensions,
            })
            .collect(),
    }
}

// -- Response: wire -> canonical --

/// Convert a full response for `model`
pub fn convert_response(resp: GeminiResponse, model: &str) -> ChatCompletion {
    let mut text = String::new();
    let mut reasoning = String::new();
    let mut tool_calls = Vec::new();
    let mut finish_reason = FinishReason::Stop;

    if let Some(candidate) = resp.candidates.into_iter().next() {
        if let Some(reason) = candidate.finish_reason.as_deref() {
            finish_reason = convert_finish_reason(reason);
        }

        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(call) = part.function_call {
                tool_calls.push(convert_function_call(call));
            } else if let Some(t) = part.text {
                if part.thought == Some(true) {
                    reasoning.push_str(&t);
                } else {
                    text.push_str(&t);
                }
            }
        }
    }

    ChatCompletion {
        id: generate_id(ID_PREFIX_COMPLETION),
        object: ChatCompletion::OBJECT.to_owned(),
        created: unix_now(),
        model: model.to_owned(),
        choices: vec![Choice {
            index: 0,
            finish_reason: Some(finish_reason.with_tool_calls(!tool_calls.is_empty())),
            message: ChoiceMessage::assistant(text, reasoning, tool_calls),
        }],
        usage: resp.usage_metadata.map(Into::into),
    }
}

impl From<GeminiUsageMetadata> for Usage {
    fn from(usage: GeminiUsageMetadata) -> Self {
        Self {
            reasoning_tokens: (usage.thoughts_token_count > 0).then_some(usage.thoughts_token_count),
            ..Self::new(usage.prompt_token_count, usage.candidates_token_count)
        }
    }
}

impl From<GeminiModel> for ModelInfo {
    fn from(model: GeminiModel) -> Self {
        Self::new(model.name, "google")
    }
}

/// Canonical embedding response in request order
pub fn convert_embedding_response(resp: GeminiBatchEmbedResponse, model: &str) -> EmbeddingResponse {
    EmbeddingResponse {
        object: "list".to_owned(),
        data: resp
            .embeddings
            .into_iter()
            .enumerate()
            .map(|(index, embedding)| EmbeddingData {
                object: "embedding".to_owned(),
                embedding: embedding.values,
                index,
            })
            .collect(),
        model: model.to_owned(),
        usage: EmbeddingUsage::default(),
    }
}

/// Function calls arrive whole; Gemini assigns no id, so one is generated
fn convert_function_call(call: GeminiFunctionCall) -> ToolCall {
    let arguments = call.args.map_or_else(|| "{}".to_owned(), |args| args.to_string());
    ToolCall::new(generate_id(ID_PREFIX_TOOL_CALL), call.name, arguments)
}

/// Map a native finish reason, defaulting unknown values to `stop`
fn convert_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "MAX_TOKENS" => FinishReason::Length,
        "SAFETY" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

// -- Streaming --

/// Rebuilds canonical chunks from streamed `GenerateContentResponse` events
#[derive(Debug)]
pub struct GeminiStreamReconstructor {
    provider: String,
    state: StreamState,
}

impl GeminiStreamReconstructor {
    /// Reconstructor for one stream of `model` served by `provider`
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            state: StreamState::new(generate_id(ID_PREFIX_COMPLETION), model),
        }
    }
}

impl StreamReconstructor for GeminiStreamReconstructor {
    type Event = GeminiResponse;

    fn process(&mut self, resp: GeminiResponse) -> Result<Vec<ChatCompletionChunk>, LlmError> {
        if let Some(error) = resp.error {
            return Err(classify_detail(&self.provider, error));
        }

        if let Some(usage) = resp.usage_metadata {
            self.state.record_usage(usage.into());
        }

        let Some(candidate) = resp.candidates.into_iter().next() else {
            return Ok(Vec::new());
        };

        if let Some(reason) = candidate.finish_reason.as_deref() {
            self.state.record_finish(convert_finish_reason(reason));
        }

        let mut out = Vec::new();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            let thought = part.is_thought();
            if let Some(call) = part.function_call {
                out.push(self.state.complete_tool_call(convert_function_call(call)));
            } else if let Some(text) = part.text.filter(|t| !t.is_empty()) {
                out.push(if thought {
                    self.state.reasoning_delta(&text)
                } else {
                    self.state.text_delta(&text)
                });
            }
        }

        Ok(out)
    }

    fn finish(self) -> ChatCompletionChunk {
        self.state.final_chunk()
    }
}

// -- Error classification --

/// Map a native failure onto the canonical taxonomy
///
/// Gemini gives no structured distinction for oversized prompts or blocked
/// content, so 400s are refined by message wording on a best-effort basis.
pub fn classify_error(provider: &str, error: UpstreamError) -> LlmError {
    match error {
        UpstreamError::Api { status, body } => {
            let message = serde_json::from_str::<GeminiErrorResponse>(&body).map_or(body, |r| r.error.message);
            let kind = kind_for_status(status).unwrap_or_else(|| refine_bad_request(&message));
            LlmError::from_kind(kind, provider, message)
        }
        other => LlmError::Provider {
            provider: provider.to_owned(),
            message: other.to_string(),
        },
    }
}

fn classify_detail(provider: &str, detail: GeminiErrorDetail) -> LlmError {
    let kind = kind_for_status(detail.code).unwrap_or_else(|| refine_bad_request(&detail.message));
    LlmError::from_kind(kind, provider, detail.message)
}

fn refine_bad_request(message: &str) -> ErrorKind {
    let message = message.to_lowercase();
    if message.contains("context") || message.contains("token") {
        ErrorKind::ContextLengthExceeded
    } else if message.contains("safety") || message.contains("block") {
        ErrorKind::ContentFilter
    } else {
        ErrorKind::InvalidRequest
    }
}
