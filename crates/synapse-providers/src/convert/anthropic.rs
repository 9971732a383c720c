//! Conversion between canonical types and the Anthropic Messages wire format

use serde_json::{Map, Value};

use crate::error::{ErrorKind, LlmError, UpstreamError, kind_for_status};
use crate::protocol::anthropic::{
    AnthropicContent, AnthropicContentBlock, AnthropicErrorDetail, AnthropicErrorResponse, AnthropicImageSource,
    AnthropicInputSchema, AnthropicMessage, AnthropicMetadata, AnthropicRequest, AnthropicResponse,
    AnthropicResponseBlock, AnthropicStreamContentBlock, AnthropicStreamDelta, AnthropicStreamEvent, AnthropicThinking,
    AnthropicTool, AnthropicToolChoice, AnthropicUsage,
};
use crate::state::StreamState;
use crate::streaming::StreamReconstructor;
use crate::types::{
    ChatCompletion, ChatCompletionChunk, Choice, ChoiceMessage, CompletionParams, Content, ContentPart, FinishReason,
    Message, ReasoningEffort, Role, ToolCall, ToolChoice, ToolChoiceMode, ToolDefinition, ToolSchemaError, Usage,
    unix_now,
};

/// Default max tokens when not specified (Anthropic requires this field)
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Thinking token budget for each effort tier
const fn thinking_budget(effort: ReasoningEffort) -> Option<u32> {
    match effort {
        ReasoningEffort::None => None,
        ReasoningEffort::Low => Some(1024),
        ReasoningEffort::Medium => Some(4096),
        ReasoningEffort::High => Some(16384),
    }
}

// -- Request: canonical -> wire --

impl TryFrom<&CompletionParams> for AnthropicRequest {
    type Error = ToolSchemaError;

    fn try_from(params: &CompletionParams) -> Result<Self, Self::Error> {
        let tools = params
            .tools()
            .map(|tools| tools.iter().map(AnthropicTool::try_from).collect::<Result<Vec<_>, _>>())
            .transpose()?;

        let (messages, system) = convert_messages(&params.messages);

        let mut max_tokens = params.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
        let thinking = ReasoningEffort::enabled(params.reasoning_effort)
            .and_then(thinking_budget)
            .map(|budget_tokens| {
                max_tokens = max_tokens.max(budget_tokens.saturating_mul(2));
                AnthropicThinking::Enabled { budget_tokens }
            });

        Ok(Self {
            model: params.model.clone(),
            max_tokens,
            system,
            messages,
            temperature: params.temperature,
            top_p: params.top_p,
            stop_sequences: params.stop.clone(),
            stream: params.stream.then_some(true),
            tools,
            tool_choice: convert_tool_choice(params.tool_choice.as_ref(), params.parallel_tool_calls),
            thinking,
            metadata: params.user.clone().map(|user_id| AnthropicMetadata { user_id: Some(user_id) }),
        })
    }
}

impl TryFrom<&ToolDefinition> for AnthropicTool {
    type Error = ToolSchemaError;

    fn try_from(tool: &ToolDefinition) -> Result<Self, Self::Error> {
        let function = &tool.function;
        let required = function.required_fields()?;

        let extra: Map<String, Value> = function
            .parameters
            .as_ref()
            .and_then(Value::as_object)
            .map(|schema| {
                schema
                    .iter()
                    .filter(|(key, _)| !matches!(key.as_str(), "type" | "properties" | "required"))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            name: function.name.clone(),
            description: function.description.clone(),
            input_schema: AnthropicInputSchema {
                schema_type: "object".to_owned(),
                properties: function.properties().cloned().unwrap_or_default(),
                required,
                extra,
            },
        })
    }
}

/// Split out the system prompt and map the remaining turns
///
/// System messages are joined with newlines in order. Consecutive tool
/// results are merged into one user turn, as Anthropic expects.
fn convert_messages(messages: &[Message]) -> (Vec<AnthropicMessage>, Option<String>) {
    let mut system = Vec::new();
    let mut out: Vec<AnthropicMessage> = Vec::new();
    let mut merging_tool_results = false;

    for msg in messages {
        match msg.role {
            Role::System => system.push(msg.content.as_text()),
            Role::Tool => {
                let block = AnthropicContentBlock::ToolResult {
                    tool_use_id: msg.tool_call_id.clone().unwrap_or_default(),
                    content: Some(msg.content.as_text()),
                    is_error: None,
                };

                if merging_tool_results
                    && let Some(AnthropicMessage {
                        content: AnthropicContent::Blocks(blocks),
                        ..
                    }) = out.last_mut()
                {
                    blocks.push(block);
                } else {
                    out.push(AnthropicMessage {
                        role: "user".to_owned(),
                        content: AnthropicContent::Blocks(vec![block]),
                    });
                }
                merging_tool_results = true;
                continue;
            }
            Role::Assistant => out.push(convert_assistant_message(msg)),
            Role::User => out.push(AnthropicMessage {
                role: "user".to_owned(),
                content: convert_user_content(&msg.content),
            }),
        }
        merging_tool_results = false;
    }

    let system = (!system.is_empty()).then(|| system.join("\n"));
    (out, system)
}

fn convert_assistant_message(msg: &Message) -> AnthropicMessage {
    let content = match msg.tool_calls.as_deref() {
        Some(calls) if !calls.is_empty() => {
            let mut blocks = Vec::with_capacity(calls.len() + 1);
            let text = msg.content.as_text();
            if !text.is_empty() {
                blocks.push(AnthropicContentBlock::Text { text });
            }
            blocks.extend(calls.iter().map(|call| AnthropicContentBlock::ToolUse {
                id: call.id.clone(),
                name: call.function.name.clone(),
                input: serde_json::from_str(&call.function.arguments).unwrap_or_else(|_| Value::Object(Map::new())),
            }));
            AnthropicContent::Blocks(blocks)
        }
        _ => AnthropicContent::Text(msg.content.as_text()),
    };

    AnthropicMessage {
        role: "assistant".to_owned(),
        content,
    }
}

fn convert_user_content(content: &Content) -> AnthropicContent {
    match content {
        Content::Text(text) => AnthropicContent::Text(text.clone()),
        Content::Parts(parts) => AnthropicContent::Blocks(
            parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => AnthropicContentBlock::Text { text: text.clone() },
                    ContentPart::Image { url, .. } => AnthropicContentBlock::Image {
                        source: convert_image_source(url),
                    },
                })
                .collect(),
        ),
    }
}

/// Data URIs become inline base64 sources; anything else is fetched by URL
fn convert_image_source(url: &str) -> AnthropicImageSource {
    match ContentPart::parse_data_uri(url) {
        Some((media_type, data)) => AnthropicImageSource::Base64 {
            media_type: media_type.to_owned(),
            data: data.to_owned(),
        },
        None => AnthropicImageSource::Url { url: url.to_owned() },
    }
}

fn convert_tool_choice(choice: Option<&ToolChoice>, parallel_tool_calls: Option<bool>) -> Option<AnthropicToolChoice> {
    let disable_parallel_tool_use = (parallel_tool_calls == Some(false)).then_some(true);

    let (choice_type, name) = match choice {
        Some(ToolChoice::Mode(ToolChoiceMode::None)) => ("none", None),
        Some(ToolChoice::Mode(ToolChoiceMode::Auto)) => ("auto", None),
        Some(ToolChoice::Mode(ToolChoiceMode::Required)) => ("any", None),
        Some(ToolChoice::Function(func)) => ("tool", Some(func.function.name.clone())),
        None if disable_parallel_tool_use.is_some() => ("auto", None),
        None => return None,
    };

    Some(AnthropicToolChoice {
        choice_type: choice_type.to_owned(),
        name,
        disable_parallel_tool_use,
    })
}

// -- Response: wire -> canonical --

impl From<AnthropicResponse> for ChatCompletion {
    fn from(resp: AnthropicResponse) -> Self {
        let mut text = String::new();
        let mut reasoning = String::new();
        let mut tool_calls = Vec::new();

        for block in resp.content {
            match block {
                AnthropicResponseBlock::Text { text: t } => text.push_str(&t),
                AnthropicResponseBlock::Thinking { thinking, .. } => reasoning.push_str(&thinking),
                AnthropicResponseBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCall::new(id, name, input.to_string()));
                }
                AnthropicResponseBlock::Unknown => {}
            }
        }

        let finish_reason = resp
            .stop_reason
            .as_deref()
            .map_or(FinishReason::Stop, convert_stop_reason)
            .with_tool_calls(!tool_calls.is_empty());

        Self {
            id: resp.id,
            object: Self::OBJECT.to_owned(),
            created: unix_now(),
            model: resp.model,
            choices: vec![Choice {
                index: 0,
                message: ChoiceMessage::assistant(text, reasoning, tool_calls),
                finish_reason: Some(finish_reason),
            }],
            usage: Some(resp.usage.into()),
        }
    }
}

impl From<AnthropicUsage> for Usage {
    fn from(usage: AnthropicUsage) -> Self {
        Self::new(usage.input_tokens, usage.output_tokens)
    }
}

/// Map a native stop reason, defaulting unknown values to `stop`
fn convert_stop_reason(reason: &str) -> FinishReason {
    match reason {
        "max_tokens" => FinishReason::Length,
        "tool_use" => FinishReason::ToolCalls,
        "refusal" => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

// -- Streaming --

/// Rebuilds canonical chunks from Anthropic stream events
#[derive(Debug)]
pub struct AnthropicStreamReconstructor {
    provider: String,
    state: StreamState,
    input_tokens: u32,
}

impl AnthropicStreamReconstructor {
    /// Reconstructor for one stream of `model` served by `provider`
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            state: StreamState::new(String::new(), model),
            input_tokens: 0,
        }
    }
}

impl StreamReconstructor for AnthropicStreamReconstructor {
    type Event = AnthropicStreamEvent;

    fn process(&mut self, event: AnthropicStreamEvent) -> Result<Vec<ChatCompletionChunk>, LlmError> {
        let chunk = match event {
            AnthropicStreamEvent::MessageStart { message } => {
                self.state.set_id(message.id);
                if !message.model.is_empty() {
                    self.state.set_model(message.model);
                }
                if let Some(usage) = message.usage {
                    self.input_tokens = usage.input_tokens;
                    self.state.record_usage(usage.into());
                }
                None
            }
            AnthropicStreamEvent::ContentBlockStart { content_block, .. } => {
                if let AnthropicStreamContentBlock::ToolUse { id, name } = content_block {
                    self.state.start_tool_call(id, name);
                    return Ok(Vec::new());
                }

                // input_json_delta of blocks we do not surface must not reach an earlier call
                self.state.clear_current_tool_call();
                match content_block {
                    AnthropicStreamContentBlock::Text { text } if !text.is_empty() => {
                        Some(self.state.text_delta(&text))
                    }
                    AnthropicStreamContentBlock::Thinking { thinking } if !thinking.is_empty() => {
                        Some(self.state.reasoning_delta(&thinking))
                    }
                    _ => None,
                }
            }
            AnthropicStreamEvent::ContentBlockDelta { delta, .. } => match delta {
                AnthropicStreamDelta::TextDelta { text } => Some(self.state.text_delta(&text)),
                AnthropicStreamDelta::ThinkingDelta { thinking } => Some(self.state.reasoning_delta(&thinking)),
                AnthropicStreamDelta::InputJsonDelta { partial_json } => {
                    self.state.tool_arguments_delta(&partial_json)
                }
                AnthropicStreamDelta::SignatureDelta { .. } | AnthropicStreamDelta::Unknown => None,
            },
            AnthropicStreamEvent::MessageDelta { delta, usage } => {
                if let Some(reason) = delta.stop_reason.as_deref() {
                    self.state.record_finish(convert_stop_reason(reason));
                }
                if let Some(usage) = usage {
                    // message_delta reports cumulative output; input comes from message_start
                    let input_tokens = if usage.input_tokens == 0 {
                        self.input_tokens
                    } else {
                        usage.input_tokens
                    };
                    self.state.record_usage(Usage::new(input_tokens, usage.output_tokens));
                }
                None
            }
            AnthropicStreamEvent::Error { error } => return Err(classify_stream_error(&self.provider, error)),
            AnthropicStreamEvent::ContentBlockStop { .. } => {
                self.state.clear_current_tool_call();
                None
            }
            AnthropicStreamEvent::MessageStop | AnthropicStreamEvent::Ping => None,
        };

        Ok(chunk.into_iter().collect())
    }

    fn finish(self) -> ChatCompletionChunk {
        self.state.final_chunk()
    }
}

// -- Error classification --

/// Map a native failure onto the canonical taxonomy
///
/// Substring refinement of 400s is best-effort and tied to Anthropic's wording.
pub fn classify_error(provider: &str, error: UpstreamError) -> LlmError {
    match error {
        UpstreamError::Api { status, body } => {
            let message = serde_json::from_str::<AnthropicErrorResponse>(&body).map_or(body, |r| r.error.message);
            let kind = kind_for_status(status).unwrap_or_else(|| refine_bad_request(&message));
            LlmError::from_kind(kind, provider, message)
        }
        other => LlmError::Provider {
            provider: provider.to_owned(),
            message: other.to_string(),
        },
    }
}

/// Classify an `error` event by its error type
fn classify_stream_error(provider: &str, error: AnthropicErrorDetail) -> LlmError {
    let kind = match error.error_type.as_str() {
        "rate_limit_error" => ErrorKind::RateLimit,
        "authentication_error" | "permission_error" => ErrorKind::Authentication,
        "not_found_error" => ErrorKind::ModelNotFound,
        "invalid_request_error" => refine_bad_request(&error.message),
        _ => ErrorKind::Provider,
    };
    LlmError::from_kind(kind, provider, error.message)
}

fn refine_bad_request(message: &str) -> ErrorKind {
    let message = message.to_lowercase();
    if message.contains("prompt is too long") || message.contains("context") {
        ErrorKind::ContextLengthExceeded
    } else {
        ErrorKind::InvalidRequest
    }
}
