//! Conversion between canonical types and the OpenAI-compatible wire format

use crate::error::{ErrorKind, LlmError, UpstreamError, kind_for_status};
use crate::protocol::openai::{
    OpenAiChoice, OpenAiContent, OpenAiContentPart, OpenAiEmbeddingRequest, OpenAiErrorDetail, OpenAiErrorResponse,
    OpenAiFunction, OpenAiFunctionCall, OpenAiImageUrl, OpenAiMessage, OpenAiModel, OpenAiRequest, OpenAiResponse,
    OpenAiStreamChunk, OpenAiTool, OpenAiToolCall, OpenAiUsage,
};
use crate::state::StreamState;
use crate::streaming::StreamReconstructor;
use crate::types::{
    ChatCompletion, ChatCompletionChunk, Choice, ChoiceMessage, CompletionParams, Content, ContentPart,
    EmbeddingParams, FinishReason, Message, ModelInfo, ReasoningEffort, ToolCall, ToolDefinition, ToolSchemaError,
    Usage,
};

// -- Request: canonical -> wire --

impl TryFrom<&CompletionParams> for OpenAiRequest {
    type Error = ToolSchemaError;

    fn try_from(params: &CompletionParams) -> Result<Self, Self::Error> {
        let tools = params
            .tools()
            .map(|tools| tools.iter().map(OpenAiTool::try_from).collect::<Result<Vec<_>, _>>())
            .transpose()?;

        Ok(Self {
            model: params.model.clone(),
            messages: params.messages.iter().map(Into::into).collect(),
            temperature: params.temperature,
            top_p: params.top_p,
            max_tokens: params.max_tokens,
            stop: params.stop.clone(),
            seed: params.seed,
            user: params.user.clone(),
            stream: params.stream.then_some(true),
            stream_options: None,
            tools,
            tool_choice: params
                .tool_choice
                .as_ref()
                .and_then(|choice| serde_json::to_value(choice).ok()),
            parallel_tool_calls: params.parallel_tool_calls,
            reasoning_effort: ReasoningEffort::enabled(params.reasoning_effort).map(|e| e.as_str().to_owned()),
            response_format: params
                .response_format
                .as_ref()
                .and_then(|format| serde_json::to_value(format).ok()),
        })
    }
}

impl TryFrom<&ToolDefinition> for OpenAiTool {
    type Error = ToolSchemaError;

    fn try_from(tool: &ToolDefinition) -> Result<Self, Self::Error> {
        // Schemas pass through untouched, but a malformed `required` is still rejected
        tool.function.required_fields()?;

        Ok(Self {
            tool_type: tool.tool_type.clone(),
            function: OpenAiFunction {
                name: tool.function.name.clone(),
                description: tool.function.description.clone(),
                parameters: tool.function.parameters.clone(),
            },
        })
    }
}

impl From<&Message> for OpenAiMessage {
    fn from(msg: &Message) -> Self {
        let tool_calls = msg
            .tool_calls
            .as_ref()
            .filter(|calls| !calls.is_empty())
            .map(|calls| calls.iter().map(Into::into).collect::<Vec<_>>());

        let content = match &msg.content {
            Content::Text(text) if text.is_empty() && tool_calls.is_some() => None,
            Content::Text(text) => Some(OpenAiContent::Text(text.clone())),
            Content::Parts(parts) => Some(OpenAiContent::Parts(parts.iter().map(Into::into).collect())),
        };

        Self {
            role: msg.role.as_str().to_owned(),
            content,
            name: msg.name.clone(),
            tool_calls,
            tool_call_id: msg.tool_call_id.clone(),
        }
    }
}

impl From<&ContentPart> for OpenAiContentPart {
    fn from(part: &ContentPart) -> Self {
        match part {
            ContentPart::Text { text } => Self::Text { text: text.clone() },
            ContentPart::Image { url, detail } => Self::ImageUrl {
                image_url: OpenAiImageUrl {
                    url: url.clone(),
                    detail: detail.clone(),
                },
            },
        }
    }
}

impl From<&ToolCall> for OpenAiToolCall {
    fn from(call: &ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            tool_type: "function".to_owned(),
            function: OpenAiFunctionCall {
                name: call.function.name.clone(),
                arguments: call.function.arguments.clone(),
            },
        }
    }
}

impl From<&EmbeddingParams> for OpenAiEmbeddingRequest {
    fn from(params: &EmbeddingParams) -> Self {
        Self {
            model: params.model.clone(),
            input: params.input.as_vec().into_iter().map(str::to_owned).collect(),
            encoding_format: params.encoding_format.clone(),
            dimensions: params.dimensions,
            user: params.user.clone(),
        }
    }
}

// -- Response: wire -> canonical --

impl From<OpenAiResponse> for ChatCompletion {
    fn from(resp: OpenAiResponse) -> Self {
        Self {
            id: resp.id,
            object: Self::OBJECT.to_owned(),
            created: resp.created,
            model: resp.model,
            choices: resp.choices.into_iter().map(Into::into).collect(),
            usage: resp.usage.map(Into::into),
        }
    }
}

impl From<OpenAiChoice> for Choice {
    fn from(choice: OpenAiChoice) -> Self {
        let message = choice.message;
        let tool_calls: Vec<ToolCall> = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall::new(tc.id, tc.function.name, tc.function.arguments))
            .collect();

        let finish_reason = choice
            .finish_reason
            .as_deref()
            .map_or(FinishReason::Stop, parse_finish_reason)
            .with_tool_calls(!tool_calls.is_empty());

        let reasoning = message.reasoning_content.or(message.reasoning).unwrap_or_default();

        Self {
            index: choice.index,
            message: ChoiceMessage::assistant(message.content.unwrap_or_default(), reasoning, tool_calls),
            finish_reason: Some(finish_reason),
        }
    }
}

impl From<OpenAiUsage> for Usage {
    fn from(usage: OpenAiUsage) -> Self {
        let total_tokens = if usage.total_tokens == 0 {
            usage.prompt_tokens.saturating_add(usage.completion_tokens)
        } else {
            usage.total_tokens
        };

        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens,
            reasoning_tokens: usage.completion_tokens_details.and_then(|d| d.reasoning_tokens),
        }
    }
}

impl From<OpenAiModel> for ModelInfo {
    fn from(model: OpenAiModel) -> Self {
        Self {
            id: model.id,
            object: "model".to_owned(),
            created: model.created,
            owned_by: model.owned_by,
        }
    }
}

/// Map a native finish reason, defaulting unknown values to `stop`
fn parse_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "length" => FinishReason::Length,
        "tool_calls" | "function_call" => FinishReason::ToolCalls,
        "content_filter" => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

// -- Streaming --

/// Rebuilds canonical chunks from OpenAI-compatible stream chunks
#[derive(Debug)]
pub struct OpenAiStreamReconstructor {
    provider: String,
    state: StreamState,
    /// Native `index` of each accumulated tool call, by position
    tool_indices: Vec<u32>,
}

impl OpenAiStreamReconstructor {
    /// Reconstructor for one stream of `model` served by `provider`
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            state: StreamState::new(String::new(), model),
            tool_indices: Vec::new(),
        }
    }

    /// Route a tool-call fragment to its call, opening a new one when needed
    ///
    /// Calls are keyed by the native `index`. A fragment opens a new call only
    /// when its index is unseen or it carries a different non-empty id.
    fn route_tool_call(&mut self, index: u32, id: Option<String>, name: Option<String>) {
        let id = id.filter(|id| !id.is_empty());
        let existing = self.tool_indices.iter().rposition(|&seen| seen == index);

        match existing {
            Some(position)
                if id
                    .as_deref()
                    .is_none_or(|id| self.state.tool_calls().get(position).is_some_and(|call| call.id == id)) =>
            {
                self.state.focus_tool_call(position);
            }
            _ => {
                self.state.start_tool_call(id.unwrap_or_default(), name.unwrap_or_default());
                self.tool_indices.push(index);
            }
        }
    }
}

impl StreamReconstructor for OpenAiStreamReconstructor {
    type Event = OpenAiStreamChunk;

    fn process(&mut self, chunk: OpenAiStreamChunk) -> Result<Vec<ChatCompletionChunk>, LlmError> {
        if let Some(error) = chunk.error {
            return Err(classify_detail(&self.provider, None, error));
        }

        if self.state.id().is_empty() && !chunk.id.is_empty() {
            self.state.set_id(chunk.id);
        }
        if !chunk.model.is_empty() {
            self.state.set_model(chunk.model);
        }
        if let Some(usage) = chunk.usage {
            self.state.record_usage(usage.into());
        }

        let mut out = Vec::new();
        for choice in chunk.choices.into_iter().filter(|c| c.index == 0) {
            let delta = choice.delta;

            if let Some(reasoning) = delta.reasoning_content.or(delta.reasoning)
                && !reasoning.is_empty()
            {
                out.push(self.state.reasoning_delta(&reasoning));
            }

            if let Some(content) = delta.content
                && !content.is_empty()
            {
                out.push(self.state.text_delta(&content));
            }

            for call in delta.tool_calls.unwrap_or_default() {
                let (name, arguments) = call.function.map(|f| (f.name, f.arguments)).unwrap_or_default();

                self.route_tool_call(call.index, call.id, name);

                if let Some(arguments) = arguments
                    && !arguments.is_empty()
                    && let Some(chunk) = self.state.tool_arguments_delta(&arguments)
                {
                    out.push(chunk);
                }
            }

            if let Some(reason) = choice.finish_reason.as_deref() {
                self.state.record_finish(parse_finish_reason(reason));
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
/// Substring refinement of 400s is best-effort and tied to provider wording.
pub fn classify_error(provider: &str, error: UpstreamError) -> LlmError {
    match error {
        UpstreamError::Api { status, body } => match serde_json::from_str::<OpenAiErrorResponse>(&body) {
            Ok(parsed) => classify_detail(provider, Some(status), parsed.error),
            Err(_) => {
                let kind = kind_for_status(status).unwrap_or_else(|| refine_bad_request(None, &body));
                LlmError::from_kind(kind, provider, body)
            }
        },
        other => LlmError::Provider {
            provider: provider.to_owned(),
            message: other.to_string(),
        },
    }
}

fn classify_detail(provider: &str, status: Option<u16>, detail: OpenAiErrorDetail) -> LlmError {
    let kind = match status {
        Some(status) => {
            kind_for_status(status).unwrap_or_else(|| refine_bad_request(detail.code_str(), &detail.message))
        }
        None => in_band_kind(&detail),
    };
    LlmError::from_kind(kind, provider, detail.message)
}

/// Refine a 400 using the structured code first, then message wording
fn refine_bad_request(code: Option<&str>, message: &str) -> ErrorKind {
    match code {
        Some("context_length_exceeded") => return ErrorKind::ContextLengthExceeded,
        Some("content_filter") => return ErrorKind::ContentFilter,
        _ => {}
    }

    let message = message.to_lowercase();
    if ["context length", "maximum context", "too many tokens"]
        .iter()
        .any(|needle| message.contains(needle))
    {
        ErrorKind::ContextLengthExceeded
    } else if ["content filter", "content_policy", "safety"]
        .iter()
        .any(|needle| message.contains(needle))
    {
        ErrorKind::ContentFilter
    } else {
        ErrorKind::InvalidRequest
    }
}

/// Errors delivered inside a stream carry no status code
fn in_band_kind(detail: &OpenAiErrorDetail) -> ErrorKind {
    let code = detail.code_str().or(detail.error_type.as_deref()).unwrap_or_default();
    if code.contains("rate_limit") {
        ErrorKind::RateLimit
    } else {
        match refine_bad_request(Some(code), &detail.message) {
            ErrorKind::InvalidRequest => ErrorKind::Provider,
            kind => kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::protocol::openai::{
        OpenAiChoiceMessage, OpenAiStreamChoice, OpenAiStreamDelta, OpenAiStreamFunctionCall, OpenAiStreamToolCall,
    };
    use crate::types::{JsonSchemaFormat, ResponseFormat, Role, ToolChoice};

    fn weather_tool(required: serde_json::Value) -> ToolDefinition {
        ToolDefinition::function(
            "get_weather",
            "Get the weather",
            json!({
                "type": "object",
                "properties": {"location": {"type": "string"}},
                "required": required,
            }),
        )
    }

    fn text_chunk(content: &str) -> OpenAiStreamChunk {
        OpenAiStreamChunk {
            id: "chatcmpl-1".to_owned(),
            model: "gpt-4o".to_owned(),
            choices: vec![OpenAiStreamChoice {
                index: 0,
                delta: OpenAiStreamDelta {
                    content: Some(content.to_owned()),
                    ..OpenAiStreamDelta::default()
                },
                finish_reason: None,
            }],
            usage: None,
            error: None,
        }
    }

    #[test]
    fn request_keeps_messages_in_order() {
        let params = CompletionParams::new(
            "gpt-4o",
            vec![Message::system("Be terse."), Message::user("2+2?")],
        );
        let req = OpenAiRequest::try_from(&params).unwrap();
        let roles: Vec<_> = req.messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["system", "user"]);
        assert!(req.stream.is_none());
        assert!(req.tools.is_none());
    }

    #[test]
    fn request_passes_structured_output_and_reasoning() {
        let mut params = CompletionParams::new("gpt-4o", vec![Message::user("hi")]);
        params.reasoning_effort = Some(ReasoningEffort::High);
        params.tool_choice = Some(ToolChoice::function("get_weather"));
        params.response_format = Some(ResponseFormat::JsonSchema {
            json_schema: JsonSchemaFormat {
                name: "answer".to_owned(),
                description: None,
                schema: json!({"type": "object"}),
                strict: Some(true),
            },
        });

        let value = serde_json::to_value(OpenAiRequest::try_from(&params).unwrap()).unwrap();
        assert_eq!(value["reasoning_effort"], "high");
        assert_eq!(value["tool_choice"]["function"]["name"], "get_weather");
        assert_eq!(value["response_format"]["type"], "json_schema");
        assert_eq!(value["response_format"]["json_schema"]["strict"], true);
    }

    #[test]
    fn reasoning_effort_none_is_omitted() {
        let mut params = CompletionParams::new("gpt-4o", vec![Message::user("hi")]);
        params.reasoning_effort = Some(ReasoningEffort::None);
        let req = OpenAiRequest::try_from(&params).unwrap();
        assert!(req.reasoning_effort.is_none());
    }

    #[test]
    fn malformed_required_rejects_request() {
        let mut params = CompletionParams::new("gpt-4o", vec![Message::user("hi")]);
        params.tools = Some(vec![weather_tool(json!(["location", 7]))]);
        let err = OpenAiRequest::try_from(&params).unwrap_err();
        assert!(matches!(err, ToolSchemaError::RequiredElement { index: 1, .. }));
    }

    #[test]
    fn tool_result_and_assistant_calls_map_to_tool_role() {
        let assistant =
            Message::assistant("").with_tool_calls(vec![ToolCall::new("call_1", "get_weather", r#"{"location":"Paris"}"#)]);
        let wire = OpenAiMessage::from(&assistant);
        assert!(wire.content.is_none());
        assert_eq!(wire.tool_calls.as_ref().unwrap()[0].function.name, "get_weather");

        let wire = OpenAiMessage::from(&Message::tool("call_1", "sunny"));
        assert_eq!(wire.role, "tool");
        assert_eq!(wire.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn response_with_tool_calls_reports_tool_calls() {
        let resp = OpenAiResponse {
            id: "chatcmpl-1".to_owned(),
            created: 1,
            model: "gpt-4o".to_owned(),
            choices: vec![OpenAiChoice {
                index: 0,
                message: OpenAiChoiceMessage {
                    tool_calls: Some(vec![OpenAiToolCall::from(&ToolCall::new("call_1", "get_weather", "{}"))]),
                    ..OpenAiChoiceMessage::default()
                },
                finish_reason: Some("stop".to_owned()),
            }],
            usage: Some(OpenAiUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                ..OpenAiUsage::default()
            }),
        };

        let completion = ChatCompletion::from(resp);
        assert_eq!(completion.object, "chat.completion");
        assert_eq!(completion.choices[0].finish_reason, Some(FinishReason::ToolCalls));
        assert_eq!(completion.message().unwrap().role, Role::Assistant);
        assert!(completion.message().unwrap().content.is_none());
        assert_eq!(completion.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn response_reasoning_reads_either_spelling() {
        let resp: OpenAiResponse = serde_json::from_value(json!({
            "id": "x", "created": 1, "model": "deepseek-reasoner",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "4", "reasoning_content": "2+2"}, "finish_reason": "stop"}]
        }))
        .unwrap();
        let completion = ChatCompletion::from(resp);
        assert_eq!(completion.message().unwrap().reasoning.as_ref().unwrap().content, "2+2");

        let resp: OpenAiResponse = serde_json::from_value(json!({
            "choices": [{"message": {"content": "4", "reasoning": "sum"}, "finish_reason": "mystery"}]
        }))
        .unwrap();
        let completion = ChatCompletion::from(resp);
        assert_eq!(completion.message().unwrap().reasoning.as_ref().unwrap().content, "sum");
        assert_eq!(completion.choices[0].finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn stream_emits_text_in_arrival_order() {
        let mut rec = OpenAiStreamReconstructor::new("openai", "gpt-4o");
        let mut texts = Vec::new();
        for piece in ["4", " (", ")"] {
            for chunk in rec.process(text_chunk(piece)).unwrap() {
                assert_eq!(chunk.id, "chatcmpl-1");
                texts.push(chunk.content().unwrap().to_owned());
            }
        }
        assert_eq!(texts, ["4", " (", ")"]);

        let last = rec.finish();
        assert_eq!(last.finish_reason(), Some(FinishReason::Stop));
        assert!(last.delta().unwrap().tool_calls.is_none());
    }

    fn tool_fragment(index: u32, id: Option<&str>, name: Option<&str>, args: &str) -> OpenAiStreamChunk {
        OpenAiStreamChunk {
            choices: vec![OpenAiStreamChoice {
                index: 0,
                delta: OpenAiStreamDelta {
                    tool_calls: Some(vec![OpenAiStreamToolCall {
                        index,
                        id: id.map(str::to_owned),
                        function: Some(OpenAiStreamFunctionCall {
                            name: name.map(str::to_owned),
                            arguments: Some(args.to_owned()),
                        }),
                    }]),
                    ..OpenAiStreamDelta::default()
                },
                finish_reason: None,
            }],
            ..text_chunk("")
        }
    }

    #[test]
    fn stream_accumulates_indexed_tool_call_fragments() {
        let mut rec = OpenAiStreamReconstructor::new("groq", "llama");
        let call = |id, name, args| tool_fragment(0, id, name, args);

        assert!(rec.process(call(Some("call_1"), Some("get_weather"), "")).unwrap().is_empty());
        assert_eq!(rec.process(call(None, None, r#"{"location":"#)).unwrap().len(), 1);
        rec.process(call(None, None, r#""Paris"}"#)).unwrap();
        assert_eq!(rec.state.tool_calls()[0].function.arguments, r#"{"location":"Paris"}"#);

        let mut done = text_chunk("");
        done.choices[0].finish_reason = Some("stop".to_owned());
        rec.process(done).unwrap();
        assert_eq!(rec.finish().finish_reason(), Some(FinishReason::ToolCalls));
    }

    #[test]
    fn stream_repeated_id_continues_same_call() {
        let mut rec = OpenAiStreamReconstructor::new("openai", "gpt-4o");
        rec.process(tool_fragment(0, Some("call_1"), Some("get_weather"), r#"{"loc"#)).unwrap();
        rec.process(tool_fragment(0, Some("call_1"), None, r#"ation":"Paris"}"#)).unwrap();

        let calls = rec.state.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "get_weather");
        assert_eq!(calls[0].function.arguments, r#"{"location":"Paris"}"#);
        assert!(serde_json::from_str::<Value>(&calls[0].function.arguments).is_ok());
    }

    #[test]
    fn stream_empty_id_continues_same_call() {
        let mut rec = OpenAiStreamReconstructor::new("llamacpp", "qwen");
        rec.process(tool_fragment(0, Some("call_1"), Some("get_weather"), r#"{"loc"#)).unwrap();
        rec.process(tool_fragment(0, Some(""), Some(""), r#"ation":"Paris"}"#)).unwrap();

        let calls = rec.state.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].function.arguments, r#"{"location":"Paris"}"#);
    }

    #[test]
    fn stream_parallel_calls_interleave_by_index() {
        let mut rec = OpenAiStreamReconstructor::new("openai", "gpt-4o");
        rec.process(tool_fragment(0, Some("call_1"), Some("get_weather"), r#"{"location":"#)).unwrap();
        rec.process(tool_fragment(1, Some("call_2"), Some("get_time"), r#"{"zone":"#)).unwrap();
        rec.process(tool_fragment(0, None, None, r#""Paris"}"#)).unwrap();
        let chunks = rec.process(tool_fragment(1, None, None, r#""CET"}"#)).unwrap();
        assert_eq!(chunks[0].delta().unwrap().tool_calls.as_ref().unwrap()[0].index, 1);

        let calls = rec.state.tool_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].function.arguments, r#"{"location":"Paris"}"#);
        assert_eq!(calls[1].id, "call_2");
        assert_eq!(calls[1].function.arguments, r#"{"zone":"CET"}"#);
    }

    #[test]
    fn stream_usage_only_chunk_lands_on_final() {
        let mut rec = OpenAiStreamReconstructor::new("openai", "gpt-4o");
        rec.process(text_chunk("hi")).unwrap();
        let usage_chunk: OpenAiStreamChunk = serde_json::from_value(json!({
            "id": "chatcmpl-1", "model": "gpt-4o", "choices": [],
            "usage": {"prompt_tokens": 3, "completion_tokens": 1, "total_tokens": 4}
        }))
        .unwrap();
        assert!(rec.process(usage_chunk).unwrap().is_empty());
        assert_eq!(rec.finish().usage, Some(Usage::new(3, 1)));
    }

    #[test]
    fn stream_in_band_error_is_classified() {
        let mut rec = OpenAiStreamReconstructor::new("openai", "gpt-4o");
        let chunk: OpenAiStreamChunk = serde_json::from_value(json!({
            "error": {"message": "Rate limit reached", "type": "requests", "code": "rate_limit_exceeded"}
        }))
        .unwrap();
        assert_eq!(rec.process(chunk).unwrap_err().kind(), ErrorKind::RateLimit);
    }

    #[test]
    fn classify_status_codes() {
        let api = |status, body: &str| UpstreamError::Api {
            status,
            body: body.to_owned(),
        };

        let err = classify_error("openai", api(429, r#"{"error":{"message":"context length exceeded"}}"#));
        assert_eq!(err.kind(), ErrorKind::RateLimit);
        assert_eq!(err.provider(), Some("openai"));

        assert_eq!(classify_error("openai", api(401, "nope")).kind(), ErrorKind::Authentication);
        assert_eq!(classify_error("openai", api(404, "{}")).kind(), ErrorKind::ModelNotFound);
        assert_eq!(classify_error("openai", api(503, "down")).kind(), ErrorKind::Provider);
    }

    #[test]
    fn classify_refines_bad_requests() {
        let api = |body: serde_json::Value| UpstreamError::Api {
            status: 400,
            body: body.to_string(),
        };

        let err = classify_error(
            "openai",
            api(json!({"error": {"message": "too long", "type": "invalid_request_error", "code": "context_length_exceeded"}})),
        );
        assert_eq!(err.kind(), ErrorKind::ContextLengthExceeded);
        assert!(err.to_string().contains("too long"));

        let err = classify_error(
            "deepseek",
            api(json!({"error": {"message": "This model's maximum context length is 65536 tokens"}})),
        );
        assert_eq!(err.kind(), ErrorKind::ContextLengthExceeded);

        let err = classify_error("groq", api(json!({"error": {"message": "Blocked by Safety system"}})));
        assert_eq!(err.kind(), ErrorKind::ContentFilter);

        let err = classify_error("groq", api(json!({"error": {"message": "bad temperature"}})));
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn classify_transport_failure_is_provider_error() {
        let err = classify_error("mistral", UpstreamError::Stream("connection reset".to_owned()));
        assert_eq!(err.kind(), ErrorKind::Provider);
        assert!(err.to_string().starts_with("[mistral]"));
    }
}
