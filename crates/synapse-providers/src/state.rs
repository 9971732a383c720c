//! Per-stream accumulator behind every stream reconstructor
//!
//! Each native event is reduced to one of a handful of transitions (text,
//! reasoning, tool-call start, tool-call arguments, usage, finish). Chunks are
//! returned in the order transitions are applied; the final chunk is built
//! once, when the stream closes.

use crate::types::{
    ChatCompletionChunk, ChunkChoice, ChunkDelta, FinishReason, Reasoning, StreamFunctionCall, StreamToolCall,
    ToolCall, Usage, unix_now,
};

/// Mutable state owned by exactly one in-flight stream
#[derive(Debug)]
pub struct StreamState {
    id: String,
    model: String,
    created: u64,
    content: String,
    reasoning: String,
    tool_calls: Vec<ToolCall>,
    /// Index into `tool_calls` currently receiving argument fragments
    current_tool_call: Option<usize>,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
}

impl StreamState {
    /// Fresh state for a stream identified by `id`
    pub fn new(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            created: unix_now(),
            content: String::new(),
            reasoning: String::new(),
            tool_calls: Vec::new(),
            current_tool_call: None,
            finish_reason: None,
            usage: None,
        }
    }

    /// Adopt the identifier reported by the provider
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Adopt the model name reported by the provider
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    /// Stream identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Text accumulated so far
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Reasoning text accumulated so far
    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    /// Tool calls accumulated so far, with their full argument strings
    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.tool_calls
    }

    /// Latest usage snapshot
    pub const fn usage(&self) -> Option<Usage> {
        self.usage
    }

    /// Append a text fragment and emit it
    pub fn text_delta(&mut self, text: &str) -> ChatCompletionChunk {
        self.content.push_str(text);
        self.chunk(ChunkDelta {
            content: Some(text.to_owned()),
            ..ChunkDelta::default()
        })
    }

    /// Append a reasoning fragment and emit it
    pub fn reasoning_delta(&mut self, text: &str) -> ChatCompletionChunk {
        self.reasoning.push_str(text);
        self.chunk(ChunkDelta {
            reasoning: Some(Reasoning {
                content: text.to_owned(),
            }),
            ..ChunkDelta::default()
        })
    }

    /// Open a new tool call with empty arguments and make it current
    pub fn start_tool_call(&mut self, id: impl Into<String>, name: impl Into<String>) {
        self.tool_calls.push(ToolCall::new(id, name, String::new()));
        self.current_tool_call = Some(self.tool_calls.len() - 1);
    }

    /// Make the call at `index` current, for providers that address calls by position
    pub const fn focus_tool_call(&mut self, index: usize) {
        self.current_tool_call = Some(index);
    }

    /// Stop routing argument fragments to any call until one is started or focused
    pub const fn clear_current_tool_call(&mut self) {
        self.current_tool_call = None;
    }

    /// Append an argument fragment to the current tool call
    ///
    /// Fragments arriving with no current call, or a current index that no
    /// longer points at a call, are dropped.
    pub fn tool_arguments_delta(&mut self, fragment: &str) -> Option<ChatCompletionChunk> {
        let index = self.current_tool_call?;
        let call = self.tool_calls.get_mut(index)?;
        call.function.arguments.push_str(fragment);
        let delta = tool_call_delta(index, call, fragment);
        Some(self.chunk(delta))
    }

    /// Record a tool call that arrived whole and emit it
    pub fn complete_tool_call(&mut self, call: ToolCall) -> ChatCompletionChunk {
        let index = self.tool_calls.len();
        let delta = tool_call_delta(index, &call, &call.function.arguments);
        self.tool_calls.push(call);
        self.current_tool_call = Some(index);
        self.chunk(delta)
    }

    /// Replace the usage snapshot
    pub const fn record_usage(&mut self, usage: Usage) {
        self.usage = Some(usage);
    }

    /// Remember why generation stopped
    pub const fn record_finish(&mut self, reason: FinishReason) {
        self.finish_reason = Some(reason);
    }

    /// Finish reason the final chunk will carry
    pub fn resolved_finish_reason(&self) -> FinishReason {
        self.finish_reason
            .unwrap_or(FinishReason::Stop)
            .with_tool_calls(!self.tool_calls.is_empty())
    }

    /// Closing chunk with the resolved finish reason and latest usage
    pub fn final_chunk(self) -> ChatCompletionChunk {
        let finish_reason = self.resolved_finish_reason();
        let mut chunk = self.chunk(ChunkDelta::default());
        if let Some(choice) = chunk.choices.first_mut() {
            choice.finish_reason = Some(finish_reason);
        }
        chunk.usage = self.usage;
        chunk
    }

    fn chunk(&self, delta: ChunkDelta) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: ChatCompletionChunk::OBJECT.to_owned(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason: None,
            }],
            usage: None,
        }
    }
}

fn tool_call_delta(index: usize, call: &ToolCall, fragment: &str) -> ChunkDelta {
    ChunkDelta {
        tool_calls: Some(vec![StreamToolCall {
            index: u32::try_from(index).unwrap_or(u32::MAX),
            id: Some(call.id.clone()),
            function: Some(StreamFunctionCall {
                name: Some(call.function.name.clone()),
                arguments: Some(fragment.to_owned()),
            }),
        }]),
        ..ChunkDelta::default()
    }
}
