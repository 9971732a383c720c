//! Canonical, provider-independent types for chat completions
//!
//! Every wire format converts to and from these shapes; callers only ever
//! see these types.

pub mod embedding;
pub mod message;
pub mod model;
pub mod request;
pub mod response;
pub mod stream;
pub mod tool;

pub use embedding::{EmbedInput, EmbeddingData, EmbeddingParams, EmbeddingResponse, EmbeddingUsage};
pub use message::{Content, ContentPart, FunctionCall, Message, Reasoning, Role, ToolCall};
pub use model::ModelInfo;
pub use request::{CompletionParams, JsonSchemaFormat, ReasoningEffort, ResponseFormat};
pub use response::{ChatCompletion, Choice, ChoiceMessage, FinishReason, Usage, unix_now};
pub use stream::{ChatCompletionChunk, ChunkChoice, ChunkDelta, StreamFunctionCall, StreamToolCall};
pub use tool::{
    FunctionDefinition, ToolChoice, ToolChoiceFunction, ToolChoiceFunctionName, ToolChoiceMode, ToolDefinition,
    ToolSchemaError,
};
