use serde::{Deserialize, Serialize};

/// Embedding input that accepts either a single string or array of strings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum EmbedInput {
    /// Single text input
    Single(String),
    /// Multiple text inputs
    Multiple(Vec<String>),
}

impl EmbedInput {
    /// Return the inputs as a list of string slices
    pub fn as_vec(&self) -> Vec<&str> {
        match self {
            Self::Single(s) => vec![s.as_str()],
            Self::Multiple(v) => v.iter().map(String::as_str).collect(),
        }
    }
}

/// Canonical embedding request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EmbeddingParams {
    /// Model identifier
    pub model: String,
    /// Input text(s) to embed
    pub input: EmbedInput,
    /// Encoding format ("float" or "base64")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding_format: Option<String>,
    /// Number of dimensions for the output embeddings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<u32>,
    /// End-user identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl EmbeddingParams {
    /// Request embeddings for `input` with `model`
    pub fn new(model: impl Into<String>, input: EmbedInput) -> Self {
        Self {
            model: model.into(),
            input,
            encoding_format: None,
            dimensions: None,
            user: None,
        }
    }
}

/// Single embedding entry in the response
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EmbeddingData {
    /// The embedding object type (always "embedding")
    pub object: String,
    /// The embedding vector
    pub embedding: Vec<f32>,
    /// Index of this embedding in the request input array
    pub index: usize,
}

/// Token usage information for an embedding request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct EmbeddingUsage {
    /// Number of tokens in the input
    pub prompt_tokens: u32,
    /// Total tokens used
    pub total_tokens: u32,
}

/// Canonical embedding response
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EmbeddingResponse {
    /// Object type (always "list")
    pub object: String,
    /// Array of embedding results
    pub data: Vec<EmbeddingData>,
    /// Model used to generate the embeddings
    pub model: String,
    /// Token usage information
    #[serde(default)]
    pub usage: EmbeddingUsage,
}
