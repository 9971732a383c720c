use serde::{Deserialize, Serialize};

/// Model advertised by a provider's listing endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier as accepted in `CompletionParams::model`
    pub id: String,
    /// Object type (always "model")
    pub object: String,
    /// Creation timestamp, zero when unknown
    #[serde(default)]
    pub created: u64,
    /// Owning organization
    #[serde(default)]
    pub owned_by: String,
}

impl ModelInfo {
    /// Entry with only an id and owner known
    pub fn new(id: impl Into<String>, owned_by: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            object: "model".to_owned(),
            created: 0,
            owned_by: owned_by.into(),
        }
    }
}
