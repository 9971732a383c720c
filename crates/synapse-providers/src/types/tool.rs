use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Definition of a tool the model can call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool type (currently always "function")
    #[serde(rename = "type", default = "function_type")]
    pub tool_type: String,
    /// Function definition
    pub function: FunctionDefinition,
}

fn function_type() -> String {
    "function".to_owned()
}

impl ToolDefinition {
    /// Function tool with a JSON Schema parameter object
    pub fn function(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            tool_type: function_type(),
            function: FunctionDefinition {
                name: name.into(),
                description: Some(description.into()),
                parameters: Some(parameters),
            },
        }
    }
}

/// Callable function definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Function name
    pub name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the function parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

impl FunctionDefinition {
    /// Names listed in the schema's `required` array
    ///
    /// An absent `required` yields an empty list. Anything other than an
    /// array of strings is rejected with the tool name and offending position.
    pub fn required_fields(&self) -> Result<Vec<String>, ToolSchemaError> {
        let Some(required) = self.parameters.as_ref().and_then(|p| p.get("required")) else {
            return Ok(Vec::new());
        };

        let Value::Array(items) = required else {
            return Err(ToolSchemaError::RequiredNotArray {
                tool: self.name.clone(),
                found: json_type_name(required),
            });
        };

        items
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::String(name) => Ok(name.clone()),
                other => Err(ToolSchemaError::RequiredElement {
                    tool: self.name.clone(),
                    index,
                    found: json_type_name(other),
                }),
            })
            .collect()
    }

    /// JSON Schema properties in declaration order
    pub fn properties(&self) -> Option<&serde_json::Map<String, Value>> {
        self.parameters.as_ref()?.get("properties")?.as_object()
    }
}

/// Malformed tool parameter schema
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolSchemaError {
    /// `required` is present but not an array
    #[error("tool {tool}: invalid required field: expected array of strings, got {found}")]
    RequiredNotArray {
        /// Tool name
        tool: String,
        /// JSON type actually supplied
        found: &'static str,
    },
    /// `required` contains a non-string entry
    #[error("tool {tool}: invalid required field: element {index}: expected string, got {found}")]
    RequiredElement {
        /// Tool name
        tool: String,
        /// Position of the offending element
        index: usize,
        /// JSON type actually supplied
        found: &'static str,
    },
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// How the model should select tools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolChoice {
    /// Simple mode: "none", "auto", or "required"
    Mode(ToolChoiceMode),
    /// Force a specific function
    Function(ToolChoiceFunction),
}

impl ToolChoice {
    /// Force a call to the named function
    pub fn function(name: impl Into<String>) -> Self {
        Self::Function(ToolChoiceFunction {
            tool_type: function_type(),
            function: ToolChoiceFunctionName { name: name.into() },
        })
    }
}

/// Tool selection mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoiceMode {
    /// Model will not call any tools
    None,
    /// Model decides whether to call tools
    Auto,
    /// Model must call at least one tool
    Required,
}

/// Force the model to call a specific function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolChoiceFunction {
    /// Must be "function"
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function to call
    pub function: ToolChoiceFunctionName,
}

/// Function name reference within a forced tool choice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolChoiceFunctionName {
    /// Name of the function to call
    pub name: String,
}
