use thiserror::Error;

use crate::types::ToolSchemaError;

/// Provider-independent error category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No API key configured or found in the environment
    MissingApiKey,
    /// Credentials rejected
    Authentication,
    /// Too many requests
    RateLimit,
    /// Request rejected as malformed
    InvalidRequest,
    /// Prompt exceeds the model's context window
    ContextLengthExceeded,
    /// Prompt or output blocked by safety systems
    ContentFilter,
    /// Requested model does not exist
    ModelNotFound,
    /// Any other provider or transport failure
    Provider,
    /// Operation outside the provider's capability set
    Unsupported,
}

/// Errors returned by every provider operation
#[derive(Debug, Error)]
pub enum LlmError {
    /// No API key configured and none in the environment
    #[error("[{provider}] missing API key: set {env_var} or configure api_key")]
    MissingApiKey { provider: String, env_var: String },

    /// Upstream rejected the credentials
    #[error("[{provider}] authentication failed: {message}")]
    Authentication { provider: String, message: String },

    /// Upstream rate limit hit
    #[error("[{provider}] rate limit exceeded: {message}")]
    RateLimit { provider: String, message: String },

    /// Upstream rejected the request as invalid
    #[error("[{provider}] invalid request: {message}")]
    InvalidRequest { provider: String, message: String },

    /// Prompt does not fit the model's context window
    #[error("[{provider}] context length exceeded: {message}")]
    ContextLengthExceeded { provider: String, message: String },

    /// Content blocked by the provider's safety systems
    #[error("[{provider}] content filtered: {message}")]
    ContentFilter { provider: String, message: String },

    /// Model does not exist upstream
    #[error("[{provider}] model not found: {message}")]
    ModelNotFound { provider: String, message: String },

    /// Generic provider or transport failure
    #[error("[{provider}] provider error: {message}")]
    Provider { provider: String, message: String },

    /// Tool schema could not be converted; no request was sent
    #[error("[{provider}] {source}")]
    InvalidTool {
        provider: String,
        #[source]
        source: ToolSchemaError,
    },

    /// Operation not offered by this provider
    #[error("[{provider}] {operation} is not supported")]
    Unsupported { provider: String, operation: &'static str },

    /// Local setup failure (HTTP client construction and similar)
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl LlmError {
    /// Canonical category of this error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingApiKey { .. } => ErrorKind::MissingApiKey,
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::RateLimit { .. } => ErrorKind::RateLimit,
            Self::InvalidRequest { .. } | Self::InvalidTool { .. } => ErrorKind::InvalidRequest,
            Self::ContextLengthExceeded { .. } => ErrorKind::ContextLengthExceeded,
            Self::ContentFilter { .. } => ErrorKind::ContentFilter,
            Self::ModelNotFound { .. } => ErrorKind::ModelNotFound,
            Self::Provider { .. } | Self::Internal(_) => ErrorKind::Provider,
            Self::Unsupported { .. } => ErrorKind::Unsupported,
        }
    }

    /// Name of the provider the error originated from
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::MissingApiKey { provider, .. }
            | Self::Authentication { provider, .. }
            | Self::RateLimit { provider, .. }
            | Self::InvalidRequest { provider, .. }
            | Self::ContextLengthExceeded { provider, .. }
            | Self::ContentFilter { provider, .. }
            | Self::ModelNotFound { provider, .. }
            | Self::Provider { provider, .. }
            | Self::InvalidTool { provider, .. }
            | Self::Unsupported { provider, .. } => Some(provider),
            Self::Internal(_) => None,
        }
    }

    /// Whether retrying the same request later may succeed
    ///
    /// Retrying is left to the caller; this only reports the category.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit { .. } | Self::Provider { .. })
    }

    /// Build an error of `kind` for `provider`
    ///
    /// Kinds that carry no upstream message collapse to a generic provider error.
    pub fn from_kind(kind: ErrorKind, provider: &str, message: impl Into<String>) -> Self {
        let provider = provider.to_owned();
        let message = message.into();
        match kind {
            ErrorKind::Authentication => Self::Authentication { provider, message },
            ErrorKind::RateLimit => Self::RateLimit { provider, message },
            ErrorKind::InvalidRequest => Self::InvalidRequest { provider, message },
            ErrorKind::ContextLengthExceeded => Self::ContextLengthExceeded { provider, message },
            ErrorKind::ContentFilter => Self::ContentFilter { provider, message },
            ErrorKind::ModelNotFound => Self::ModelNotFound { provider, message },
            ErrorKind::MissingApiKey | ErrorKind::Provider | ErrorKind::Unsupported => {
                Self::Provider { provider, message }
            }
        }
    }
}

/// Native failure reported by the HTTP collaborator, before classification
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Connection, TLS, or body read failure
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success status with the raw response body
    #[error("provider returned {status}: {body}")]
    Api { status: u16, body: String },

    /// Event stream broke or carried an in-band error
    #[error("stream interrupted: {0}")]
    Stream(String),

    /// Body was not the expected JSON shape
    #[error("failed to parse response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Shared status-code branch of every classifier
///
/// Returns `None` for 400, which each provider refines with its own
/// wording heuristics.
pub(crate) const fn kind_for_status(status: u16) -> Option<ErrorKind> {
    match status {
        401 | 403 => Some(ErrorKind::Authentication),
        404 => Some(ErrorKind::ModelNotFound),
        429 => Some(ErrorKind::RateLimit),
        400 => None,
        _ => Some(ErrorKind::Provider),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_provider_name() {
        let err = LlmError::from_kind(ErrorKind::RateLimit, "gemini", "slow down");
        assert_eq!(err.to_string(), "[gemini] rate limit exceeded: slow down");
        assert_eq!(err.provider(), Some("gemini"));
        assert_eq!(err.kind(), ErrorKind::RateLimit);
    }

    #[test]
    fn invalid_tool_is_invalid_request() {
        let err = LlmError::InvalidTool {
            provider: "anthropic".to_owned(),
            source: ToolSchemaError::RequiredNotArray {
                tool: "get_weather".to_owned(),
                found: "number",
            },
        };
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert!(err.to_string().starts_with("[anthropic] tool get_weather"));
    }

    #[test]
    fn retryable_kinds() {
        assert!(LlmError::from_kind(ErrorKind::RateLimit, "p", "").is_retryable());
        assert!(LlmError::from_kind(ErrorKind::Provider, "p", "").is_retryable());
        assert!(!LlmError::from_kind(ErrorKind::Authentication, "p", "").is_retryable());
    }

    #[test]
    fn status_table() {
        assert_eq!(kind_for_status(401), Some(ErrorKind::Authentication));
        assert_eq!(kind_for_status(403), Some(ErrorKind::Authentication));
        assert_eq!(kind_for_status(404), Some(ErrorKind::ModelNotFound));
        assert_eq!(kind_for_status(429), Some(ErrorKind::RateLimit));
        assert_eq!(kind_for_status(400), None);
        assert_eq!(kind_for_status(500), Some(ErrorKind::Provider));
        assert_eq!(kind_for_status(529), Some(ErrorKind::Provider));
    }
}
