//! Bidirectional conversion between internal canonical types and wire formats
//!
//! Each provider submodule maps requests out, responses and stream events
//! back in, and classifies native failures.

pub mod anthropic;
pub mod gemini;
pub mod json_mode;
pub mod openai;
