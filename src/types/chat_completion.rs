use serde::{Deserialize, Serialize};

use crate::types::Message;

/// Request body for an OpenAI-compatible `chat/completions` call.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatCompletionRequest<'a> {
    /// The provider-side model name.
    pub model: &'a str,

    /// The full conversation, oldest first.
    pub messages: &'a [Message],

    /// Always true for clix.
    pub stream: bool,
}

/// One `data:` payload of a streaming completion response.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ChatCompletionChunk {
    /// Incremental choices; clix only reads the first.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,

    /// Present when the provider reports a failure inside the stream.
    #[serde(default)]
    pub error: Option<ChunkError>,
}

impl ChatCompletionChunk {
    /// The text carried by this chunk, empty when the delta has no content.
    pub fn text(&self) -> &str {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
            .unwrap_or("")
    }
}

/// A single choice inside a chunk.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ChunkChoice {
    /// The incremental delta.
    #[serde(default)]
    pub delta: ChunkDelta,

    /// Set on the final chunk of a choice.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// The incremental message delta of a choice.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ChunkDelta {
    /// Newly generated text; `null` or absent on role-only and final chunks.
    #[serde(default)]
    pub content: Option<String>,
}

/// An error object reported by the provider.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ChunkError {
    /// Human-readable description.
    #[serde(default)]
    pub message: String,

    /// Provider error type, e.g. `invalid_request_error`.
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
}
