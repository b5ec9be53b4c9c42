//! The output protocol of a graph execution.
//!
//! An execution yields an asynchronous sequence of [`FlowMessage`] records:
//! user-visible `content` chunks interleaved with `debug` records and a final
//! `debug_summary`. The envelope serializes as `{"type": …, "content": …}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::debug::events::{DebugEvent, ExecutionSummary};

/// A streamed completion fragment, the unit of user-visible content.
///
/// Kept deliberately close to the common chat-completion wire shape so
/// embedders can forward chunks unchanged. `extras` is the sideband channel
/// for structured payloads (citations, tool results) produced by
/// `send_message` nodes.
///
/// # Examples
///
/// ```
/// use flowweave::stream::ChatCompletionChunk;
///
/// let chunk = ChatCompletionChunk::text("hello");
/// assert_eq!(chunk.delta_text(), Some("hello"));
///
/// let json = serde_json::to_value(&chunk).unwrap();
/// assert_eq!(json["choices"][0]["delta"]["content"], "hello");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

impl ChatCompletionChunk {
    /// An empty chunk, as emitted by terminal nodes.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            choices: vec![ChunkChoice::default()],
            ..Self::default()
        }
    }

    /// A chunk carrying a single delta text fragment.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            choices: vec![ChunkChoice {
                delta: ChunkDelta {
                    role: None,
                    content: Some(content.into()),
                },
                finish_reason: None,
            }],
            ..Self::default()
        }
    }

    /// Attaches a sideband extras payload.
    #[must_use]
    pub fn with_extras(mut self, extras: Value) -> Self {
        self.extras = Some(extras);
        self
    }

    /// The delta text of the first choice, if any.
    #[must_use]
    pub fn delta_text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
    }
}

/// One choice inside a [`ChatCompletionChunk`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// The incremental delta of a streamed choice.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// A record on the caller-facing output stream.
///
/// Serializes as a tagged envelope:
///
/// ```json
/// {"type": "content", "content": {"id": "", "model": "", "choices": […]}}
/// {"type": "debug", "content": {…}}
/// {"type": "debug_summary", "content": {…}}
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum FlowMessage {
    /// A user-visible completion chunk, forwarded in production order.
    Content(ChatCompletionChunk),
    /// A structured debug record (lifecycle, errors, validation issues).
    Debug(DebugEvent),
    /// The final execution summary, emitted once when debug mode is active.
    DebugSummary(ExecutionSummary),
}

impl FlowMessage {
    /// The chunk if this is a content record.
    #[must_use]
    pub fn as_content(&self) -> Option<&ChatCompletionChunk> {
        match self {
            FlowMessage::Content(chunk) => Some(chunk),
            _ => None,
        }
    }

    /// The debug record if this is a debug message.
    #[must_use]
    pub fn as_debug(&self) -> Option<&DebugEvent> {
        match self {
            FlowMessage::Debug(event) => Some(event),
            _ => None,
        }
    }

    /// The summary if this is the final debug summary.
    #[must_use]
    pub fn as_summary(&self) -> Option<&ExecutionSummary> {
        match self {
            FlowMessage::DebugSummary(summary) => Some(summary),
            _ => None,
        }
    }
}
