//! Typed events produced by nodes.
//!
//! Every node run yields a finite, ordered sequence of [`NodeEvent`]s.
//! Exactly one final event per invocation carries the canonical terminal tag
//! (`end`, with `default` as an accepted alias). `content` is reserved for
//! user-visible streaming chunks and `debug` for node-yielded diagnostic
//! records; neither is routed along edges.

use std::sync::Arc;

use serde_json::Value;

use crate::llm::LlmClient;
use crate::message::ChatThread;
use crate::stream::ChatCompletionChunk;

/// Canonical terminal event type.
pub const SOURCE_END: &str = "end";
/// Accepted alias for [`SOURCE_END`].
pub const SOURCE_DEFAULT: &str = "default";
/// Streaming passthrough event type, forwarded to the caller immediately.
pub const SOURCE_CONTENT: &str = "content";
/// Node-yielded debug record, consumed by the debug pipeline.
pub const SOURCE_DEBUG: &str = "debug";

/// The opaque value moved along edges.
///
/// Most values are plain JSON, but some node outputs carry richer cargo: an
/// assembled chat thread, a shared LLM client handle, or a completion chunk.
/// Representing the catalog as a closed sum keeps edge routing type-agnostic
/// while letting consumers match on what they actually need.
#[derive(Clone)]
pub enum FlowValue {
    /// A plain JSON value.
    Json(Value),
    /// An assembled chat conversation.
    Chat(ChatThread),
    /// A shared LLM client handle. Clients are shared-read: downstream nodes
    /// invoke them but never mutate them.
    Client(Arc<dyn LlmClient>),
    /// A completion chunk (send_message output).
    Chunk(Box<ChatCompletionChunk>),
}

impl FlowValue {
    /// Wraps a string as a JSON value.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        FlowValue::Json(Value::String(s.into()))
    }

    /// The inner string for JSON string values.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FlowValue::Json(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// The inner JSON value, if this is a JSON payload.
    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            FlowValue::Json(value) => Some(value),
            _ => None,
        }
    }

    /// The chat thread, if this payload carries one.
    #[must_use]
    pub fn as_chat(&self) -> Option<&ChatThread> {
        match self {
            FlowValue::Chat(thread) => Some(thread),
            _ => None,
        }
    }

    /// The client handle, if this payload carries one.
    #[must_use]
    pub fn as_client(&self) -> Option<&Arc<dyn LlmClient>> {
        match self {
            FlowValue::Client(client) => Some(client),
            _ => None,
        }
    }

    /// A string rendering used when a textual input is expected: JSON strings
    /// yield their raw contents, other JSON values their compact encoding.
    #[must_use]
    pub fn coerce_string(&self) -> String {
        match self {
            FlowValue::Json(Value::String(s)) => s.clone(),
            FlowValue::Json(value) => value.to_string(),
            FlowValue::Chat(thread) => serde_json::to_string(&thread.messages)
                .unwrap_or_default(),
            FlowValue::Client(client) => client.name().to_string(),
            FlowValue::Chunk(chunk) => chunk.delta_text().unwrap_or_default().to_string(),
        }
    }

    /// A JSON rendering of any variant, used for debug capture and template
    /// binding.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        match self {
            FlowValue::Json(value) => value.clone(),
            FlowValue::Chat(thread) => serde_json::to_value(thread).unwrap_or(Value::Null),
            FlowValue::Client(client) => {
                serde_json::json!({ "client": client.name() })
            }
            FlowValue::Chunk(chunk) => {
                serde_json::to_value(chunk.as_ref()).unwrap_or(Value::Null)
            }
        }
    }
}

impl std::fmt::Debug for FlowValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowValue::Json(value) => f.debug_tuple("Json").field(value).finish(),
            FlowValue::Chat(thread) => f.debug_tuple("Chat").field(thread).finish(),
            FlowValue::Client(client) => {
                f.debug_tuple("Client").field(&client.name()).finish()
            }
            FlowValue::Chunk(chunk) => f.debug_tuple("Chunk").field(chunk).finish(),
        }
    }
}

impl From<Value> for FlowValue {
    fn from(value: Value) -> Self {
        FlowValue::Json(value)
    }
}

impl From<ChatThread> for FlowValue {
    fn from(thread: ChatThread) -> Self {
        FlowValue::Chat(thread)
    }
}

impl From<ChatCompletionChunk> for FlowValue {
    fn from(chunk: ChatCompletionChunk) -> Self {
        FlowValue::Chunk(Box::new(chunk))
    }
}

/// The payload of a node event: who produced it and what it carries.
#[derive(Clone, Debug)]
pub struct EventPayload {
    /// Id of the producing node.
    pub producer: String,
    /// The carried value.
    pub value: FlowValue,
}

impl EventPayload {
    pub fn new(producer: impl Into<String>, value: impl Into<FlowValue>) -> Self {
        Self {
            producer: producer.into(),
            value: value.into(),
        }
    }
}

/// A typed event emitted by a node during one invocation.
///
/// The `source_type` is matched against edge `source_type`s for routing;
/// the reserved tags ([`SOURCE_CONTENT`], [`SOURCE_DEBUG`]) short-circuit to
/// the output stream and debug pipeline respectively.
#[derive(Clone, Debug)]
pub struct NodeEvent {
    pub source_type: String,
    pub payload: EventPayload,
}

impl NodeEvent {
    /// A terminal event.
    #[must_use]
    pub fn end(producer: impl Into<String>, value: impl Into<FlowValue>) -> Self {
        Self {
            source_type: SOURCE_END.to_string(),
            payload: EventPayload::new(producer, value),
        }
    }

    /// A streaming content event.
    #[must_use]
    pub fn content(producer: impl Into<String>, chunk: ChatCompletionChunk) -> Self {
        Self {
            source_type: SOURCE_CONTENT.to_string(),
            payload: EventPayload::new(producer, chunk),
        }
    }

    /// An event with an arbitrary type tag (conditional branches, entry-node
    /// outputs, inner-node results).
    #[must_use]
    pub fn typed(
        source_type: impl Into<String>,
        producer: impl Into<String>,
        value: impl Into<FlowValue>,
    ) -> Self {
        Self {
            source_type: source_type.into(),
            payload: EventPayload::new(producer, value),
        }
    }

    /// A node-yielded debug record.
    #[must_use]
    pub fn debug_record(producer: impl Into<String>, record: Value) -> Self {
        Self {
            source_type: SOURCE_DEBUG.to_string(),
            payload: EventPayload::new(producer, record),
        }
    }

    /// True for the canonical terminal tag or its alias.
    #[must_use]
    pub fn is_final(&self) -> bool {
        is_final_type(&self.source_type)
    }

    /// True for streaming content events.
    #[must_use]
    pub fn is_content(&self) -> bool {
        self.source_type == SOURCE_CONTENT
    }

    /// True for node-yielded debug records.
    #[must_use]
    pub fn is_debug(&self) -> bool {
        self.source_type == SOURCE_DEBUG
    }
}

/// True if `source_type` is the canonical terminal tag or its alias.
#[must_use]
pub fn is_final_type(source_type: &str) -> bool {
    source_type == SOURCE_END || source_type == SOURCE_DEFAULT
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn end_and_default_are_aliases() {
        assert!(NodeEvent::end("n", json!(1)).is_final());
        assert!(NodeEvent::typed(SOURCE_DEFAULT, "n", json!(1)).is_final());
        assert!(!NodeEvent::typed("branch_a", "n", json!(1)).is_final());
    }

    #[test]
    fn coerce_string_unwraps_json_strings() {
        assert_eq!(FlowValue::text("raw").coerce_string(), "raw");
        assert_eq!(FlowValue::Json(json!({"k": 1})).coerce_string(), r#"{"k":1}"#);
    }

    #[test]
    fn snapshot_renders_chunks() {
        let value: FlowValue = ChatCompletionChunk::text("hi").into();
        let snap = value.snapshot();
        assert_eq!(snap["choices"][0]["delta"]["content"], "hi");
    }
}
