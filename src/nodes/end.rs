//! Terminal, sink and stub nodes.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::stream::ChatCompletionChunk;
use crate::types::NodeTag;

use super::{InputMap, Node, NodeContext, NodeError};

/// Terminal node of a branch. Emits an empty completion chunk so downstream
/// consumers observe a well-formed terminal value.
#[derive(Clone, Debug, Default)]
pub struct EndNode;

#[async_trait]
impl Node for EndNode {
    async fn run(&self, _inputs: InputMap, ctx: NodeContext) -> Result<(), NodeError> {
        ctx.emit_end(ChatCompletionChunk::empty())
    }
}

/// The process-wide sink absorbing unwired outputs. Accepts anything under
/// the reserved `void` key and produces nothing routable.
#[derive(Clone, Debug, Default)]
pub struct SinkNode;

#[async_trait]
impl Node for SinkNode {
    async fn run(&self, _inputs: InputMap, ctx: NodeContext) -> Result<(), NodeError> {
        ctx.emit_end(Value::Null)
    }
}

/// Stand-in for nodes the factory could not instantiate.
///
/// Reports the problem as a debug record, then yields a no-op terminal event
/// so the rest of the graph keeps executing.
#[derive(Clone, Debug)]
pub struct StubNode {
    record: Value,
}

impl StubNode {
    /// A stub for an unrecognized node type.
    #[must_use]
    pub fn unsupported(node_id: &str, attempted_type: &str) -> Self {
        Self {
            record: json!({
                "event_type": "config_error",
                "error_type": "UnsupportedNodeType",
                "error_message": format!("unsupported node type: {attempted_type}"),
                "node_id": node_id,
                "attempted_type": attempted_type,
            }),
        }
    }

    /// A stub for a node whose configuration failed validation.
    #[must_use]
    pub fn config_error(node_id: &str, tag: &NodeTag, message: &str) -> Self {
        Self {
            record: json!({
                "event_type": "config_error",
                "error_type": "ConfigError",
                "error_message": message,
                "node_id": node_id,
                "node_type": tag.encode(),
            }),
        }
    }
}

#[async_trait]
impl Node for StubNode {
    async fn run(&self, _inputs: InputMap, ctx: NodeContext) -> Result<(), NodeError> {
        ctx.emit_debug(self.record.clone())?;
        ctx.emit_end(Value::Null)
    }

    fn snapshot(&self) -> Value {
        self.record.clone()
    }
}
