//! List expansion.
//!
//! When a graph contains a loop node the executors take over: the loop
//! executor publishes each element on this node's `content` output, drives
//! the iteration subgraph per element and aggregates the `handle_loop`
//! feedback into the `end` output. The `run` implementation below is the
//! standalone fallback used when the node is driven outside a loop plan:
//! it emits every element followed by whatever feedback has accumulated.

use async_trait::async_trait;
use serde_json::Value;

use crate::event::SOURCE_CONTENT;
use crate::spec::NodeSpec;
use crate::types::{HANDLE_LIST, HANDLE_LOOP};

use super::{require_input, Handles, InputMap, Node, NodeContext, NodeError};

/// Default cap on loop iterations.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Iterates a list input, collecting per-iteration feedback.
#[derive(Clone, Debug)]
pub struct LoopNode {
    max_iterations: usize,
    handles: Handles,
}

impl Default for LoopNode {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            handles: Handles::default(),
        }
    }
}

impl LoopNode {
    #[must_use]
    pub fn from_spec(spec: &NodeSpec) -> Self {
        Self {
            max_iterations: spec
                .data
                .get("max_iterations")
                .and_then(Value::as_u64)
                .map(|v| v as usize)
                .unwrap_or(DEFAULT_MAX_ITERATIONS),
            handles: Handles::from_spec(spec),
        }
    }

    /// Cap on iterations before the loop aborts with a debug error.
    #[must_use]
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// The resolved list input handle.
    #[must_use]
    pub fn list_handle(&self) -> &str {
        self.handles.resolve(HANDLE_LIST)
    }

    /// The resolved feedback input handle.
    #[must_use]
    pub fn feedback_handle(&self) -> &str {
        self.handles.resolve(HANDLE_LOOP)
    }

    /// Parse the list input: JSON arrays pass through, strings are decoded.
    pub fn parse_items(value: &Value) -> Result<Vec<Value>, NodeError> {
        let parsed = match value {
            Value::String(raw) => {
                serde_json::from_str::<Value>(raw).map_err(|e| NodeError::Data {
                    message: format!("invalid JSON list: {e}"),
                })?
            }
            other => other.clone(),
        };
        match parsed {
            Value::Array(items) => Ok(items),
            other => Err(NodeError::Data {
                message: format!("loop expects a list, got {}", type_name(&other)),
            }),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl Node for LoopNode {
    async fn run(&self, inputs: InputMap, ctx: NodeContext) -> Result<(), NodeError> {
        let raw = require_input(&inputs, self.list_handle())?;
        let items = Self::parse_items(&raw.snapshot())?;
        for item in items.iter().take(self.max_iterations) {
            ctx.emit_typed(SOURCE_CONTENT, item.clone())?;
        }
        let feedback = inputs
            .get(self.feedback_handle())
            .map(|v| v.snapshot())
            .unwrap_or_else(|| Value::Array(Vec::new()));
        ctx.emit_end(feedback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_json_string_lists() {
        let items = LoopNode::parse_items(&json!(r#"["a", "b"]"#)).unwrap();
        assert_eq!(items, vec![json!("a"), json!("b")]);
    }

    #[test]
    fn passes_arrays_through() {
        let items = LoopNode::parse_items(&json!([1, 2, 3])).unwrap();
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn rejects_non_lists() {
        let err = LoopNode::parse_items(&json!({"not": "a list"})).unwrap_err();
        assert!(matches!(err, NodeError::Data { .. }));
    }

    #[test]
    fn rejects_unparsable_strings() {
        let err = LoopNode::parse_items(&json!("not json")).unwrap_err();
        assert!(matches!(err, NodeError::Data { .. }));
    }
}
