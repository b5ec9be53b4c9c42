//! Wire types for graph specifications.
//!
//! A [`FlowSpec`] is the declarative input handed to the compiler: a tree of
//! node and edge records, optionally carrying a debug configuration and, for
//! `inner` nodes, nested specs. Stored specs sometimes wrap the node/edge
//! lists in a `content` object; [`FlowSpec::from_value`] normalizes both
//! shapes.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::debug::config::DebugConfig;

/// A declarative graph specification.
///
/// ```json
/// {
///   "type": "chat",
///   "debug": true,
///   "nodes": [{"id": "u", "type": "user_input"}],
///   "edges": [{"source": "u", "sourceHandle": "handle_user_message",
///              "target": "e", "targetHandle": "handle-5"}]
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FlowSpec {
    /// Free-form graph tag (e.g. `"chat"`).
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Whether the debug pipeline emits lifecycle events and a summary.
    #[serde(default)]
    pub debug: bool,
    /// Debug pipeline configuration; `None` means the preset default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_config: Option<DebugConfig>,
    /// Entry node id override; defaults to the sole `user_input` node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master: Option<String>,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
}

impl FlowSpec {
    /// Parse a spec from JSON, accepting both the flat shape and the stored
    /// shape where `nodes`/`edges` live under a `content` wrapper. Top-level
    /// keys win over wrapper keys.
    pub fn from_value(mut value: Value) -> Result<Self, serde_json::Error> {
        if let Value::Object(ref mut obj) = value {
            let wrapped = obj
                .get("content")
                .and_then(Value::as_object)
                .is_some_and(|c| c.contains_key("nodes"));
            if wrapped {
                if let Some(Value::Object(content)) = obj.remove("content") {
                    for (key, inner) in content {
                        obj.entry(key).or_insert(inner);
                    }
                }
            }
        }
        serde_json::from_value(value)
    }
}

/// One node record in a spec.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Unique id within the enclosing graph.
    pub id: String,
    /// Node type tag, dispatched to the factory.
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific configuration, including the optional `handles` rebind
    /// map and the `iterate` flag.
    #[serde(default)]
    pub data: Map<String, Value>,
    /// Nested spec, only meaningful for `inner` nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magic_flow: Option<Box<FlowSpec>>,
}

impl NodeSpec {
    /// A string field from `data`.
    #[must_use]
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// A boolean field from `data`, defaulting to false.
    #[must_use]
    pub fn data_bool(&self, key: &str) -> bool {
        self.data.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Whether this node opts into per-iteration re-execution.
    #[must_use]
    pub fn iterate(&self) -> bool {
        self.data_bool("iterate")
    }

    /// The handle rebind map from `data.handles`, if present.
    #[must_use]
    pub fn handles(&self) -> FxHashMap<String, String> {
        let mut map = FxHashMap::default();
        if let Some(Value::Object(handles)) = self.data.get("handles") {
            for (logical, actual) in handles {
                if let Value::String(actual) = actual {
                    map.insert(logical.clone(), actual.clone());
                }
            }
        }
        map
    }
}

/// One edge record in a spec.
///
/// A missing `targetHandle` marks the edge as unwired; the compiler rewrites
/// it to the injected sink node under the reserved `void` key.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EdgeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub source: String,
    #[serde(rename = "sourceHandle")]
    pub source_handle: String,
    pub target: String,
    #[serde(rename = "targetHandle", default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_flat_spec() {
        let spec = FlowSpec::from_value(json!({
            "type": "chat",
            "nodes": [{"id": "u", "type": "user_input"}],
            "edges": []
        }))
        .unwrap();
        assert_eq!(spec.kind, "chat");
        assert_eq!(spec.nodes.len(), 1);
    }

    #[test]
    fn unwraps_content_envelope() {
        let spec = FlowSpec::from_value(json!({
            "type": "chat",
            "content": {
                "nodes": [{"id": "u", "type": "user_input"}],
                "edges": [{"source": "u", "sourceHandle": "handle_user_message", "target": "x"}]
            }
        }))
        .unwrap();
        assert_eq!(spec.nodes.len(), 1);
        assert_eq!(spec.edges.len(), 1);
        assert!(spec.edges[0].target_handle.is_none());
    }

    #[test]
    fn node_data_helpers() {
        let node: NodeSpec = serde_json::from_value(json!({
            "id": "p",
            "type": "parser",
            "data": {
                "text": "{{ x }}",
                "iterate": true,
                "handles": {"handle_parser_input": "handle_custom"}
            }
        }))
        .unwrap();
        assert_eq!(node.data_str("text"), Some("{{ x }}"));
        assert!(node.iterate());
        assert_eq!(
            node.handles().get("handle_parser_input").map(String::as_str),
            Some("handle_custom")
        );
    }

    #[test]
    fn nested_magic_flow_parses() {
        let node: NodeSpec = serde_json::from_value(json!({
            "id": "i",
            "type": "inner",
            "magic_flow": {
                "type": "chat",
                "nodes": [{"id": "u2", "type": "user_input"}],
                "edges": []
            }
        }))
        .unwrap();
        assert_eq!(node.magic_flow.unwrap().nodes.len(), 1);
    }
}
