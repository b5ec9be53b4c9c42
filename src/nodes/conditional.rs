//! Template-routed branching.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::spec::NodeSpec;
use crate::template;
use crate::types::HANDLE_INPUT;

use super::{Handles, InputMap, Node, NodeContext, NodeError};

/// How a conditional merges multiple inputs into its template context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Union of top-level keys; later inputs win on collision.
    #[default]
    Flat,
    /// Each input nested under its target key.
    Namespaced,
}

impl MergeStrategy {
    fn from_spec(spec: &NodeSpec) -> Self {
        match spec.data_str("merge_strategy") {
            Some("namespaced") => MergeStrategy::Namespaced,
            _ => MergeStrategy::Flat,
        }
    }
}

/// Evaluates a condition template against its merged input context and emits
/// one event whose type names the selected output handle, plus the terminal
/// event carrying selection metadata.
///
/// Bypass of the non-selected branches is the executor's job; the optional
/// `default_handle` gives it a fallback route when the rendered handle
/// matches no outgoing edge.
#[derive(Clone, Debug)]
pub struct ConditionalNode {
    condition: String,
    merge: MergeStrategy,
    default_handle: Option<String>,
    handles: Handles,
}

impl ConditionalNode {
    /// Build from a spec; an absent or empty condition is a config error the
    /// factory degrades to a stub.
    pub fn from_spec(spec: &NodeSpec) -> Result<Self, NodeError> {
        let condition = spec.data_str("condition").unwrap_or_default().to_string();
        if condition.trim().is_empty() {
            return Err(NodeError::Config {
                message: "conditional requires a non-empty 'condition' template".to_string(),
            });
        }
        Ok(Self {
            condition,
            merge: MergeStrategy::from_spec(spec),
            default_handle: spec.data_str("default_handle").map(str::to_string),
            handles: Handles::from_spec(spec),
        })
    }

    /// The configured routing fallback, if any.
    #[must_use]
    pub fn default_handle(&self) -> Option<&str> {
        self.default_handle.as_deref()
    }

    fn merged_context(&self, inputs: &InputMap) -> Value {
        let ctx_key = self.handles.resolve(HANDLE_INPUT);
        // A single handle_input binds directly, matching the common shape.
        if inputs.len() == 1 {
            if let Some(value) = inputs.get(ctx_key) {
                return template::bind_value(&value.snapshot());
            }
        }
        let mut merged = Map::new();
        match self.merge {
            MergeStrategy::Flat => {
                for value in inputs.values() {
                    match template::bind_value(&value.snapshot()) {
                        Value::Object(fields) => merged.extend(fields),
                        other => {
                            merged.insert("value".to_string(), other);
                        }
                    }
                }
            }
            MergeStrategy::Namespaced => {
                for (key, value) in inputs {
                    merged.insert(key.clone(), template::bind_value(&value.snapshot()));
                }
            }
        }
        Value::Object(merged)
    }
}

#[async_trait]
impl Node for ConditionalNode {
    async fn run(&self, inputs: InputMap, ctx: NodeContext) -> Result<(), NodeError> {
        let context = self.merged_context(&inputs);
        let selected = template::render_with_value(&self.condition, &context)?
            .trim()
            .to_string();
        if selected.is_empty() {
            return Err(NodeError::Config {
                message: format!(
                    "condition rendered an empty handle: {}",
                    self.condition
                ),
            });
        }
        ctx.emit_typed(selected.clone(), context)?;
        ctx.emit_end(json!({ "selected": selected }))
    }

    fn snapshot(&self) -> Value {
        json!({
            "condition": self.condition,
            "default_handle": self.default_handle,
        })
    }
}
