//! Template rendering over the node's inputs.

use async_trait::async_trait;
use serde_json::Value;

use crate::spec::NodeSpec;
use crate::template;

use super::{json_context, InputMap, Node, NodeContext, NodeError};

/// Renders a configured template against the bound inputs.
///
/// Every input is exposed to the template under its target key; values that
/// look like serialized JSON are parsed before binding.
#[derive(Clone, Debug, Default)]
pub struct ParserNode {
    text: String,
}

impl ParserNode {
    #[must_use]
    pub fn from_spec(spec: &NodeSpec) -> Self {
        Self {
            text: spec.data_str("text").unwrap_or_default().to_string(),
        }
    }

    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl Node for ParserNode {
    async fn run(&self, inputs: InputMap, ctx: NodeContext) -> Result<(), NodeError> {
        let context = json_context(&inputs);
        let rendered = template::render(&self.text, &context)?;
        ctx.emit_end(Value::String(rendered))
    }

    fn snapshot(&self) -> Value {
        serde_json::json!({ "template": self.text })
    }
}
