//! Static text output.

use async_trait::async_trait;
use serde_json::Value;

use crate::spec::NodeSpec;

use super::{InputMap, Node, NodeContext, NodeError};

/// Emits its configured text as the terminal event.
#[derive(Clone, Debug, Default)]
pub struct TextNode {
    text: String,
}

impl TextNode {
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
impl Node for TextNode {
    async fn run(&self, _inputs: InputMap, ctx: NodeContext) -> Result<(), NodeError> {
        ctx.emit_end(Value::String(self.text.clone()))
    }
}
