//! Sideband messages with structured extras.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::spec::NodeSpec;
use crate::stream::ChatCompletionChunk;
use crate::types::HANDLE_SEND_EXTRA;

use super::{Handles, InputMap, Node, NodeContext, NodeError};

/// Emits a content chunk carrying the configured message text with the
/// `handle_send_extra` input attached as the chunk's extras payload.
///
/// String inputs that parse as JSON are used as-is; other strings are wrapped
/// as `{"text": …}` so the extras channel always carries structure.
#[derive(Clone, Debug, Default)]
pub struct SendMessageNode {
    message: String,
    handles: Handles,
}

impl SendMessageNode {
    #[must_use]
    pub fn from_spec(spec: &NodeSpec) -> Self {
        Self {
            message: spec.data_str("message").unwrap_or_default().to_string(),
            handles: Handles::from_spec(spec),
        }
    }
}

#[async_trait]
impl Node for SendMessageNode {
    async fn run(&self, inputs: InputMap, ctx: NodeContext) -> Result<(), NodeError> {
        let extras = match inputs.get(self.handles.resolve(HANDLE_SEND_EXTRA)) {
            Some(value) => match value.as_str() {
                Some(raw) => serde_json::from_str::<Value>(raw)
                    .unwrap_or_else(|_| json!({ "text": raw })),
                None => value.snapshot(),
            },
            None => json!({}),
        };
        let chunk = ChatCompletionChunk::text(&self.message).with_extras(extras);
        ctx.emit_content(chunk.clone())?;
        ctx.emit_end(chunk)
    }
}
