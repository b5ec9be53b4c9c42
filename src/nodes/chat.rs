//! Chat thread assembly.

use async_trait::async_trait;
use serde_json::Value;

use crate::message::{ChatMessage, ChatThread};
use crate::spec::NodeSpec;
use crate::types::{HANDLE_MESSAGES, HANDLE_SYSTEM_CONTEXT, HANDLE_USER_MESSAGE};

use super::{Handles, InputMap, Node, NodeContext, NodeError};

/// Assembles a [`ChatThread`] from its inputs.
///
/// A full message list on `handle_messages` replaces the thread wholesale;
/// otherwise a system context and the current user turn are layered onto the
/// seeded thread. The compiler injects the execution's message as the current
/// turn at build time.
#[derive(Clone, Debug, Default)]
pub struct ChatNode {
    message: String,
    max_input_tokens: Option<u32>,
    handles: Handles,
}

impl ChatNode {
    #[must_use]
    pub fn from_spec(spec: &NodeSpec) -> Self {
        Self {
            message: spec.data_str("message").unwrap_or_default().to_string(),
            max_input_tokens: spec
                .data
                .get("max_input_tokens")
                .and_then(Value::as_u64)
                .map(|v| v as u32),
            handles: Handles::from_spec(spec),
        }
    }
}

#[async_trait]
impl Node for ChatNode {
    async fn run(&self, inputs: InputMap, ctx: NodeContext) -> Result<(), NodeError> {
        let mut thread = ChatThread {
            max_input_tokens: self.max_input_tokens,
            ..ChatThread::new()
        };

        let messages_key = self.handles.resolve(HANDLE_MESSAGES);
        if let Some(value) = inputs.get(messages_key) {
            let messages: Vec<ChatMessage> =
                serde_json::from_value(value.snapshot()).map_err(|e| NodeError::Data {
                    message: format!("handle_messages is not a message list: {e}"),
                })?;
            thread.messages = messages;
        } else {
            if let Some(system) = inputs.get(self.handles.resolve(HANDLE_SYSTEM_CONTEXT)) {
                thread.set_system(&system.coerce_string());
            }
            if let Some(user) = inputs.get(self.handles.resolve(HANDLE_USER_MESSAGE)) {
                thread.add_user(&user.coerce_string());
            } else if !self.message.is_empty() {
                thread.add_user(&self.message);
            }
        }

        ctx.emit_end(thread)
    }

    fn snapshot(&self) -> Value {
        serde_json::json!({ "message": self.message })
    }
}
