//! The entry node carrying the user's message and attachments.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::spec::NodeSpec;
use crate::types::{HANDLE_USER_FILES, HANDLE_USER_IMAGES, HANDLE_USER_MESSAGE};

use super::{InputMap, Node, NodeContext, NodeError};

/// The single entry node of a graph.
///
/// The compiler seeds its configuration with the initial message and any
/// attachments; at run time it publishes them on three distinct output
/// types (`handle_user_message`, `handle_user_files`, `handle_user_images`)
/// before the terminal event.
#[derive(Clone, Debug, Default)]
pub struct UserInputNode {
    text: String,
    files: Vec<String>,
    images: Vec<String>,
}

impl UserInputNode {
    #[must_use]
    pub fn from_spec(spec: &NodeSpec) -> Self {
        let list = |key: &str| -> Vec<String> {
            spec.data
                .get(key)
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        };
        Self {
            text: spec.data_str("text").unwrap_or_default().to_string(),
            files: list("files"),
            images: list("images"),
        }
    }
}

#[async_trait]
impl Node for UserInputNode {
    async fn run(&self, _inputs: InputMap, ctx: NodeContext) -> Result<(), NodeError> {
        ctx.emit_typed(HANDLE_USER_MESSAGE, Value::String(self.text.clone()))?;
        ctx.emit_typed(HANDLE_USER_FILES, json!(self.files))?;
        ctx.emit_typed(HANDLE_USER_IMAGES, json!(self.images))?;
        ctx.emit_end(Value::String(self.text.clone()))
    }

    fn snapshot(&self) -> Value {
        json!({
            "text": self.text,
            "files": self.files.len(),
            "images": self.images.len(),
        })
    }
}
