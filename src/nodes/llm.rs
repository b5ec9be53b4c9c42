//! LLM generation.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;

use crate::llm::GenerateParams;
use crate::message::ChatThread;
use crate::spec::NodeSpec;
use crate::types::{HANDLE_CHAT, HANDLE_CLIENT_PROVIDER, HANDLE_SYSTEM_CONTEXT, HANDLE_USER_MESSAGE};

use super::{require_input, Handles, InputMap, Node, NodeContext, NodeError};

/// History window kept for batch generation when a system turn is present.
const BATCH_WINDOW_WITH_SYSTEM: usize = 5;
/// History window kept for batch generation without a system turn.
const BATCH_WINDOW: usize = 4;

/// Invokes an upstream-provided LLM client.
///
/// Consumes a client handle on `handle-client-provider` and either a fully
/// assembled thread on `handle-chat` or a system context plus user message.
/// In streaming mode every chunk is forwarded as a `content` event while the
/// generated text accumulates into the terminal output; in batch mode the
/// history is truncated to a trailing window first.
#[derive(Clone, Debug, Default)]
pub struct LlmNode {
    stream: bool,
    params: GenerateParams,
    handles: Handles,
}

impl LlmNode {
    #[must_use]
    pub fn from_spec(spec: &NodeSpec) -> Self {
        Self {
            stream: spec.data_bool("stream"),
            params: GenerateParams {
                max_tokens: spec
                    .data
                    .get("max_tokens")
                    .and_then(Value::as_u64)
                    .map(|v| v as u32),
                temperature: spec
                    .data
                    .get("temperature")
                    .and_then(Value::as_f64)
                    .map(|v| v as f32),
            },
            handles: Handles::from_spec(spec),
        }
    }

    fn assemble_thread(&self, inputs: &InputMap) -> ChatThread {
        if let Some(chat) = inputs
            .get(self.handles.resolve(HANDLE_CHAT))
            .and_then(|v| v.as_chat())
        {
            return chat.clone();
        }
        let mut thread = ChatThread::new();
        if let Some(system) = inputs.get(self.handles.resolve(HANDLE_SYSTEM_CONTEXT)) {
            thread.set_system(&system.coerce_string());
        }
        if let Some(user) = inputs.get(self.handles.resolve(HANDLE_USER_MESSAGE)) {
            thread.add_user(&user.coerce_string());
        }
        thread
    }
}

#[async_trait]
impl Node for LlmNode {
    async fn run(&self, inputs: InputMap, ctx: NodeContext) -> Result<(), NodeError> {
        let client_key = self.handles.resolve(HANDLE_CLIENT_PROVIDER);
        let client = require_input(&inputs, client_key)?
            .as_client()
            .ok_or_else(|| NodeError::Data {
                message: format!("input '{client_key}' does not carry an LLM client"),
            })?
            .clone();

        let mut thread = self.assemble_thread(&inputs);
        let mut generated = String::new();

        if self.stream {
            let mut chunks = client.stream_generate(&thread, &self.params).await?;
            loop {
                tokio::select! {
                    _ = ctx.cancel.cancelled() => break,
                    next = chunks.next() => {
                        let Some(chunk) = next else { break };
                        let chunk = chunk?;
                        if let Some(delta) = chunk.delta_text() {
                            generated.push_str(delta);
                        }
                        ctx.emit_content(chunk)?;
                    }
                }
            }
        } else {
            let window = if thread.has_system() {
                BATCH_WINDOW_WITH_SYSTEM
            } else {
                BATCH_WINDOW
            };
            thread.truncate_window(window);
            let completion = client.generate(&thread, &self.params).await?;
            generated = completion.content;
        }

        ctx.emit_end(Value::String(generated))
    }

    fn snapshot(&self) -> Value {
        serde_json::json!({
            "stream": self.stream,
            "max_tokens": self.params.max_tokens,
            "temperature": self.params.temperature,
        })
    }
}
