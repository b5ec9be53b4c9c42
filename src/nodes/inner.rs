//! Nested graph execution.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};

use crate::graphs::model::Graph;
use crate::runtime;
use crate::spec::NodeSpec;
use crate::stream::FlowMessage;
use crate::types::{HANDLE_EXECUTION_CONTENT, HANDLE_EXECUTION_EXTRAS, HANDLE_USER_MESSAGE};

use super::{require_input, Handles, InputMap, Node, NodeContext, NodeError};

/// Hosts a pre-built nested graph.
///
/// The sub-graph is compiled once by the enclosing build and re-used per
/// invocation: each run resets its runtime state, reseeds the entry node with
/// the forwarded message and drives it with a fresh executor. Streamed
/// `content` chunks (and nested debug records) are forwarded to the caller
/// unchanged while the chunk text aggregates into `handle_execution_content`
/// and collected extras into `handle_execution_extras`.
pub struct InnerNode {
    graph: Mutex<Graph>,
    handles: Handles,
}

impl InnerNode {
    #[must_use]
    pub fn new(graph: Graph, spec: &NodeSpec) -> Self {
        Self {
            graph: Mutex::new(graph),
            handles: Handles::from_spec(spec),
        }
    }
}

#[async_trait]
impl Node for InnerNode {
    async fn run(&self, inputs: InputMap, ctx: NodeContext) -> Result<(), NodeError> {
        let message_key = self.handles.resolve(HANDLE_USER_MESSAGE);
        let message = require_input(&inputs, message_key)?.coerce_string();

        let mut graph = self.graph.lock().await;
        graph.reset_runtime_state();
        graph.seed_message(&message);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let drive = runtime::execute_into(&mut graph, tx, ctx.chat_log.clone(), ctx.cancel.clone());

        let forward_ctx = ctx.clone();
        let forward = async move {
            let mut aggregated = String::new();
            let mut extras: Vec<Value> = Vec::new();
            while let Some(message) = rx.recv().await {
                if let FlowMessage::Content(chunk) = &message {
                    if let Some(text) = chunk.delta_text() {
                        aggregated.push_str(text);
                    }
                    if let Some(extra) = &chunk.extras {
                        extras.push(extra.clone());
                    }
                }
                if forward_ctx.forward(message).is_err() {
                    break;
                }
            }
            (aggregated, extras)
        };

        let ((), (aggregated, extras)) = tokio::join!(drive, forward);

        ctx.emit_typed(HANDLE_EXECUTION_CONTENT, Value::String(aggregated.clone()))?;
        if !extras.is_empty() {
            ctx.emit_typed(HANDLE_EXECUTION_EXTRAS, Value::Array(extras))?;
        }
        ctx.emit_end(Value::String(aggregated))
    }
}
