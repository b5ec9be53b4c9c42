#![allow(dead_code)]

use std::sync::Once;

use serde_json::{json, Value};
use tokio_stream::StreamExt;

use flowweave::debug::events::{DebugEvent, DebugEventType, ExecutionSummary};
use flowweave::graphs::{build, Attachments, Graph};
use flowweave::runtime::{run_graph, RunOptions};
use flowweave::spec::FlowSpec;
use flowweave::stream::FlowMessage;

static TRACING: Once = Once::new();

/// Route engine logs through `RUST_LOG` when a test needs them.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Parse a JSON value into a spec, panicking on malformed fixtures.
pub fn spec(value: Value) -> FlowSpec {
    FlowSpec::from_value(value).expect("fixture spec must parse")
}

/// Compile a JSON spec with a message and no attachments.
pub fn compile(value: Value, message: &str) -> Graph {
    build(spec(value), message, Attachments::default())
}

/// Run a graph to completion and collect every streamed message.
pub async fn collect(graph: Graph) -> Vec<FlowMessage> {
    init_tracing();
    let mut stream = run_graph(graph, RunOptions::default());
    let mut messages = Vec::new();
    while let Some(message) = stream.next().await {
        messages.push(message);
    }
    messages
}

/// Compile and run in one step.
pub async fn run_spec(value: Value, message: &str) -> Vec<FlowMessage> {
    collect(compile(value, message)).await
}

/// The delta text of every content chunk, in stream order.
pub fn content_chunks(messages: &[FlowMessage]) -> Vec<String> {
    messages
        .iter()
        .filter_map(FlowMessage::as_content)
        .filter_map(|chunk| chunk.delta_text().map(str::to_string))
        .collect()
}

/// All content text concatenated in stream order.
pub fn content_text(messages: &[FlowMessage]) -> String {
    content_chunks(messages).concat()
}

/// The final execution summary, if one was emitted.
pub fn summary(messages: &[FlowMessage]) -> Option<&ExecutionSummary> {
    messages.iter().find_map(FlowMessage::as_summary)
}

/// All debug records in stream order.
pub fn debug_events(messages: &[FlowMessage]) -> Vec<&DebugEvent> {
    messages.iter().filter_map(FlowMessage::as_debug).collect()
}

/// Debug records of one event type.
pub fn debug_events_of<'a>(
    messages: &'a [FlowMessage],
    event_type: DebugEventType,
) -> Vec<&'a DebugEvent> {
    debug_events(messages)
        .into_iter()
        .filter(|event| event.event_type == event_type)
        .collect()
}

/// A client node spec backed by the deterministic scripted client.
pub fn fake_client(id: &str, script: &[&str]) -> Value {
    json!({
        "id": id,
        "type": "client",
        "data": {
            "engine": "fake",
            "model": "fake-model",
            "script": script,
        }
    })
}

/// The linear chat fixture: user_input -> chat (+ system text) -> llm -> end,
/// streaming from a scripted client.
pub fn linear_chat_spec(debug: bool, script: &[&str]) -> Value {
    json!({
        "type": "chat",
        "debug": debug,
        "nodes": [
            {"id": "user-input", "type": "user_input"},
            {"id": "system-text", "type": "text", "data": {"text": "You are terse."}},
            fake_client("client-node", script),
            {"id": "chat-node", "type": "chat"},
            {"id": "llm-node", "type": "llm", "data": {"stream": true}},
            {"id": "end-node", "type": "end"}
        ],
        "edges": [
            {"source": "system-text", "sourceHandle": "end",
             "target": "chat-node", "targetHandle": "handle-system-context"},
            {"source": "user-input", "sourceHandle": "handle_user_message",
             "target": "chat-node", "targetHandle": "handle_user_message"},
            {"source": "client-node", "sourceHandle": "end",
             "target": "llm-node", "targetHandle": "handle-client-provider"},
            {"source": "chat-node", "sourceHandle": "end",
             "target": "llm-node", "targetHandle": "handle-chat"},
            {"source": "llm-node", "sourceHandle": "end",
             "target": "end-node", "targetHandle": "handle-5"}
        ]
    })
}

/// The conditional split fixture: the condition routes on `age`.
pub fn conditional_split_spec(debug: bool, condition: &str) -> Value {
    json!({
        "type": "chat",
        "debug": debug,
        "nodes": [
            {"id": "user-input", "type": "user_input"},
            {"id": "cond", "type": "conditional", "data": {"condition": condition}},
            {"id": "text-adult", "type": "text", "data": {"text": "welcome"}},
            {"id": "text-minor", "type": "text", "data": {"text": "sorry"}},
            {"id": "end-adult", "type": "end"},
            {"id": "end-minor", "type": "end"}
        ],
        "edges": [
            {"source": "user-input", "sourceHandle": "handle_user_message",
             "target": "cond", "targetHandle": "handle_input"},
            {"source": "cond", "sourceHandle": "adult",
             "target": "text-adult", "targetHandle": "handle_value"},
            {"source": "cond", "sourceHandle": "minor",
             "target": "text-minor", "targetHandle": "handle_value"},
            {"source": "text-adult", "sourceHandle": "end",
             "target": "end-adult", "targetHandle": "handle-1"},
            {"source": "text-minor", "sourceHandle": "end",
             "target": "end-minor", "targetHandle": "handle-2"}
        ]
    })
}
