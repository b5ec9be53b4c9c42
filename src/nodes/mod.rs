//! The node runtime protocol and the built-in node catalog.
//!
//! Every node conforms to one contract: it is configured at construction,
//! receives its bound inputs and an execution context, and produces a finite
//! sequence of typed events through [`NodeContext::emit`]. The executor owns
//! result caching and bypass marking; nodes only compute.
//!
//! Unknown spec types and invalid configurations never abort a build: the
//! factory degrades them to a [`StubNode`] that reports the problem as a
//! debug event and yields a no-op terminal event so execution continues.

pub mod chat;
pub mod client;
pub mod conditional;
pub mod end;
pub mod fetch;
pub mod inner;
pub mod llm;
pub mod loop_node;
pub mod parser;
pub mod send_message;
pub mod text;
pub mod user_input;

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::event::{FlowValue, NodeEvent};
use crate::llm::LlmError;
use crate::runtime::ChatLog;
use crate::spec::NodeSpec;
use crate::stream::{ChatCompletionChunk, FlowMessage};
use crate::template::TemplateError;
use crate::types::NodeTag;

pub use end::{EndNode, SinkNode, StubNode};
pub use inner::InnerNode;

/// The inputs bound to a node for one invocation.
pub type InputMap = FxHashMap<String, FlowValue>;

/// Execution context passed to nodes during graph execution.
///
/// Carries the node's identity, the per-execution chat log, the event channel
/// back to the executor, a handle on the caller-facing stream (used by nested
/// graph hosts to forward content directly) and the cancellation token every
/// node must propagate into its transport calls.
#[derive(Clone)]
pub struct NodeContext {
    /// Id of the node being executed.
    pub node_id: String,
    /// Per-execution identity record, assigned once by the entry node.
    pub chat_log: ChatLog,
    /// Channel for the node's typed events.
    pub events: flume::Sender<NodeEvent>,
    /// The caller-facing output stream.
    pub stream: mpsc::UnboundedSender<FlowMessage>,
    /// Cancellation token; nodes pass it to I/O they start.
    pub cancel: CancellationToken,
}

impl NodeContext {
    /// Emit one typed event.
    pub fn emit(&self, event: NodeEvent) -> Result<(), NodeError> {
        self.events
            .send(event)
            .map_err(|_| NodeError::EventChannelClosed)
    }

    /// Emit the canonical terminal event.
    pub fn emit_end(&self, value: impl Into<FlowValue>) -> Result<(), NodeError> {
        self.emit(NodeEvent::end(self.node_id.clone(), value))
    }

    /// Emit a streaming content chunk.
    pub fn emit_content(&self, chunk: ChatCompletionChunk) -> Result<(), NodeError> {
        self.emit(NodeEvent::content(self.node_id.clone(), chunk))
    }

    /// Emit an event with an arbitrary type tag.
    pub fn emit_typed(
        &self,
        source_type: impl Into<String>,
        value: impl Into<FlowValue>,
    ) -> Result<(), NodeError> {
        self.emit(NodeEvent::typed(source_type, self.node_id.clone(), value))
    }

    /// Emit a node-level debug record.
    pub fn emit_debug(&self, record: Value) -> Result<(), NodeError> {
        self.emit(NodeEvent::debug_record(self.node_id.clone(), record))
    }

    /// Forward a message straight onto the caller stream. Used by nested
    /// graph hosts; regular nodes stream through [`emit_content`].
    ///
    /// [`emit_content`]: NodeContext::emit_content
    pub fn forward(&self, message: FlowMessage) -> Result<(), NodeError> {
        self.stream
            .send(message)
            .map_err(|_| NodeError::EventChannelClosed)
    }
}

/// Errors a node can raise during execution.
///
/// The executor converts every variant into a structured debug record and
/// keeps running; the failing node produces no terminal output, so dependent
/// subtrees stall on their missing inputs instead of crashing the stream.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeError {
    /// The node's configuration is malformed.
    #[error("invalid node configuration: {message}")]
    #[diagnostic(code(flowweave::node::config))]
    Config { message: String },

    /// A required input was not provided.
    #[error("missing required input '{key}'")]
    #[diagnostic(
        code(flowweave::node::input),
        help("Check that an edge wires a producer into this handle.")
    )]
    Input { key: String },

    /// A template failed to compile or render.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Template(#[from] TemplateError),

    /// An HTTP call failed.
    #[error("transport error: {message}")]
    #[diagnostic(code(flowweave::node::transport))]
    Transport {
        message: String,
        status: Option<u16>,
    },

    /// A JSON parse or type check failed.
    #[error("data error: {message}")]
    #[diagnostic(code(flowweave::node::data))]
    Data { message: String },

    /// A conditional rendered a handle that matches no outgoing edge.
    #[error("no outgoing edge matches selected handle '{selected}'")]
    #[diagnostic(code(flowweave::node::routing))]
    Routing {
        selected: String,
        available: Vec<String>,
    },

    /// An LLM client call failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Llm(#[from] LlmError),

    /// JSON serialization failure.
    #[error(transparent)]
    #[diagnostic(code(flowweave::node::serde))]
    Serde(#[from] serde_json::Error),

    /// The executor dropped the event channel mid-run.
    #[error("event channel closed")]
    #[diagnostic(code(flowweave::node::channel))]
    EventChannelClosed,
}

impl NodeError {
    /// The debug event type this error maps to.
    #[must_use]
    pub fn kind(&self) -> crate::debug::events::DebugEventType {
        use crate::debug::events::DebugEventType;
        match self {
            NodeError::Config { .. } => DebugEventType::ConfigError,
            NodeError::Input { .. } => DebugEventType::InputError,
            NodeError::Template(_) => DebugEventType::TemplateError,
            NodeError::Transport { .. } | NodeError::Llm(_) => DebugEventType::TransportError,
            NodeError::Data { .. } | NodeError::Serde(_) => DebugEventType::DataError,
            NodeError::Routing { .. } => DebugEventType::RoutingError,
            NodeError::EventChannelClosed => DebugEventType::NodeError,
        }
    }

    /// A contextual snapshot for the debug record.
    #[must_use]
    pub fn context(&self) -> Value {
        match self {
            NodeError::Template(err) => serde_json::json!({ "template": err.template() }),
            NodeError::Routing {
                selected,
                available,
            } => serde_json::json!({
                "selected_handle": selected,
                "outgoing_handles": available,
            }),
            NodeError::Transport { status, .. } => serde_json::json!({ "status": status }),
            _ => Value::Null,
        }
    }
}

/// Resolved handle names for one node.
///
/// The spec's `data.handles` map lets a graph rebind the default handle names
/// on a per-node basis; lookups fall through to the default.
#[derive(Clone, Debug, Default)]
pub struct Handles {
    map: FxHashMap<String, String>,
}

impl Handles {
    /// Build from a node spec's `data.handles`.
    #[must_use]
    pub fn from_spec(spec: &NodeSpec) -> Self {
        Self {
            map: spec.handles(),
        }
    }

    /// The actual handle name for a default one.
    #[must_use]
    pub fn resolve<'a>(&'a self, default: &'a str) -> &'a str {
        self.map.get(default).map(String::as_str).unwrap_or(default)
    }
}

/// A single unit of computation in a graph.
#[async_trait]
pub trait Node: Send + Sync {
    /// Execute with the bound inputs, emitting events through the context.
    async fn run(&self, inputs: InputMap, ctx: NodeContext) -> Result<(), NodeError>;

    /// Opt-in snapshot of internal variables for debug capture.
    fn snapshot(&self) -> Value {
        Value::Null
    }
}

/// A required input, or the canonical missing-input error.
pub fn require_input<'a>(inputs: &'a InputMap, key: &str) -> Result<&'a FlowValue, NodeError> {
    inputs.get(key).ok_or_else(|| NodeError::Input {
        key: key.to_string(),
    })
}

/// Render the inputs as a JSON object keyed by target handle, the shape
/// template contexts and debug captures expect.
#[must_use]
pub fn json_context(inputs: &InputMap) -> Map<String, Value> {
    inputs
        .iter()
        .map(|(key, value)| (key.clone(), value.snapshot()))
        .collect()
}

/// Instantiate the runtime for a node spec.
///
/// `inner` nodes are handled by the compiler (their sub-graph must be built
/// first); passing one here yields a stub.
pub(crate) fn create_node(tag: &NodeTag, spec: &NodeSpec) -> std::sync::Arc<dyn Node> {
    use std::sync::Arc;
    match tag {
        NodeTag::UserInput => Arc::new(user_input::UserInputNode::from_spec(spec)),
        NodeTag::Text => Arc::new(text::TextNode::from_spec(spec)),
        NodeTag::Parser => Arc::new(parser::ParserNode::from_spec(spec)),
        NodeTag::Fetch => match fetch::FetchNode::from_spec(spec) {
            Ok(node) => Arc::new(node),
            Err(err) => Arc::new(StubNode::config_error(&spec.id, tag, &err.to_string())),
        },
        NodeTag::Client => Arc::new(client::ClientNode::from_spec(spec)),
        NodeTag::Llm => Arc::new(llm::LlmNode::from_spec(spec)),
        NodeTag::Chat => Arc::new(chat::ChatNode::from_spec(spec)),
        NodeTag::SendMessage => Arc::new(send_message::SendMessageNode::from_spec(spec)),
        NodeTag::End => Arc::new(EndNode),
        NodeTag::Void => Arc::new(SinkNode),
        NodeTag::Loop => Arc::new(loop_node::LoopNode::from_spec(spec)),
        NodeTag::Conditional => match conditional::ConditionalNode::from_spec(spec) {
            Ok(node) => Arc::new(node),
            Err(err) => Arc::new(StubNode::config_error(&spec.id, tag, &err.to_string())),
        },
        NodeTag::Inner => Arc::new(StubNode::config_error(
            &spec.id,
            tag,
            "inner node requires a compiled sub-graph",
        )),
        NodeTag::Unknown(name) => Arc::new(StubNode::unsupported(&spec.id, name)),
    }
}
