//! Debug event model.
//!
//! Every diagnostic the engine produces is a [`DebugEvent`]: lifecycle
//! transitions, data-flow traces, validation findings and node errors all
//! share one structure so filtering, redaction and emission stay uniform.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The kind of a debug event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugEventType {
    // Lifecycle
    GraphStart,
    GraphEnd,
    NodeStart,
    NodeEnd,
    NodeError,
    NodeBypass,
    IterationStart,
    IterationEnd,
    // Data flow
    EdgeTraversed,
    ConditionEvaluated,
    // Errors
    ValidationError,
    ConfigError,
    InputError,
    TemplateError,
    TransportError,
    DataError,
    RoutingError,
    Deadlock,
}

impl DebugEventType {
    /// Whether this type reports an error condition.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            DebugEventType::NodeError
                | DebugEventType::ValidationError
                | DebugEventType::ConfigError
                | DebugEventType::InputError
                | DebugEventType::TemplateError
                | DebugEventType::TransportError
                | DebugEventType::DataError
                | DebugEventType::RoutingError
                | DebugEventType::Deadlock
        )
    }
}

/// Severity levels used for filtering.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum DebugSeverity {
    Trace,
    #[default]
    Debug,
    Info,
    Warn,
    Error,
}

/// A single structured debug record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DebugEvent {
    pub event_id: String,
    pub event_type: DebugEventType,
    pub severity: DebugSeverity,
    pub timestamp: DateTime<Utc>,
    pub execution_id: String,
    pub sequence: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl DebugEvent {
    /// A new event with generated id and current timestamp. The execution id
    /// and sequence number are stamped by the pipeline.
    #[must_use]
    pub fn new(event_type: DebugEventType, severity: DebugSeverity) -> Self {
        Self {
            event_id: Uuid::new_v4().simple().to_string(),
            event_type,
            severity,
            timestamp: Utc::now(),
            execution_id: String::new(),
            sequence: 0,
            node_id: None,
            node_type: None,
            payload: Value::Null,
            tags: Vec::new(),
        }
    }

    /// Attach the producing node.
    #[must_use]
    pub fn with_node(mut self, node_id: impl Into<String>, node_type: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self.node_type = Some(node_type.into());
        self
    }

    /// Attach an event payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Attach a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// Per-node state captured when a node finishes (or is bypassed).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeDebugInfo {
    pub node_id: String,
    pub node_type: String,
    pub was_executed: bool,
    pub was_bypassed: bool,
    #[serde(default)]
    pub inputs: Value,
    #[serde(default)]
    pub outputs: Value,
    #[serde(default)]
    pub internal_variables: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// The final record of one graph execution.
///
/// Contains exactly the nodes that were executed or bypassed; unreached
/// nodes are omitted.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub execution_id: String,
    pub graph_type: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: u64,
    pub executed: Vec<String>,
    pub bypassed: Vec<String>,
    pub error_count: usize,
    pub nodes: Vec<NodeDebugInfo>,
}
