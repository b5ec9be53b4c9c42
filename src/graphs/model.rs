//! The compiled graph model.
//!
//! A [`Graph`] owns an ordered list of [`NodeCell`]s, the edge list and the
//! designated master entry node. Cells carry the per-execution mutable state
//! (inputs, outputs, cache, execution state); nodes cross-reference each
//! other by id only, so nested graphs and cyclic specs never create
//! ownership cycles.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::debug::config::DebugConfig;
use crate::debug::events::NodeDebugInfo;
use crate::event::EventPayload;
use crate::nodes::{self, InputMap, Node};
use crate::spec::NodeSpec;
use crate::types::NodeTag;

use super::validate::SpecIssue;

/// Execution state of a node within one graph invocation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NodeState {
    /// Not yet reached.
    #[default]
    Unset,
    /// Invoked (or replayed from cache); outputs may still be absent on
    /// failure.
    Executed,
    /// Skipped because every incoming edge was bypassed.
    Bypassed,
}

/// A directed, typed connection between two nodes.
#[derive(Clone, Debug)]
pub struct Edge {
    pub id: String,
    pub source: String,
    /// Matched against event `source_type`s of the source node.
    pub source_type: String,
    pub target: String,
    /// Key under which the payload lands in the target's inputs.
    pub target_key: String,
    /// Runtime bypass bit; a bypassed edge is neither a readiness
    /// prerequisite nor a data path.
    pub bypassed: bool,
}

impl Edge {
    /// The full identity tuple used for duplicate detection.
    #[must_use]
    pub fn signature(&self) -> (&str, &str, &str, &str) {
        (
            self.source.as_str(),
            self.target.as_str(),
            self.source_type.as_str(),
            self.target_key.as_str(),
        )
    }
}

/// One compiled node: the runtime implementation plus the mutable state the
/// executor threads through an invocation.
pub struct NodeCell {
    pub id: String,
    pub tag: NodeTag,
    /// Per-iteration re-execution opt-in.
    pub iterate: bool,
    /// The originating spec entry; kept for reseeding and debug excerpts.
    pub spec: NodeSpec,
    pub runtime: Arc<dyn Node>,
    pub inputs: InputMap,
    pub outputs: FxHashMap<String, EventPayload>,
    /// Last final event; replayed instead of re-invoking unless `iterate`.
    pub cached: Option<EventPayload>,
    pub state: NodeState,
    pub started_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
}

impl NodeCell {
    pub(crate) fn new(tag: NodeTag, spec: NodeSpec, runtime: Arc<dyn Node>) -> Self {
        Self {
            id: spec.id.clone(),
            iterate: spec.iterate(),
            tag,
            spec,
            runtime,
            inputs: InputMap::default(),
            outputs: FxHashMap::default(),
            cached: None,
            state: NodeState::Unset,
            started_at: None,
            duration_ms: None,
        }
    }

    /// Clear all per-execution state.
    pub fn reset(&mut self) {
        self.inputs.clear();
        self.outputs.clear();
        self.cached = None;
        self.state = NodeState::Unset;
        self.started_at = None;
        self.duration_ms = None;
    }

    /// Prepare for a loop iteration. Cells without the `iterate` flag keep
    /// their cache so they replay instead of re-running.
    pub fn reset_for_iteration(&mut self) {
        self.outputs.clear();
        self.state = NodeState::Unset;
        if self.iterate {
            self.cached = None;
            self.inputs.clear();
        }
    }

    /// Capture this cell's debug state. Serialized-JSON strings are parsed
    /// before capture so the redaction stage sees their keys.
    #[must_use]
    pub fn debug_info(&self, config: &DebugConfig) -> NodeDebugInfo {
        NodeDebugInfo {
            node_id: self.id.clone(),
            node_type: self.tag.encode().to_string(),
            was_executed: self.state == NodeState::Executed,
            was_bypassed: self.state == NodeState::Bypassed,
            inputs: if config.capture_inputs {
                Value::Object(
                    self.inputs
                        .iter()
                        .map(|(k, v)| (k.clone(), crate::template::bind_value(&v.snapshot())))
                        .collect(),
                )
            } else {
                Value::Null
            },
            outputs: if config.capture_outputs {
                Value::Object(
                    self.outputs
                        .iter()
                        .map(|(k, payload)| {
                            (k.clone(), crate::template::bind_value(&payload.value.snapshot()))
                        })
                        .collect(),
                )
            } else {
                Value::Null
            },
            internal_variables: if config.capture_internal_state {
                self.runtime.snapshot()
            } else {
                Value::Null
            },
            started_at: self.started_at,
            duration_ms: self.duration_ms,
        }
    }
}

/// A compiled, executable graph.
pub struct Graph {
    /// Free-form graph tag from the spec.
    pub kind: String,
    /// Whether the spec requested debug mode.
    pub debug: bool,
    /// Debug configuration, if the spec supplied one.
    pub debug_config: Option<DebugConfig>,
    /// Cells in compile order (entry node first).
    pub nodes: Vec<NodeCell>,
    pub edges: Vec<Edge>,
    /// Id of the entry user-input node.
    pub master: String,
    /// Id of the injected sink node.
    pub sink: String,
    /// Build-time findings, surfaced as debug events at graph start.
    pub issues: Vec<SpecIssue>,
    index: FxHashMap<String, usize>,
}

impl Graph {
    pub(crate) fn new(
        kind: String,
        debug: bool,
        debug_config: Option<DebugConfig>,
        nodes: Vec<NodeCell>,
        edges: Vec<Edge>,
        master: String,
        sink: String,
        issues: Vec<SpecIssue>,
    ) -> Self {
        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, cell)| (cell.id.clone(), i))
            .collect();
        Self {
            kind,
            debug,
            debug_config,
            nodes,
            edges,
            master,
            sink,
            issues,
            index,
        }
    }

    /// Index of a node id, if present.
    #[must_use]
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Cell lookup by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&NodeCell> {
        self.index_of(id).map(|i| &self.nodes[i])
    }

    /// Mutable cell lookup by id.
    pub fn node_mut(&mut self, id: &str) -> Option<&mut NodeCell> {
        let i = self.index_of(id)?;
        Some(&mut self.nodes[i])
    }

    /// Edges arriving at `id`.
    pub fn incoming<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == id)
    }

    /// Edges leaving `id`.
    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == id)
    }

    /// Index of the first loop node, if the graph contains one.
    #[must_use]
    pub fn loop_index(&self) -> Option<usize> {
        self.nodes.iter().position(|cell| cell.tag == NodeTag::Loop)
    }

    /// Clear all per-execution state so the graph can be driven again.
    /// Nested graphs are reset through their host node on its next run.
    pub fn reset_runtime_state(&mut self) {
        for cell in &mut self.nodes {
            cell.reset();
        }
        for edge in &mut self.edges {
            edge.bypassed = false;
        }
    }

    /// Reseed the entry node (and any chat nodes) with a new message,
    /// re-instantiating their runtimes from the updated spec. Used by nested
    /// graph hosts, which re-drive a pre-built graph per forwarded message.
    pub fn seed_message(&mut self, message: &str) {
        for cell in &mut self.nodes {
            let key = match cell.tag {
                NodeTag::UserInput => "text",
                NodeTag::Chat => "message",
                _ => continue,
            };
            cell.spec
                .data
                .insert(key.to_string(), Value::String(message.to_string()));
            cell.runtime = nodes::create_node(&cell.tag, &cell.spec);
        }
    }

    /// A structural fingerprint: node ids and tags in order, edge tuples and
    /// the master id. Two builds of the same spec produce equal structures.
    #[must_use]
    pub fn structure(&self) -> Value {
        serde_json::json!({
            "kind": self.kind,
            "master": self.master,
            "nodes": self
                .nodes
                .iter()
                .map(|cell| serde_json::json!({"id": cell.id, "type": cell.tag.encode()}))
                .collect::<Vec<_>>(),
            "edges": self
                .edges
                .iter()
                .map(|e| serde_json::json!([e.source, e.source_type, e.target, e.target_key]))
                .collect::<Vec<_>>(),
        })
    }
}
