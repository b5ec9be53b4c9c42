//! The debug pipeline: capture → transform → emit.
//!
//! Lifecycle hooks fire from the node runtime and the executors; every
//! capture is stamped with the execution id and a sequence number, pushed
//! through the configured transform chain and fanned out to the registered
//! sinks. When the spec does not request debug mode the pipeline still runs
//! with the `errors_only` preset so validation findings and node failures
//! always reach the caller; only lifecycle events and the final summary are
//! withheld.

pub mod config;
pub mod emit;
pub mod events;
pub mod transform;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use config::DebugConfig;
use emit::DebugSink;
use events::{DebugEvent, DebugEventType, DebugSeverity, ExecutionSummary, NodeDebugInfo};
use transform::TransformChain;

/// Stateful debug pipeline for one graph execution.
pub struct DebugPipeline {
    config: DebugConfig,
    chain: TransformChain,
    sinks: Vec<Box<dyn DebugSink>>,
    execution_id: String,
    graph_type: String,
    sequence: u64,
    started: DateTime<Utc>,
    node_infos: Vec<NodeDebugInfo>,
    error_count: usize,
    summary_enabled: bool,
}

impl DebugPipeline {
    /// Build a pipeline. `summary_enabled` controls whether [`finish`]
    /// produces and emits an [`ExecutionSummary`].
    ///
    /// [`finish`]: DebugPipeline::finish
    #[must_use]
    pub fn new(config: DebugConfig, graph_type: &str, summary_enabled: bool) -> Self {
        let chain = TransformChain::for_config(&config);
        Self {
            config,
            chain,
            sinks: Vec::new(),
            execution_id: Uuid::new_v4().simple().to_string(),
            graph_type: graph_type.to_string(),
            sequence: 0,
            started: Utc::now(),
            node_infos: Vec::new(),
            error_count: 0,
            summary_enabled,
        }
    }

    /// Register an output sink.
    pub fn add_sink(&mut self, sink: impl DebugSink + 'static) {
        self.sinks.push(Box::new(sink));
    }

    /// The configuration driving this pipeline.
    #[must_use]
    pub fn config(&self) -> &DebugConfig {
        &self.config
    }

    /// The unique id of this execution.
    #[must_use]
    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    /// Stamp, transform and emit one event.
    pub fn capture(&mut self, mut event: DebugEvent) {
        if !self.config.enabled && event.severity < DebugSeverity::Error {
            return;
        }
        event.execution_id = self.execution_id.clone();
        event.sequence = self.sequence;
        self.sequence += 1;
        if event.event_type.is_error() {
            self.error_count += 1;
        }
        let Some(transformed) = self.chain.process(event) else {
            return;
        };
        for sink in &mut self.sinks {
            if let Err(err) = sink.emit(&transformed) {
                tracing::debug!(error = %err, "debug sink failed");
            }
        }
    }

    /// Graph execution is starting.
    pub fn graph_start(&mut self, node_count: usize, edge_count: usize) {
        self.capture(
            DebugEvent::new(DebugEventType::GraphStart, DebugSeverity::Info).with_payload(
                serde_json::json!({
                    "graph_type": self.graph_type,
                    "nodes": node_count,
                    "edges": edge_count,
                }),
            ),
        );
    }

    /// A build-time validation finding, surfaced at graph start.
    pub fn validation_issue(&mut self, severity: DebugSeverity, payload: Value) {
        self.capture(
            DebugEvent::new(DebugEventType::ValidationError, severity).with_payload(payload),
        );
    }

    /// A node is about to run.
    pub fn node_start(&mut self, node_id: &str, node_type: &str) {
        self.capture(
            DebugEvent::new(DebugEventType::NodeStart, DebugSeverity::Debug)
                .with_node(node_id, node_type),
        );
    }

    /// A node finished; records its state for the summary. Re-executions
    /// (loop iterations) update the node's entry rather than duplicating it.
    pub fn node_end(&mut self, mut info: NodeDebugInfo) {
        self.sanitize_info(&mut info);
        let payload = serde_json::to_value(&info).unwrap_or(Value::Null);
        self.capture(
            DebugEvent::new(DebugEventType::NodeEnd, DebugSeverity::Debug)
                .with_node(info.node_id.clone(), info.node_type.clone())
                .with_payload(payload),
        );
        self.record_info(info);
    }

    /// A node was bypassed; records its state for the summary.
    pub fn node_bypassed(&mut self, mut info: NodeDebugInfo) {
        self.sanitize_info(&mut info);
        self.capture(
            DebugEvent::new(DebugEventType::NodeBypass, DebugSeverity::Debug)
                .with_node(info.node_id.clone(), info.node_type.clone()),
        );
        self.record_info(info);
    }

    /// Sanitize a captured node state with the same redaction and size
    /// limits the event chain applies, so the summary never carries what the
    /// stream would not.
    fn sanitize_info(&self, info: &mut NodeDebugInfo) {
        if self.config.redact_sensitive {
            let redact = transform::RedactTransform::new(&self.config.additional_redact_keys);
            redact.mask(&mut info.inputs);
            redact.mask(&mut info.outputs);
            redact.mask(&mut info.internal_variables);
        }
        let truncate = transform::TruncateTransform {
            max_payload_length: self.config.max_payload_length,
            max_list_items: self.config.max_list_items,
        };
        truncate.limit(&mut info.inputs);
        truncate.limit(&mut info.outputs);
        truncate.limit(&mut info.internal_variables);
    }

    fn record_info(&mut self, info: NodeDebugInfo) {
        match self
            .node_infos
            .iter_mut()
            .find(|existing| existing.node_id == info.node_id)
        {
            Some(existing) => *existing = info,
            None => self.node_infos.push(info),
        }
    }

    /// A node failed or reported an error condition.
    pub fn node_error(
        &mut self,
        node_id: &str,
        node_type: &str,
        kind: DebugEventType,
        message: &str,
        context: Value,
    ) {
        self.capture(
            DebugEvent::new(kind, DebugSeverity::Error)
                .with_node(node_id, node_type)
                .with_payload(serde_json::json!({
                    "error_type": kind,
                    "error_message": message,
                    "context": context,
                })),
        );
    }

    /// A debug record yielded by a node itself.
    pub fn node_record(&mut self, node_id: &str, node_type: &str, record: Value) {
        let kind = record
            .get("event_type")
            .cloned()
            .and_then(|v| serde_json::from_value::<DebugEventType>(v).ok())
            .unwrap_or(DebugEventType::NodeError);
        let severity = if kind.is_error() {
            DebugSeverity::Error
        } else {
            DebugSeverity::Debug
        };
        self.capture(
            DebugEvent::new(kind, severity)
                .with_node(node_id, node_type)
                .with_payload(record),
        );
    }

    /// A loop iteration is starting.
    pub fn iteration_start(&mut self, loop_id: &str, index: usize, total: usize) {
        self.capture(
            DebugEvent::new(DebugEventType::IterationStart, DebugSeverity::Debug)
                .with_node(loop_id, "loop")
                .with_payload(serde_json::json!({
                    "current": index,
                    "total": total,
                })),
        );
    }

    /// A loop iteration finished.
    pub fn iteration_end(&mut self, loop_id: &str, index: usize) {
        self.capture(
            DebugEvent::new(DebugEventType::IterationEnd, DebugSeverity::Debug)
                .with_node(loop_id, "loop")
                .with_payload(serde_json::json!({ "current": index })),
        );
    }

    /// The scheduler made no progress while non-bypassed edges remain.
    pub fn deadlock(&mut self, stuck_nodes: Vec<String>) {
        self.capture(
            DebugEvent::new(DebugEventType::Deadlock, DebugSeverity::Error).with_payload(
                serde_json::json!({
                    "error_message": "scheduler made no progress; dependency cycle suspected",
                    "stuck_nodes": stuck_nodes,
                }),
            ),
        );
    }

    /// Graph execution finished. Emits the summary if enabled and returns it.
    pub fn finish(&mut self) -> Option<ExecutionSummary> {
        self.capture(DebugEvent::new(
            DebugEventType::GraphEnd,
            DebugSeverity::Info,
        ));
        if !self.summary_enabled || !self.config.enabled {
            return None;
        }
        let now = Utc::now();
        let summary = ExecutionSummary {
            execution_id: self.execution_id.clone(),
            graph_type: self.graph_type.clone(),
            start_time: self.started,
            end_time: now,
            duration_ms: (now - self.started).num_milliseconds().max(0) as u64,
            executed: self
                .node_infos
                .iter()
                .filter(|info| info.was_executed)
                .map(|info| info.node_id.clone())
                .collect(),
            bypassed: self
                .node_infos
                .iter()
                .filter(|info| info.was_bypassed)
                .map(|info| info.node_id.clone())
                .collect(),
            error_count: self.error_count,
            nodes: std::mem::take(&mut self.node_infos),
        };
        for sink in &mut self.sinks {
            if let Err(err) = sink.emit_summary(&summary) {
                tracing::debug!(error = %err, "debug summary sink failed");
            }
        }
        Some(summary)
    }
}
