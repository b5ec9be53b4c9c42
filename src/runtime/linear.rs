//! The ready-queue scheduler.
//!
//! Drives nodes one at a time in dependency order. A node is ready when
//! every non-bypassed incoming edge is satisfied, i.e. its source executed
//! and produced the matching output type. Each invocation runs as a spawned
//! task drained through its event channel: `content` chunks forward to the
//! caller immediately, debug records feed the pipeline, and every other
//! typed event lands in the producer's outputs and routes along matching
//! edges.
//!
//! When no node is ready and unset nodes remain, the stalled set is
//! Kahn-reduced: whatever survives is waiting on itself (a dependency
//! cycle) and reported as a deadlock; nodes stalled on an upstream failure
//! simply stay unreached.

use std::sync::Arc;

use chrono::Utc;
use rustc_hash::FxHashSet;
use serde_json::{json, Value};

use crate::debug::events::{DebugEvent, DebugEventType, DebugSeverity};
use crate::event::{is_final_type, EventPayload, FlowValue, NodeEvent, SOURCE_END};
use crate::graphs::model::{Graph, NodeState};
use crate::nodes::NodeContext;
use crate::stream::{ChatCompletionChunk, FlowMessage};
use crate::types::NodeTag;

use super::{bypass, ExecCtx};

/// The outputs-map key an edge's `source_type` resolves to.
fn output_key(source_type: &str) -> &str {
    if is_final_type(source_type) {
        SOURCE_END
    } else {
        source_type
    }
}

fn in_subset(subset: Option<&FxHashSet<String>>, id: &str) -> bool {
    subset.map_or(true, |s| s.contains(id))
}

fn source_done(graph: &Graph, source: &str, source_type: &str) -> bool {
    graph.node(source).is_some_and(|cell| {
        cell.state == NodeState::Executed && cell.outputs.contains_key(output_key(source_type))
    })
}

fn edge_satisfied(graph: &Graph, source: &str, source_type: &str, bypassed: bool) -> bool {
    bypassed || source_done(graph, source, source_type)
}

/// Drive every node in `subset` (or the whole graph) to a terminal state.
pub(crate) async fn drive(
    graph: &mut Graph,
    subset: Option<&FxHashSet<String>>,
    cx: &mut ExecCtx,
) {
    loop {
        if cx.cancel.is_cancelled() {
            return;
        }
        let Some(idx) = next_ready(graph, subset) else {
            break;
        };
        run_node(graph, idx, cx).await;
    }
    report_stall(graph, subset, cx);
}

fn next_ready(graph: &Graph, subset: Option<&FxHashSet<String>>) -> Option<usize> {
    graph.nodes.iter().position(|cell| {
        cell.state == NodeState::Unset
            && in_subset(subset, &cell.id)
            && graph
                .incoming(&cell.id)
                .all(|e| edge_satisfied(graph, &e.source, &e.source_type, e.bypassed))
    })
}

/// Execute (or replay) one node and integrate its events into the graph.
pub(crate) async fn run_node(graph: &mut Graph, idx: usize, cx: &mut ExecCtx) {
    let node_id = graph.nodes[idx].id.clone();
    let tag = graph.nodes[idx].tag.clone();
    if tag != NodeTag::Void {
        cx.pipeline.node_start(&node_id, tag.encode());
    }
    let started = Utc::now();
    graph.nodes[idx].started_at = Some(started);

    let replay = if graph.nodes[idx].iterate {
        None
    } else {
        graph.nodes[idx].cached.clone()
    };
    let mut selected: Option<String> = None;

    if let Some(cached) = replay {
        // Cached final event: re-publish and re-route, no re-execution.
        graph.nodes[idx]
            .outputs
            .insert(SOURCE_END.to_string(), cached.clone());
        route(graph, &node_id, SOURCE_END, &cached, cx);
    } else {
        let runtime = Arc::clone(&graph.nodes[idx].runtime);
        let inputs = graph.nodes[idx].inputs.clone();
        let (events_tx, events_rx) = flume::unbounded();
        let node_ctx = NodeContext {
            node_id: node_id.clone(),
            chat_log: cx.chat_log.clone(),
            events: events_tx,
            stream: cx.out.clone(),
            cancel: cx.cancel.clone(),
        };
        let handle = tokio::spawn(async move { runtime.run(inputs, node_ctx).await });

        while let Ok(event) = events_rx.recv_async().await {
            integrate_event(graph, idx, &node_id, &tag, event, &mut selected, cx);
        }
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                cx.pipeline.node_error(
                    &node_id,
                    tag.encode(),
                    err.kind(),
                    &err.to_string(),
                    err.context(),
                );
            }
            Err(join_err) => {
                cx.pipeline.node_error(
                    &node_id,
                    tag.encode(),
                    DebugEventType::NodeError,
                    &format!("node task aborted: {join_err}"),
                    Value::Null,
                );
            }
        }
    }

    {
        let cell = &mut graph.nodes[idx];
        cell.state = NodeState::Executed;
        cell.duration_ms = Some((Utc::now() - started).num_milliseconds().max(0) as u64);
        if let Some(end) = cell.outputs.get(SOURCE_END) {
            cell.cached = Some(end.clone());
        }
    }
    // The injected sink is engine-internal and stays out of debug output.
    if graph.nodes[idx].tag != NodeTag::Void {
        let info = graph.nodes[idx].debug_info(&cx.config);
        cx.pipeline.node_end(info);
    }

    if tag == NodeTag::Conditional {
        settle_conditional(graph, idx, selected, cx);
    }
}

fn integrate_event(
    graph: &mut Graph,
    idx: usize,
    node_id: &str,
    tag: &NodeTag,
    event: NodeEvent,
    selected: &mut Option<String>,
    cx: &mut ExecCtx,
) {
    if event.is_content() {
        let chunk = match event.payload.value {
            FlowValue::Chunk(chunk) => *chunk,
            other => ChatCompletionChunk::text(other.coerce_string()),
        };
        cx.send(FlowMessage::Content(chunk));
        return;
    }
    if event.is_debug() {
        cx.pipeline
            .node_record(node_id, tag.encode(), event.payload.value.snapshot());
        return;
    }

    let key = output_key(&event.source_type).to_string();
    if *tag == NodeTag::Conditional && selected.is_none() && key != SOURCE_END {
        *selected = Some(key.clone());
    }
    graph.nodes[idx]
        .outputs
        .insert(key.clone(), event.payload.clone());
    route(graph, node_id, &key, &event.payload, cx);
}

/// Write a payload into every non-bypassed edge matching the output type.
pub(crate) fn route(
    graph: &mut Graph,
    source_id: &str,
    source_type: &str,
    payload: &EventPayload,
    cx: &mut ExecCtx,
) {
    let matching: Vec<(String, String, String)> = graph
        .edges
        .iter()
        .filter(|e| {
            !e.bypassed && e.source == source_id && output_key(&e.source_type) == source_type
        })
        .map(|e| (e.id.clone(), e.target.clone(), e.target_key.clone()))
        .collect();
    for (edge_id, target, target_key) in matching {
        if let Some(cell) = graph.node_mut(&target) {
            cell.inputs.insert(target_key.clone(), payload.value.clone());
        }
        cx.pipeline.capture(
            DebugEvent::new(DebugEventType::EdgeTraversed, DebugSeverity::Trace).with_payload(
                json!({
                    "edge_id": edge_id,
                    "source": source_id,
                    "source_type": source_type,
                    "target": target,
                    "target_key": target_key,
                }),
            ),
        );
    }
}

/// Apply a conditional's selection: verify an edge matches (falling back to
/// the configured default handle), then prune and propagate bypass.
fn settle_conditional(
    graph: &mut Graph,
    idx: usize,
    selected: Option<String>,
    cx: &mut ExecCtx,
) {
    // A conditional that failed before emitting leaves its branches
    // unsatisfied; downstream stalls are handled by the scheduler.
    let Some(mut selected) = selected else {
        return;
    };
    let node_id = graph.nodes[idx].id.clone();
    let outgoing_types: Vec<String> = graph
        .outgoing(&node_id)
        .map(|e| e.source_type.clone())
        .collect();

    if !outgoing_types.iter().any(|t| *t == selected) {
        let default = graph.nodes[idx]
            .spec
            .data_str("default_handle")
            .map(str::to_string)
            .filter(|d| outgoing_types.iter().any(|t| t == d));
        match default {
            Some(default) => {
                cx.pipeline.capture(
                    DebugEvent::new(DebugEventType::ConditionEvaluated, DebugSeverity::Warn)
                        .with_node(node_id.as_str(), NodeTag::Conditional.encode())
                        .with_payload(json!({
                            "message": "selected handle matches no edge; using default handle",
                            "selected_handle": selected,
                            "default_handle": default,
                        })),
                );
                if let Some(payload) = graph.nodes[idx].outputs.get(&selected).cloned() {
                    graph.nodes[idx]
                        .outputs
                        .insert(default.clone(), payload.clone());
                    route(graph, &node_id, &default, &payload, cx);
                }
                selected = default;
            }
            None => {
                cx.pipeline.node_error(
                    &node_id,
                    NodeTag::Conditional.encode(),
                    DebugEventType::RoutingError,
                    &format!(
                        "conditional selected handle '{selected}' but no outgoing edge matches"
                    ),
                    json!({
                        "selected_handle": selected,
                        "outgoing_handles": outgoing_types,
                    }),
                );
                bypass::bypass_all_outgoing(graph, &node_id, cx);
                return;
            }
        }
    }

    bypass::prune_conditional(graph, &node_id, &selected, cx);
}

/// Classify a stall: nodes in mutual dependency wait are a deadlock; nodes
/// stalled on executed-but-silent producers stay unreached.
fn report_stall(graph: &Graph, subset: Option<&FxHashSet<String>>, cx: &mut ExecCtx) {
    let mut stalled: FxHashSet<String> = graph
        .nodes
        .iter()
        .filter(|cell| cell.state == NodeState::Unset && in_subset(subset, &cell.id))
        .map(|cell| cell.id.clone())
        .collect();
    if stalled.is_empty() {
        return;
    }

    loop {
        let removable: Vec<String> = stalled
            .iter()
            .filter(|id| {
                graph.incoming(id).all(|e| {
                    edge_satisfied(graph, &e.source, &e.source_type, e.bypassed)
                        || !stalled.contains(&e.source)
                })
            })
            .cloned()
            .collect();
        if removable.is_empty() {
            break;
        }
        for id in removable {
            stalled.remove(&id);
        }
    }

    if !stalled.is_empty() {
        let mut stuck: Vec<String> = stalled.into_iter().collect();
        stuck.sort();
        cx.pipeline.deadlock(stuck);
    }
}
