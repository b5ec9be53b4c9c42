//! The loop executor.
//!
//! Expands a loop node's list input into per-element re-executions. The
//! graph is partitioned into three phases sharing the linear scheduler:
//!
//! 1. *static* — everything feeding the loop (and anything independent),
//! 2. *iteration* — the subgraph reachable from the loop's per-item output,
//!    re-driven once per element with iteration-scoped cache resets,
//! 3. *aggregation* — the subgraph reachable from the loop's terminal
//!    output, driven once with the accumulated feedback list.
//!
//! Per-element routing events carry the `content` type and the aggregation
//! the `end` type, matching the handles edges use. Feedback values received
//! on the loop input are both accumulated and forwarded to the caller as
//! content chunks in iteration order.

use std::collections::VecDeque;

use chrono::Utc;
use rustc_hash::FxHashSet;
use serde_json::Value;

use crate::debug::events::DebugEventType;
use crate::event::{is_final_type, EventPayload, SOURCE_CONTENT, SOURCE_END};
use crate::graphs::model::{Graph, NodeState};
use crate::nodes::loop_node::{LoopNode, DEFAULT_MAX_ITERATIONS};
use crate::nodes::Handles;
use crate::stream::{ChatCompletionChunk, FlowMessage};
use crate::types::{HANDLE_LIST, HANDLE_LOOP, NodeTag};

use super::{bypass, linear, ExecCtx};

pub(crate) async fn run(graph: &mut Graph, cx: &mut ExecCtx) {
    let Some(loop_idx) = graph.loop_index() else {
        return;
    };
    let loop_id = graph.nodes[loop_idx].id.clone();
    let loop_tag = NodeTag::Loop.encode();
    let handles = Handles::from_spec(&graph.nodes[loop_idx].spec);
    let list_key = handles.resolve(HANDLE_LIST).to_string();
    let feedback_key = handles.resolve(HANDLE_LOOP).to_string();
    let max_iterations = graph.nodes[loop_idx]
        .spec
        .data
        .get("max_iterations")
        .and_then(Value::as_u64)
        .map(|v| v as usize)
        .unwrap_or(DEFAULT_MAX_ITERATIONS);

    let item_targets: Vec<String> = graph
        .outgoing(&loop_id)
        .filter(|e| e.source_type == SOURCE_CONTENT)
        .map(|e| e.target.clone())
        .collect();
    let end_targets: Vec<String> = graph
        .outgoing(&loop_id)
        .filter(|e| is_final_type(&e.source_type))
        .map(|e| e.target.clone())
        .collect();

    let mut iteration_set = reachable(graph, &item_targets, &loop_id, None);
    iteration_set.remove(&graph.sink);
    let mut post_set = reachable(graph, &end_targets, &loop_id, Some(&iteration_set));
    post_set.insert(graph.sink.clone());
    let static_set: FxHashSet<String> = graph
        .nodes
        .iter()
        .map(|cell| cell.id.clone())
        .filter(|id| *id != loop_id && !iteration_set.contains(id) && !post_set.contains(id))
        .collect();
    tracing::debug!(
        loop_node = %loop_id,
        static_nodes = static_set.len(),
        iteration_nodes = iteration_set.len(),
        post_nodes = post_set.len(),
        "loop plan"
    );

    cx.pipeline.node_start(&loop_id, loop_tag);
    let started = Utc::now();
    graph.nodes[loop_idx].started_at = Some(started);

    linear::drive(graph, Some(&static_set), cx).await;
    if cx.cancel.is_cancelled() {
        return;
    }

    let Some(raw) = graph.nodes[loop_idx].inputs.get(&list_key).cloned() else {
        let list_source_bypassed = graph
            .incoming(&loop_id)
            .filter(|e| e.target_key == list_key)
            .any(|e| e.bypassed);
        if list_source_bypassed {
            // A conditional pruned the path feeding the loop: the whole loop
            // subtree is skipped, but merge points past it may still run.
            bypass_loop_subtree(graph, loop_idx, &iteration_set, cx);
            linear::drive(graph, Some(&post_set), cx).await;
        } else {
            cx.pipeline.node_error(
                &loop_id,
                loop_tag,
                DebugEventType::InputError,
                &format!("loop received no input on '{list_key}'"),
                Value::Null,
            );
        }
        return;
    };

    let items = match LoopNode::parse_items(&raw.snapshot()) {
        Ok(items) => items,
        Err(err) => {
            cx.pipeline
                .node_error(&loop_id, loop_tag, err.kind(), &err.to_string(), err.context());
            return;
        }
    };

    let total = items.len();
    let mut aggregated: Vec<Value> = Vec::with_capacity(total);
    for (index, item) in items.into_iter().enumerate() {
        if cx.cancel.is_cancelled() {
            return;
        }
        if index >= max_iterations {
            cx.pipeline.node_error(
                &loop_id,
                loop_tag,
                DebugEventType::DataError,
                &format!("loop exceeded max iterations ({max_iterations})"),
                serde_json::json!({ "iterations_completed": index }),
            );
            break;
        }
        cx.pipeline.iteration_start(&loop_id, index, total);

        for id in &iteration_set {
            if let Some(cell) = graph.node_mut(id) {
                cell.reset_for_iteration();
            }
        }
        let payload = EventPayload::new(loop_id.clone(), item);
        {
            let cell = &mut graph.nodes[loop_idx];
            cell.outputs.clear();
            cell.inputs.remove(&feedback_key);
            cell.state = NodeState::Executed;
            cell.outputs
                .insert(SOURCE_CONTENT.to_string(), payload.clone());
        }
        linear::route(graph, &loop_id, SOURCE_CONTENT, &payload, cx);

        linear::drive(graph, Some(&iteration_set), cx).await;

        let feedback = graph.nodes[loop_idx].inputs.get(&feedback_key).cloned();
        if let Some(feedback) = &feedback {
            cx.send(FlowMessage::Content(ChatCompletionChunk::text(
                feedback.coerce_string(),
            )));
        }
        aggregated.push(feedback.map(|v| v.snapshot()).unwrap_or(Value::Null));
        cx.pipeline.iteration_end(&loop_id, index);
    }

    let end_payload = EventPayload::new(loop_id.clone(), Value::Array(aggregated));
    {
        let cell = &mut graph.nodes[loop_idx];
        cell.outputs.clear();
        cell.outputs
            .insert(SOURCE_END.to_string(), end_payload.clone());
        cell.cached = Some(end_payload.clone());
        cell.state = NodeState::Executed;
        cell.duration_ms = Some((Utc::now() - started).num_milliseconds().max(0) as u64);
    }
    linear::route(graph, &loop_id, SOURCE_END, &end_payload, cx);
    let info = graph.nodes[loop_idx].debug_info(&cx.config);
    cx.pipeline.node_end(info);

    linear::drive(graph, Some(&post_set), cx).await;
}

/// Node ids reachable from `seeds` along outgoing edges, never crossing the
/// loop node itself.
fn reachable(
    graph: &Graph,
    seeds: &[String],
    loop_id: &str,
    exclude: Option<&FxHashSet<String>>,
) -> FxHashSet<String> {
    let mut set = FxHashSet::default();
    let mut queue: VecDeque<String> = seeds.iter().cloned().collect();
    while let Some(id) = queue.pop_front() {
        if id == loop_id
            || set.contains(&id)
            || exclude.map_or(false, |ex| ex.contains(&id))
            || graph.node(&id).is_none()
        {
            continue;
        }
        set.insert(id.clone());
        for edge in graph.outgoing(&id) {
            if edge.target != loop_id && !set.contains(&edge.target) {
                queue.push_back(edge.target.clone());
            }
        }
    }
    set
}

/// Skip the loop and its iteration subgraph after the list path was pruned.
fn bypass_loop_subtree(
    graph: &mut Graph,
    loop_idx: usize,
    iteration_set: &FxHashSet<String>,
    cx: &mut ExecCtx,
) {
    let loop_id = graph.nodes[loop_idx].id.clone();
    graph.nodes[loop_idx].state = NodeState::Bypassed;
    let info = graph.nodes[loop_idx].debug_info(&cx.config);
    cx.pipeline.node_bypassed(info);

    bypass::bypass_all_outgoing(graph, &loop_id, cx);

    // Iteration members kept alive by static parents are still meaningless
    // without items; mark them too.
    let leftover: Vec<String> = iteration_set
        .iter()
        .filter(|id| {
            graph
                .node(id)
                .is_some_and(|cell| cell.state == NodeState::Unset)
        })
        .cloned()
        .collect();
    for id in leftover {
        if let Some(cell) = graph.node_mut(&id) {
            cell.state = NodeState::Bypassed;
        }
        if let Some(cell) = graph.node(&id) {
            let info = cell.debug_info(&cx.config);
            cx.pipeline.node_bypassed(info);
        }
        let touching: Vec<(usize, String)> = graph
            .edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.source == id || e.target == id)
            .map(|(i, e)| (i, e.target.clone()))
            .collect();
        for (edge_idx, target) in touching {
            graph.edges[edge_idx].bypassed = true;
            if target != id {
                bypass::auto_bypass(graph, &target, cx);
            }
        }
    }
}
