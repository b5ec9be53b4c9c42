//! The bypass engine.
//!
//! Marking an edge bypassed removes it both as a readiness prerequisite and
//! as a data path. A node with at least one incoming edge whose incoming
//! edges are all bypassed is itself bypassed, and the marking propagates
//! depth-first through its outgoing edges. Because propagation stops at any
//! node with a live parent, merge points keep executing on their surviving
//! branch.

use crate::event::is_final_type;
use crate::graphs::model::{Graph, NodeState};

use super::ExecCtx;

/// Recursively bypass `node_id` if every incoming edge is bypassed, then
/// propagate through its outgoing edges.
pub(crate) fn auto_bypass(graph: &mut Graph, node_id: &str, cx: &mut ExecCtx) {
    let Some(cell) = graph.node(node_id) else {
        return;
    };
    if cell.state != NodeState::Unset {
        return;
    }

    let mut incoming = 0usize;
    let mut live = 0usize;
    for edge in graph.incoming(node_id) {
        incoming += 1;
        if !edge.bypassed {
            live += 1;
        }
    }
    // Source nodes (no parents) and nodes with a live parent stay eligible.
    if incoming == 0 || live > 0 {
        return;
    }

    if let Some(cell) = graph.node_mut(node_id) {
        cell.state = NodeState::Bypassed;
    }
    if let Some(cell) = graph.node(node_id) {
        let info = cell.debug_info(&cx.config);
        cx.pipeline.node_bypassed(info);
    }

    let outgoing: Vec<(usize, String)> = graph
        .edges
        .iter()
        .enumerate()
        .filter(|(_, e)| e.source == node_id)
        .map(|(i, e)| (i, e.target.clone()))
        .collect();
    for (edge_idx, target) in outgoing {
        graph.edges[edge_idx].bypassed = true;
        auto_bypass(graph, &target, cx);
    }
}

/// Bypass every outgoing edge of `node_id` and propagate. Used when a
/// conditional cannot route (no matching edge, no usable default).
pub(crate) fn bypass_all_outgoing(graph: &mut Graph, node_id: &str, cx: &mut ExecCtx) {
    let outgoing: Vec<(usize, String)> = graph
        .edges
        .iter()
        .enumerate()
        .filter(|(_, e)| e.source == node_id)
        .map(|(i, e)| (i, e.target.clone()))
        .collect();
    for (edge_idx, target) in outgoing {
        graph.edges[edge_idx].bypassed = true;
        auto_bypass(graph, &target, cx);
    }
}

/// Prune a conditional's outgoing edges after it selected `selected`:
/// every edge whose type is neither the selection nor the terminal tag is
/// bypassed and the bypass propagated. The terminal event carries selection
/// metadata and does not participate.
pub(crate) fn prune_conditional(
    graph: &mut Graph,
    node_id: &str,
    selected: &str,
    cx: &mut ExecCtx,
) {
    // Targets also reachable through the selected handle are safe: the
    // depth-first bypass stops at any node with a live parent edge.
    let pruned: Vec<(usize, String)> = graph
        .edges
        .iter()
        .enumerate()
        .filter(|(_, e)| {
            e.source == node_id
                && e.source_type != selected
                && !is_final_type(&e.source_type)
        })
        .map(|(i, e)| (i, e.target.clone()))
        .collect();
    for (edge_idx, target) in pruned {
        graph.edges[edge_idx].bypassed = true;
        auto_bypass(graph, &target, cx);
    }
}
