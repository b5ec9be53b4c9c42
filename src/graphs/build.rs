//! Graph compilation.
//!
//! `build` is pure and synchronous: it validates the spec, orders nodes for
//! debuggability, injects the sink node, patches unwired edges, seeds the
//! entry and chat nodes with the initial message, instantiates every node
//! runtime and recurses into nested specs. All side effects are deferred to
//! execute time; validation failures are embedded in the returned graph
//! rather than raised.

use serde_json::{json, Value};

use crate::event::SOURCE_END;
use crate::nodes::{self, InnerNode, StubNode};
use crate::spec::{EdgeSpec, FlowSpec, NodeSpec};
use crate::types::{NodeTag, KEY_VOID};

use super::model::{Edge, Graph, NodeCell};
use super::validate::{self, SpecIssue};

/// Attachments carried by the entry node alongside the message.
#[derive(Clone, Debug, Default)]
pub struct Attachments {
    pub files: Vec<String>,
    pub images: Vec<String>,
}

/// Compile a spec and an initial user message into an executable graph.
#[must_use]
pub fn build(spec: FlowSpec, message: &str, attachments: Attachments) -> Graph {
    let mut issues = validate::validate(&spec);

    let FlowSpec {
        kind,
        debug,
        debug_config,
        master,
        mut nodes,
        edges,
    } = spec;

    sort_nodes(&mut nodes, &edges);
    let edges = sort_edges(edges, &nodes);

    // The sink id must not collide with user node ids; fresh but stable so
    // repeated builds of one spec are structurally identical.
    let sink_id = fresh_sink_id(&nodes);
    let mut compiled_edges = Vec::with_capacity(edges.len());
    for (i, edge) in edges.into_iter().enumerate() {
        let id = edge.id.clone().unwrap_or_else(|| format!("edge-{i}"));
        match edge.target_handle {
            Some(target_key) => compiled_edges.push(Edge {
                id,
                source: edge.source,
                source_type: edge.source_handle,
                target: edge.target,
                target_key,
                bypassed: false,
            }),
            // Unwired edges are absorbed by the sink.
            None => compiled_edges.push(Edge {
                id,
                source: edge.source,
                source_type: edge.source_handle,
                target: sink_id.clone(),
                target_key: KEY_VOID.to_string(),
                bypassed: false,
            }),
        }
    }

    // Terminal outputs always have a consumer.
    for node in &nodes {
        if NodeTag::decode(&node.kind).is_end() {
            compiled_edges.push(Edge {
                id: format!("edge-{}-absorb", node.id),
                source: node.id.clone(),
                source_type: SOURCE_END.to_string(),
                target: sink_id.clone(),
                target_key: KEY_VOID.to_string(),
                bypassed: false,
            });
        }
    }

    seed_inputs(&mut nodes, message, &attachments);

    let mut cells = Vec::with_capacity(nodes.len() + 1);
    for node in nodes {
        let tag = NodeTag::decode(&node.kind);
        let runtime: std::sync::Arc<dyn nodes::Node> = match tag {
            NodeTag::Inner => match node.magic_flow.clone() {
                Some(sub_spec) => {
                    // Nested graphs compile once here and are re-seeded per
                    // run by the host; their findings bubble up to this
                    // graph's issue list.
                    let mut sub = build(*sub_spec, "", Attachments::default());
                    issues.extend(
                        std::mem::take(&mut sub.issues)
                            .into_iter()
                            .map(|issue| issue.nested_in(&node.id)),
                    );
                    std::sync::Arc::new(InnerNode::new(sub, &node))
                }
                None => std::sync::Arc::new(StubNode::config_error(
                    &node.id,
                    &tag,
                    "inner node is missing its magic_flow spec",
                )),
            },
            _ => nodes::create_node(&tag, &node),
        };
        cells.push(NodeCell::new(tag, node, runtime));
    }

    let sink_spec = NodeSpec {
        id: sink_id.clone(),
        kind: NodeTag::Void.encode().to_string(),
        data: serde_json::Map::new(),
        magic_flow: None,
    };
    let sink_runtime = nodes::create_node(&NodeTag::Void, &sink_spec);
    cells.push(NodeCell::new(NodeTag::Void, sink_spec, sink_runtime));

    let master = resolve_master(master, &cells, &mut issues);

    Graph::new(
        kind,
        debug,
        debug_config,
        cells,
        compiled_edges,
        master,
        sink_id,
        issues,
    )
}

/// Order nodes so that producers precede consumers, entry node first. The
/// sort tolerates cycles (members keep their spec order at the tail) so a
/// cyclic graph still builds and can report its deadlock at run time.
fn sort_nodes(nodes: &mut Vec<NodeSpec>, edges: &[EdgeSpec]) {
    let position = |id: &str| nodes.iter().position(|n| n.id == id);
    let mut in_degree = vec![0usize; nodes.len()];
    for edge in edges {
        if position(&edge.source).is_some() {
            if let Some(target) = position(&edge.target) {
                in_degree[target] += 1;
            }
        }
    }

    let mut placed = vec![false; nodes.len()];
    let mut order: Vec<usize> = Vec::with_capacity(nodes.len());
    loop {
        // First unplaced node with no unsatisfied producers, preferring the
        // entry node, then spec order. O(n^2) but builds are small.
        let next = nodes
            .iter()
            .enumerate()
            .filter(|(i, _)| !placed[*i] && in_degree[*i] == 0)
            .min_by_key(|(i, node)| {
                let entry_rank = usize::from(!NodeTag::decode(&node.kind).is_user_input());
                (entry_rank, *i)
            })
            .map(|(i, _)| i);
        let Some(i) = next else { break };
        placed[i] = true;
        order.push(i);
        for edge in edges {
            if edge.source == nodes[i].id {
                if let Some(target) = position(&edge.target) {
                    if !placed[target] {
                        in_degree[target] = in_degree[target].saturating_sub(1);
                    }
                }
            }
        }
    }
    // Cycle members.
    for (i, was_placed) in placed.iter().enumerate() {
        if !was_placed {
            order.push(i);
        }
    }

    let mut reordered = Vec::with_capacity(nodes.len());
    for i in order {
        reordered.push(nodes[i].clone());
    }
    *nodes = reordered;
}

/// Stable-sort edges so edges from earlier nodes appear first.
fn sort_edges(mut edges: Vec<EdgeSpec>, nodes: &[NodeSpec]) -> Vec<EdgeSpec> {
    let rank = |id: &str| {
        nodes
            .iter()
            .position(|n| n.id == id)
            .unwrap_or(nodes.len())
    };
    edges.sort_by_key(|edge| rank(&edge.source));
    edges
}

fn fresh_sink_id(nodes: &[NodeSpec]) -> String {
    let taken = |candidate: &str| nodes.iter().any(|n| n.id == candidate);
    if !taken(KEY_VOID) {
        return KEY_VOID.to_string();
    }
    let mut i = 1usize;
    loop {
        let candidate = format!("{KEY_VOID}-{i}");
        if !taken(&candidate) {
            return candidate;
        }
        i += 1;
    }
}

/// Inject the initial message and attachments into the entry node's
/// configuration, and the message as the current turn of any chat node.
fn seed_inputs(nodes: &mut [NodeSpec], message: &str, attachments: &Attachments) {
    for node in nodes {
        match NodeTag::decode(&node.kind) {
            NodeTag::UserInput => {
                node.data
                    .insert("text".to_string(), Value::String(message.to_string()));
                node.data
                    .insert("files".to_string(), json!(attachments.files));
                node.data
                    .insert("images".to_string(), json!(attachments.images));
            }
            NodeTag::Chat => {
                node.data
                    .insert("message".to_string(), Value::String(message.to_string()));
            }
            _ => {}
        }
    }
}

fn resolve_master(
    declared: Option<String>,
    cells: &[NodeCell],
    issues: &mut Vec<SpecIssue>,
) -> String {
    if let Some(master) = declared {
        if cells.iter().any(|cell| cell.id == master) {
            return master;
        }
        issues.push(SpecIssue::error(
            format!("declared master node '{master}' does not exist"),
            json!({ "master": master }),
        ));
    }
    cells
        .iter()
        .find(|cell| cell.tag.is_user_input())
        .or_else(|| cells.first())
        .map(|cell| cell.id.clone())
        .unwrap_or_default()
}
