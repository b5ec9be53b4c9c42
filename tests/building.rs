mod common;

use common::*;
use proptest::prelude::*;
use serde_json::json;

use flowweave::graphs::{build, Attachments};
use flowweave::types::{NodeTag, KEY_VOID};

#[test]
fn entry_node_sorts_first() {
    let graph = compile(
        json!({
            "nodes": [
                {"id": "t", "type": "text", "data": {"text": "x"}},
                {"id": "u", "type": "user_input"},
                {"id": "e", "type": "end"}
            ],
            "edges": [
                {"source": "u", "sourceHandle": "handle_user_message",
                 "target": "t", "targetHandle": "in"},
                {"source": "t", "sourceHandle": "end",
                 "target": "e", "targetHandle": "in"}
            ]
        }),
        "Hi",
    );
    assert_eq!(graph.nodes[0].id, "u");
    assert_eq!(graph.master, "u");
}

#[test]
fn unwired_edges_are_absorbed_by_the_sink() {
    let graph = compile(
        json!({
            "nodes": [
                {"id": "u", "type": "user_input"},
                {"id": "t", "type": "text", "data": {"text": "x"}}
            ],
            "edges": [
                {"source": "t", "sourceHandle": "end", "target": "whatever"}
            ]
        }),
        "Hi",
    );
    let patched = graph
        .edges
        .iter()
        .find(|e| e.source == "t")
        .expect("edge survives compilation");
    assert_eq!(patched.target, graph.sink);
    assert_eq!(patched.target_key, KEY_VOID);
    assert!(graph.node(&graph.sink).is_some());
}

#[test]
fn end_nodes_get_an_absorbing_edge() {
    let graph = compile(
        json!({
            "nodes": [
                {"id": "u", "type": "user_input"},
                {"id": "e", "type": "end"}
            ],
            "edges": [
                {"source": "u", "sourceHandle": "handle_user_message",
                 "target": "e", "targetHandle": "in"}
            ]
        }),
        "Hi",
    );
    assert!(graph
        .edges
        .iter()
        .any(|edge| edge.source == "e" && edge.target == graph.sink));
}

#[test]
fn entry_node_is_seeded_with_message_and_attachments() {
    let attachments = Attachments {
        files: vec!["notes.txt".to_string()],
        images: vec!["photo.png".to_string()],
    };
    let graph = build(
        spec(json!({
            "nodes": [
                {"id": "u", "type": "user_input"},
                {"id": "c", "type": "chat"}
            ],
            "edges": []
        })),
        "Hello there",
        attachments,
    );
    let entry = graph.node("u").unwrap();
    assert_eq!(entry.spec.data["text"], "Hello there");
    assert_eq!(entry.spec.data["files"][0], "notes.txt");
    let chat = graph.node("c").unwrap();
    assert_eq!(chat.spec.data["message"], "Hello there");
}

#[test]
fn unknown_node_types_degrade_to_stubs() {
    let graph = compile(
        json!({
            "nodes": [
                {"id": "u", "type": "user_input"},
                {"id": "x", "type": "quantum_oracle"}
            ],
            "edges": []
        }),
        "Hi",
    );
    assert_eq!(
        graph.node("x").unwrap().tag,
        NodeTag::Unknown("quantum_oracle".to_string())
    );
}

#[tokio::test]
async fn stub_nodes_report_and_execution_continues() {
    let messages = run_spec(
        json!({
            "nodes": [
                {"id": "u", "type": "user_input"},
                {"id": "x", "type": "quantum_oracle"},
                {"id": "t", "type": "text", "data": {"text": "still here"}},
                {"id": "e", "type": "end"}
            ],
            "edges": [
                {"source": "x", "sourceHandle": "end",
                 "target": "t", "targetHandle": "in"},
                {"source": "t", "sourceHandle": "end",
                 "target": "e", "targetHandle": "in"}
            ]
        }),
        "Hi",
    )
    .await;
    let errors = debug_events(&messages);
    assert!(
        errors
            .iter()
            .any(|e| e.payload["error_type"] == "UnsupportedNodeType"),
        "stub should report the unsupported type"
    );
}

#[test]
fn declared_master_overrides_default() {
    let graph = compile(
        json!({
            "master": "u2",
            "nodes": [
                {"id": "u2", "type": "user_input"},
                {"id": "t", "type": "text", "data": {"text": "x"}}
            ],
            "edges": []
        }),
        "Hi",
    );
    assert_eq!(graph.master, "u2");
}

#[test]
fn building_twice_yields_identical_structure() {
    let value = json!({
        "nodes": [
            {"id": "u", "type": "user_input"},
            {"id": "t", "type": "text", "data": {"text": "x"}},
            {"id": "e", "type": "end"}
        ],
        "edges": [
            {"source": "u", "sourceHandle": "handle_user_message",
             "target": "t", "targetHandle": "in"},
            {"source": "t", "sourceHandle": "end",
             "target": "e", "targetHandle": "in"}
        ]
    });
    let first = compile(value.clone(), "same message");
    let second = compile(value, "same message");
    assert_eq!(first.structure(), second.structure());
}

#[test]
fn cyclic_specs_still_build() {
    let graph = compile(
        json!({
            "nodes": [
                {"id": "u", "type": "user_input"},
                {"id": "a", "type": "text", "data": {"text": "a"}},
                {"id": "b", "type": "text", "data": {"text": "b"}}
            ],
            "edges": [
                {"source": "a", "sourceHandle": "end", "target": "b", "targetHandle": "in"},
                {"source": "b", "sourceHandle": "end", "target": "a", "targetHandle": "in"}
            ]
        }),
        "Hi",
    );
    assert_eq!(graph.nodes.len(), 4); // u, a, b + sink
}

proptest! {
    /// Compilation is deterministic over arbitrary linear chains.
    #[test]
    fn compile_is_deterministic(names in proptest::collection::vec("[a-z]{3,8}", 1..6)) {
        let mut nodes = vec![json!({"id": "entry", "type": "user_input"})];
        let mut edges = Vec::new();
        let mut prev = "entry".to_string();
        for (i, name) in names.iter().enumerate() {
            let id = format!("{name}-{i}");
            nodes.push(json!({"id": id.clone(), "type": "text", "data": {"text": name}}));
            edges.push(json!({
                "source": prev.clone(),
                "sourceHandle": if prev == "entry" { "handle_user_message" } else { "end" },
                "target": id.clone(),
                "targetHandle": "in"
            }));
            prev = id;
        }
        let value = json!({"nodes": nodes, "edges": edges});
        let first = compile(value.clone(), "msg");
        let second = compile(value, "msg");
        prop_assert_eq!(first.structure(), second.structure());
    }
}
