mod common;

use common::*;
use serde_json::json;

use flowweave::debug::events::DebugEventType;

fn outer_with_inner(debug: bool, script: &[&str]) -> serde_json::Value {
    json!({
        "type": "chat",
        "debug": debug,
        "nodes": [
            {"id": "outer-input", "type": "user_input"},
            {"id": "inner-host", "type": "inner",
             "magic_flow": linear_chat_spec(debug, script)},
            {"id": "outer-end", "type": "end"}
        ],
        "edges": [
            {"source": "outer-input", "sourceHandle": "handle_user_message",
             "target": "inner-host", "targetHandle": "handle_user_message"},
            {"source": "inner-host", "sourceHandle": "end",
             "target": "outer-end", "targetHandle": "handle-1"}
        ]
    })
}

#[tokio::test]
async fn inner_content_streams_through_the_outer_graph() {
    let messages = run_spec(outer_with_inner(false, &["nested ", "hello"]), "Hi").await;
    assert_eq!(content_text(&messages), "nested hello");
}

#[tokio::test]
async fn inner_aggregates_its_content_as_an_output() {
    let messages = run_spec(outer_with_inner(true, &["a", "b"]), "Hi").await;

    // Two summaries: the nested graph's first, then the outer's.
    let summaries: Vec<_> = messages.iter().filter_map(|m| m.as_summary()).collect();
    assert_eq!(summaries.len(), 2);

    let outer = summaries.last().unwrap();
    let host = outer
        .nodes
        .iter()
        .find(|n| n.node_id == "inner-host")
        .expect("host node captured");
    assert!(host.was_executed);
    assert_eq!(host.outputs["handle_execution_content"], "ab");
    assert!(outer.executed.iter().any(|n| n == "outer-end"));
}

#[tokio::test]
async fn debug_tree_shows_both_graphs() {
    let messages = run_spec(outer_with_inner(true, &["x"]), "Hi").await;
    let graph_starts = debug_events_of(&messages, DebugEventType::GraphStart);
    assert_eq!(graph_starts.len(), 2);
    // Two distinct execution ids: one per graph.
    assert_ne!(graph_starts[0].execution_id, graph_starts[1].execution_id);
}

#[tokio::test]
async fn inner_nodes_nest_recursively() {
    let innermost = linear_chat_spec(false, &["deep"]);
    let middle = json!({
        "type": "chat",
        "nodes": [
            {"id": "mid-input", "type": "user_input"},
            {"id": "mid-host", "type": "inner", "magic_flow": innermost},
            {"id": "mid-end", "type": "end"}
        ],
        "edges": [
            {"source": "mid-input", "sourceHandle": "handle_user_message",
             "target": "mid-host", "targetHandle": "handle_user_message"},
            {"source": "mid-host", "sourceHandle": "end",
             "target": "mid-end", "targetHandle": "in"}
        ]
    });
    let outer = json!({
        "type": "chat",
        "nodes": [
            {"id": "outer-input", "type": "user_input"},
            {"id": "outer-host", "type": "inner", "magic_flow": middle},
            {"id": "outer-end", "type": "end"}
        ],
        "edges": [
            {"source": "outer-input", "sourceHandle": "handle_user_message",
             "target": "outer-host", "targetHandle": "handle_user_message"},
            {"source": "outer-host", "sourceHandle": "end",
             "target": "outer-end", "targetHandle": "in"}
        ]
    });

    let messages = run_spec(outer, "Hi").await;
    assert_eq!(content_text(&messages), "deep");
}
