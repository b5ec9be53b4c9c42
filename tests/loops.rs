mod common;

use common::*;
use serde_json::json;

use flowweave::debug::events::DebugEventType;

fn loop_spec(list_literal: &str) -> serde_json::Value {
    json!({
        "type": "chat",
        "debug": true,
        "nodes": [
            {"id": "user-input", "type": "user_input"},
            {"id": "list-text", "type": "text", "data": {"text": list_literal}},
            {"id": "loop-node", "type": "loop", "data": {}},
            {"id": "item-parser", "type": "parser",
             "data": {"text": "Item: {{ item }}", "iterate": true}},
            {"id": "count-parser", "type": "parser",
             "data": {"text": "Count: {{ results | length }}"}},
            {"id": "end-node", "type": "end"}
        ],
        "edges": [
            {"source": "list-text", "sourceHandle": "end",
             "target": "loop-node", "targetHandle": "handle_list"},
            {"source": "loop-node", "sourceHandle": "content",
             "target": "item-parser", "targetHandle": "item"},
            {"source": "item-parser", "sourceHandle": "end",
             "target": "loop-node", "targetHandle": "handle_loop"},
            {"source": "loop-node", "sourceHandle": "end",
             "target": "count-parser", "targetHandle": "results"},
            {"source": "count-parser", "sourceHandle": "end",
             "target": "end-node", "targetHandle": "handle-5"}
        ]
    })
}

#[tokio::test]
async fn loop_streams_each_item_and_aggregates_once() {
    let messages = run_spec(loop_spec(r#"["a", "b", "c"]"#), "go").await;

    assert_eq!(
        content_chunks(&messages),
        vec!["Item: a", "Item: b", "Item: c"]
    );

    let summary = summary(&messages).expect("summary");
    let count = summary
        .nodes
        .iter()
        .find(|n| n.node_id == "count-parser")
        .unwrap();
    assert_eq!(count.outputs["end"], "Count: 3");

    // One iteration event per element, in order.
    let iterations = debug_events_of(&messages, DebugEventType::IterationStart);
    assert_eq!(iterations.len(), 3);
    assert_eq!(iterations[0].payload["current"], 0);
    assert_eq!(iterations[2].payload["current"], 2);
}

#[tokio::test]
async fn inner_parser_reexecutes_while_outer_runs_once() {
    let messages = run_spec(loop_spec(r#"["x", "y"]"#), "go").await;

    let starts = |id: &str| {
        debug_events_of(&messages, DebugEventType::NodeStart)
            .iter()
            .filter(|e| e.node_id.as_deref() == Some(id))
            .count()
    };
    assert_eq!(starts("item-parser"), 2);
    assert_eq!(starts("count-parser"), 1);
}

#[tokio::test]
async fn empty_list_skips_iteration_but_still_aggregates() {
    let messages = run_spec(loop_spec("[]"), "go").await;

    assert!(content_chunks(&messages).is_empty());
    assert!(debug_events_of(&messages, DebugEventType::IterationStart).is_empty());

    let summary = summary(&messages).unwrap();
    let count = summary
        .nodes
        .iter()
        .find(|n| n.node_id == "count-parser")
        .unwrap();
    assert_eq!(count.outputs["end"], "Count: 0");
    assert!(!summary.nodes.iter().any(|n| n.node_id == "item-parser"));
}

#[tokio::test]
async fn non_list_input_is_a_data_error() {
    let messages = run_spec(loop_spec(r#"{"not": "a list"}"#), "go").await;

    let errors = debug_events_of(&messages, DebugEventType::DataError);
    assert_eq!(errors.len(), 1);
    assert!(content_chunks(&messages).is_empty());
}

#[tokio::test]
async fn max_iterations_caps_runaway_lists() {
    let mut value = loop_spec(r#"["1", "2", "3", "4"]"#);
    value["nodes"][2]["data"]["max_iterations"] = json!(2);
    let messages = run_spec(value, "go").await;

    assert_eq!(content_chunks(&messages).len(), 2);
    assert_eq!(
        debug_events_of(&messages, DebugEventType::DataError).len(),
        1
    );
}

#[tokio::test]
async fn non_iterating_nodes_replay_their_cache_across_iterations() {
    // A second parser without the iterate flag joins the iteration subgraph;
    // it runs once and replays for later elements.
    let messages = run_spec(
        json!({
            "debug": true,
            "nodes": [
                {"id": "user-input", "type": "user_input"},
                {"id": "list-text", "type": "text", "data": {"text": "[1, 2, 3]"}},
                {"id": "loop-node", "type": "loop", "data": {}},
                {"id": "stamp", "type": "text", "data": {"text": "stamped"}},
                {"id": "item-parser", "type": "parser",
                 "data": {"text": "{{ stamp }}:{{ item }}", "iterate": true}}
            ],
            "edges": [
                {"source": "list-text", "sourceHandle": "end",
                 "target": "loop-node", "targetHandle": "handle_list"},
                {"source": "loop-node", "sourceHandle": "content",
                 "target": "stamp", "targetHandle": "trigger"},
                {"source": "loop-node", "sourceHandle": "content",
                 "target": "item-parser", "targetHandle": "item"},
                {"source": "stamp", "sourceHandle": "end",
                 "target": "item-parser", "targetHandle": "stamp"},
                {"source": "item-parser", "sourceHandle": "end",
                 "target": "loop-node", "targetHandle": "handle_loop"}
            ]
        }),
        "go",
    )
    .await;

    assert_eq!(
        content_chunks(&messages),
        vec!["stamped:1", "stamped:2", "stamped:3"]
    );
}
