mod common;

use common::*;
use serde_json::json;

use flowweave::debug::events::DebugEventType;

const AGE_CONDITION: &str = "{% if age >= 18 %}adult{% else %}minor{% endif %}";

#[tokio::test]
async fn only_the_selected_branch_executes() {
    let messages = run_spec(conditional_split_spec(true, AGE_CONDITION), r#"{"age": 16}"#).await;

    let summary = summary(&messages).expect("summary");
    assert!(summary.executed.iter().any(|n| n == "text-minor"));
    assert!(summary.executed.iter().any(|n| n == "end-minor"));
    assert!(summary.bypassed.iter().any(|n| n == "text-adult"));
    assert!(summary.bypassed.iter().any(|n| n == "end-adult"));
    assert_eq!(summary.executed.len(), 4); // user-input, cond, text-minor, end-minor
    assert_eq!(summary.bypassed.len(), 2);
}

#[tokio::test]
async fn the_other_branch_wins_for_adults() {
    let messages = run_spec(conditional_split_spec(true, AGE_CONDITION), r#"{"age": 40}"#).await;
    let summary = summary(&messages).unwrap();
    assert!(summary.executed.iter().any(|n| n == "text-adult"));
    assert!(summary.bypassed.iter().any(|n| n == "text-minor"));
}

#[tokio::test]
async fn unmatched_handle_yields_routing_error_and_bypasses_everything() {
    // The condition renders a handle no edge carries.
    let messages = run_spec(
        conditional_split_spec(true, "{% if age >= 0 %}elder{% endif %}"),
        r#"{"age": 5}"#,
    )
    .await;

    let routing = debug_events_of(&messages, DebugEventType::RoutingError);
    assert_eq!(routing.len(), 1);
    assert_eq!(routing[0].payload["context"]["selected_handle"], "elder");

    let summary = summary(&messages).unwrap();
    assert_eq!(summary.executed.len(), 2); // user-input + the conditional
    assert_eq!(summary.bypassed.len(), 4);
}

#[tokio::test]
async fn default_handle_rescues_a_routing_miss() {
    let mut value = conditional_split_spec(true, "{% if age >= 0 %}elder{% endif %}");
    value["nodes"][1]["data"]["default_handle"] = json!("minor");
    let messages = run_spec(value, r#"{"age": 5}"#).await;

    assert!(debug_events_of(&messages, DebugEventType::RoutingError).is_empty());
    let summary = summary(&messages).unwrap();
    assert!(summary.executed.iter().any(|n| n == "text-minor"));
    assert!(summary.bypassed.iter().any(|n| n == "text-adult"));
}

#[tokio::test]
async fn bypass_propagates_through_chains() {
    // cond -> skipped -> downstream: both die when the branch is pruned.
    let messages = run_spec(
        json!({
            "debug": true,
            "nodes": [
                {"id": "u", "type": "user_input"},
                {"id": "cond", "type": "conditional", "data": {"condition": "{{ pick }}"}},
                {"id": "taken", "type": "text", "data": {"text": "taken"}},
                {"id": "skipped", "type": "text", "data": {"text": "skipped"}},
                {"id": "downstream", "type": "text", "data": {"text": "downstream"}},
                {"id": "e", "type": "end"}
            ],
            "edges": [
                {"source": "u", "sourceHandle": "handle_user_message",
                 "target": "cond", "targetHandle": "handle_input"},
                {"source": "cond", "sourceHandle": "yes",
                 "target": "taken", "targetHandle": "v"},
                {"source": "cond", "sourceHandle": "no",
                 "target": "skipped", "targetHandle": "v"},
                {"source": "skipped", "sourceHandle": "end",
                 "target": "downstream", "targetHandle": "v"},
                {"source": "taken", "sourceHandle": "end",
                 "target": "e", "targetHandle": "in"}
            ]
        }),
        r#"{"pick": "yes"}"#,
    )
    .await;

    let summary = summary(&messages).unwrap();
    assert!(summary.bypassed.iter().any(|n| n == "skipped"));
    assert!(summary.bypassed.iter().any(|n| n == "downstream"));
    assert!(summary.executed.iter().any(|n| n == "taken"));
}

#[tokio::test]
async fn merge_nodes_execute_with_partial_inputs() {
    // Both branches converge on one parser; only branch_a stays live, and
    // the template reads whichever input arrived.
    let messages = run_spec(
        json!({
            "debug": true,
            "nodes": [
                {"id": "u", "type": "user_input"},
                {"id": "cond", "type": "conditional",
                 "data": {"condition": "branch_{{ pick }}"}},
                {"id": "merge", "type": "parser",
                 "data": {"text": "{% if input_a is defined %}A={{ input_a.pick }}{% elif input_b is defined %}B={{ input_b.pick }}{% else %}none{% endif %}"}},
                {"id": "e", "type": "end"}
            ],
            "edges": [
                {"source": "u", "sourceHandle": "handle_user_message",
                 "target": "cond", "targetHandle": "handle_input"},
                {"source": "cond", "sourceHandle": "branch_a",
                 "target": "merge", "targetHandle": "input_a"},
                {"source": "cond", "sourceHandle": "branch_b",
                 "target": "merge", "targetHandle": "input_b"},
                {"source": "merge", "sourceHandle": "end",
                 "target": "e", "targetHandle": "in"}
            ]
        }),
        r#"{"pick": "a"}"#,
    )
    .await;

    let summary = summary(&messages).unwrap();
    let merge = summary.nodes.iter().find(|n| n.node_id == "merge").unwrap();
    assert!(merge.was_executed);
    assert_eq!(merge.outputs["end"], "A=a");
    assert!(summary.executed.iter().any(|n| n == "e"));
}
