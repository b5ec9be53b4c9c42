//! Build-time graph validation.
//!
//! Validation never aborts a build: findings are embedded in the compiled
//! graph and surfaced as debug events when execution starts, so node-level
//! problems can still be observed in the same run.

use serde::Serialize;
use serde_json::{json, Value};

use crate::spec::{EdgeSpec, FlowSpec};
use crate::types::NodeTag;

/// Severity of a build-time finding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Warning,
    Error,
}

/// One build-time validation finding.
#[derive(Clone, Debug, Serialize)]
pub struct SpecIssue {
    pub severity: IssueSeverity,
    pub error_type: String,
    pub message: String,
    #[serde(default)]
    pub context: Value,
}

impl SpecIssue {
    pub(crate) fn error(message: impl Into<String>, context: Value) -> Self {
        Self {
            severity: IssueSeverity::Error,
            error_type: "GraphValidationError".to_string(),
            message: message.into(),
            context,
        }
    }

    pub(crate) fn warning(message: impl Into<String>, context: Value) -> Self {
        Self {
            severity: IssueSeverity::Warning,
            error_type: "GraphValidationWarning".to_string(),
            message: message.into(),
            context,
        }
    }

    /// The debug event payload for this finding.
    #[must_use]
    pub fn payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Wrap this finding with the nested-graph host that produced it.
    #[must_use]
    pub fn nested_in(mut self, host_id: &str) -> Self {
        let context = std::mem::replace(&mut self.context, Value::Null);
        self.context = json!({ "host_node": host_id, "nested": context });
        self
    }
}

fn edge_signature(edge: &EdgeSpec) -> (String, String, String, String) {
    (
        edge.source.clone(),
        edge.target.clone(),
        edge.source_handle.clone(),
        edge.target_handle.clone().unwrap_or_default(),
    )
}

/// Apply the validation rules to a spec. Nested specs are the compiler's
/// responsibility: it validates each sub-spec through its own build and
/// bubbles the findings up tagged with the host node.
#[must_use]
pub fn validate(spec: &FlowSpec) -> Vec<SpecIssue> {
    let mut issues = Vec::new();

    // Exactly one entry node.
    let entry_ids: Vec<&str> = spec
        .nodes
        .iter()
        .filter(|n| NodeTag::decode(&n.kind).is_user_input())
        .map(|n| n.id.as_str())
        .collect();
    match entry_ids.len() {
        0 => issues.push(SpecIssue::error(
            "graph must contain exactly one user_input node; found 0",
            json!({ "user_input_count": 0 }),
        )),
        1 => {}
        n => issues.push(SpecIssue::error(
            format!("graph must contain exactly one user_input node; found {n}"),
            json!({ "user_input_count": n, "node_ids": entry_ids }),
        )),
    }

    // No two edges may share the full (source, target, handles) tuple.
    let mut seen = std::collections::BTreeSet::new();
    let mut duplicates = Vec::new();
    for edge in &spec.edges {
        let signature = edge_signature(edge);
        if !seen.insert(signature) {
            duplicates.push(json!({
                "edge_id": edge.id,
                "source": edge.source,
                "target": edge.target,
                "sourceHandle": edge.source_handle,
                "targetHandle": edge.target_handle,
            }));
        }
    }
    if !duplicates.is_empty() {
        issues.push(SpecIssue::error(
            "found duplicate edges with the same source, target and handles",
            json!({
                "duplicate_count": duplicates.len(),
                "duplicate_edges": duplicates,
            }),
        ));
    }

    // Declared conditional output handles should match at least one edge.
    for node in &spec.nodes {
        if NodeTag::decode(&node.kind) != NodeTag::Conditional {
            continue;
        }
        let Some(declared) = node.data.get("output_handles").and_then(Value::as_array) else {
            continue;
        };
        for handle in declared.iter().filter_map(Value::as_str) {
            let wired = spec
                .edges
                .iter()
                .any(|e| e.source == node.id && e.source_handle == handle);
            if !wired {
                issues.push(SpecIssue::warning(
                    format!(
                        "conditional '{}' declares output handle '{handle}' with no matching edge",
                        node.id
                    ),
                    json!({ "node_id": node.id, "handle": handle }),
                ));
            }
        }
    }

    // The executors expand one loop per graph level.
    let loop_ids: Vec<&str> = spec
        .nodes
        .iter()
        .filter(|n| NodeTag::decode(&n.kind) == NodeTag::Loop)
        .map(|n| n.id.as_str())
        .collect();
    if loop_ids.len() > 1 {
        issues.push(SpecIssue::warning(
            format!(
                "graph contains {} loop nodes; only the first is expanded",
                loop_ids.len()
            ),
            json!({ "loop_ids": loop_ids }),
        ));
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(value: Value) -> FlowSpec {
        FlowSpec::from_value(value).unwrap()
    }

    #[test]
    fn missing_entry_is_an_error() {
        let issues = validate(&spec(json!({
            "nodes": [{"id": "t", "type": "text"}],
            "edges": []
        })));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, IssueSeverity::Error);
        assert_eq!(issues[0].context["user_input_count"], 0);
    }

    #[test]
    fn multiple_entries_list_offenders() {
        let issues = validate(&spec(json!({
            "nodes": [
                {"id": "u1", "type": "user_input"},
                {"id": "u2", "type": "user_input"}
            ],
            "edges": []
        })));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].context["node_ids"], json!(["u1", "u2"]));
    }

    #[test]
    fn duplicate_edges_are_reported_with_ids() {
        let issues = validate(&spec(json!({
            "nodes": [{"id": "u", "type": "user_input"}],
            "edges": [
                {"id": "e1", "source": "a", "sourceHandle": "out", "target": "b", "targetHandle": "in"},
                {"id": "e2", "source": "a", "sourceHandle": "out", "target": "b", "targetHandle": "in"}
            ]
        })));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].context["duplicate_count"], 1);
        assert_eq!(issues[0].context["duplicate_edges"][0]["edge_id"], "e2");
    }

    #[test]
    fn same_endpoints_on_different_handles_are_allowed() {
        let issues = validate(&spec(json!({
            "nodes": [{"id": "u", "type": "user_input"}],
            "edges": [
                {"source": "a", "sourceHandle": "out", "target": "b", "targetHandle": "x"},
                {"source": "a", "sourceHandle": "out", "target": "b", "targetHandle": "y"}
            ]
        })));
        assert!(issues.is_empty());
    }

    #[test]
    fn undeclared_conditional_handle_is_a_warning() {
        let issues = validate(&spec(json!({
            "nodes": [
                {"id": "u", "type": "user_input"},
                {"id": "c", "type": "conditional",
                 "data": {"condition": "x", "output_handles": ["yes", "no"]}}
            ],
            "edges": [
                {"source": "c", "sourceHandle": "yes", "target": "u", "targetHandle": "in"}
            ]
        })));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, IssueSeverity::Warning);
        assert_eq!(issues[0].context["handle"], "no");
    }
}
