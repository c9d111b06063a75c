use serde_json::json;

use loomflow::spec::{SourceKind, WorkflowSpec};
use loomflow::state::RunState;

/// `n1 -> n2 -> ... -> n{len}` of path-recording nodes.
#[allow(dead_code)]
pub fn linear_spec(len: usize) -> WorkflowSpec {
    assert!(len >= 1, "a linear spec needs at least one node");
    let mut builder = WorkflowSpec::builder("n1").name("linear");
    for i in 1..=len {
        builder = builder.node(format!("n{i}"), "path");
    }
    for i in 1..len {
        builder = builder.edge(format!("n{i}"), format!("n{}", i + 1));
    }
    builder.build()
}

/// `intake` routes to `urgent` when `priority == "high"`, otherwise falls
/// through to `routine`. Both targets are terminal.
#[allow(dead_code)]
pub fn triage_spec() -> WorkflowSpec {
    WorkflowSpec::builder("intake")
        .name("triage")
        .node("intake", "path")
        .node("urgent", "path")
        .node("routine", "path")
        .conditional_edge("intake", "urgent", r#"priority == "high""#)
        .edge("intake", "routine")
        .build()
}

/// One compute node invoking the `answers` source with a static prompt.
#[allow(dead_code)]
pub fn sourced_spec() -> WorkflowSpec {
    WorkflowSpec::builder("ask")
        .name("sourced")
        .node_with_config(
            "ask",
            "compute",
            [("source_id", json!("answers")), ("prompt", json!("ping"))],
        )
        .source("answers", SourceKind::ModelCall)
        .build()
}

/// State holding `text` under the default input key.
#[allow(dead_code)]
pub fn initial_input(text: &str) -> RunState {
    RunState::from_pairs([("user_input", json!(text))])
}
