//! The built-in node types wired into full workflows.
//!
//! Per-handler behavior is unit-tested next to each handler; these tests
//! cover the wiring: state flowing through input, router, compute, and
//! aggregate nodes across real routing decisions.

use serde_json::json;

use loomflow::context::{ContextError, ExecutionContext};
use loomflow::registry::NodeRegistry;
use loomflow::runtime::{ExecError, RunOptions, RunStatus};
use loomflow::spec::{SourceKind, WorkflowSpec};
use loomflow::state::RunState;

mod common;
use common::*;

fn ctx() -> ExecutionContext {
    ExecutionContext::builder()
        .with_registry(stub_registry())
        .build()
}

/// Ticket triage: normalize the complaint, route it by keyword, draft a
/// reply per department, bundle the outcome.
fn triage_pipeline() -> WorkflowSpec {
    WorkflowSpec::builder("intake")
        .name("ticket-triage")
        .node_with_config(
            "intake",
            "input",
            [
                ("output_key", json!("question")),
                ("transform", json!("lowercase")),
                ("validate", json!({"required": true})),
            ],
        )
        .node_with_config(
            "classify",
            "router",
            [
                ("input_key", json!("question")),
                ("routes", json!({"refund": "billing", "crash": "support"})),
                ("default_route", json!("general")),
            ],
        )
        .node_with_config(
            "billing-reply",
            "compute",
            [
                ("template", json!("billing will review: {question}")),
                ("output_key", json!("reply")),
            ],
        )
        .node_with_config(
            "support-reply",
            "compute",
            [
                ("template", json!("support will debug: {question}")),
                ("output_key", json!("reply")),
            ],
        )
        .node_with_config(
            "general-reply",
            "compute",
            [
                ("template", json!("forwarded to a human: {question}")),
                ("output_key", json!("reply")),
            ],
        )
        .node_with_config(
            "final",
            "aggregate",
            [
                ("strategy", json!("collect")),
                ("source_keys", json!(["route", "reply"])),
            ],
        )
        .edge("intake", "classify")
        .conditional_edge("classify", "billing-reply", r#"route == "billing""#)
        .conditional_edge("classify", "support-reply", r#"route == "support""#)
        .edge("classify", "general-reply")
        .edge("billing-reply", "final")
        .edge("support-reply", "final")
        .edge("general-reply", "final")
        .build()
}

#[tokio::test]
async fn full_pipeline_routes_a_billing_ticket() {
    let initial = RunState::from_pairs([("user_input", json!("  I want a REFUND for order 112  "))]);

    let result = ctx()
        .run(&triage_pipeline(), initial, RunOptions::default())
        .await
        .unwrap();

    assert_completed(&result);
    assert_visited(&result, &["intake", "classify", "billing-reply", "final"]);
    assert_eq!(
        result.final_state.get("question"),
        Some(&json!("i want a refund for order 112"))
    );
    assert_eq!(result.final_state.get("route"), Some(&json!("billing")));
    assert_eq!(
        result.final_state.get("final_output"),
        Some(&json!({
            "route": "billing",
            "reply": "billing will review: i want a refund for order 112",
        }))
    );
}

#[tokio::test]
async fn unmatched_ticket_takes_the_fallback_route() {
    let initial = RunState::from_pairs([("user_input", json!("my invoice looks wrong"))]);

    let result = ctx()
        .run(&triage_pipeline(), initial, RunOptions::default())
        .await
        .unwrap();

    assert_completed(&result);
    assert_visited(&result, &["intake", "classify", "general-reply", "final"]);
    assert_eq!(result.final_state.get("route"), Some(&json!("general")));
    assert_eq!(
        result.final_state.get("reply"),
        Some(&json!("forwarded to a human: my invoice looks wrong"))
    );
}

#[tokio::test]
async fn missing_required_input_fails_the_run() {
    let result = ctx()
        .run(&triage_pipeline(), RunState::new(), RunOptions::default())
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Failed);
    assert!(matches!(
        result.error,
        Some(ExecError::Handler { ref node_id, step: 1, .. }) if node_id == "intake"
    ));
}

#[tokio::test]
async fn rules_router_consults_the_whole_state() {
    let spec = WorkflowSpec::builder("decide")
        .node_with_config(
            "decide",
            "router",
            [
                ("strategy", json!("rules")),
                (
                    "rules",
                    json!([
                        {"when": "score >= 0.8", "route": "fast-lane"},
                        {"when": r#"contains(tags, "vip")"#, "route": "concierge"},
                    ]),
                ),
                ("default_route", json!("standard")),
            ],
        )
        .build();
    let context = ctx();

    for (initial, expected) in [
        (json!({"score": 0.9}), "fast-lane"),
        (json!({"score": 0.2, "tags": ["vip"]}), "concierge"),
        (json!({}), "standard"),
    ] {
        let result = context
            .run(
                &spec,
                RunState::from_json_object(initial),
                RunOptions::default(),
            )
            .await
            .unwrap();
        assert_completed(&result);
        assert_eq!(result.final_state.get("route"), Some(&json!(expected)));
    }
}

#[tokio::test]
async fn compute_source_mode_unwraps_the_envelope_and_tracks_usage() {
    let canned = CannedSources::completing_with("All good.", 42, 0.002);
    let context = ExecutionContext::builder()
        .with_registry(NodeRegistry::with_builtins())
        .with_capability(canned.clone())
        .build();
    let spec = WorkflowSpec::builder("ask")
        .node_with_config(
            "ask",
            "compute",
            [
                ("source_id", json!("llm")),
                ("prompt_template", json!("Summarize: {notes}")),
                ("params", json!({"temperature": 0.2})),
            ],
        )
        .source("llm", SourceKind::ModelCall)
        .build();
    let initial = RunState::from_pairs([("notes", json!("three pages of meeting notes"))]);

    let result = context
        .run(&spec, initial, RunOptions::default())
        .await
        .unwrap();

    assert_completed(&result);
    assert_eq!(result.final_state.get("result"), Some(&json!("All good.")));
    assert_eq!(result.metadata.usage.tokens, 42);

    let calls = canned.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0]["prompt"],
        json!("Summarize: three pages of meeting notes")
    );
    assert_eq!(calls[0]["params"]["temperature"], json!(0.2));
}

#[tokio::test]
async fn aggregate_summary_supplies_the_final_output() {
    let spec = WorkflowSpec::builder("work")
        .node_with_config(
            "work",
            "set",
            [("key", json!("answer")), ("value", json!("done"))],
        )
        .node_with_config(
            "final",
            "aggregate",
            [
                ("strategy", json!("select")),
                ("source_keys", json!(["answer"])),
                ("include_summary", json!(true)),
            ],
        )
        .edge("work", "final")
        .build();

    let result = ctx()
        .run(&spec, RunState::new(), RunOptions::default())
        .await
        .unwrap();

    assert_completed(&result);
    assert_eq!(result.final_output(), Some(&json!("done")));
    let envelope = result.final_state.get("final_output").unwrap();
    assert_eq!(envelope["keys"], json!(["answer"]));
    assert_eq!(envelope["count"], json!(1));
}

#[tokio::test]
async fn unusable_node_config_is_a_compile_error() {
    let spec = WorkflowSpec::builder("r")
        .node_with_config("r", "router", [("strategy", json!("fixed"))])
        .build();

    let err = ctx()
        .run(&spec, RunState::new(), RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ContextError::Compile(_)));
    assert!(err.to_string().contains("route"));
}
