use loomflow::graphs::{CompileError, EdgeKind, compile};
use loomflow::registry::NodeRegistry;
use loomflow::spec::{BandwidthSpec, QueueSpec, SourceKind, WorkflowSpec};
use loomflow::state::StateSnapshot;
use loomflow::validation::FindingKind;
use serde_json::json;

fn registry() -> NodeRegistry {
    NodeRegistry::with_builtins()
}

fn triage_spec() -> WorkflowSpec {
    WorkflowSpec::builder("entry")
        .name("triage")
        .node("entry", "input")
        .node_with_config(
            "classify",
            "router",
            [("strategy", json!("fixed")), ("route", json!("answer"))],
        )
        .node_with_config("answer", "compute", [("source_id", json!("llm"))])
        .node_with_config("final", "aggregate", [("source_keys", json!(["result"]))])
        .edge("entry", "classify")
        .conditional_edge("classify", "answer", "route == 'answer'")
        .queued_edge("answer", "final", "llm-q")
        .queue(
            QueueSpec::new("llm-q", "answer", "final").with_bandwidth(BandwidthSpec {
                max_requests_per_minute: Some(30),
                ..Default::default()
            }),
        )
        .source("llm", SourceKind::ModelCall)
        .carry_forward(["user_input"])
        .build()
}

#[test]
fn compiles_a_clean_spec_into_a_frozen_graph() {
    let graph = compile(&triage_spec(), &registry()).unwrap();

    assert_eq!(graph.entry(), "entry");
    assert_eq!(graph.node_count(), 4);
    assert_eq!(graph.name(), Some("triage"));
    assert_eq!(graph.carry_forward(), ["user_input".to_string()]);
    assert!(graph.warnings().is_empty());

    assert!(graph.handler("classify").is_some());
    assert!(graph.handler("ghost").is_none());

    assert_eq!(graph.edges_from("entry").len(), 1);
    assert_eq!(graph.edges_from("final").len(), 0);
    assert_eq!(graph.edges_from("answer")[0].queue(), Some("llm-q"));

    assert!(graph.sources().get("llm").is_some());
    assert_eq!(graph.queues().len(), 1);
}

#[test]
fn edge_kinds_follow_their_declarations() {
    let spec = WorkflowSpec::builder("a")
        .node("a", "input")
        .node_with_config("b", "compute", [("template", json!("x"))])
        .node_with_config("c", "compute", [("template", json!("y"))])
        .node_with_config("d", "aggregate", [("source_keys", json!(["result"]))])
        .edge("a", "b")
        .conditional_edge("b", "c", "route == 'c'")
        .conditional_edge("c", vec!["d", "b"], "exists(result)")
        .build();
    let graph = compile(&spec, &registry()).unwrap();

    assert!(matches!(
        graph.edges_from("a")[0].kind(),
        EdgeKind::Unconditional
    ));
    assert!(matches!(
        graph.edges_from("b")[0].kind(),
        EdgeKind::Conditional(_)
    ));
    let fan_out = &graph.edges_from("c")[0];
    assert!(fan_out.is_fan_out());
    assert!(matches!(
        fan_out.kind(),
        EdgeKind::FanOut { condition: Some(_) }
    ));
    assert_eq!(fan_out.targets(), ["d".to_string(), "b".to_string()]);
}

#[test]
fn compiled_conditions_evaluate_against_state() {
    let spec = WorkflowSpec::builder("a")
        .node("a", "input")
        .node_with_config("b", "compute", [("template", json!("x"))])
        .conditional_edge("a", "b", "route == 'work' && length_gt(user_input, 2)")
        .build();
    let graph = compile(&spec, &registry()).unwrap();
    let plan = &graph.edges_from("a")[0];

    let matching = StateSnapshot::from_json(json!({"route": "work", "user_input": "hello"}));
    assert!(plan.fires(&matching));

    let wrong_route = StateSnapshot::from_json(json!({"route": "idle", "user_input": "hello"}));
    assert!(!plan.fires(&wrong_route));

    let absent_keys = StateSnapshot::from_json(json!({}));
    assert!(!plan.fires(&absent_keys));
}

#[test]
fn validation_errors_abort_with_the_full_report() {
    let spec = WorkflowSpec::builder("entry")
        .node("entry", "input")
        .node("odd", "mystery")
        .edge("entry", "ghost")
        .build();

    match compile(&spec, &registry()) {
        Err(CompileError::InvalidSpec { findings }) => {
            assert!(findings.iter().any(|f| matches!(f.kind, FindingKind::MissingNode { .. })));
            assert!(
                findings
                    .iter()
                    .any(|f| matches!(f.kind, FindingKind::UnsupportedType { .. }))
            );
        }
        other => panic!("expected InvalidSpec, got {other:?}"),
    }
}

#[test]
fn warnings_are_preserved_but_do_not_block() {
    let spec = WorkflowSpec::builder("entry")
        .node("entry", "input")
        .node_with_config("island", "compute", [("template", json!("x"))])
        .build();

    let graph = compile(&spec, &registry()).unwrap();
    assert_eq!(graph.warnings().len(), 1);
    assert!(matches!(
        graph.warnings()[0].kind,
        FindingKind::UnreachableNode { .. }
    ));
}

#[test]
fn malformed_condition_is_a_compile_error() {
    let spec = WorkflowSpec::builder("a")
        .node("a", "input")
        .node_with_config("b", "compute", [("template", json!("x"))])
        .conditional_edge("a", "b", "route == ")
        .build();

    match compile(&spec, &registry()) {
        Err(CompileError::InvalidCondition { edge, .. }) => {
            assert_eq!(edge, "a -> b");
        }
        other => panic!("expected InvalidCondition, got {other:?}"),
    }
}

#[test]
fn handler_construction_failures_surface_with_the_node_id() {
    let spec = WorkflowSpec::builder("a")
        .node("a", "input")
        .node("final", "aggregate") // missing source_keys
        .edge("a", "final")
        .build();

    match compile(&spec, &registry()) {
        Err(CompileError::InvalidNodeConfig { node_id, .. }) => {
            assert_eq!(node_id, "final");
        }
        other => panic!("expected InvalidNodeConfig, got {other:?}"),
    }
}

#[test]
fn empty_entry_id_is_rejected_outright() {
    let spec = WorkflowSpec::builder("").build();
    assert!(matches!(
        compile(&spec, &registry()),
        Err(CompileError::MissingEntry)
    ));
}
