use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::condition::{Condition, ConditionParseError};
use crate::node::NodeHandler;
use crate::registry::{NodeRegistry, RegistryError};
use crate::sources::SourceTable;
use crate::spec::{EdgeSpec, EdgeTarget, WorkflowSpec};
use crate::types::NodeType;
use crate::validation::{Severity, ValidationFinding, validate};

use super::compiled::CompiledGraph;
use super::edges::{EdgeKind, EdgePlan};

/// Why a spec could not be compiled.
///
/// All variants are fatal; no partially compiled graph escapes.
#[derive(Debug, Error, Diagnostic)]
pub enum CompileError {
    #[error("spec failed validation with {} finding(s)", findings.len())]
    #[diagnostic(
        code(loomflow::compile::invalid_spec),
        help("Every error-severity finding must be fixed before the spec can compile.")
    )]
    InvalidSpec { findings: Vec<ValidationFinding> },

    #[error("node '{node_id}' uses unknown type '{tag}'")]
    #[diagnostic(
        code(loomflow::compile::unknown_node_type),
        help("Registered types: {supported}. Register custom node types before compiling.")
    )]
    UnknownNodeType {
        node_id: String,
        tag: String,
        supported: String,
    },

    #[error("node '{node_id}' configuration is invalid: {detail}")]
    #[diagnostic(code(loomflow::compile::node_config))]
    InvalidNodeConfig { node_id: String, detail: String },

    #[error("condition on edge '{edge}' failed to parse: {source}")]
    #[diagnostic(code(loomflow::compile::condition))]
    InvalidCondition {
        edge: String,
        #[source]
        source: ConditionParseError,
    },

    #[error("spec does not declare an entry node")]
    #[diagnostic(
        code(loomflow::compile::missing_entry),
        help("Set entry_node to the id of the node every run starts at.")
    )]
    MissingEntry,
}

/// Compiles a spec into a frozen [`CompiledGraph`].
///
/// Validation runs first and any error-severity finding aborts with
/// [`CompileError::InvalidSpec`] carrying the full report. Warnings are
/// logged and preserved on the graph. Handlers are constructed from their
/// configs and every edge condition is parsed here, so execution never hits
/// a malformed expression.
///
/// # Examples
///
/// ```rust
/// use loomflow::graphs::compile;
/// use loomflow::registry::NodeRegistry;
/// use loomflow::spec::WorkflowSpec;
/// use serde_json::json;
///
/// let spec = WorkflowSpec::builder("entry")
///     .node("entry", "input")
///     .node_with_config("echo", "compute", [("template", json!("got: {user_input}"))])
///     .edge("entry", "echo")
///     .build();
///
/// let graph = compile(&spec, &NodeRegistry::with_builtins()).unwrap();
/// assert_eq!(graph.entry(), "entry");
/// assert_eq!(graph.node_count(), 2);
/// assert_eq!(graph.edges_from("entry").len(), 1);
/// ```
#[tracing::instrument(skip_all)]
pub fn compile(
    spec: &WorkflowSpec,
    registry: &NodeRegistry,
) -> Result<CompiledGraph, CompileError> {
    if spec.entry_node.is_empty() {
        return Err(CompileError::MissingEntry);
    }

    let findings = validate(spec, registry);
    if findings.iter().any(|f| f.severity == Severity::Error) {
        return Err(CompileError::InvalidSpec { findings });
    }
    for warning in &findings {
        tracing::warn!(%warning, "spec validation warning");
    }

    let mut handlers: FxHashMap<String, Arc<dyn NodeHandler>> = FxHashMap::default();
    for node in &spec.nodes {
        let handler = registry
            .create(&NodeType::from_tag(&node.type_tag), &node.id, &node.config)
            .map_err(|err| match err {
                RegistryError::UnknownType { tag, supported } => CompileError::UnknownNodeType {
                    node_id: node.id.clone(),
                    tag,
                    supported,
                },
                RegistryError::Construction { node_id, detail } => {
                    CompileError::InvalidNodeConfig { node_id, detail }
                }
            })?;
        handlers.insert(node.id.clone(), handler);
    }

    let mut edges: FxHashMap<String, Vec<EdgePlan>> = FxHashMap::default();
    for edge in &spec.edges {
        let condition = match edge.condition.as_deref() {
            Some(expr) => Some(Condition::parse(expr).map_err(|source| {
                CompileError::InvalidCondition {
                    edge: render_edge(edge),
                    source,
                }
            })?),
            None => None,
        };
        let kind = match (&edge.to, condition) {
            (EdgeTarget::Many(_), condition) => EdgeKind::FanOut { condition },
            (EdgeTarget::One(_), Some(condition)) => EdgeKind::Conditional(condition),
            (EdgeTarget::One(_), None) => EdgeKind::Unconditional,
        };
        edges
            .entry(edge.from.clone())
            .or_default()
            .push(EdgePlan::new(edge.to.ids().to_vec(), kind, edge.queue.clone()));
    }

    let costs: FxHashMap<String, u64> = spec
        .nodes
        .iter()
        .filter(|node| node.cost_estimate() > 0)
        .map(|node| (node.id.clone(), node.cost_estimate()))
        .collect();

    tracing::debug!(
        nodes = handlers.len(),
        edges = spec.edges.len(),
        warnings = findings.len(),
        "compiled workflow spec"
    );

    Ok(CompiledGraph::new(
        spec.entry_node.clone(),
        handlers,
        edges,
        costs,
        Arc::new(SourceTable::from_spec(spec)),
        spec.queues.clone(),
        spec.carry_forward.clone(),
        findings,
        spec.name.clone(),
    ))
}

fn render_edge(edge: &EdgeSpec) -> String {
    format!("{} -> {}", edge.from, edge.to.ids().join(", "))
}
