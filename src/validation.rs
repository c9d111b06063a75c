//! Structural validation of workflow specs.
//!
//! [`validate`] inspects a [`WorkflowSpec`] against a [`NodeRegistry`] and
//! reports every problem it can find in one pass. Findings carry a severity:
//! errors make the spec uncompilable, warnings are advisory and leave the
//! compile decision to the caller.

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::registry::NodeRegistry;
use crate::spec::WorkflowSpec;
use crate::types::NodeType;

/// How serious a finding is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Advisory; compilation may proceed.
    Warning,
    /// The spec cannot be compiled as written.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// What kind of problem a finding reports.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FindingKind {
    /// An id refers to a node the spec never declares.
    MissingNode { id: String },
    /// A node config names a source the spec never declares.
    MissingSource { id: String },
    /// A node, source, or queue id is declared more than once.
    DuplicateId { id: String },
    /// A node's type tag has no registered handler factory.
    UnsupportedType { tag: String },
    /// A non-entry node that no edge or queue ever reaches.
    UnreachableNode { id: String },
    /// The edge table loops back on itself.
    Cycle { path: Vec<String> },
}

impl FindingKind {
    pub fn severity(&self) -> Severity {
        match self {
            FindingKind::UnreachableNode { .. } | FindingKind::Cycle { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// One problem found in a spec.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationFinding {
    pub severity: Severity,
    pub kind: FindingKind,
    /// Names the spec element at fault.
    pub message: String,
}

impl ValidationFinding {
    fn new(kind: FindingKind, message: impl Into<String>) -> Self {
        Self {
            severity: kind.severity(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Checks a spec for structural problems.
///
/// Never short-circuits: every check runs and every finding is reported, so
/// a caller can surface the full list in one round trip. Ordering is
/// deterministic and follows the spec's declaration order within each check.
///
/// # Examples
///
/// ```rust
/// use loomflow::registry::NodeRegistry;
/// use loomflow::spec::WorkflowSpec;
/// use loomflow::validation::{Severity, validate};
///
/// let spec = WorkflowSpec::builder("entry")
///     .node("entry", "input")
///     .edge("entry", "missing")
///     .build();
///
/// let findings = validate(&spec, &NodeRegistry::with_builtins());
/// assert!(findings.iter().any(|f| f.severity == Severity::Error));
/// ```
#[instrument(skip_all)]
pub fn validate(spec: &WorkflowSpec, registry: &NodeRegistry) -> Vec<ValidationFinding> {
    let mut findings = Vec::new();
    let node_ids: FxHashSet<&str> = spec.nodes.iter().map(|node| node.id.as_str()).collect();

    if !node_ids.contains(spec.entry_node.as_str()) {
        findings.push(ValidationFinding::new(
            FindingKind::MissingNode {
                id: spec.entry_node.clone(),
            },
            format!("entry node '{}' is not declared", spec.entry_node),
        ));
    }

    duplicate_findings(
        spec.nodes.iter().map(|node| node.id.as_str()),
        "node",
        &mut findings,
    );
    duplicate_findings(
        spec.sources.iter().map(|source| source.id.as_str()),
        "source",
        &mut findings,
    );
    duplicate_findings(
        spec.queues.iter().map(|queue| queue.id.as_str()),
        "queue",
        &mut findings,
    );

    for (index, edge) in spec.edges.iter().enumerate() {
        if !node_ids.contains(edge.from.as_str()) {
            findings.push(ValidationFinding::new(
                FindingKind::MissingNode {
                    id: edge.from.clone(),
                },
                format!("edge[{index}] starts at undeclared node '{}'", edge.from),
            ));
        }
        for target in edge.to.ids() {
            if !node_ids.contains(target.as_str()) {
                findings.push(ValidationFinding::new(
                    FindingKind::MissingNode { id: target.clone() },
                    format!("edge[{index}] targets undeclared node '{target}'"),
                ));
            }
        }
    }

    for node in &spec.nodes {
        if !registry.resolves(&NodeType::from_tag(&node.type_tag)) {
            findings.push(ValidationFinding::new(
                FindingKind::UnsupportedType {
                    tag: node.type_tag.clone(),
                },
                format!("node '{}' uses unregistered type '{}'", node.id, node.type_tag),
            ));
        }
    }

    let source_ids: FxHashSet<&str> = spec.sources.iter().map(|s| s.id.as_str()).collect();
    for node in &spec.nodes {
        if let Some(source_id) = node.source_id() {
            if !source_ids.contains(source_id) {
                findings.push(ValidationFinding::new(
                    FindingKind::MissingSource {
                        id: source_id.to_string(),
                    },
                    format!("node '{}' references undeclared source '{source_id}'", node.id),
                ));
            }
        }
    }

    for queue in &spec.queues {
        for (end, id) in [("from", &queue.from), ("to", &queue.to)] {
            if !node_ids.contains(id.as_str()) {
                findings.push(ValidationFinding::new(
                    FindingKind::MissingNode { id: id.clone() },
                    format!("queue '{}' {end} endpoint '{id}' is not declared", queue.id),
                ));
            }
        }
    }

    let mut has_incoming: FxHashSet<&str> = FxHashSet::default();
    for edge in &spec.edges {
        for target in edge.to.ids() {
            has_incoming.insert(target.as_str());
        }
    }
    for queue in &spec.queues {
        has_incoming.insert(queue.to.as_str());
    }
    for node in &spec.nodes {
        if node.id != spec.entry_node && !has_incoming.contains(node.id.as_str()) {
            findings.push(ValidationFinding::new(
                FindingKind::UnreachableNode {
                    id: node.id.clone(),
                },
                format!("node '{}' has no incoming edges", node.id),
            ));
        }
    }

    cycle_findings(spec, &node_ids, &mut findings);

    let errors = findings.iter().filter(|f| f.severity == Severity::Error).count();
    debug!(errors, warnings = findings.len() - errors, "spec validation finished");

    findings
}

fn duplicate_findings<'a>(
    ids: impl Iterator<Item = &'a str>,
    what: &str,
    findings: &mut Vec<ValidationFinding>,
) {
    let mut seen = FxHashSet::default();
    for id in ids {
        if !seen.insert(id) {
            findings.push(ValidationFinding::new(
                FindingKind::DuplicateId { id: id.to_string() },
                format!("{what} id '{id}' is declared more than once"),
            ));
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    InProgress,
    Done,
}

/// DFS over the edge table from every declared node, in declaration order.
/// Each back edge reports the cycle once, with the path spelled out.
fn cycle_findings(
    spec: &WorkflowSpec,
    node_ids: &FxHashSet<&str>,
    findings: &mut Vec<ValidationFinding>,
) {
    let mut adjacency: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
    for edge in &spec.edges {
        if !node_ids.contains(edge.from.as_str()) {
            continue;
        }
        let targets = adjacency.entry(edge.from.as_str()).or_default();
        for target in edge.to.ids() {
            if node_ids.contains(target.as_str()) {
                targets.push(target.as_str());
            }
        }
    }

    let mut marks: FxHashMap<&str, Mark> = FxHashMap::default();
    let mut path: Vec<&str> = Vec::new();
    for node in &spec.nodes {
        if !marks.contains_key(node.id.as_str()) {
            dfs(node.id.as_str(), &adjacency, &mut marks, &mut path, findings);
        }
    }
}

fn dfs<'a>(
    node: &'a str,
    adjacency: &FxHashMap<&'a str, Vec<&'a str>>,
    marks: &mut FxHashMap<&'a str, Mark>,
    path: &mut Vec<&'a str>,
    findings: &mut Vec<ValidationFinding>,
) {
    marks.insert(node, Mark::InProgress);
    path.push(node);
    for &next in adjacency.get(node).map(Vec::as_slice).unwrap_or_default() {
        match marks.get(next) {
            Some(Mark::InProgress) => {
                let start = path.iter().position(|&seen| seen == next).unwrap_or(0);
                let mut cycle: Vec<String> =
                    path[start..].iter().map(|id| id.to_string()).collect();
                cycle.push(next.to_string());
                let rendered = cycle.join(" -> ");
                findings.push(ValidationFinding::new(
                    FindingKind::Cycle { path: cycle },
                    format!("cycle detected: {rendered}"),
                ));
            }
            Some(Mark::Done) => {}
            None => dfs(next, adjacency, marks, path, findings),
        }
    }
    path.pop();
    marks.insert(node, Mark::Done);
}
