use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::node::NodeHandler;
use crate::sources::SourceTable;
use crate::spec::QueueSpec;
use crate::validation::ValidationFinding;

use super::edges::EdgePlan;

/// A validated, frozen workflow ready for execution.
///
/// Produced by [`compile`](super::compile); immutable afterwards, so one
/// compiled graph can back any number of concurrent runs. Handlers were
/// constructed once from their configs, conditions were parsed once, and the
/// edge table preserves declaration order.
pub struct CompiledGraph {
    entry: String,
    handlers: FxHashMap<String, Arc<dyn NodeHandler>>,
    edges: FxHashMap<String, Vec<EdgePlan>>,
    costs: FxHashMap<String, u64>,
    sources: Arc<SourceTable>,
    queues: Vec<QueueSpec>,
    carry_forward: Vec<String>,
    warnings: Vec<ValidationFinding>,
    name: Option<String>,
}

impl CompiledGraph {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        entry: String,
        handlers: FxHashMap<String, Arc<dyn NodeHandler>>,
        edges: FxHashMap<String, Vec<EdgePlan>>,
        costs: FxHashMap<String, u64>,
        sources: Arc<SourceTable>,
        queues: Vec<QueueSpec>,
        carry_forward: Vec<String>,
        warnings: Vec<ValidationFinding>,
        name: Option<String>,
    ) -> Self {
        Self {
            entry,
            handlers,
            edges,
            costs,
            sources,
            queues,
            carry_forward,
            warnings,
            name,
        }
    }

    /// Id of the node every run starts at.
    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn handler(&self, node_id: &str) -> Option<&Arc<dyn NodeHandler>> {
        self.handlers.get(node_id)
    }

    /// Outgoing plans for a node, in declaration order. Empty for terminal
    /// nodes.
    pub fn edges_from(&self, node_id: &str) -> &[EdgePlan] {
        self.edges.get(node_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Declared per-invocation unit cost for a node, zero when undeclared.
    /// Debited against the cost window of queue-bound inbound edges.
    pub fn cost_estimate(&self, node_id: &str) -> u64 {
        self.costs.get(node_id).copied().unwrap_or(0)
    }

    pub fn sources(&self) -> &Arc<SourceTable> {
        &self.sources
    }

    /// Queue declarations, for limiter registration at run start.
    pub fn queues(&self) -> &[QueueSpec] {
        &self.queues
    }

    /// Keys re-asserted into every merge so they survive handler omission.
    pub fn carry_forward(&self) -> &[String] {
        &self.carry_forward
    }

    /// Non-fatal findings the validator reported at compile time.
    pub fn warnings(&self) -> &[ValidationFinding] {
        &self.warnings
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn node_count(&self) -> usize {
        self.handlers.len()
    }

    /// Declared node ids, sorted for stable iteration.
    pub fn node_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("entry", &self.entry)
            .field("nodes", &self.handlers.len())
            .field("edges", &self.edges.values().map(Vec::len).sum::<usize>())
            .field("warnings", &self.warnings.len())
            .finish_non_exhaustive()
    }
}
