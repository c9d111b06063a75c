//! Edge plans produced by compilation.
//!
//! The compiler turns every spec edge into an [`EdgePlan`]: the declared
//! targets, a routing classification, and the queue (if any) whose bandwidth
//! governs traversal. Plans are frozen; the executor only reads them.

use crate::condition::Condition;
use crate::state::StateSnapshot;

/// How a compiled edge decides to fire.
#[derive(Clone, Debug)]
pub enum EdgeKind {
    /// Always fires.
    Unconditional,
    /// Fires when the predicate holds over the merged state.
    Conditional(Condition),
    /// An ordered target list; every target runs to completion in declared
    /// order once the edge fires.
    FanOut { condition: Option<Condition> },
}

/// One outgoing edge of a compiled node.
#[derive(Clone, Debug)]
pub struct EdgePlan {
    targets: Vec<String>,
    kind: EdgeKind,
    queue: Option<String>,
}

impl EdgePlan {
    pub(crate) fn new(targets: Vec<String>, kind: EdgeKind, queue: Option<String>) -> Self {
        Self {
            targets,
            kind,
            queue,
        }
    }

    /// Target node ids in declared order.
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn kind(&self) -> &EdgeKind {
        &self.kind
    }

    /// Queue whose bandwidth must be acquired before traversal.
    pub fn queue(&self) -> Option<&str> {
        self.queue.as_deref()
    }

    #[must_use]
    pub fn is_fan_out(&self) -> bool {
        matches!(self.kind, EdgeKind::FanOut { .. })
    }

    /// Whether this edge fires against the given state.
    ///
    /// Evaluation is total; a missing key makes a predicate false, never a
    /// panic.
    #[must_use]
    pub fn fires(&self, snapshot: &StateSnapshot) -> bool {
        match &self.kind {
            EdgeKind::Unconditional => true,
            EdgeKind::Conditional(condition) => condition.evaluate(snapshot),
            EdgeKind::FanOut { condition } => {
                condition.as_ref().is_none_or(|c| c.evaluate(snapshot))
            }
        }
    }
}
