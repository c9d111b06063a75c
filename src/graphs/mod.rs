//! Compilation of workflow specs into frozen executable graphs.
//!
//! [`compile`] validates a [`WorkflowSpec`](crate::spec::WorkflowSpec),
//! constructs every node handler through the registry, parses every edge
//! condition, and freezes the result as a [`CompiledGraph`]. Compilation is
//! the last point at which a spec problem can surface; whatever the executor
//! receives is structurally sound.

mod compiled;
mod compiler;
mod edges;

pub use compiled::CompiledGraph;
pub use compiler::{CompileError, compile};
pub use edges::{EdgeKind, EdgePlan};
