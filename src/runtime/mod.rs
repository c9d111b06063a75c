//! Run execution: options, the executor loop, and the result types.
//!
//! A run is one traversal of a [`CompiledGraph`](crate::graphs::CompiledGraph)
//! by one [`Executor`]. The lifecycle is strictly
//! `Ready → Running → (Completed | Failed | TimedOut)`, and whichever way it
//! ends the [`ExecutionResult`] reports the state merged so far plus a full
//! [`RunMetadata`] trace.
//!
//! Most embedders reach this module through
//! [`ExecutionContext`](crate::context::ExecutionContext) rather than
//! constructing an [`Executor`] directly.

mod executor;
mod options;
mod outcome;

pub use executor::{ExecError, Executor};
pub use options::{DEFAULT_MAX_STEPS, RunOptions};
pub use outcome::{ExecutionResult, NodeOutcome, NodeTrace, RunMetadata, RunStatus};
