//! Node handler framework for the loomflow workflow engine.
//!
//! This module provides the core abstractions for executable workflow nodes:
//! the [`NodeHandler`] trait, the per-invocation [`NodeContext`], the
//! [`StateUpdate`] partial handlers return, and the fatal [`HandlerError`].

// Standard library and external crates
use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// Internal crate modules
use crate::errors::ErrorEvent;
use crate::event_bus::Event;
use crate::sources::{SourceError, SourcesHandle};
use crate::state::StateSnapshot;

// ============================================================================
// Core Trait
// ============================================================================

/// A single executable unit of work within a compiled graph.
///
/// Handlers receive an immutable snapshot of the run's state plus a context,
/// do their work, and return a partial update the executor merges back in.
/// Instances are created once at compile time and shared across every
/// concurrent run of the graph, so implementations must be stateless (or
/// internally synchronized) and are invoked through `&self`.
///
/// # Error Handling
///
/// Two lanes:
/// 1. **Fatal**: return `Err(HandlerError)`. The run terminates as failed,
///    preserving the state merged so far.
/// 2. **Recoverable**: record an [`ErrorEvent`] on the update and return
///    `Ok`. The run continues and the event lands in the `errors` state key.
///
/// # Examples
///
/// ```rust,no_run
/// use async_trait::async_trait;
/// use loomflow::node::{HandlerError, NodeContext, NodeHandler, StateUpdate};
/// use loomflow::state::StateSnapshot;
/// use serde_json::json;
///
/// struct WordCount;
///
/// #[async_trait]
/// impl NodeHandler for WordCount {
///     async fn run(
///         &self,
///         snapshot: StateSnapshot,
///         ctx: NodeContext,
///     ) -> Result<StateUpdate, HandlerError> {
///         let text = snapshot
///             .get_str("text")
///             .ok_or(HandlerError::MissingInput { what: "text" })?;
///         ctx.emit("count", "counting words")?;
///         Ok(StateUpdate::new().with_value("word_count", json!(text.split_whitespace().count())))
///     }
/// }
/// ```
#[async_trait]
pub trait NodeHandler: Send + Sync {
    /// Execute this node against the given state snapshot.
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<StateUpdate, HandlerError>;
}

// ============================================================================
// Execution Context
// ============================================================================

/// Per-invocation context passed to node handlers.
///
/// Carries the handler's identity within the run, the step counter, an event
/// channel for observability, and the handle through which source-backed
/// nodes reach their external capability.
#[derive(Clone)]
pub struct NodeContext {
    /// Id of the run this invocation belongs to.
    pub run_id: String,
    /// Id of the node being executed.
    pub node_id: String,
    /// Step number within the run (first node is step 1).
    pub step: u64,
    /// Channel for emitting events to the run's event bus.
    pub event_sender: flume::Sender<Event>,
    /// Declared sources plus the capability that services them.
    pub sources: SourcesHandle,
}

impl NodeContext {
    /// Emit a node-scoped event enriched with this context's metadata.
    pub fn emit(
        &self,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), EmitError> {
        self.event_sender
            .send(Event::node(
                self.node_id.clone(),
                self.step,
                scope,
                message,
            ))
            .map_err(|_| EmitError::BusClosed)
    }

    /// Invoke the source declared under `source_id`, passing `request`
    /// through to the capability.
    pub async fn invoke_source(
        &self,
        source_id: &str,
        request: Value,
    ) -> Result<Value, SourceError> {
        self.sources.invoke(source_id, request).await
    }
}

impl std::fmt::Debug for NodeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeContext")
            .field("run_id", &self.run_id)
            .field("node_id", &self.node_id)
            .field("step", &self.step)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// State Updates
// ============================================================================

/// Partial state update returned by a handler invocation.
///
/// All fields are optional; a default update changes nothing. The executor
/// merges `values` into the run state (overwrite semantics, carry-forward
/// keys re-asserted), appends `errors` to the reserved error lane, and folds
/// `metrics` into the run's usage totals.
///
/// # Examples
///
/// ```rust
/// use loomflow::node::{StateUpdate, UsageMetrics};
/// use serde_json::json;
///
/// let update = StateUpdate::new()
///     .with_value("answer", json!("blue"))
///     .with_metrics(UsageMetrics { tokens: 420, cost: 0.003 });
///
/// assert!(update.values.is_some());
/// ```
#[derive(Clone, Debug, Default)]
pub struct StateUpdate {
    /// Key/value entries to merge into the run state.
    pub values: Option<FxHashMap<String, Value>>,
    /// Non-fatal errors to record.
    pub errors: Option<Vec<ErrorEvent>>,
    /// Usage accounting for this invocation.
    pub metrics: Option<UsageMetrics>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single key/value entry.
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.values
            .get_or_insert_with(FxHashMap::default)
            .insert(key.into(), value);
        self
    }

    /// Replace the value map wholesale.
    #[must_use]
    pub fn with_values(mut self, values: FxHashMap<String, Value>) -> Self {
        self.values = Some(values);
        self
    }

    /// Record non-fatal errors.
    #[must_use]
    pub fn with_errors(mut self, errors: Vec<ErrorEvent>) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Record one non-fatal error.
    #[must_use]
    pub fn with_error(mut self, error: ErrorEvent) -> Self {
        self.errors.get_or_insert_with(Vec::new).push(error);
        self
    }

    /// Attach usage metrics.
    #[must_use]
    pub fn with_metrics(mut self, metrics: UsageMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// Usage accounting reported by source-backed handlers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageMetrics {
    /// Units consumed, in whatever unit the source counts (tokens, rows, bytes).
    #[serde(default)]
    pub tokens: u64,
    /// Estimated monetary cost.
    #[serde(default)]
    pub cost: f64,
}

impl UsageMetrics {
    /// Fold another sample into this one.
    pub fn absorb(&mut self, other: UsageMetrics) {
        self.tokens += other.tokens;
        self.cost += other.cost;
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Failure to emit an event through the node context.
#[derive(Debug, Error, Diagnostic)]
pub enum EmitError {
    /// The run's event bus has shut down.
    #[error("failed to emit event: event bus closed")]
    #[diagnostic(
        code(loomflow::node::bus_closed),
        help("The event bus listener has stopped. Check run teardown ordering.")
    )]
    BusClosed,
}

/// Fatal errors raised by node handlers.
///
/// A `HandlerError` halts the run; the executor records it on the result
/// together with the failing node's id and the state merged so far. For
/// problems worth noting but not worth dying over, attach an [`ErrorEvent`]
/// to the update instead.
#[derive(Debug, Error, Diagnostic)]
pub enum HandlerError {
    /// Expected input data is missing from the state snapshot.
    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(loomflow::node::missing_input),
        help("Check that an upstream node produced the required key.")
    )]
    MissingInput { what: &'static str },

    /// The node's config is unusable for its handler.
    #[error("invalid node config: {detail}")]
    #[diagnostic(
        code(loomflow::node::invalid_config),
        help("Check the node's config block against its handler's documentation.")
    )]
    InvalidConfig { detail: String },

    /// Input data was present but failed a configured validation rule.
    #[error("input failed validation: {detail}")]
    #[diagnostic(code(loomflow::node::validation))]
    Validation { detail: String },

    /// A source invocation failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Source(#[from] SourceError),

    /// JSON serialization/deserialization error.
    #[error(transparent)]
    #[diagnostic(code(loomflow::node::serde_json))]
    Serde(#[from] serde_json::Error),

    /// Event bus communication error.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Emit(#[from] EmitError),
}
