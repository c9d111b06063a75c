//! The embedder's entry point: one bundle of collaborators, no ambient
//! globals.
//!
//! An [`ExecutionContext`] pairs a node registry with a source capability, a
//! shared queue limiter, and an event bus, then exposes the whole engine
//! surface: [`validate`](ExecutionContext::validate),
//! [`compile`](ExecutionContext::compile),
//! [`execute`](ExecutionContext::execute), the
//! [`run`](ExecutionContext::run) shorthand, and
//! [`run_stored`](ExecutionContext::run_stored) for specs addressed by id.
//!
//! Contexts are cheap to clone; clones share the same registry, limiter, and
//! bus, which is exactly what concurrent runs want.

use std::sync::Arc;

use futures_util::stream::Stream;
use miette::Diagnostic;
use thiserror::Error;
use tracing::instrument;

use crate::event_bus::{Event, EventBus, EventSink};
use crate::graphs::{CompileError, CompiledGraph, compile};
use crate::limiter::QueueLimiter;
use crate::registry::NodeRegistry;
use crate::runtime::{ExecutionResult, Executor, RunOptions};
use crate::sources::{NullSources, SourceCapability};
use crate::spec::WorkflowSpec;
use crate::state::RunState;
use crate::store::{SpecStore, StoreError};
use crate::validation::{ValidationFinding, validate};

/// Errors surfaced by the context facade.
#[derive(Debug, Error, Diagnostic)]
pub enum ContextError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

/// Immutable bundle of everything a run needs.
///
/// # Examples
///
/// ```rust
/// use loomflow::context::ExecutionContext;
/// use loomflow::runtime::RunOptions;
/// use loomflow::spec::WorkflowSpec;
/// use loomflow::state::RunState;
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let spec = WorkflowSpec::builder("entry")
///     .node("entry", "input")
///     .node_with_config("echo", "compute", [("template", json!("got: {user_input}"))])
///     .edge("entry", "echo")
///     .build();
///
/// let ctx = ExecutionContext::default();
/// let initial = RunState::from_pairs([("user_input", json!("hello"))]);
/// let result = ctx.run(&spec, initial, RunOptions::default()).await.unwrap();
///
/// assert!(result.is_completed());
/// assert_eq!(result.final_state.get("result"), Some(&json!("got: hello")));
/// # }
/// ```
#[derive(Clone)]
pub struct ExecutionContext {
    registry: Arc<NodeRegistry>,
    capability: Arc<dyn SourceCapability>,
    limiter: Arc<QueueLimiter>,
    event_bus: Arc<EventBus>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ExecutionContext {
    pub fn builder() -> ExecutionContextBuilder {
        ExecutionContextBuilder::new()
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// The limiter shared by every run through this context.
    pub fn limiter(&self) -> &Arc<QueueLimiter> {
        &self.limiter
    }

    /// The event bus runs publish to.
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Stream of events published after this call.
    pub fn subscribe(&self) -> impl Stream<Item = Event> + use<> {
        self.event_bus.subscribe()
    }

    /// Exhaustively check `spec` against this context's registry.
    ///
    /// Findings are data, not errors; the caller decides what blocks.
    pub fn validate(&self, spec: &WorkflowSpec) -> Vec<ValidationFinding> {
        validate(spec, &self.registry)
    }

    /// Compile `spec` into a frozen graph ready for any number of runs.
    pub fn compile(&self, spec: &WorkflowSpec) -> Result<CompiledGraph, CompileError> {
        compile(spec, &self.registry)
    }

    /// Execute a compiled graph to a terminal status.
    pub async fn execute(
        &self,
        graph: &CompiledGraph,
        initial: RunState,
        options: RunOptions,
    ) -> ExecutionResult {
        Executor::new(
            self.capability.clone(),
            self.limiter.clone(),
            self.event_bus.sender(),
        )
        .execute(graph, initial, options)
        .await
    }

    /// Compile and execute in one call.
    #[instrument(
        skip(self, spec, initial, options),
        fields(workflow = spec.name.as_deref().unwrap_or("unnamed")),
        err
    )]
    pub async fn run(
        &self,
        spec: &WorkflowSpec,
        initial: RunState,
        options: RunOptions,
    ) -> Result<ExecutionResult, ContextError> {
        let graph = self.compile(spec)?;
        Ok(self.execute(&graph, initial, options).await)
    }

    /// Load a spec from `store` by id, then compile and execute it.
    #[instrument(skip(self, store, initial, options), err)]
    pub async fn run_stored(
        &self,
        store: &dyn SpecStore,
        spec_id: &str,
        initial: RunState,
        options: RunOptions,
    ) -> Result<ExecutionResult, ContextError> {
        let spec = store.load(spec_id).await?;
        self.run(&spec, initial, options).await
    }

    /// Stop the bus listener after draining in-flight events. Call before
    /// asserting on sink contents.
    pub async fn shutdown(&self) {
        self.event_bus.shutdown().await;
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("registered_types", &self.registry.type_tags())
            .finish_non_exhaustive()
    }
}

/// Assembles an [`ExecutionContext`].
///
/// Unset parts get working defaults: the built-in registry, the
/// all-rejecting [`NullSources`] capability, a fresh limiter, and a stdout
/// event sink.
///
/// # Examples
///
/// ```rust
/// use loomflow::context::ExecutionContext;
/// use loomflow::event_bus::MemorySink;
/// use loomflow::registry::NodeRegistry;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let events = MemorySink::new();
/// let ctx = ExecutionContext::builder()
///     .with_registry(NodeRegistry::with_builtins())
///     .with_sink(events.clone())
///     .build();
/// assert!(ctx.registry().resolves(&"router".into()));
/// # }
/// ```
#[derive(Default)]
pub struct ExecutionContextBuilder {
    registry: Option<Arc<NodeRegistry>>,
    capability: Option<Arc<dyn SourceCapability>>,
    limiter: Option<Arc<QueueLimiter>>,
    sinks: Vec<Box<dyn EventSink>>,
}

impl ExecutionContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this registry instead of the built-in set.
    #[must_use]
    pub fn with_registry(mut self, registry: NodeRegistry) -> Self {
        self.registry = Some(Arc::new(registry));
        self
    }

    /// Share an already-built registry between contexts.
    #[must_use]
    pub fn with_shared_registry(mut self, registry: Arc<NodeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Capability that services the spec's declared sources.
    #[must_use]
    pub fn with_capability<C>(mut self, capability: C) -> Self
    where
        C: SourceCapability + 'static,
    {
        self.capability = Some(Arc::new(capability));
        self
    }

    /// Share a limiter between contexts so they draw on the same budgets.
    #[must_use]
    pub fn with_limiter(mut self, limiter: Arc<QueueLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Attach an event sink. The first call replaces the default stdout
    /// sink; later calls add further sinks.
    #[must_use]
    pub fn with_sink<T>(mut self, sink: T) -> Self
    where
        T: EventSink + 'static,
    {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn build(self) -> ExecutionContext {
        let event_bus = if self.sinks.is_empty() {
            EventBus::default()
        } else {
            EventBus::with_sinks(self.sinks)
        };
        event_bus.listen();

        ExecutionContext {
            registry: self
                .registry
                .unwrap_or_else(|| Arc::new(NodeRegistry::with_builtins())),
            capability: self.capability.unwrap_or_else(|| Arc::new(NullSources)),
            limiter: self.limiter.unwrap_or_default(),
            event_bus: Arc::new(event_bus),
        }
    }
}
