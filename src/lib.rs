//! # Loomflow: Declarative Workflow Execution Engine
//!
//! Loomflow compiles declarative workflow specs into frozen graphs and
//! drives them through deterministic, single-threaded-per-run traversal with
//! conditional routing, sequential fan-out, carry-forward state merging, and
//! queue-bound rate limiting.
//!
//! ## Core Concepts
//!
//! - **Spec**: A declarative description of nodes, edges, queues, and
//!   sources; pure data, serializable, validated before compilation
//! - **Registry**: Maps node type tags to handler factories; ships the
//!   built-in `input`, `router`, `compute`, and `aggregate` types
//! - **CompiledGraph**: A frozen spec with constructed handlers and parsed
//!   conditions; one graph backs any number of concurrent runs
//! - **Executor**: Drives a run `Ready → Running → (Completed | Failed |
//!   TimedOut)`, merging each handler's partial update into the run state
//! - **QueueLimiter**: Sliding-window bandwidth accounting for edges bound
//!   to named queues, shared process-wide across runs
//!
//! ## Quick Start
//!
//! ### Declaring and Running a Workflow
//!
//! ```
//! use loomflow::context::ExecutionContext;
//! use loomflow::runtime::RunOptions;
//! use loomflow::spec::WorkflowSpec;
//! use loomflow::state::RunState;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let spec = WorkflowSpec::builder("entry")
//!     .name("greeter")
//!     .node("entry", "input")
//!     .node_with_config("greet", "compute", [("template", json!("hello, {user_input}!"))])
//!     .edge("entry", "greet")
//!     .build();
//!
//! let ctx = ExecutionContext::default();
//! let initial = RunState::from_pairs([("user_input", json!("world"))]);
//! let result = ctx.run(&spec, initial, RunOptions::default()).await.unwrap();
//!
//! assert!(result.is_completed());
//! assert_eq!(result.final_state.get("result"), Some(&json!("hello, world!")));
//! # }
//! ```
//!
//! ### Custom Node Handlers
//!
//! Anything implementing [`NodeHandler`](node::NodeHandler) can be
//! registered under a type tag and declared in specs like a built-in:
//!
//! ```
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use loomflow::node::{HandlerError, NodeContext, NodeHandler, StateUpdate};
//! use loomflow::registry::NodeRegistry;
//! use loomflow::state::StateSnapshot;
//! use serde_json::json;
//!
//! struct WordCount;
//!
//! #[async_trait]
//! impl NodeHandler for WordCount {
//!     async fn run(
//!         &self,
//!         snapshot: StateSnapshot,
//!         _ctx: NodeContext,
//!     ) -> Result<StateUpdate, HandlerError> {
//!         let text = snapshot.get_str("text").unwrap_or_default();
//!         Ok(StateUpdate::new().with_value("words", json!(text.split_whitespace().count())))
//!     }
//! }
//!
//! let mut registry = NodeRegistry::with_builtins();
//! registry.register_fn("word-count".into(), |_id, _config| {
//!     Ok(Arc::new(WordCount) as Arc<dyn NodeHandler>)
//! });
//! assert!(registry.resolves(&"word-count".into()));
//! ```
//!
//! ### Validation Before Compilation
//!
//! [`validate`](validation::validate) never short-circuits: every problem in
//! a spec is reported in one pass, and the caller decides what blocks.
//!
//! ```
//! use loomflow::registry::NodeRegistry;
//! use loomflow::spec::WorkflowSpec;
//! use loomflow::validation::validate;
//!
//! let spec = WorkflowSpec::builder("entry")
//!     .node("entry", "input")
//!     .edge("entry", "ghost")
//!     .build();
//!
//! let findings = validate(&spec, &NodeRegistry::with_builtins());
//! assert!(!findings.is_empty());
//! ```
//!
//! ## Module Guide
//!
//! - [`spec`] - The declarative workflow data model and its builder
//! - [`validation`] - Exhaustive spec checking with ordered findings
//! - [`registry`] - Node type tag → handler factory mapping
//! - [`nodes`] - Built-in handlers: input, router, compute, aggregate
//! - [`condition`] - The edge predicate language, parsed at compile time
//! - [`graphs`] - Compilation into frozen, run-ready graphs
//! - [`runtime`] - The executor loop, run options, and result types
//! - [`limiter`] - Sliding-window queue bandwidth accounting
//! - [`state`] - The per-run state bag and its merge policy
//! - [`node`] - The handler trait and per-invocation context
//! - [`sources`] - The boundary to external capabilities
//! - [`store`] - Spec storage for runs initiated by reference
//! - [`context`] - The embedder-facing facade tying it all together
//! - [`event_bus`] - Structured run events fanned out to sinks
//! - [`telemetry`] - Event formatting and tracing bootstrap

pub mod condition;
pub mod context;
pub mod errors;
pub mod event_bus;
pub mod graphs;
pub mod limiter;
pub mod node;
pub mod nodes;
pub mod registry;
pub mod runtime;
pub mod sources;
pub mod spec;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod utils;
pub mod validation;
