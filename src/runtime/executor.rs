//! The run loop: drives a compiled graph from its entry node to a terminal
//! status.
//!
//! Traversal is single-threaded and cooperative. One node runs at a time;
//! fan-out targets are visited depth-first in declared order, each branch
//! finishing before the next sibling starts. The only suspension points are
//! queue-bound edge crossings (bounded waits granted by the
//! [`QueueLimiter`]) and whatever a handler awaits internally.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use miette::Diagnostic;
use thiserror::Error;
use tracing::instrument;

use crate::errors::ErrorEvent;
use crate::event_bus::Event;
use crate::graphs::CompiledGraph;
use crate::limiter::{Acquire, QueueLimiter};
use crate::node::{HandlerError, NodeContext, UsageMetrics};
use crate::sources::{SourceCapability, SourcesHandle};
use crate::state::RunState;

use super::options::RunOptions;
use super::outcome::{ExecutionResult, NodeOutcome, NodeTrace, RunMetadata, RunStatus};

/// What ended a failed run.
///
/// Recorded on [`ExecutionResult::error`]; the result's `final_state` always
/// carries the merges of every node that completed beforehand.
#[derive(Debug, Error, Diagnostic)]
pub enum ExecError {
    /// A node handler returned a fatal error.
    #[error("node '{node_id}' failed at step {step}: {source}")]
    #[diagnostic(
        code(loomflow::run::handler),
        help("The final state carries every merge completed before the failure.")
    )]
    Handler {
        node_id: String,
        step: u64,
        #[source]
        source: HandlerError,
    },

    /// The step budget ran out before the graph reached a terminal node.
    #[error("step limit of {max_steps} reached before node '{node_id}'")]
    #[diagnostic(
        code(loomflow::run::step_limit),
        help("Raise max_steps on RunOptions, or look for an unbounded cycle in the spec.")
    )]
    StepLimit { node_id: String, max_steps: u64 },

    /// A queue's budget can never admit this traversal.
    #[error("queue '{queue_id}' denied traversal to node '{node_id}'")]
    #[diagnostic(
        code(loomflow::run::queue_denied),
        help(
            "The node's cost estimate exceeds what the queue's bandwidth grants in a full window."
        )
    )]
    QueueDenied { queue_id: String, node_id: String },

    /// The compiled graph holds no handler for a routed node id.
    ///
    /// Validation rules this out for graphs produced by
    /// [`compile`](crate::graphs::compile); hitting it means the graph
    /// invariant was broken.
    #[error("no handler compiled for node '{node_id}'")]
    #[diagnostic(code(loomflow::run::missing_handler))]
    MissingHandler { node_id: String },
}

/// A node waiting its turn, together with the queue its inbound edge was
/// bound to.
struct Pending {
    node_id: String,
    queue: Option<String>,
}

/// Why the queue gate refused to admit a traversal.
enum Gate {
    Denied,
    DeadlineExceeded,
}

/// Drives runs of compiled graphs to a terminal status.
///
/// Holds the per-context collaborators every run needs: the source
/// capability, the shared limiter, and the event channel. The executor
/// itself is stateless across runs; any number of runs may proceed through
/// one executor concurrently.
pub struct Executor {
    capability: Arc<dyn SourceCapability>,
    limiter: Arc<QueueLimiter>,
    events: flume::Sender<Event>,
}

impl Executor {
    pub fn new(
        capability: Arc<dyn SourceCapability>,
        limiter: Arc<QueueLimiter>,
        events: flume::Sender<Event>,
    ) -> Self {
        Self {
            capability,
            limiter,
            events,
        }
    }

    /// Execute `graph` from its entry node until a terminal status.
    ///
    /// Per step, in order: cooperative deadline check, step-limit check,
    /// queue admission for queue-bound edges, handler invocation, merge,
    /// route. Routing picks the first outgoing edge (declared order) whose
    /// condition holds; an unconditioned edge always fires, which is how a
    /// declared fallback works. No firing edge means the current branch is
    /// done; an empty pending stack completes the run.
    ///
    /// Errors are encoded in the result rather than thrown: handler
    /// failures, step-limit breaches, and queue denials end the run as
    /// [`RunStatus::Failed`] with the offending [`ExecError`], and a missed
    /// deadline ends it as [`RunStatus::TimedOut`]. Both keep the state
    /// merged so far.
    #[instrument(skip(self, graph, initial, options), fields(run_id = %options.run_id))]
    pub async fn execute(
        &self,
        graph: &CompiledGraph,
        initial: RunState,
        options: RunOptions,
    ) -> ExecutionResult {
        let RunOptions {
            run_id,
            max_steps,
            timeout,
            carry_forward,
        } = options;
        let carry = carry_forward.unwrap_or_else(|| graph.carry_forward().to_vec());

        let started_at = Utc::now();
        let clock = Instant::now();
        let deadline = timeout.and_then(|t| clock.checked_add(t));

        self.limiter.configure_all(graph.queues());

        let sources = SourcesHandle::new(graph.sources().clone(), self.capability.clone());
        let mut state = initial;
        let mut trace: Vec<NodeTrace> = Vec::new();
        let mut usage = UsageMetrics::default();
        let mut steps: u64 = 0;

        tracing::info!(entry = %graph.entry(), "workflow run started");
        self.emit(Event::diagnostic(
            "run",
            format!("run '{}' started at '{}'", run_id, graph.entry()),
        ));

        let mut stack = vec![Pending {
            node_id: graph.entry().to_string(),
            queue: None,
        }];

        let (status, error) = loop {
            let Some(pending) = stack.pop() else {
                break (RunStatus::Completed, None);
            };

            if let Some(deadline) = deadline
                && Instant::now() >= deadline
            {
                state.record_error(&ErrorEvent::run(format!(
                    "run deadline exceeded before node '{}'",
                    pending.node_id
                )));
                break (RunStatus::TimedOut, None);
            }

            if steps >= max_steps {
                break (
                    RunStatus::Failed,
                    Some(ExecError::StepLimit {
                        node_id: pending.node_id,
                        max_steps,
                    }),
                );
            }
            steps += 1;
            let step = steps;

            let mut waited = Duration::ZERO;
            if let Some(queue_id) = &pending.queue {
                let cost = graph.cost_estimate(&pending.node_id);
                match self
                    .admit(queue_id, &pending.node_id, step, cost, deadline)
                    .await
                {
                    Ok(wait) => waited = wait,
                    Err(Gate::Denied) => {
                        break (
                            RunStatus::Failed,
                            Some(ExecError::QueueDenied {
                                queue_id: queue_id.clone(),
                                node_id: pending.node_id,
                            }),
                        );
                    }
                    Err(Gate::DeadlineExceeded) => {
                        state.record_error(&ErrorEvent::run(format!(
                            "run deadline exceeded waiting on queue '{queue_id}'"
                        )));
                        break (RunStatus::TimedOut, None);
                    }
                }
            }

            let Some(handler) = graph.handler(&pending.node_id).cloned() else {
                break (
                    RunStatus::Failed,
                    Some(ExecError::MissingHandler {
                        node_id: pending.node_id,
                    }),
                );
            };

            let ctx = NodeContext {
                run_id: run_id.clone(),
                node_id: pending.node_id.clone(),
                step,
                event_sender: self.events.clone(),
                sources: sources.clone(),
            };
            let node_started = clock.elapsed();
            let invoke_started = Instant::now();
            let outcome = handler.run(state.snapshot(), ctx).await;
            let duration = invoke_started.elapsed();

            match outcome {
                Err(source) => {
                    trace.push(NodeTrace {
                        node_id: pending.node_id.clone(),
                        step,
                        started_at: node_started,
                        duration,
                        wait: waited,
                        outcome: NodeOutcome::Failed,
                    });
                    self.emit(Event::node(
                        pending.node_id.clone(),
                        step,
                        "node",
                        format!("failed: {source}"),
                    ));
                    break (
                        RunStatus::Failed,
                        Some(ExecError::Handler {
                            node_id: pending.node_id,
                            step,
                            source,
                        }),
                    );
                }
                Ok(update) => {
                    if let Some(metrics) = update.metrics {
                        usage.absorb(metrics);
                    }
                    let written = state.apply(update, &carry);
                    tracing::debug!(
                        node = %pending.node_id,
                        step,
                        written = written.len(),
                        "node update merged"
                    );
                    trace.push(NodeTrace {
                        node_id: pending.node_id.clone(),
                        step,
                        started_at: node_started,
                        duration,
                        wait: waited,
                        outcome: NodeOutcome::Succeeded,
                    });
                    self.emit(Event::node(
                        pending.node_id.clone(),
                        step,
                        "node",
                        format!("completed in {duration:?}"),
                    ));

                    let snapshot = state.snapshot();
                    let plans = graph.edges_from(&pending.node_id);
                    match plans.iter().find(|plan| plan.fires(&snapshot)) {
                        Some(plan) => {
                            tracing::debug!(
                                from = %pending.node_id,
                                to = ?plan.targets(),
                                queue = plan.queue(),
                                "edge fired"
                            );
                            // reversed push keeps declared order under LIFO
                            for target in plan.targets().iter().rev() {
                                stack.push(Pending {
                                    node_id: target.clone(),
                                    queue: plan.queue().map(str::to_string),
                                });
                            }
                        }
                        None => {
                            tracing::debug!(node = %pending.node_id, "no outgoing edge fired");
                        }
                    }
                }
            }
        };

        let duration = clock.elapsed();
        tracing::info!(%status, steps, ?duration, "workflow run finished");
        self.emit(Event::diagnostic(
            "run",
            format!("run '{run_id}' {status} after {steps} step(s) in {duration:?}"),
        ));

        ExecutionResult {
            status,
            final_state: state,
            error,
            metadata: RunMetadata {
                run_id,
                started_at,
                duration,
                steps,
                trace,
                usage,
            },
        }
    }

    /// Wait for a queue grant, retrying jittered bounded pauses.
    ///
    /// Returns the total time suspended. Pauses never overrun the run
    /// deadline; a deadline reached mid-wait surfaces as
    /// [`Gate::DeadlineExceeded`] so the caller can time the run out with
    /// its partial state intact.
    async fn admit(
        &self,
        queue_id: &str,
        node_id: &str,
        step: u64,
        cost: u64,
        deadline: Option<Instant>,
    ) -> Result<Duration, Gate> {
        let mut waited = Duration::ZERO;
        loop {
            match self.limiter.acquire(queue_id, cost) {
                Acquire::Allowed => return Ok(waited),
                Acquire::Denied => return Err(Gate::Denied),
                Acquire::MustWait(wait) => {
                    // jitter spreads concurrent re-acquires apart
                    let mut pause = wait + wait.mul_f64(rand::random::<f64>() * 0.1);
                    if let Some(deadline) = deadline {
                        let remaining = deadline.saturating_duration_since(Instant::now());
                        if remaining.is_zero() {
                            return Err(Gate::DeadlineExceeded);
                        }
                        pause = pause.min(remaining);
                    }
                    self.emit(Event::node(
                        node_id,
                        step,
                        "queue",
                        format!("waiting {pause:?} on queue '{queue_id}'"),
                    ));
                    tracing::debug!(queue = %queue_id, node = %node_id, ?pause, "queue wait");
                    tokio::time::sleep(pause).await;
                    waited += pause;
                }
            }
        }
    }

    /// Best-effort event emission; a closed bus is logged, never fatal.
    fn emit(&self, event: Event) {
        if self.events.send(event).is_err() {
            tracing::debug!("event bus closed, dropping executor event");
        }
    }
}
