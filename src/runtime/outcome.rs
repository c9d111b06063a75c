use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::node::UsageMetrics;
use crate::state::RunState;

use super::executor::ExecError;

/// Lifecycle of a run.
///
/// Every run moves `Ready → Running → ` one of the three terminal statuses.
/// [`TimedOut`](RunStatus::TimedOut) is distinct from
/// [`Failed`](RunStatus::Failed): the partial state a timed-out run
/// accumulated is intact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Ready,
    Running,
    Completed,
    Failed,
    TimedOut,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::TimedOut
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunStatus::Ready => "ready",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::TimedOut => "timed_out",
        };
        f.write_str(label)
    }
}

/// How a single node invocation ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeOutcome {
    Succeeded,
    Failed,
}

/// One entry in a run's per-node trace, in execution order.
#[derive(Clone, Debug, Serialize)]
pub struct NodeTrace {
    pub node_id: String,
    /// Step number within the run (first node is step 1).
    pub step: u64,
    /// Offset from run start at which the handler began.
    pub started_at: Duration,
    /// Wall-clock time spent inside the handler.
    pub duration: Duration,
    /// Time spent suspended on queue bandwidth before the handler ran.
    pub wait: Duration,
    pub outcome: NodeOutcome,
}

/// Everything recorded about a run besides its state.
#[derive(Clone, Debug, Serialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    /// Total wall-clock duration, queue waits included.
    pub duration: Duration,
    /// Node steps taken.
    pub steps: u64,
    /// Per-node execution trace, in visit order.
    pub trace: Vec<NodeTrace>,
    /// Usage accumulated from handler updates.
    pub usage: UsageMetrics,
}

impl RunMetadata {
    /// Node ids in visit order. The determinism guarantee makes this stable
    /// across re-runs with identical inputs.
    pub fn visited(&self) -> Vec<&str> {
        self.trace.iter().map(|t| t.node_id.as_str()).collect()
    }
}

/// The executor's final report.
///
/// Infrastructure aside, execution never throws: handler failures, step-limit
/// breaches, and queue denials all land here as a [`Failed`](RunStatus::Failed)
/// status with the offending [`ExecError`], and the state always reflects
/// every merge that completed before the run ended.
#[derive(Debug)]
pub struct ExecutionResult {
    pub status: RunStatus,
    /// Run state as merged so far, whatever the terminal status.
    pub final_state: RunState,
    /// Populated when `status` is [`Failed`](RunStatus::Failed).
    pub error: Option<ExecError>,
    pub metadata: RunMetadata,
}

impl ExecutionResult {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Convenience accessor for the conventional `final_output` state key.
    ///
    /// When an aggregate node wrapped its result in a summary object, the
    /// inner `result` value is returned instead of the wrapper.
    pub fn final_output(&self) -> Option<&Value> {
        match self.final_state.get("final_output")? {
            Value::Object(map) if map.contains_key("result") => map.get("result"),
            other => Some(other),
        }
    }
}
