//! Non-fatal error events recorded alongside run state.
//!
//! Handlers can fail hard ([`HandlerError`](crate::node::HandlerError) halts
//! the run) or record a problem and keep going. The latter produces an
//! [`ErrorEvent`]: structured data the executor appends to the reserved
//! [`ERRORS_KEY`] entry of the run state, where it survives every merge and
//! lands in the final state for the caller to inspect.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved state key under which error events accumulate (a JSON array).
pub const ERRORS_KEY: &str = "errors";

/// A recorded, non-fatal error.
///
/// # Examples
///
/// ```
/// use loomflow::errors::ErrorEvent;
/// use serde_json::json;
///
/// let event = ErrorEvent::node("normalize", 2, "input was empty")
///     .with_context(json!({"input_key": "question"}));
/// assert_eq!(event.message, "input was empty");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ErrorEvent {
    #[serde(default = "chrono::Utc::now")]
    pub when: DateTime<Utc>,
    #[serde(default)]
    pub scope: ErrorScope,
    pub message: String,
    #[serde(default)]
    pub context: Value,
}

impl ErrorEvent {
    /// An error recorded by a node handler.
    pub fn node<S: Into<String>>(node_id: S, step: u64, message: impl Into<String>) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Node {
                id: node_id.into(),
                step,
            },
            message: message.into(),
            context: Value::Null,
        }
    }

    /// An error recorded by the executor itself.
    pub fn run(message: impl Into<String>) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Run,
            message: message.into(),
            context: Value::Null,
        }
    }

    /// Attach structured context.
    #[must_use]
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }
}

/// Where an error event originated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ErrorScope {
    /// Recorded by the named node at the given step.
    Node { id: String, step: u64 },
    /// Recorded by the run loop outside any single node.
    #[default]
    Run,
}
