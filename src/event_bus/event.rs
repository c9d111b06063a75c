use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A structured observation emitted while a workflow runs.
///
/// Handlers emit node-scoped events through
/// [`NodeContext::emit`](crate::node::NodeContext::emit); the executor emits
/// diagnostics for run-level milestones (run started, route taken, run
/// finished). Sinks receive both uniformly.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Event {
    Node(NodeEvent),
    Diagnostic(DiagnosticEvent),
}

impl Event {
    /// Event attributed to a node invocation at a known step.
    pub fn node(
        node_id: impl Into<String>,
        step: u64,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Event::Node(NodeEvent {
            node_id: node_id.into(),
            step,
            scope: scope.into(),
            message: message.into(),
        })
    }

    /// Run-level event with no node attribution.
    pub fn diagnostic(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Event::Diagnostic(DiagnosticEvent {
            scope: scope.into(),
            message: message.into(),
        })
    }

    pub fn scope_label(&self) -> &str {
        match self {
            Event::Node(node) => &node.scope,
            Event::Diagnostic(diag) => &diag.scope,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Event::Node(node) => &node.message,
            Event::Diagnostic(diag) => &diag.message,
        }
    }

    /// Convert the event to a JSON value with a normalized schema.
    ///
    /// Every variant renders to the same shape, so downstream consumers can
    /// parse events without matching on the variant first:
    ///
    /// ```json
    /// {
    ///   "type": "node" | "diagnostic",
    ///   "scope": "scope_label",
    ///   "message": "event message",
    ///   "timestamp": "2026-08-22T12:34:56.789Z",
    ///   "metadata": { /* variant-specific fields */ }
    /// }
    /// ```
    ///
    /// # Example
    ///
    /// ```
    /// use loomflow::event_bus::Event;
    ///
    /// let event = Event::node("router", 3, "routing", "matched rule 2");
    /// let json = event.to_json_value();
    ///
    /// assert_eq!(json["type"], "node");
    /// assert_eq!(json["scope"], "routing");
    /// assert_eq!(json["metadata"]["node_id"], "router");
    /// assert_eq!(json["metadata"]["step"], 3);
    /// ```
    pub fn to_json_value(&self) -> Value {
        use serde_json::json;

        let (event_type, metadata) = match self {
            Event::Node(node) => (
                "node",
                json!({"node_id": node.node_id, "step": node.step}),
            ),
            Event::Diagnostic(_) => ("diagnostic", json!({})),
        };

        json!({
            "type": event_type,
            "scope": self.scope_label(),
            "message": self.message(),
            "timestamp": Utc::now().to_rfc3339(),
            "metadata": metadata,
        })
    }

    /// Compact JSON string form of [`to_json_value`](Self::to_json_value).
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_json_value())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Node(node) => {
                write!(f, "[{}@{}] {}", node.node_id, node.step, node.message)
            }
            Event::Diagnostic(diag) => write!(f, "({}) {}", diag.scope, diag.message),
        }
    }
}

/// Event attributed to a specific node invocation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeEvent {
    pub node_id: String,
    pub step: u64,
    pub scope: String,
    pub message: String,
}

/// Run-level event without node attribution.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosticEvent {
    pub scope: String,
    pub message: String,
}
