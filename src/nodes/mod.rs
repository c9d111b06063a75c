//! The built-in node handlers.
//!
//! Four handlers ship with the crate, one per built-in
//! [`NodeType`](crate::types::NodeType): [`InputNode`] normalizes the run's
//! initial input, [`RouterNode`] writes a routing decision for downstream
//! conditional edges, [`ComputeNode`] does source-backed or template work,
//! and [`AggregateNode`] folds several state keys into one output value.
//! Each parses its config when the graph compiles, so a malformed config
//! fails the compile rather than a run.

mod aggregate;
mod compute;
mod input;
mod router;

pub use aggregate::AggregateNode;
pub use compute::ComputeNode;
pub use input::InputNode;
pub use router::RouterNode;

use serde_json::Value;

use crate::spec::ConfigMap;
use crate::state::StateSnapshot;

pub(crate) fn config_str<'a>(config: &'a ConfigMap, key: &str) -> Option<&'a str> {
    config.get(key).and_then(Value::as_str)
}

pub(crate) fn config_usize(config: &serde_json::Map<String, Value>, key: &str) -> Option<usize> {
    config.get(key).and_then(Value::as_u64).map(|n| n as usize)
}

/// Text form of a state value: strings verbatim, null/missing empty,
/// everything else compact JSON.
pub(crate) fn value_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Empty by aggregation rules: null, `""`, `[]`, and `{}` all count.
pub(crate) fn value_is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Substitute `{key}` placeholders with state values.
///
/// Unknown placeholders are left intact so a template mentioning a key no
/// node produced stays visible in the output instead of vanishing. `{{` and
/// `}}` escape literal braces.
pub(crate) fn render_template(template: &str, snapshot: &StateSnapshot) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut key = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    key.push(c);
                }
                match (closed, snapshot.get(&key)) {
                    (true, Some(value)) => out.push_str(&value_text(Some(value))),
                    _ => {
                        out.push('{');
                        out.push_str(&key);
                        if closed {
                            out.push('}');
                        }
                    }
                }
            }
            other => out.push(other),
        }
    }

    out
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use crate::event_bus::Event;
    use crate::node::NodeContext;
    use crate::sources::{NullSources, SourceCapability, SourceTable, SourcesHandle};

    /// Context wired to a fresh event channel and no sources. Keep the
    /// returned receiver alive for the duration of the test or emits fail.
    pub(crate) fn context(node_id: &str) -> (NodeContext, flume::Receiver<Event>) {
        context_with_sources(node_id, Arc::new(SourceTable::default()), Arc::new(NullSources))
    }

    pub(crate) fn context_with_sources(
        node_id: &str,
        table: Arc<SourceTable>,
        capability: Arc<dyn SourceCapability>,
    ) -> (NodeContext, flume::Receiver<Event>) {
        let (event_sender, events) = flume::unbounded();
        let ctx = NodeContext {
            run_id: "run-test".to_string(),
            node_id: node_id.to_string(),
            step: 1,
            event_sender,
            sources: SourcesHandle::new(table, capability),
        };
        (ctx, events)
    }
}
