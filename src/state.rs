//! Run state management for the loomflow workflow engine.
//!
//! Each run owns exactly one [`RunState`]: a flat key→value bag. Handlers
//! never touch it directly; they receive an immutable [`StateSnapshot`] and
//! return a [`StateUpdate`](crate::node::StateUpdate), and only the executor
//! merges updates back in, via [`RunState::apply`].
//!
//! # Merge policy
//!
//! An update's keys overwrite existing keys, nothing is ever dropped, and
//! the graph's designated carry-forward keys are re-asserted after every
//! merge: once such a key holds a value, no later update can erase or null
//! it out. Non-fatal [`ErrorEvent`](crate::errors::ErrorEvent)s append to
//! the reserved `errors` key.
//!
//! # Examples
//!
//! ```rust
//! use loomflow::node::StateUpdate;
//! use loomflow::state::RunState;
//! use serde_json::json;
//!
//! let mut state = RunState::new();
//! state.insert("request_id", json!("r-17"));
//!
//! // A later update cannot null out a carry-forward key.
//! let update = StateUpdate::new()
//!     .with_value("answer", json!("42"))
//!     .with_value("request_id", json!(null));
//! state.apply(update, &["request_id".to_string()]);
//!
//! assert_eq!(state.get("answer"), Some(&json!("42")));
//! assert_eq!(state.get("request_id"), Some(&json!("r-17")));
//! ```

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::errors::{ERRORS_KEY, ErrorEvent};
use crate::node::StateUpdate;

/// The mutable state bag owned by a single run.
///
/// Constructed from the caller's initial state, mutated exclusively by the
/// executor through [`apply`](Self::apply), and handed back on the
/// [`ExecutionResult`](crate::runtime::ExecutionResult) whatever the terminal
/// status.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunState {
    values: FxHashMap<String, Value>,
}

impl RunState {
    /// An empty state bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a state bag from key/value pairs.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use loomflow::state::RunState;
    /// use serde_json::json;
    ///
    /// let state = RunState::from_pairs([("user_input", json!("hello"))]);
    /// assert_eq!(state.get("user_input"), Some(&json!("hello")));
    /// ```
    pub fn from_pairs<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self {
            values: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Build a state bag from a JSON object; non-object values yield an
    /// empty bag.
    pub fn from_json_object(value: Value) -> Self {
        match value {
            Value::Object(map) => Self {
                values: map.into_iter().collect(),
            },
            _ => Self::default(),
        }
    }

    /// Read a value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Insert a value directly. Callers outside the executor normally only
    /// do this while preparing the initial state.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Borrow the underlying map.
    pub fn values(&self) -> &FxHashMap<String, Value> {
        &self.values
    }

    /// Consume the state into its underlying map.
    pub fn into_values(self) -> FxHashMap<String, Value> {
        self.values
    }

    /// Clone an immutable view for a handler invocation.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            values: self.values.clone(),
        }
    }

    /// Merge a handler's partial update into this state.
    ///
    /// Update keys overwrite existing keys. Keys named in `carry_forward`
    /// are re-asserted afterwards: if the pre-merge state held a non-null
    /// value and the update removed or nulled it, the previous value is
    /// restored. Error events append to the reserved `errors` array.
    ///
    /// Returns the keys written by the update, sorted, for tracing.
    pub fn apply(&mut self, update: StateUpdate, carry_forward: &[String]) -> Vec<String> {
        let preserved: Vec<(String, Value)> = carry_forward
            .iter()
            .filter_map(|key| {
                self.values
                    .get(key)
                    .filter(|v| !v.is_null())
                    .map(|v| (key.clone(), v.clone()))
            })
            .collect();

        let mut written: Vec<String> = Vec::new();
        if let Some(values) = update.values {
            written.reserve(values.len());
            for (key, value) in values {
                written.push(key.clone());
                self.values.insert(key, value);
            }
        }
        written.sort_unstable();

        for (key, previous) in preserved {
            let erased = match self.values.get(&key) {
                None => true,
                Some(v) => v.is_null(),
            };
            if erased {
                self.values.insert(key, previous);
            }
        }

        if let Some(errors) = update.errors {
            for event in errors {
                self.record_error(&event);
            }
        }

        written
    }

    /// Append one error event to the reserved `errors` array.
    pub fn record_error(&mut self, event: &ErrorEvent) {
        let rendered = serde_json::to_value(event)
            .unwrap_or_else(|_| Value::String(event.message.clone()));
        match self.values.get_mut(ERRORS_KEY) {
            Some(Value::Array(entries)) => entries.push(rendered),
            _ => {
                self.values
                    .insert(ERRORS_KEY.to_string(), Value::Array(vec![rendered]));
            }
        }
    }
}

impl From<FxHashMap<String, Value>> for RunState {
    fn from(values: FxHashMap<String, Value>) -> Self {
        Self { values }
    }
}

/// Immutable view of run state handed to node handlers.
///
/// Snapshots are independent clones: handlers can hold them across awaits
/// while the executor keeps working, and nothing a handler does to its copy
/// leaks back into the run.
#[derive(Clone, Debug, Default)]
pub struct StateSnapshot {
    /// State entries at the time of the snapshot.
    pub values: FxHashMap<String, Value>,
}

impl StateSnapshot {
    /// Build a snapshot directly from a JSON object. Non-object values yield
    /// an empty snapshot. Handy for tests and condition examples.
    pub fn from_json(value: Value) -> Self {
        let values = match value {
            Value::Object(map) => map.into_iter().collect(),
            _ => FxHashMap::default(),
        };
        Self { values }
    }

    /// Read a value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Read a value as a string slice, if it is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn apply_overwrites_and_reports_written_keys() {
        let mut state = RunState::from_pairs([("a", json!(1)), ("b", json!(2))]);
        let written = state.apply(
            StateUpdate::new()
                .with_value("b", json!(20))
                .with_value("c", json!(3)),
            &[],
        );
        assert_eq!(written, vec!["b".to_string(), "c".to_string()]);
        assert_eq!(state.get("a"), Some(&json!(1)));
        assert_eq!(state.get("b"), Some(&json!(20)));
    }

    #[test]
    fn carry_forward_restores_nulled_key() {
        let carry = vec!["request_id".to_string()];
        let mut state = RunState::from_pairs([("request_id", json!("r-1"))]);
        state.apply(StateUpdate::new().with_value("request_id", json!(null)), &carry);
        assert_eq!(state.get("request_id"), Some(&json!("r-1")));
    }

    #[test]
    fn carry_forward_allows_real_overwrite() {
        let carry = vec!["request_id".to_string()];
        let mut state = RunState::from_pairs([("request_id", json!("r-1"))]);
        state.apply(StateUpdate::new().with_value("request_id", json!("r-2")), &carry);
        assert_eq!(state.get("request_id"), Some(&json!("r-2")));
    }

    #[test]
    fn errors_accumulate_in_reserved_key() {
        let mut state = RunState::new();
        state.record_error(&ErrorEvent::run("first"));
        state.record_error(&ErrorEvent::run("second"));
        let errors = state.get(ERRORS_KEY).and_then(Value::as_array).unwrap();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn snapshot_is_independent() {
        let mut state = RunState::from_pairs([("k", json!("v"))]);
        let snapshot = state.snapshot();
        state.insert("k", json!("changed"));
        assert_eq!(snapshot.get("k"), Some(&json!("v")));
    }
}
