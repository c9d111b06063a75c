use serde_json::Value;

use loomflow::runtime::{ExecutionResult, RunStatus};

#[allow(dead_code)]
pub fn assert_completed(result: &ExecutionResult) {
    assert_eq!(
        result.status,
        RunStatus::Completed,
        "expected a completed run, got {:?} (error: {:?})",
        result.status,
        result.error
    );
}

/// Asserts the executor visited exactly these nodes, in this order.
#[allow(dead_code)]
pub fn assert_visited(result: &ExecutionResult, expected: &[&str]) {
    assert_eq!(
        result.metadata.visited(),
        expected,
        "unexpected traversal order"
    );
}

/// Asserts the `path` array written by path-recording stub nodes.
#[allow(dead_code)]
pub fn assert_path(result: &ExecutionResult, expected: &[&str]) {
    let path: Vec<&str> = result
        .final_state
        .get("path")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    assert_eq!(path, expected, "unexpected path through the graph");
}
