use serde_json::json;

use loomflow::utils::id_generator::*;
use loomflow::utils::json_ext::*;

#[test]
fn test_deep_merge_recurses_into_objects() {
    let left = json!({"a": 1, "b": {"x": 10}});
    let right = json!({"b": {"y": 20}, "c": 3});
    let merged = deep_merge(&left, &right, MergeStrategy::DeepMerge);
    assert_eq!(merged, json!({"a": 1, "b": {"x": 10, "y": 20}, "c": 3}));
}

#[test]
fn test_merge_strategies_settle_conflicts() {
    let left = json!({"k": "old", "tags": [1]});
    let right = json!({"k": "new", "tags": [2]});

    assert_eq!(
        deep_merge(&left, &right, MergeStrategy::PreferLeft),
        json!({"k": "old", "tags": [1]})
    );
    assert_eq!(
        deep_merge(&left, &right, MergeStrategy::PreferRight),
        json!({"k": "new", "tags": [2]})
    );
    assert_eq!(
        deep_merge(&left, &right, MergeStrategy::DeepMerge),
        json!({"k": "new", "tags": [1, 2]})
    );
}

#[test]
fn test_merge_handles_mismatched_shapes() {
    let left = json!({"v": 1});
    let right = json!({"v": {"nested": true}});

    assert_eq!(
        deep_merge(&left, &right, MergeStrategy::PreferLeft),
        json!({"v": 1})
    );
    assert_eq!(
        deep_merge(&left, &right, MergeStrategy::DeepMerge),
        json!({"v": {"nested": true}})
    );
}

#[test]
fn test_merge_multiple_folds_left_to_right() {
    let values = vec![
        json!({"a": 1}),
        json!({"b": 2}),
        json!({"a": 9, "c": {"d": 4}}),
    ];
    let merged = merge_multiple(values.iter(), MergeStrategy::PreferRight);
    assert_eq!(merged, json!({"a": 9, "b": 2, "c": {"d": 4}}));

    let empty: Vec<serde_json::Value> = Vec::new();
    assert_eq!(
        merge_multiple(empty.iter(), MergeStrategy::DeepMerge),
        json!({})
    );
}

#[test]
fn test_id_generator_basics() {
    let id_gen = IdGenerator::new();
    let run = id_gen.generate_run_id();
    assert!(run.starts_with("run-"));
    assert_ne!(run, id_gen.generate_run_id());
}
