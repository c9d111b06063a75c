//! JSON merge helpers shared by the aggregation node and run metadata.

use serde_json::{Map, Value};

/// Conflict resolution for [`deep_merge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeStrategy {
    /// Keep the left value when both sides define the same leaf.
    PreferLeft,
    /// Keep the right value when both sides define the same leaf.
    #[default]
    PreferRight,
    /// Recurse into objects and concatenate arrays; conflicting scalars
    /// resolve to the right value.
    DeepMerge,
}

/// Merges two JSON values.
///
/// Objects merge key by key regardless of strategy; the strategy only
/// decides array handling and scalar conflicts.
///
/// # Examples
///
/// ```rust
/// use loomflow::utils::json_ext::{deep_merge, MergeStrategy};
/// use serde_json::json;
///
/// let left = json!({"a": 1, "b": {"x": 10}});
/// let right = json!({"b": {"y": 20}, "c": 3});
///
/// let merged = deep_merge(&left, &right, MergeStrategy::DeepMerge);
/// assert_eq!(merged, json!({"a": 1, "b": {"x": 10, "y": 20}, "c": 3}));
/// ```
#[must_use]
pub fn deep_merge(left: &Value, right: &Value, strategy: MergeStrategy) -> Value {
    match (left, right) {
        (Value::Object(left_obj), Value::Object(right_obj)) => {
            let mut merged = Map::new();
            for (key, value) in left_obj {
                match right_obj.get(key) {
                    Some(other) => {
                        merged.insert(key.clone(), deep_merge(value, other, strategy));
                    }
                    None => {
                        merged.insert(key.clone(), value.clone());
                    }
                }
            }
            for (key, value) in right_obj {
                if !left_obj.contains_key(key) {
                    merged.insert(key.clone(), value.clone());
                }
            }
            Value::Object(merged)
        }
        (Value::Array(left_arr), Value::Array(right_arr)) => match strategy {
            MergeStrategy::PreferLeft => Value::Array(left_arr.clone()),
            MergeStrategy::PreferRight => Value::Array(right_arr.clone()),
            MergeStrategy::DeepMerge => {
                let mut joined = left_arr.clone();
                joined.extend(right_arr.iter().cloned());
                Value::Array(joined)
            }
        },
        (left_val, right_val) => match strategy {
            MergeStrategy::PreferLeft => left_val.clone(),
            MergeStrategy::PreferRight | MergeStrategy::DeepMerge => right_val.clone(),
        },
    }
}

/// Folds [`deep_merge`] over a sequence of values, starting from an empty
/// object.
///
/// # Examples
///
/// ```rust
/// use loomflow::utils::json_ext::{merge_multiple, MergeStrategy};
/// use serde_json::json;
///
/// let values = vec![json!({"a": 1}), json!({"b": 2}), json!({"a": 9})];
/// let merged = merge_multiple(values.iter(), MergeStrategy::PreferRight);
/// assert_eq!(merged, json!({"a": 9, "b": 2}));
/// ```
#[must_use]
pub fn merge_multiple<'a, I>(values: I, strategy: MergeStrategy) -> Value
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut merged = Value::Object(Map::new());
    for value in values {
        merged = deep_merge(&merged, value, strategy);
    }
    merged
}
