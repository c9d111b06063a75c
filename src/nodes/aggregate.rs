use async_trait::async_trait;
use serde_json::{Value, json};

use super::{config_str, value_is_empty, value_text};
use crate::node::{HandlerError, NodeContext, NodeHandler, StateUpdate};
use crate::registry::RegistryError;
use crate::spec::ConfigMap;
use crate::state::StateSnapshot;
use crate::utils::json_ext::{MergeStrategy, merge_multiple};

const DEFAULT_OUTPUT_KEY: &str = "final_output";
const DEFAULT_SEPARATOR: &str = "\n\n";

/// Terminal handler that folds several state keys into one output value.
///
/// Keys are visited in declared order; missing or empty values (null, `""`,
/// `[]`, `{}`) are skipped.
///
/// Config:
/// - `source_keys`: state keys to combine (required, at least one)
/// - `strategy`: `"merge"`, `"concat"`, `"select"`, or `"collect"`
///   (default `"merge"`)
/// - `output_key`: state key to write (default `"final_output"`)
/// - `separator`: joiner for `concat` (default `"\n\n"`)
/// - `include_summary`: wrap the result with the consumed keys and their
///   count (default `false`)
#[derive(Debug)]
pub struct AggregateNode {
    strategy: Strategy,
    source_keys: Vec<String>,
    output_key: String,
    separator: String,
    include_summary: bool,
}

#[derive(Clone, Copy, Debug)]
enum Strategy {
    /// Deep-merge the object values; non-objects are ignored.
    Merge,
    /// Join string renderings with the separator.
    Concat,
    /// First non-empty value wins.
    Select,
    /// Build an object keyed by source key.
    Collect,
}

impl AggregateNode {
    pub fn from_config(node_id: &str, config: &ConfigMap) -> Result<Self, RegistryError> {
        let strategy = match config_str(config, "strategy").unwrap_or("merge") {
            "merge" => Strategy::Merge,
            "concat" => Strategy::Concat,
            "select" => Strategy::Select,
            "collect" => Strategy::Collect,
            other => {
                return Err(RegistryError::construction(
                    node_id,
                    format!("unknown aggregation strategy '{other}'"),
                ));
            }
        };

        let source_keys = match config.get("source_keys") {
            Some(Value::Array(items)) => {
                let mut keys = Vec::with_capacity(items.len());
                for item in items {
                    match item.as_str() {
                        Some(key) => keys.push(key.to_string()),
                        None => {
                            return Err(RegistryError::construction(
                                node_id,
                                "source_keys entries must be strings",
                            ));
                        }
                    }
                }
                keys
            }
            Some(_) => {
                return Err(RegistryError::construction(
                    node_id,
                    "source_keys must be an array of state keys",
                ));
            }
            None => Vec::new(),
        };
        if source_keys.is_empty() {
            return Err(RegistryError::construction(
                node_id,
                "source_keys must name at least one state key",
            ));
        }

        Ok(Self {
            strategy,
            source_keys,
            output_key: config_str(config, "output_key")
                .unwrap_or(DEFAULT_OUTPUT_KEY)
                .to_string(),
            separator: config_str(config, "separator")
                .unwrap_or(DEFAULT_SEPARATOR)
                .to_string(),
            include_summary: config
                .get("include_summary")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }

    fn gather<'a>(&'a self, snapshot: &'a StateSnapshot) -> Vec<(&'a str, &'a Value)> {
        self.source_keys
            .iter()
            .filter_map(|key| {
                snapshot
                    .get(key)
                    .filter(|value| !value_is_empty(value))
                    .map(|value| (key.as_str(), value))
            })
            .collect()
    }
}

fn concat_fragment(key: &str, value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => {
            let joined = items
                .iter()
                .map(|item| value_text(Some(item)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{key}: {joined}")
        }
        Value::Object(_) => format!("{key}: {value}"),
        other => value_text(Some(other)),
    }
}

#[async_trait]
impl NodeHandler for AggregateNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<StateUpdate, HandlerError> {
        let gathered = self.gather(&snapshot);

        let result = match self.strategy {
            Strategy::Merge => merge_multiple(
                gathered
                    .iter()
                    .map(|(_, value)| *value)
                    .filter(|value| value.is_object()),
                MergeStrategy::DeepMerge,
            ),
            Strategy::Concat => Value::String(
                gathered
                    .iter()
                    .map(|(key, value)| concat_fragment(key, value))
                    .collect::<Vec<_>>()
                    .join(&self.separator),
            ),
            Strategy::Select => gathered
                .first()
                .map(|(_, value)| (*value).clone())
                .unwrap_or(Value::Null),
            Strategy::Collect => Value::Object(
                gathered
                    .iter()
                    .map(|(key, value)| (key.to_string(), (*value).clone()))
                    .collect(),
            ),
        };

        let output = if self.include_summary {
            json!({
                "result": result,
                "keys": gathered.iter().map(|(key, _)| *key).collect::<Vec<_>>(),
                "count": gathered.len(),
            })
        } else {
            result
        };

        ctx.emit(
            "aggregate",
            format!(
                "combined {} of {} source keys",
                gathered.len(),
                self.source_keys.len()
            ),
        )?;

        Ok(StateUpdate::new().with_value(self.output_key.clone(), output))
    }
}
