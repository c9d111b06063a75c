use async_trait::async_trait;
use serde_json::{Value, json};

use super::{config_str, config_usize, value_text};
use crate::errors::ErrorEvent;
use crate::node::{HandlerError, NodeContext, NodeHandler, StateUpdate};
use crate::registry::RegistryError;
use crate::spec::ConfigMap;
use crate::state::StateSnapshot;

const DEFAULT_INPUT_KEY: &str = "user_input";

/// Entry-point handler that normalizes the run's initial input.
///
/// Reads the configured input key, trims surrounding whitespace, applies an
/// optional case transform, and writes the result under the output key.
/// Empty input is recorded as a non-fatal error event so the run can still
/// route (for example to a clarification branch); configured validation
/// rules promote bad input to a fatal handler error instead.
///
/// Config:
/// - `input_key`: state key to read (default `"user_input"`)
/// - `output_key`: state key to write (default: same as `input_key`)
/// - `transform`: `"lowercase"` or `"uppercase"` (trimming always happens)
/// - `validate`: object with `required` (bool), `min_length`, `max_length`
#[derive(Debug)]
pub struct InputNode {
    input_key: String,
    output_key: String,
    transform: Option<Transform>,
    required: bool,
    min_length: Option<usize>,
    max_length: Option<usize>,
}

#[derive(Clone, Copy, Debug)]
enum Transform {
    Lowercase,
    Uppercase,
}

impl InputNode {
    pub fn from_config(node_id: &str, config: &ConfigMap) -> Result<Self, RegistryError> {
        let input_key = config_str(config, "input_key")
            .unwrap_or(DEFAULT_INPUT_KEY)
            .to_string();
        let output_key = config_str(config, "output_key")
            .unwrap_or(&input_key)
            .to_string();

        let transform = match config_str(config, "transform") {
            None | Some("trim") | Some("strip") => None,
            Some("lowercase") => Some(Transform::Lowercase),
            Some("uppercase") => Some(Transform::Uppercase),
            Some(other) => {
                return Err(RegistryError::construction(
                    node_id,
                    format!("unknown transform '{other}'"),
                ));
            }
        };

        let validate = config.get("validate").and_then(Value::as_object);
        let required = validate
            .and_then(|rules| rules.get("required"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let min_length = validate.and_then(|rules| config_usize(rules, "min_length"));
        let max_length = validate.and_then(|rules| config_usize(rules, "max_length"));

        Ok(Self {
            input_key,
            output_key,
            transform,
            required,
            min_length,
            max_length,
        })
    }
}

#[async_trait]
impl NodeHandler for InputNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<StateUpdate, HandlerError> {
        let raw = value_text(snapshot.get(&self.input_key));
        let mut text = raw.trim().to_string();
        match self.transform {
            Some(Transform::Lowercase) => text = text.to_lowercase(),
            Some(Transform::Uppercase) => text = text.to_uppercase(),
            None => {}
        }

        if self.required && text.is_empty() {
            return Err(HandlerError::MissingInput {
                what: "required input text",
            });
        }
        let length = text.chars().count();
        if let Some(min) = self.min_length {
            if length < min {
                return Err(HandlerError::Validation {
                    detail: format!("input must be at least {min} characters, got {length}"),
                });
            }
        }
        if let Some(max) = self.max_length {
            if length > max {
                return Err(HandlerError::Validation {
                    detail: format!("input must be at most {max} characters, got {length}"),
                });
            }
        }

        ctx.emit("input", format!("accepted {length} chars"))?;

        let mut update = StateUpdate::new().with_value(self.output_key.clone(), json!(text));
        if text.is_empty() {
            update = update.with_error(ErrorEvent::node(
                ctx.node_id.clone(),
                ctx.step,
                format!("empty input under key '{}'", self.input_key),
            ));
        }
        Ok(update)
    }
}
