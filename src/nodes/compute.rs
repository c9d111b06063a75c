use async_trait::async_trait;
use serde_json::{Map, Value, json};

use super::{config_str, render_template, value_text};
use crate::node::{HandlerError, NodeContext, NodeHandler, StateUpdate, UsageMetrics};
use crate::registry::RegistryError;
use crate::spec::{ConfigMap, SOURCE_ID_KEY};
use crate::state::StateSnapshot;

const DEFAULT_OUTPUT_KEY: &str = "result";

/// General-purpose work node.
///
/// With a `source_id` config the node builds a request and invokes the
/// declared source through the run's capability; without one it renders a
/// `{placeholder}` template over the current state. Either way the result
/// lands under `output_key` (default `"result"`).
///
/// Source mode builds its request text from, in order: `prompt_template`
/// (rendered against state), `prompt` (static), or the `input_key` state
/// value (default `"user_input"`). An optional `params` config object is
/// forwarded verbatim alongside the prompt. A response shaped
/// `{"output": ..., "usage": {"tokens": n, "cost": x}}` is unwrapped and its
/// usage folded into the run's metrics; any other response value is stored
/// as-is.
#[derive(Debug)]
pub struct ComputeNode {
    source_id: Option<String>,
    template: Option<String>,
    prompt: Option<String>,
    prompt_template: Option<String>,
    params: Option<Value>,
    input_key: String,
    output_key: String,
}

impl ComputeNode {
    pub fn from_config(node_id: &str, config: &ConfigMap) -> Result<Self, RegistryError> {
        let source_id = config_str(config, SOURCE_ID_KEY).map(str::to_string);
        let template = config_str(config, "template").map(str::to_string);
        if source_id.is_none() && template.is_none() {
            return Err(RegistryError::construction(
                node_id,
                "compute node needs either 'source_id' or 'template'",
            ));
        }

        Ok(Self {
            source_id,
            template,
            prompt: config_str(config, "prompt").map(str::to_string),
            prompt_template: config_str(config, "prompt_template").map(str::to_string),
            params: config.get("params").cloned(),
            input_key: config_str(config, "input_key")
                .unwrap_or("user_input")
                .to_string(),
            output_key: config_str(config, "output_key")
                .unwrap_or(DEFAULT_OUTPUT_KEY)
                .to_string(),
        })
    }

    fn build_prompt(&self, snapshot: &StateSnapshot) -> String {
        if let Some(template) = &self.prompt_template {
            render_template(template, snapshot)
        } else if let Some(prompt) = &self.prompt {
            prompt.clone()
        } else {
            value_text(snapshot.get(&self.input_key))
        }
    }
}

/// Unwrap the `{"output": ..., "usage": ...}` response convention.
fn split_response(response: Value) -> (Value, Option<UsageMetrics>) {
    match response {
        Value::Object(mut map) if map.contains_key("output") => {
            let usage = map
                .remove("usage")
                .and_then(|u| serde_json::from_value::<UsageMetrics>(u).ok());
            let output = map.remove("output").unwrap_or(Value::Null);
            (output, usage)
        }
        other => (other, None),
    }
}

#[async_trait]
impl NodeHandler for ComputeNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<StateUpdate, HandlerError> {
        if let Some(source_id) = &self.source_id {
            let prompt = self.build_prompt(&snapshot);
            if prompt.trim().is_empty() {
                return Err(HandlerError::MissingInput { what: "prompt" });
            }

            let mut request = Map::new();
            request.insert("prompt".to_string(), json!(prompt));
            if let Some(params) = &self.params {
                request.insert("params".to_string(), params.clone());
            }

            let response = ctx.invoke_source(source_id, Value::Object(request)).await?;
            let (output, usage) = split_response(response);
            ctx.emit("compute", format!("source '{source_id}' responded"))?;

            let mut update = StateUpdate::new().with_value(self.output_key.clone(), output);
            if let Some(usage) = usage {
                update = update.with_metrics(usage);
            }
            return Ok(update);
        }

        // Template mode; from_config guarantees the template is present.
        let template = self.template.as_deref().unwrap_or_default();
        let rendered = render_template(template, &snapshot);
        ctx.emit("compute", "rendered template")?;
        Ok(StateUpdate::new().with_value(self.output_key.clone(), json!(rendered)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::nodes::testing;
    use crate::sources::{SourceCapability, SourceError, SourceTable};
    use crate::spec::{SourceKind, SourceSpec};

    struct Echo;

    #[async_trait]
    impl SourceCapability for Echo {
        async fn invoke(
            &self,
            _kind: SourceKind,
            _config: &ConfigMap,
            request: Value,
        ) -> Result<Value, SourceError> {
            let prompt = request["prompt"].as_str().unwrap_or_default();
            Ok(json!({
                "output": format!("echo: {prompt}"),
                "usage": {"tokens": 7, "cost": 0.001},
            }))
        }
    }

    fn node(config: Value) -> ComputeNode {
        let config: ConfigMap = serde_json::from_value(config).unwrap();
        ComputeNode::from_config("work", &config).unwrap()
    }

    fn echo_sources() -> (Arc<SourceTable>, Arc<Echo>) {
        let table = SourceTable::from_sources(&[SourceSpec {
            id: "model".to_string(),
            kind: SourceKind::ModelCall,
            config: ConfigMap::default(),
        }]);
        (Arc::new(table), Arc::new(Echo))
    }

    #[tokio::test]
    async fn source_mode_unwraps_output_and_usage() {
        let handler = node(json!({"source_id": "model"}));
        let (table, capability) = echo_sources();
        let (ctx, _events) = testing::context_with_sources("work", table, capability);
        let snapshot = StateSnapshot::from_json(json!({"user_input": "hi"}));

        let update = handler.run(snapshot, ctx).await.unwrap();
        assert_eq!(update.values.unwrap()["result"], json!("echo: hi"));
        let metrics = update.metrics.unwrap();
        assert_eq!(metrics.tokens, 7);
        assert!((metrics.cost - 0.001).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn prompt_template_renders_before_invoking() {
        let handler = node(json!({
            "source_id": "model",
            "prompt_template": "answer {question} briefly",
        }));
        let (table, capability) = echo_sources();
        let (ctx, _events) = testing::context_with_sources("work", table, capability);
        let snapshot = StateSnapshot::from_json(json!({"question": "why"}));

        let update = handler.run(snapshot, ctx).await.unwrap();
        assert_eq!(
            update.values.unwrap()["result"],
            json!("echo: answer why briefly")
        );
    }

    #[tokio::test]
    async fn empty_prompt_is_fatal() {
        let handler = node(json!({"source_id": "model"}));
        let (table, capability) = echo_sources();
        let (ctx, _events) = testing::context_with_sources("work", table, capability);
        let snapshot = StateSnapshot::from_json(json!({}));

        let err = handler.run(snapshot, ctx).await.unwrap_err();
        assert!(matches!(err, HandlerError::MissingInput { .. }));
    }

    #[tokio::test]
    async fn unknown_source_surfaces_source_error() {
        let handler = node(json!({"source_id": "nope"}));
        let (table, capability) = echo_sources();
        let (ctx, _events) = testing::context_with_sources("work", table, capability);
        let snapshot = StateSnapshot::from_json(json!({"user_input": "hi"}));

        let err = handler.run(snapshot, ctx).await.unwrap_err();
        assert!(matches!(
            err,
            HandlerError::Source(SourceError::UnknownSource { .. })
        ));
    }

    #[tokio::test]
    async fn template_mode_writes_rendered_text() {
        let handler = node(json!({
            "template": "summary of {topic}",
            "output_key": "summary",
        }));
        let (ctx, _events) = testing::context("work");
        let snapshot = StateSnapshot::from_json(json!({"topic": "queues"}));

        let update = handler.run(snapshot, ctx).await.unwrap();
        assert_eq!(update.values.unwrap()["summary"], json!("summary of queues"));
    }

    #[test]
    fn requires_source_or_template() {
        let config: ConfigMap = serde_json::from_value(json!({})).unwrap();
        assert!(ComputeNode::from_config("work", &config).is_err());
    }

    #[test]
    fn bare_response_is_stored_verbatim() {
        let (output, usage) = split_response(json!({"rows": [1, 2]}));
        assert_eq!(output, json!({"rows": [1, 2]}));
        assert!(usage.is_none());
    }
}
