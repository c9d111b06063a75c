use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use loomflow::node::{HandlerError, NodeContext, NodeHandler, StateUpdate, UsageMetrics};
use loomflow::registry::{NodeRegistry, RegistryError};
use loomflow::state::StateSnapshot;
use loomflow::types::NodeType;

/// Appends its own node id to the `path` array so tests can assert traversal
/// order from the final state.
#[derive(Debug, Clone)]
pub struct PathNode {
    pub name: String,
}

#[async_trait]
impl NodeHandler for PathNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<StateUpdate, HandlerError> {
        Ok(StateUpdate::new().with_value("path", push_path(&snapshot, &self.name)))
    }
}

/// Like [`PathNode`], but sleeps before recording itself.
#[derive(Debug, Clone)]
pub struct DelayedNode {
    pub name: String,
    pub delay: Duration,
}

#[async_trait]
impl NodeHandler for DelayedNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<StateUpdate, HandlerError> {
        tokio::time::sleep(self.delay).await;
        Ok(StateUpdate::new().with_value("path", push_path(&snapshot, &self.name)))
    }
}

/// Fails every invocation with a validation error.
#[derive(Debug, Clone)]
pub struct FailingNode {
    pub message: String,
}

#[async_trait]
impl NodeHandler for FailingNode {
    async fn run(
        &self,
        _snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<StateUpdate, HandlerError> {
        Err(HandlerError::Validation {
            detail: self.message.clone(),
        })
    }
}

/// Writes one fixed key/value pair into the state.
#[derive(Debug, Clone)]
pub struct SetValueNode {
    pub key: String,
    pub value: Value,
}

#[async_trait]
impl NodeHandler for SetValueNode {
    async fn run(
        &self,
        _snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<StateUpdate, HandlerError> {
        Ok(StateUpdate::new().with_value(self.key.clone(), self.value.clone()))
    }
}

/// Reports usage metrics without touching the state.
#[derive(Debug, Clone)]
pub struct MetricsNode {
    pub metrics: UsageMetrics,
}

#[async_trait]
impl NodeHandler for MetricsNode {
    async fn run(
        &self,
        _snapshot: StateSnapshot,
        _ctx: NodeContext,
    ) -> Result<StateUpdate, HandlerError> {
        Ok(StateUpdate::new().with_metrics(self.metrics))
    }
}

/// Emits one node-scoped event and changes nothing.
#[derive(Debug, Clone)]
pub struct EmitNode {
    pub message: String,
}

#[async_trait]
impl NodeHandler for EmitNode {
    async fn run(
        &self,
        _snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<StateUpdate, HandlerError> {
        ctx.emit("note", self.message.clone())?;
        Ok(StateUpdate::new())
    }
}

fn push_path(snapshot: &StateSnapshot, name: &str) -> Value {
    let mut path = snapshot
        .get("path")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    path.push(json!(name));
    Value::Array(path)
}

/// The built-in registry extended with the stub types above.
///
/// Stub configs: `delay` reads `delay_ms` (default 5), `fail` reads `message`
/// (default "boom"), `set` requires `key` and takes an optional `value`,
/// `metrics` reads `tokens` and `cost`, `emit` reads `message` (default: the
/// node id). `path` takes no config.
#[allow(dead_code)]
pub fn stub_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::with_builtins();
    registry
        .register_fn(NodeType::custom("path"), |id, _config| {
            Ok(Arc::new(PathNode {
                name: id.to_string(),
            }) as Arc<dyn NodeHandler>)
        })
        .register_fn(NodeType::custom("delay"), |id, config| {
            let millis = config.get("delay_ms").and_then(Value::as_u64).unwrap_or(5);
            Ok(Arc::new(DelayedNode {
                name: id.to_string(),
                delay: Duration::from_millis(millis),
            }) as Arc<dyn NodeHandler>)
        })
        .register_fn(NodeType::custom("fail"), |_id, config| {
            let message = config
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("boom")
                .to_string();
            Ok(Arc::new(FailingNode { message }) as Arc<dyn NodeHandler>)
        })
        .register_fn(NodeType::custom("set"), |id, config| {
            let key = config
                .get("key")
                .and_then(Value::as_str)
                .ok_or_else(|| RegistryError::construction(id, "set node needs a 'key' entry"))?
                .to_string();
            let value = config.get("value").cloned().unwrap_or(Value::Null);
            Ok(Arc::new(SetValueNode { key, value }) as Arc<dyn NodeHandler>)
        })
        .register_fn(NodeType::custom("metrics"), |_id, config| {
            let tokens = config.get("tokens").and_then(Value::as_u64).unwrap_or(0);
            let cost = config.get("cost").and_then(Value::as_f64).unwrap_or(0.0);
            Ok(Arc::new(MetricsNode {
                metrics: UsageMetrics { tokens, cost },
            }) as Arc<dyn NodeHandler>)
        })
        .register_fn(NodeType::custom("emit"), |id, config| {
            let message = config
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or(id)
                .to_string();
            Ok(Arc::new(EmitNode { message }) as Arc<dyn NodeHandler>)
        });
    registry
}
