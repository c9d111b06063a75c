//! Maps node types to handler factories.
//!
//! The registry is consulted once per node while a spec compiles; the
//! resulting handler instances are frozen into the
//! [`CompiledGraph`](crate::graphs::CompiledGraph). Execution never touches
//! the registry again, so embedders can share one registry across threads
//! and runs without synchronization.

use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::node::NodeHandler;
use crate::nodes::{AggregateNode, ComputeNode, InputNode, RouterNode};
use crate::spec::ConfigMap;
use crate::types::NodeType;

/// Builds a handler for one node from its id and config.
///
/// Factories run at compile time, so config mistakes surface before any run
/// starts rather than mid-execution.
pub type HandlerFactory =
    Arc<dyn Fn(&str, &ConfigMap) -> Result<Arc<dyn NodeHandler>, RegistryError> + Send + Sync>;

/// Registry of node type → handler factory.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use loomflow::node::{HandlerError, NodeContext, NodeHandler, StateUpdate};
/// use loomflow::registry::NodeRegistry;
/// use loomflow::state::StateSnapshot;
/// use loomflow::types::NodeType;
/// use serde_json::json;
///
/// struct Uppercase;
///
/// #[async_trait]
/// impl NodeHandler for Uppercase {
///     async fn run(
///         &self,
///         snapshot: StateSnapshot,
///         _ctx: NodeContext,
///     ) -> Result<StateUpdate, HandlerError> {
///         let text = snapshot.get_str("text").unwrap_or_default().to_uppercase();
///         Ok(StateUpdate::new().with_value("text", json!(text)))
///     }
/// }
///
/// let mut registry = NodeRegistry::with_builtins();
/// registry.register_fn(NodeType::custom("uppercase"), |_id, _config| {
///     Ok(Arc::new(Uppercase) as Arc<dyn NodeHandler>)
/// });
/// assert!(registry.resolves(&NodeType::custom("uppercase")));
/// ```
#[derive(Clone, Default)]
pub struct NodeRegistry {
    factories: FxHashMap<NodeType, HandlerFactory>,
}

impl NodeRegistry {
    /// An empty registry. Rarely what you want; see [`with_builtins`](Self::with_builtins).
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the four built-in node types installed.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_fn(NodeType::Input, |id, config| {
            Ok(Arc::new(InputNode::from_config(id, config)?) as Arc<dyn NodeHandler>)
        });
        registry.register_fn(NodeType::Router, |id, config| {
            Ok(Arc::new(RouterNode::from_config(id, config)?) as Arc<dyn NodeHandler>)
        });
        registry.register_fn(NodeType::Compute, |id, config| {
            Ok(Arc::new(ComputeNode::from_config(id, config)?) as Arc<dyn NodeHandler>)
        });
        registry.register_fn(NodeType::Aggregate, |id, config| {
            Ok(Arc::new(AggregateNode::from_config(id, config)?) as Arc<dyn NodeHandler>)
        });
        registry
    }

    /// Install a factory for a node type, replacing any previous one.
    pub fn register(&mut self, node_type: NodeType, factory: HandlerFactory) -> &mut Self {
        self.factories.insert(node_type, factory);
        self
    }

    /// Convenience wrapper around [`register`](Self::register) for closures.
    pub fn register_fn<F>(&mut self, node_type: NodeType, factory: F) -> &mut Self
    where
        F: Fn(&str, &ConfigMap) -> Result<Arc<dyn NodeHandler>, RegistryError>
            + Send
            + Sync
            + 'static,
    {
        self.register(node_type, Arc::new(factory))
    }

    /// Whether a factory exists for the type.
    pub fn resolves(&self, node_type: &NodeType) -> bool {
        self.factories.contains_key(node_type)
    }

    /// Build a handler for one node.
    pub fn create(
        &self,
        node_type: &NodeType,
        node_id: &str,
        config: &ConfigMap,
    ) -> Result<Arc<dyn NodeHandler>, RegistryError> {
        let factory = self
            .factories
            .get(node_type)
            .ok_or_else(|| RegistryError::UnknownType {
                tag: node_type.as_tag().to_string(),
                supported: self.type_tags().join(", "),
            })?;
        factory(node_id, config)
    }

    /// Registered type tags, sorted for stable messages.
    pub fn type_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .factories
            .keys()
            .map(|t| t.as_tag().to_string())
            .collect();
        tags.sort_unstable();
        tags
    }
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("types", &self.type_tags())
            .finish()
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum RegistryError {
    #[error("no handler registered for node type '{tag}'")]
    #[diagnostic(
        code(loomflow::registry::unknown_type),
        help("Registered types: {supported}. Register custom node types before compiling.")
    )]
    UnknownType { tag: String, supported: String },

    #[error("handler construction failed for node '{node_id}': {detail}")]
    #[diagnostic(code(loomflow::registry::construction))]
    Construction { node_id: String, detail: String },
}

impl RegistryError {
    /// Shorthand for a construction failure on `node_id`.
    pub fn construction(node_id: &str, detail: impl Into<String>) -> Self {
        Self::Construction {
            node_id: node_id.to_string(),
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_resolve() {
        let registry = NodeRegistry::with_builtins();
        for node_type in [
            NodeType::Input,
            NodeType::Router,
            NodeType::Compute,
            NodeType::Aggregate,
        ] {
            assert!(registry.resolves(&node_type), "{node_type} should resolve");
        }
        assert!(!registry.resolves(&NodeType::custom("fancy")));
    }

    #[test]
    fn unknown_type_lists_supported_tags() {
        let registry = NodeRegistry::with_builtins();
        let err = registry
            .create(&NodeType::custom("fancy"), "n1", &ConfigMap::default())
            .err()
            .unwrap();
        match err {
            RegistryError::UnknownType { tag, supported } => {
                assert_eq!(tag, "fancy");
                assert_eq!(supported, "aggregate, compute, input, router");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn registration_replaces_existing_factory() {
        let mut registry = NodeRegistry::with_builtins();
        registry.register_fn(NodeType::Input, |id, _| {
            Err(RegistryError::construction(id, "always fails"))
        });
        let err = registry
            .create(&NodeType::Input, "entry", &ConfigMap::default())
            .err()
            .unwrap();
        assert!(matches!(err, RegistryError::Construction { .. }));
    }
}
