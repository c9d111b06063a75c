//! Workflow specification data model.
//!
//! A [`WorkflowSpec`] is inert data: nodes, edges, queues, and external
//! source references, typically parsed from JSON. Nothing here executes;
//! validation lives in [`crate::validation`], compilation in
//! [`crate::graphs`]. The spec is immutable once constructed; compilation
//! snapshots whatever it needs and runs never touch the spec again.
//!
//! # Wire format
//!
//! The JSON shape accepts the aliases produced by common workflow designers:
//! `start_node` for `entry_node`, `from_node` for `from`, and `metadata` for
//! a node's `config`. An edge's `to` is either a single id or an ordered
//! list (fan-out).
//!
//! # Examples
//!
//! ```rust
//! use loomflow::spec::WorkflowSpec;
//!
//! let spec = WorkflowSpec::from_json(r#"{
//!     "nodes": [
//!         {"id": "entry", "type": "input"},
//!         {"id": "work", "type": "compute"}
//!     ],
//!     "edges": [{"from": "entry", "to": "work"}],
//!     "entry_node": "entry"
//! }"#).unwrap();
//!
//! assert_eq!(spec.nodes.len(), 2);
//! assert_eq!(spec.entry_node, "entry");
//! ```

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Opaque configuration map attached to nodes and sources.
///
/// The compiler never interprets these; only the owning handler (or source
/// capability) reads them.
pub type ConfigMap = FxHashMap<String, Value>;

/// Config key through which a node references a declared source.
pub const SOURCE_ID_KEY: &str = "source_id";

/// Config key declaring a node's expected unit cost per invocation, debited
/// against the cost window of any queue its inbound edge is bound to.
pub const COST_ESTIMATE_KEY: &str = "cost_estimate";

/// Complete declarative description of a workflow.
///
/// Everything a run needs is declared here: the node set, the edge set with
/// conditions and queue bindings, queue bandwidth configs, external source
/// references, the entry node, and the carry-forward key set protected by
/// the merge policy.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkflowSpec {
    /// Nodes, in declaration order.
    pub nodes: Vec<NodeSpec>,
    /// Edges, in declaration order. Ordering is significant: routing
    /// resolves them first-match-wins.
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
    /// Rate-limited queues governing queue-bound edges.
    #[serde(default)]
    pub queues: Vec<QueueSpec>,
    /// External source references nodes may invoke.
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
    /// Id of the node where every run begins.
    #[serde(alias = "start_node")]
    pub entry_node: String,
    /// State keys re-asserted after every merge (see
    /// [`RunState::apply`](crate::state::RunState::apply)).
    #[serde(default)]
    pub carry_forward: Vec<String>,
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Optional free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional spec version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl WorkflowSpec {
    /// Start building a spec programmatically.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use loomflow::spec::WorkflowSpec;
    ///
    /// let spec = WorkflowSpec::builder("entry")
    ///     .node("entry", "input")
    ///     .node("work", "compute")
    ///     .edge("entry", "work")
    ///     .build();
    ///
    /// assert_eq!(spec.edges.len(), 1);
    /// ```
    pub fn builder(entry_node: impl Into<String>) -> WorkflowSpecBuilder {
        WorkflowSpecBuilder::new(entry_node)
    }

    /// Parse a spec from JSON text.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Parse a spec from an already-deserialized JSON value.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Look up a node declaration by id.
    pub fn node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Look up a source declaration by id.
    pub fn source(&self, id: &str) -> Option<&SourceSpec> {
        self.sources.iter().find(|s| s.id == id)
    }

    /// Look up a queue declaration by id.
    pub fn queue(&self, id: &str) -> Option<&QueueSpec> {
        self.queues.iter().find(|q| q.id == id)
    }

    /// Ordered outgoing edges declared for `node_id`.
    pub fn edges_from<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a EdgeSpec> {
        self.edges.iter().filter(move |e| e.from == node_id)
    }
}

/// A single node declaration.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NodeSpec {
    /// Unique, non-empty node id.
    pub id: String,
    /// Type tag resolved against the registry at compile time.
    #[serde(rename = "type")]
    pub type_tag: String,
    /// Handler-specific configuration; opaque to the compiler.
    #[serde(default, alias = "metadata")]
    pub config: ConfigMap,
}

impl NodeSpec {
    /// Construct a node with an empty config.
    pub fn new(id: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_tag: type_tag.into(),
            config: ConfigMap::default(),
        }
    }

    /// Attach a config entry.
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    /// The source id this node references, if any.
    pub fn source_id(&self) -> Option<&str> {
        self.config.get(SOURCE_ID_KEY).and_then(Value::as_str)
    }

    /// The declared per-invocation unit cost, zero when absent.
    pub fn cost_estimate(&self) -> u64 {
        self.config
            .get(COST_ESTIMATE_KEY)
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }
}

/// A directed connection between nodes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EdgeSpec {
    /// Source node id.
    #[serde(alias = "from_node")]
    pub from: String,
    /// Target node id, or an ordered list of ids for sequential fan-out.
    pub to: EdgeTarget,
    /// Predicate expression over state; the edge fires only when it holds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Queue whose bandwidth governs traversal of this edge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
}

impl EdgeSpec {
    /// A plain edge between two nodes.
    pub fn new(from: impl Into<String>, to: impl Into<EdgeTarget>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            condition: None,
            queue: None,
        }
    }

    /// Attach a condition expression.
    #[must_use]
    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Bind traversal to a queue's bandwidth.
    #[must_use]
    pub fn via_queue(mut self, queue_id: impl Into<String>) -> Self {
        self.queue = Some(queue_id.into());
        self
    }
}

/// Target of an edge: one node, or an ordered fan-out list.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum EdgeTarget {
    /// A single downstream node.
    One(String),
    /// An ordered list of downstream nodes, each visited to completion
    /// before the next.
    Many(Vec<String>),
}

impl EdgeTarget {
    /// The target ids in declared order.
    pub fn ids(&self) -> &[String] {
        match self {
            EdgeTarget::One(id) => std::slice::from_ref(id),
            EdgeTarget::Many(ids) => ids,
        }
    }

    /// Whether this target was declared as a list.
    #[must_use]
    pub fn is_fan_out(&self) -> bool {
        matches!(self, EdgeTarget::Many(_))
    }
}

impl From<&str> for EdgeTarget {
    fn from(id: &str) -> Self {
        EdgeTarget::One(id.to_string())
    }
}

impl From<String> for EdgeTarget {
    fn from(id: String) -> Self {
        EdgeTarget::One(id)
    }
}

impl From<Vec<String>> for EdgeTarget {
    fn from(ids: Vec<String>) -> Self {
        EdgeTarget::Many(ids)
    }
}

impl From<Vec<&str>> for EdgeTarget {
    fn from(ids: Vec<&str>) -> Self {
        EdgeTarget::Many(ids.into_iter().map(str::to_string).collect())
    }
}

/// A rate-limited queue between two nodes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct QueueSpec {
    /// Unique queue id, referenced by edges via `queue`.
    pub id: String,
    /// Source node id.
    #[serde(alias = "from_node")]
    pub from: String,
    /// Target node id.
    pub to: String,
    /// Bandwidth limits; absent means unthrottled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<BandwidthSpec>,
    /// Weighted subdivisions of this queue's budget.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_queues: Vec<SubQueueSpec>,
}

impl QueueSpec {
    /// Declare an unthrottled queue between two nodes.
    pub fn new(id: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            to: to.into(),
            bandwidth: None,
            sub_queues: Vec::new(),
        }
    }

    /// Attach bandwidth limits.
    #[must_use]
    pub fn with_bandwidth(mut self, bandwidth: BandwidthSpec) -> Self {
        self.bandwidth = Some(bandwidth);
        self
    }

    /// Add a weighted sub-queue.
    #[must_use]
    pub fn with_sub_queue(mut self, id: impl Into<String>, weight: f64) -> Self {
        self.sub_queues.push(SubQueueSpec {
            id: id.into(),
            weight,
        });
        self
    }
}

/// Bandwidth limits for a queue. All dimensions are optional and independent;
/// an absent dimension is unlimited.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BandwidthSpec {
    /// Messages admitted per rolling second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_messages_per_second: Option<u32>,
    /// Requests admitted per rolling minute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_requests_per_minute: Option<u32>,
    /// Unit cost admitted per rolling minute.
    #[serde(
        default,
        alias = "max_tokens_per_minute",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_cost_per_minute: Option<u64>,
}

/// A weighted subdivision of a queue's budget.
///
/// Weights are positive and need not sum to anything; each sub-queue receives
/// `weight / total_weight` of every parent dimension.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SubQueueSpec {
    /// Sub-queue id, acquirable in its own right.
    pub id: String,
    /// Relative share of the parent budget.
    pub weight: f64,
}

/// Reference to an external capability a node may invoke.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SourceSpec {
    /// Unique source id, referenced from node configs via `source_id`.
    pub id: String,
    /// Which capability family services this source.
    pub kind: SourceKind,
    /// Capability-specific configuration; opaque to this crate.
    #[serde(default)]
    pub config: ConfigMap,
}

impl SourceSpec {
    /// Construct a source with an empty config.
    pub fn new(id: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            id: id.into(),
            kind,
            config: ConfigMap::default(),
        }
    }

    /// Attach a config entry.
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }
}

/// The closed set of source families.
///
/// Concrete adapters live behind
/// [`SourceCapability`](crate::sources::SourceCapability); the kind tells the
/// capability which family of work is being requested.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Generative model invocation.
    ModelCall,
    /// Structured data lookup.
    DataQuery,
    /// Any other remote call.
    GenericCall,
}

impl SourceKind {
    /// The wire-format tag for this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::ModelCall => "model-call",
            SourceKind::DataQuery => "data-query",
            SourceKind::GenericCall => "generic-call",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fluent builder for [`WorkflowSpec`].
///
/// Exists for tests and embedders that assemble specs in code rather than
/// parsing JSON. Declaration order is preserved, matching the wire format's
/// ordering guarantees.
///
/// # Examples
///
/// ```rust
/// use loomflow::spec::{SourceKind, WorkflowSpec};
/// use serde_json::json;
///
/// let spec = WorkflowSpec::builder("entry")
///     .name("triage")
///     .node("entry", "input")
///     .node_with_config("classify", "router", [("strategy", json!("fixed")), ("route", json!("work"))])
///     .node("work", "compute")
///     .edge("entry", "classify")
///     .conditional_edge("classify", "work", "route == 'work'")
///     .source("answers", SourceKind::DataQuery)
///     .carry_forward(["request_id"])
///     .build();
///
/// assert_eq!(spec.nodes.len(), 3);
/// assert_eq!(spec.carry_forward, vec!["request_id".to_string()]);
/// ```
#[derive(Debug)]
pub struct WorkflowSpecBuilder {
    spec: WorkflowSpec,
}

impl WorkflowSpecBuilder {
    fn new(entry_node: impl Into<String>) -> Self {
        Self {
            spec: WorkflowSpec {
                nodes: Vec::new(),
                edges: Vec::new(),
                queues: Vec::new(),
                sources: Vec::new(),
                entry_node: entry_node.into(),
                carry_forward: Vec::new(),
                name: None,
                description: None,
                version: None,
            },
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.spec.name = Some(name.into());
        self
    }

    /// Declare a node with an empty config.
    #[must_use]
    pub fn node(mut self, id: impl Into<String>, type_tag: impl Into<String>) -> Self {
        self.spec.nodes.push(NodeSpec::new(id, type_tag));
        self
    }

    /// Declare a node with config entries.
    #[must_use]
    pub fn node_with_config<K, I>(
        mut self,
        id: impl Into<String>,
        type_tag: impl Into<String>,
        config: I,
    ) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let mut node = NodeSpec::new(id, type_tag);
        node.config
            .extend(config.into_iter().map(|(k, v)| (k.into(), v)));
        self.spec.nodes.push(node);
        self
    }

    /// Declare an unconditional edge.
    #[must_use]
    pub fn edge(mut self, from: impl Into<String>, to: impl Into<EdgeTarget>) -> Self {
        self.spec.edges.push(EdgeSpec::new(from, to));
        self
    }

    /// Declare a conditional edge.
    #[must_use]
    pub fn conditional_edge(
        mut self,
        from: impl Into<String>,
        to: impl Into<EdgeTarget>,
        condition: impl Into<String>,
    ) -> Self {
        self.spec.edges.push(EdgeSpec::new(from, to).when(condition));
        self
    }

    /// Declare an edge governed by a queue's bandwidth.
    #[must_use]
    pub fn queued_edge(
        mut self,
        from: impl Into<String>,
        to: impl Into<EdgeTarget>,
        queue_id: impl Into<String>,
    ) -> Self {
        self.spec.edges.push(EdgeSpec::new(from, to).via_queue(queue_id));
        self
    }

    /// Declare an edge from a fully specified [`EdgeSpec`].
    #[must_use]
    pub fn edge_spec(mut self, edge: EdgeSpec) -> Self {
        self.spec.edges.push(edge);
        self
    }

    /// Declare a queue.
    #[must_use]
    pub fn queue(mut self, queue: QueueSpec) -> Self {
        self.spec.queues.push(queue);
        self
    }

    /// Declare a source with an empty config.
    #[must_use]
    pub fn source(mut self, id: impl Into<String>, kind: SourceKind) -> Self {
        self.spec.sources.push(SourceSpec::new(id, kind));
        self
    }

    /// Declare a fully specified source.
    #[must_use]
    pub fn source_spec(mut self, source: SourceSpec) -> Self {
        self.spec.sources.push(source);
        self
    }

    /// Declare the carry-forward key set.
    #[must_use]
    pub fn carry_forward<S: Into<String>>(mut self, keys: impl IntoIterator<Item = S>) -> Self {
        self.spec.carry_forward = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Finish building.
    pub fn build(self) -> WorkflowSpec {
        self.spec
    }
}
