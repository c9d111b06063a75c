//! Core types for the loomflow workflow engine.
//!
//! This module defines the node-type vocabulary shared by the validator,
//! registry, and compiler. A workflow spec carries node types as plain string
//! tags; [`NodeType`] is the closed, typed form those tags are resolved into
//! exactly once, at compile time. Everything downstream of the compiler
//! dispatches on the enum, never on raw strings.
//!
//! # Examples
//!
//! ```rust
//! use loomflow::types::NodeType;
//!
//! // Built-in tags resolve to their variants
//! assert_eq!(NodeType::from_tag("router"), NodeType::Router);
//!
//! // Anything else is a custom tag the registry may still resolve
//! let custom = NodeType::from_tag("sentiment");
//! assert_eq!(custom, NodeType::Custom("sentiment".to_string()));
//! assert_eq!(custom.as_tag(), "sentiment");
//! ```

use std::fmt;

/// The type of a node within a workflow graph.
///
/// `NodeType` is the resolved form of a spec's `type` tag. The four built-in
/// variants cover the handlers this crate ships; [`Custom`](Self::Custom)
/// carries any other tag so embedders can register their own handlers without
/// touching this enum.
///
/// Parsing is total: [`from_tag`](Self::from_tag) never fails. Whether a
/// custom tag is actually *supported* is the registry's call, surfaced by the
/// validator as an `UnsupportedType` finding.
///
/// # Examples
///
/// ```rust
/// use loomflow::types::NodeType;
///
/// let tag = NodeType::from_tag("aggregate");
/// assert_eq!(tag, NodeType::Aggregate);
/// assert!(tag.is_builtin());
///
/// // Round-trips through its tag form
/// let custom = NodeType::from_tag("enrich");
/// assert_eq!(NodeType::from_tag(custom.as_tag()), custom);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// Run entry point: normalizes the initial input into the state bag.
    Input,

    /// Writes a routing decision consumed by downstream conditional edges.
    Router,

    /// General work node: invokes an external source or renders a template.
    Compute,

    /// Combines several state keys into a single output value.
    Aggregate,

    /// A tag with no built-in handler; resolved through registered factories.
    Custom(String),
}

impl NodeType {
    /// Resolve a spec type tag into its typed form. Total; unknown tags
    /// become [`Custom`](Self::Custom).
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use loomflow::types::NodeType;
    /// assert_eq!(NodeType::from_tag("input"), NodeType::Input);
    /// assert_eq!(NodeType::from_tag("compute"), NodeType::Compute);
    /// assert_eq!(
    ///     NodeType::from_tag("my-handler"),
    ///     NodeType::Custom("my-handler".to_string()),
    /// );
    /// ```
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "input" => NodeType::Input,
            "router" => NodeType::Router,
            "compute" => NodeType::Compute,
            "aggregate" => NodeType::Aggregate,
            other => NodeType::Custom(other.to_string()),
        }
    }

    /// A custom type with the given tag. Equivalent to
    /// [`from_tag`](Self::from_tag) when the tag is not a built-in name.
    pub fn custom(tag: impl Into<String>) -> Self {
        NodeType::Custom(tag.into())
    }

    /// The wire-format tag for this type, as it appears in a spec.
    #[must_use]
    pub fn as_tag(&self) -> &str {
        match self {
            NodeType::Input => "input",
            NodeType::Router => "router",
            NodeType::Compute => "compute",
            NodeType::Aggregate => "aggregate",
            NodeType::Custom(tag) => tag,
        }
    }

    /// Returns `true` for the four types this crate ships handlers for.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        !matches!(self, NodeType::Custom(_))
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_tag())
    }
}

// Developer Experience: allow using string literals where a NodeType is expected.
impl From<&str> for NodeType {
    fn from(s: &str) -> Self {
        NodeType::from_tag(s)
    }
}
