//! The boundary to external capabilities (models, data stores, remote calls).
//!
//! A workflow spec *declares* sources ([`SourceSpec`]: id, kind, config); the
//! embedder *services* them by supplying one [`SourceCapability`]
//! implementation per [`ExecutionContext`](crate::context::ExecutionContext).
//! At compile time the declared sources are snapshotted into a
//! [`SourceTable`]; at run time handlers reach both through the
//! [`SourcesHandle`] on their context. Concrete provider adapters (which
//! model, which database, which endpoint) live entirely outside this crate.

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::spec::{ConfigMap, SourceKind, SourceSpec, WorkflowSpec};

/// Services source invocations for a context.
///
/// One implementation covers all three [`SourceKind`] families; the kind and
/// the declared config tell it what is being asked. By convention a response
/// is either the bare result value, or an object of the form
/// `{"output": <result>, "usage": {"tokens": n, "cost": x}}` when the
/// capability wants usage accounted against the run.
///
/// # Examples
///
/// ```rust,no_run
/// use async_trait::async_trait;
/// use loomflow::sources::{SourceCapability, SourceError};
/// use loomflow::spec::{ConfigMap, SourceKind};
/// use serde_json::{Value, json};
///
/// struct CannedAnswers;
///
/// #[async_trait]
/// impl SourceCapability for CannedAnswers {
///     async fn invoke(
///         &self,
///         kind: SourceKind,
///         _config: &ConfigMap,
///         _request: Value,
///     ) -> Result<Value, SourceError> {
///         match kind {
///             SourceKind::DataQuery => Ok(json!({"rows": []})),
///             other => Err(SourceError::Unavailable { kind: other }),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait SourceCapability: Send + Sync {
    /// Perform the work declared by a source of the given kind.
    async fn invoke(
        &self,
        kind: SourceKind,
        config: &ConfigMap,
        request: Value,
    ) -> Result<Value, SourceError>;
}

/// Immutable id → declaration table snapshotted from a spec at compile time.
#[derive(Clone, Debug, Default)]
pub struct SourceTable {
    sources: FxHashMap<String, SourceSpec>,
}

impl SourceTable {
    /// Snapshot the sources declared by a spec.
    pub fn from_spec(spec: &WorkflowSpec) -> Self {
        Self::from_sources(&spec.sources)
    }

    /// Build a table from a slice of declarations.
    pub fn from_sources(sources: &[SourceSpec]) -> Self {
        Self {
            sources: sources.iter().map(|s| (s.id.clone(), s.clone())).collect(),
        }
    }

    /// Look up a declaration by id.
    pub fn get(&self, id: &str) -> Option<&SourceSpec> {
        self.sources.get(id)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// The pair a running node sees: declared sources plus the capability that
/// services them.
#[derive(Clone)]
pub struct SourcesHandle {
    table: Arc<SourceTable>,
    capability: Arc<dyn SourceCapability>,
}

impl SourcesHandle {
    pub fn new(table: Arc<SourceTable>, capability: Arc<dyn SourceCapability>) -> Self {
        Self { table, capability }
    }

    /// Resolve `source_id` against the table and invoke the capability with
    /// the declaration's kind and config.
    pub async fn invoke(&self, source_id: &str, request: Value) -> Result<Value, SourceError> {
        let spec = self
            .table
            .get(source_id)
            .ok_or_else(|| SourceError::UnknownSource {
                id: source_id.to_string(),
            })?;
        self.capability.invoke(spec.kind, &spec.config, request).await
    }

    /// The declaration table backing this handle.
    pub fn table(&self) -> &SourceTable {
        &self.table
    }
}

impl fmt::Debug for SourcesHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourcesHandle")
            .field("sources", &self.table.len())
            .finish_non_exhaustive()
    }
}

/// Errors crossing the source boundary.
#[derive(Debug, Error, Diagnostic)]
pub enum SourceError {
    /// The referenced source id is not declared in the spec.
    #[error("unknown source: {id}")]
    #[diagnostic(
        code(loomflow::source::unknown),
        help("Declare the source in the spec's `sources` list or fix the node's `source_id`.")
    )]
    UnknownSource { id: String },

    /// The configured capability does not service this kind.
    #[error("no capability available for {kind} sources")]
    #[diagnostic(
        code(loomflow::source::unavailable),
        help("Supply a SourceCapability that handles this kind on the ExecutionContext.")
    )]
    Unavailable { kind: SourceKind },

    /// The capability accepted the request but failed to complete it.
    #[error("source '{id}' failed: {message}")]
    #[diagnostic(code(loomflow::source::provider))]
    Provider { id: String, message: String },
}

/// Default capability that services nothing.
///
/// Contexts built without an explicit capability get this; any invocation
/// fails with [`SourceError::Unavailable`], which keeps source-free specs
/// fully functional while making a forgotten capability loud and obvious.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSources;

#[async_trait]
impl SourceCapability for NullSources {
    async fn invoke(
        &self,
        kind: SourceKind,
        _config: &ConfigMap,
        _request: Value,
    ) -> Result<Value, SourceError> {
        Err(SourceError::Unavailable { kind })
    }
}
