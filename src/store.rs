//! Spec storage for runs initiated by reference.
//!
//! [`ExecutionContext::run_stored`](crate::context::ExecutionContext::run_stored)
//! loads a [`WorkflowSpec`] from a [`SpecStore`] by id, then compiles and
//! executes it. The crate ships [`MemorySpecStore`] for embedders and tests;
//! durable backends implement the trait outside this crate.

use async_trait::async_trait;
use miette::Diagnostic;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::spec::WorkflowSpec;

/// Source of workflow specs addressable by id.
#[async_trait]
pub trait SpecStore: Send + Sync {
    /// Fetch the spec stored under `spec_id`.
    async fn load(&self, spec_id: &str) -> Result<WorkflowSpec, StoreError>;
}

/// Errors crossing the spec-store boundary.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    /// No spec is stored under the requested id.
    #[error("no spec stored under id '{spec_id}'")]
    #[diagnostic(
        code(loomflow::store::not_found),
        help("Insert the spec first, or check the id for typos.")
    )]
    NotFound { spec_id: String },

    /// The backend failed to produce the spec.
    #[error("spec store backend failed: {message}")]
    #[diagnostic(code(loomflow::store::backend))]
    Backend { message: String },
}

/// Volatile in-process spec store.
///
/// Reads take a shared lock, so concurrent runs can load freely while an
/// embedder inserts or removes specs from other tasks.
///
/// # Examples
///
/// ```rust
/// use loomflow::spec::WorkflowSpec;
/// use loomflow::store::MemorySpecStore;
///
/// let store = MemorySpecStore::new();
/// let spec = WorkflowSpec::builder("entry").node("entry", "input").build();
/// store.insert("triage-v1", spec);
/// assert!(store.contains("triage-v1"));
/// ```
#[derive(Debug, Default)]
pub struct MemorySpecStore {
    specs: RwLock<FxHashMap<String, WorkflowSpec>>,
}

impl MemorySpecStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `spec` under `spec_id`, replacing any previous entry.
    pub fn insert(&self, spec_id: impl Into<String>, spec: WorkflowSpec) {
        self.specs.write().insert(spec_id.into(), spec);
    }

    /// Drop the entry under `spec_id`, returning it if present.
    pub fn remove(&self, spec_id: &str) -> Option<WorkflowSpec> {
        self.specs.write().remove(spec_id)
    }

    pub fn contains(&self, spec_id: &str) -> bool {
        self.specs.read().contains_key(spec_id)
    }

    pub fn len(&self) -> usize {
        self.specs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.read().is_empty()
    }
}

#[async_trait]
impl SpecStore for MemorySpecStore {
    async fn load(&self, spec_id: &str) -> Result<WorkflowSpec, StoreError> {
        self.specs
            .read()
            .get(spec_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                spec_id: spec_id.to_string(),
            })
    }
}
