//! Run identifier generation.

use uuid::Uuid;

/// Produces unique, `run-` prefixed identifiers for workflow executions.
///
/// # Examples
///
/// ```rust
/// use loomflow::utils::id_generator::IdGenerator;
///
/// let id = IdGenerator::new().generate_run_id();
/// assert!(id.starts_with("run-"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct IdGenerator;

impl IdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns a fresh identifier, unique across processes.
    #[must_use]
    pub fn generate_run_id(&self) -> String {
        format!("run-{}", Uuid::new_v4())
    }
}
