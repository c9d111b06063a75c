use std::time::Duration;

use crate::utils::IdGenerator;

/// Step budget applied when neither the caller nor the environment set one.
pub const DEFAULT_MAX_STEPS: u64 = 500;

/// Per-run knobs supplied to [`execute`](crate::runtime::Executor::execute).
///
/// `Default` resolves the step budget and deadline from the environment
/// (`LOOMFLOW_MAX_STEPS`, `LOOMFLOW_TIMEOUT_MS`, with `.env` support) and
/// mints a fresh run id, so `RunOptions::default()` is a complete, usable
/// configuration.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use loomflow::runtime::RunOptions;
///
/// let options = RunOptions::new()
///     .with_run_id("run-reprocess-42")
///     .with_timeout(Duration::from_secs(30))
///     .with_max_steps(50);
///
/// assert_eq!(options.run_id, "run-reprocess-42");
/// assert_eq!(options.max_steps, 50);
/// ```
#[derive(Clone, Debug)]
pub struct RunOptions {
    /// Identifier attached to events, traces, and logs for this run.
    pub run_id: String,
    /// Hard ceiling on node steps; exceeding it fails the run.
    pub max_steps: u64,
    /// Cooperative per-run deadline, checked at the start of every step.
    pub timeout: Option<Duration>,
    /// Overrides the compiled graph's carry-forward key set when present.
    pub carry_forward: Option<Vec<String>>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            run_id: IdGenerator::new().generate_run_id(),
            max_steps: Self::resolve_max_steps(None),
            timeout: Self::resolve_timeout(None),
            carry_forward: None,
        }
    }
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve_max_steps(provided: Option<u64>) -> u64 {
        if let Some(max_steps) = provided {
            return max_steps;
        }
        dotenvy::dotenv().ok();
        std::env::var("LOOMFLOW_MAX_STEPS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_MAX_STEPS)
    }

    fn resolve_timeout(provided: Option<Duration>) -> Option<Duration> {
        if provided.is_some() {
            return provided;
        }
        dotenvy::dotenv().ok();
        std::env::var("LOOMFLOW_TIMEOUT_MS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .map(Duration::from_millis)
    }

    #[must_use]
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    #[must_use]
    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Replace the compiled graph's carry-forward keys for this run only.
    #[must_use]
    pub fn with_carry_forward<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.carry_forward = Some(keys.into_iter().map(Into::into).collect());
        self
    }
}
