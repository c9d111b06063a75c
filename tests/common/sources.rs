use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use loomflow::sources::{SourceCapability, SourceError};
use loomflow::spec::{ConfigMap, SourceKind};

/// Capability that answers every invocation with a fixed response and records
/// the requests it receives.
#[derive(Clone, Debug, Default)]
pub struct CannedSources {
    response: Value,
    calls: Arc<Mutex<Vec<Value>>>,
}

impl CannedSources {
    #[allow(dead_code)]
    pub fn new(response: Value) -> Self {
        Self {
            response,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Canned `{"output": ..., "usage": {...}}` envelope, the shape compute
    /// nodes unwrap.
    #[allow(dead_code)]
    pub fn completing_with(output: &str, tokens: u64, cost: f64) -> Self {
        Self::new(json!({
            "output": output,
            "usage": {"tokens": tokens, "cost": cost},
        }))
    }

    /// Requests seen so far, in invocation order.
    #[allow(dead_code)]
    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl SourceCapability for CannedSources {
    async fn invoke(
        &self,
        _kind: SourceKind,
        _config: &ConfigMap,
        request: Value,
    ) -> Result<Value, SourceError> {
        self.calls.lock().push(request);
        Ok(self.response.clone())
    }
}

/// Capability whose every invocation fails with a provider error.
#[derive(Clone, Debug)]
pub struct FailingSources {
    pub id: String,
    pub message: String,
}

impl FailingSources {
    #[allow(dead_code)]
    pub fn new(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl SourceCapability for FailingSources {
    async fn invoke(
        &self,
        _kind: SourceKind,
        _config: &ConfigMap,
        _request: Value,
    ) -> Result<Value, SourceError> {
        Err(SourceError::Provider {
            id: self.id.clone(),
            message: self.message.clone(),
        })
    }
}
