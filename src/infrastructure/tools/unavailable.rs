use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ToolInput, ToolKind};
use crate::domain::ports::tool_backend::require_inputs;
use crate::domain::ports::ToolBackend;

/// Placeholder for tools without a local implementation.
///
/// Plans may still name the tool; invoking it validates the input and then
/// fails with `BackendUnavailable` so the executor's retry and failure path
/// handles it like any other tool error.
#[derive(Debug, Clone, Copy)]
pub struct UnavailableBackend {
    kind: ToolKind,
}

impl UnavailableBackend {
    pub fn new(kind: ToolKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl ToolBackend for UnavailableBackend {
    fn kind(&self) -> ToolKind {
        self.kind
    }

    async fn invoke(&self, input: &ToolInput) -> DomainResult<Value> {
        require_inputs(self.kind, input)?;
        warn!(tool = %self.kind, "Tool has no local backend");
        Err(DomainError::BackendUnavailable(self.kind.to_string()))
    }
}
