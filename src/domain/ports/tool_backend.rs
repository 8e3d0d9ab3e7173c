//! Tool backend port - one implementation per tool kind.

use async_trait::async_trait;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ToolInput, ToolKind};

/// Trait for tool backends.
///
/// Backends receive the task's `tool_input` untouched and either return a
/// JSON result or an error. Retries are the executor's concern.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    fn kind(&self) -> ToolKind;

    async fn invoke(&self, input: &ToolInput) -> DomainResult<serde_json::Value>;
}

/// Reject inputs missing any key the tool requires.
pub fn require_inputs(kind: ToolKind, input: &ToolInput) -> DomainResult<()> {
    let missing: Vec<&str> = kind
        .required_inputs()
        .iter()
        .copied()
        .filter(|key| !input.contains_key(*key))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(DomainError::InvalidToolInput {
            tool: kind.to_string(),
            message: format!("missing required input(s): {}", missing.join(", ")),
        })
    }
}

/// Fetch a required string input.
pub fn input_str<'a>(kind: ToolKind, input: &'a ToolInput, key: &str) -> DomainResult<&'a str> {
    input
        .get(key)
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| DomainError::InvalidToolInput {
            tool: kind.to_string(),
            message: format!("'{key}' must be a string"),
        })
}
