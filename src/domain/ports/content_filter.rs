//! Content filter port - guardrails applied to user input and agent output.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainResult;

/// Outcome of a content check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterVerdict {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl FilterVerdict {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

#[async_trait]
pub trait ContentFilter: Send + Sync {
    async fn validate_input(&self, text: &str) -> DomainResult<FilterVerdict>;

    async fn validate_output(&self, text: &str) -> DomainResult<FilterVerdict>;
}

/// A filter that allows everything.
///
/// Used when guardrails are disabled.
#[derive(Debug, Clone, Default)]
pub struct NullContentFilter;

impl NullContentFilter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContentFilter for NullContentFilter {
    async fn validate_input(&self, _text: &str) -> DomainResult<FilterVerdict> {
        Ok(FilterVerdict::allow())
    }

    async fn validate_output(&self, _text: &str) -> DomainResult<FilterVerdict> {
        Ok(FilterVerdict::allow())
    }
}
