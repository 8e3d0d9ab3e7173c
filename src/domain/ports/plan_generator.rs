//! Plan generator port - interface for the LLM that drafts plans and replies.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainResult;
use crate::domain::models::ToolKind;

/// Input for drafting or refining a plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanningRequest {
    pub user_query: String,
    /// Recent conversation as `role: content` lines
    pub conversation_context: String,
    /// Tools the plan may use
    pub tool_catalog: Vec<ToolKind>,
    /// Current plan as JSON, set when refining
    pub current_plan: Option<String>,
    /// User feedback on `current_plan`
    pub feedback: Option<String>,
}

/// Input for the final natural-language reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynthesisRequest {
    pub conversation_context: String,
    /// Execution summary rendered as JSON
    pub execution_summary: String,
    /// `(task id, truncated output)` pairs
    pub tool_outputs: Vec<(String, String)>,
}

/// Trait for plan generator implementations.
///
/// `generate_plan` returns raw text expected to contain a JSON array of task
/// descriptors, possibly wrapped in fences or prose. Parsing is the caller's job.
#[async_trait]
pub trait PlanGenerator: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    async fn generate_plan(&self, request: &PlanningRequest) -> DomainResult<String>;

    async fn synthesize(&self, request: &SynthesisRequest) -> DomainResult<String>;
}
