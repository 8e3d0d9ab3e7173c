//! Domain errors for the Aegis execution engine.

use thiserror::Error;

/// Format a cycle path as a human-readable string: `A -> B -> C -> A`.
fn format_cycle_path(path: &[String]) -> String {
    path.join(" -> ")
}

/// Reasons a candidate plan is rejected as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("Plan generator output could not be parsed: {0}")]
    MalformedOutput(String),

    #[error("Duplicate task id in plan: {0}")]
    DuplicateTaskId(String),

    #[error("Task {task_id} uses unknown tool '{tool}'")]
    UnknownTool { task_id: String, tool: String },

    #[error("Task {task_id} uses tool '{tool}' which has no registered backend")]
    ToolNotRegistered { task_id: String, tool: String },

    #[error("Task {task_id} depends on unknown task {dependency}")]
    DanglingDependency { task_id: String, dependency: String },

    #[error("Task dependency cycle detected: {}", format_cycle_path(.0))]
    DependencyCycle(Vec<String>),
}

impl PlanError {
    /// Id of the task that caused the rejection, when one can be named.
    pub fn offending_task(&self) -> Option<&str> {
        match self {
            Self::MalformedOutput(_) => None,
            Self::DuplicateTaskId(id) => Some(id),
            Self::UnknownTool { task_id, .. }
            | Self::ToolNotRegistered { task_id, .. }
            | Self::DanglingDependency { task_id, .. } => Some(task_id),
            Self::DependencyCycle(path) => path.first().map(String::as_str),
        }
    }
}

/// Errors raised by the approval state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApprovalError {
    #[error("Task {0} already has a pending approval request")]
    AlreadyPending(String),
}

/// Domain-level errors that can occur in the Aegis engine.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Approval(#[from] ApprovalError),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Invalid state transition for task {task_id}: {reason}")]
    InvalidStateTransition { task_id: String, reason: String },

    #[error("Invalid input for {tool}: {message}")]
    InvalidToolInput { tool: String, message: String },

    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("No backend available for {0}")]
    BackendUnavailable(String),

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("Plan generation failed: {0}")]
    PlanGeneration(String),

    #[error("Content filter failed: {0}")]
    ContentFilter(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}
