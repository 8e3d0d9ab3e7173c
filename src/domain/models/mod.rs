pub mod audit;
pub mod config;
pub mod plan;
pub mod session;
pub mod task;

pub use audit::{AuditDecision, AuditEvent, AuditEventKind, AuditLog, RiskStats};
pub use config::{
    ApprovalConfig, AuditConfig, Config, EngineConfig, GuardrailsConfig, LoggingConfig,
    PlannerConfig, ToolsConfig,
};
pub use plan::{Plan, PlanCounts};
pub use session::{GuardrailViolation, Message, MessageRole, SessionState, ViolationKind};
pub use task::{RiskLevel, Task, TaskStatus, ToolInput, ToolKind};
