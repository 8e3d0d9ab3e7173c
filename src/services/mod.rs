//! Service layer: plan validation, risk policy, execution, orchestration.

pub mod executor;
pub mod plan_parser;
pub mod plan_validator;
pub mod risk_policy;
pub mod session_orchestrator;
pub mod tool_registry;

pub use executor::{ExecutionSummary, Executor, ExecutorConfig, FailedTask, StopReason};
pub use plan_parser::{parse_plan, TaskDescriptor};
pub use plan_validator::{detect_cycle, topological_order, PlanValidator};
pub use risk_policy::{assess, format_approval_request, RiskAssessment, RiskPolicy};
pub use session_orchestrator::{SessionOrchestrator, SessionStats, TurnOutcome};
pub use tool_registry::ToolRegistry;
