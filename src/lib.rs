//! Aegis - Risk-Gated Task Execution Engine
//!
//! Aegis turns a user request into a dependency-ordered plan of tool
//! invocations, screens every task against a risk policy, holds risky tasks
//! for human approval, and executes the rest with bounded retries.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Task, plan, session and audit models; port traits
//! - **Service Layer** (`services`): Plan validation, risk policy, executor, orchestrator
//! - **Infrastructure Layer** (`infrastructure`): Config, logging, tool backends,
//!   guardrails, audit sink, LLM plan generator
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use aegis::infrastructure::build_orchestrator;
//! use aegis::ConfigLoader;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load()?;
//!     let mut session = build_orchestrator(config)?;
//!     let outcome = session.process_user_message("list the files in src").await;
//!     println!("{}", outcome.message());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{ApprovalError, DomainError, DomainResult, PlanError};
pub use domain::models::{
    AuditDecision, AuditLog, Config, Plan, RiskLevel, SessionState, Task, TaskStatus, ToolInput,
    ToolKind,
};
pub use domain::ports::{AuditSink, ContentFilter, PlanGenerator, ToolBackend};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    ExecutionSummary, Executor, ExecutorConfig, PlanValidator, RiskPolicy, SessionOrchestrator,
    ToolRegistry, TurnOutcome,
};
