//! Port trait definitions (Hexagonal Architecture)
//!
//! Async trait interfaces the engine's collaborators implement:
//! - PlanGenerator: drafts plans and final replies
//! - ToolBackend: performs one kind of tool invocation
//! - ContentFilter: guardrails on input and output text
//! - AuditSink: durable approval audit trail

pub mod audit_sink;
pub mod content_filter;
pub mod plan_generator;
pub mod tool_backend;

pub use audit_sink::{AuditSink, NullAuditSink};
pub use content_filter::{ContentFilter, FilterVerdict, NullContentFilter};
pub use plan_generator::{PlanGenerator, PlanningRequest, SynthesisRequest};
pub use tool_backend::ToolBackend;
