//! Infrastructure layer module
//!
//! Adapters satisfying the domain ports:
//! - Configuration management (figment)
//! - Logging and the JSON-lines audit trail
//! - Local tool backends
//! - Pattern based guardrails
//! - Anthropic plan generator

pub mod config;
pub mod guardrails;
pub mod logging;
pub mod planner;
pub mod tools;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::domain::models::Config;
use crate::domain::ports::{AuditSink, ContentFilter, NullAuditSink, NullContentFilter};
use crate::services::SessionOrchestrator;

/// Wire the production adapters into a session orchestrator.
///
/// # Errors
/// Returns an error if the plan generator's HTTP client cannot be built.
pub fn build_orchestrator(config: Config) -> Result<SessionOrchestrator> {
    let registry = Arc::new(tools::build_registry(&config.tools));

    let generator = planner::AnthropicPlanGenerator::new(config.planner.clone())
        .context("Failed to initialize plan generator")?;

    let content_filter: Arc<dyn ContentFilter> = if config.guardrails.enabled {
        Arc::new(guardrails::PatternContentFilter::new())
    } else {
        Arc::new(NullContentFilter::new())
    };

    let audit_sink: Arc<dyn AuditSink> = if config.audit.enabled {
        Arc::new(logging::JsonlAuditSink::new(&config.audit.directory))
    } else {
        Arc::new(NullAuditSink::new())
    };

    info!(
        tools = registry.len(),
        guardrails = config.guardrails.enabled,
        audit = config.audit.enabled,
        threshold = %config.approval.threshold,
        "Session orchestrator initialized"
    );

    Ok(SessionOrchestrator::new(
        config,
        registry,
        Arc::new(generator),
        content_filter,
        audit_sink,
    ))
}
