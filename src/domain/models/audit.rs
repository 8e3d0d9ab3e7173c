//! Approval audit records.
//!
//! An [`AuditLog`] is created when a task is submitted for human sign-off and
//! stamped once a decision is made. [`AuditEvent`] is the flattened record
//! mirrored to the persisted audit sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::models::task::{RiskLevel, Task, ToolKind};

/// Human decision on an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditDecision {
    Approve,
    Deny,
}

impl AuditDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Deny => "deny",
        }
    }

    /// Reason recorded when the caller gives none.
    pub fn default_reason(&self) -> &'static str {
        match self {
            Self::Approve => "Approved by user",
            Self::Deny => "Denied by user",
        }
    }
}

/// One approval request and, once resolved, its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub task_id: String,
    pub task_description: String,
    pub tool: ToolKind,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub decision: Option<AuditDecision>,
    pub decided_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

impl AuditLog {
    pub fn for_task(task: &Task, user_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id: task.id.clone(),
            task_description: task.description.clone(),
            tool: task.tool,
            risk_level: task.risk_level,
            risk_factors: Vec::new(),
            user_id: user_id.into(),
            created_at: Utc::now(),
            decision: None,
            decided_at: None,
            reason: None,
        }
    }

    pub fn with_factors(mut self, factors: Vec<String>) -> Self {
        self.risk_factors = factors;
        self
    }

    /// Stamp the decision. An empty reason falls back to the default text.
    pub fn resolve(&mut self, decision: AuditDecision, reason: Option<&str>) {
        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| decision.default_reason());
        self.decision = Some(decision);
        self.decided_at = Some(Utc::now());
        self.reason = Some(reason.to_string());
    }

    pub fn is_resolved(&self) -> bool {
        self.decision.is_some()
    }
}

/// Kind of event mirrored to the audit sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    ApprovalRequested,
    TaskApproved,
    TaskDenied,
}

impl AuditEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApprovalRequested => "approval_requested",
            Self::TaskApproved => "task_approved",
            Self::TaskDenied => "task_denied",
        }
    }
}

/// A single record written to the persisted audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_type: AuditEventKind,
    pub audit_id: Uuid,
    pub task_id: String,
    pub tool: ToolKind,
    pub risk_level: RiskLevel,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    pub fn from_log(kind: AuditEventKind, log: &AuditLog) -> Self {
        Self {
            event_type: kind,
            audit_id: log.id,
            task_id: log.task_id.clone(),
            tool: log.tool,
            risk_level: log.risk_level,
            user_id: log.user_id.clone(),
            reason: log.reason.clone(),
            timestamp: log.decided_at.unwrap_or(log.created_at),
        }
    }
}

/// Aggregate view over approval history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskStats {
    pub total_decisions: usize,
    pub approved: usize,
    pub denied: usize,
    /// Share of decisions that were approvals, 0.0 when there are none.
    pub approval_rate: f64,
    pub pending: usize,
    /// Decided requests per risk level.
    pub risk_breakdown: BTreeMap<RiskLevel, usize>,
}
