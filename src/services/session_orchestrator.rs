//! Session orchestrator: one conversation from user text to reply.
//!
//! Flow per message: input filter, plan generation, validation, risk
//! screening, then execution up to the first gated task. A paused run ends
//! in an approval request; a finished one in a synthesized reply that passes
//! the output filter.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::models::{
    AuditLog, Config, MessageRole, RiskStats, SessionState, TaskStatus, ViolationKind,
};
use crate::domain::ports::{
    AuditSink, ContentFilter, PlanGenerator, PlanningRequest, SynthesisRequest,
};
use crate::services::executor::{ExecutionSummary, Executor, ExecutorConfig, StopReason};
use crate::services::plan_parser::{parse_plan, TaskDescriptor};
use crate::services::plan_validator::PlanValidator;
use crate::services::risk_policy::{format_approval_request, RiskPolicy};
use crate::services::tool_registry::ToolRegistry;

/// Tool output handed to synthesis is cut to this many characters.
const TOOL_OUTPUT_PREVIEW_CHARS: usize = 500;

pub const BLOCKED_OUTPUT_MESSAGE: &str =
    "Response blocked by security guardrails due to sensitive content.";
pub const NOTHING_TO_EXECUTE_MESSAGE: &str = "No approved tasks to execute.";

/// What the caller should show the user after a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnOutcome {
    /// Normal reply, with the execution summary when something ran.
    Reply {
        message: String,
        summary: Option<ExecutionSummary>,
    },
    /// Execution paused at a gated task; these requests need a decision.
    ApprovalRequired {
        message: String,
        requests: Vec<AuditLog>,
        summary: Option<ExecutionSummary>,
    },
    /// A guardrail rejected the input or the reply.
    Blocked { message: String, reason: String },
    /// A collaborator failed; the error is also recorded on the session.
    Failed { message: String, error: String },
}

impl TurnOutcome {
    pub fn message(&self) -> &str {
        match self {
            Self::Reply { message, .. }
            | Self::ApprovalRequired { message, .. }
            | Self::Blocked { message, .. }
            | Self::Failed { message, .. } => message,
        }
    }

    pub fn summary(&self) -> Option<&ExecutionSummary> {
        match self {
            Self::Reply { summary, .. } | Self::ApprovalRequired { summary, .. } => summary.as_ref(),
            _ => None,
        }
    }
}

/// Snapshot of a session for the `stats` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: Uuid,
    pub correlation_id: Uuid,
    pub user_id: String,
    pub message_count: usize,
    pub completed_tasks: usize,
    pub active_tasks: usize,
    pub iteration_count: u32,
    pub max_iterations: u32,
    pub guardrail_violations: usize,
    pub pending_approvals: usize,
    pub error: Option<String>,
    pub risk: RiskStats,
}

/// How a freshly generated plan is handled.
enum Planning {
    /// A new request: the plan runs immediately.
    Fresh,
    /// A revision of the active plan. Dependencies on these already
    /// completed tasks count as satisfied.
    Refinement { satisfied: HashSet<String> },
}

pub struct SessionOrchestrator {
    config: Config,
    state: SessionState,
    /// The active plan still has a run to report: it stopped at an approval
    /// gate or was refined without running.
    resumable: bool,
    generator: Arc<dyn PlanGenerator>,
    content_filter: Arc<dyn ContentFilter>,
    registry: Arc<ToolRegistry>,
    validator: PlanValidator,
    policy: RiskPolicy,
    executor: Executor,
}

impl SessionOrchestrator {
    pub fn new(
        config: Config,
        registry: Arc<ToolRegistry>,
        generator: Arc<dyn PlanGenerator>,
        content_filter: Arc<dyn ContentFilter>,
        audit_sink: Arc<dyn AuditSink>,
    ) -> Self {
        let state = SessionState::new(
            config.approval.default_user.clone(),
            config.engine.max_iterations,
        );
        let policy = RiskPolicy::from_config(&config, audit_sink);
        let executor = Executor::new(registry.clone(), ExecutorConfig::from(&config.engine));
        let validator = PlanValidator::new(registry.clone());

        Self {
            config,
            state,
            resumable: false,
            generator,
            content_filter,
            registry,
            validator,
            policy,
            executor,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.state.user_id = user_id.into();
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn policy(&self) -> &RiskPolicy {
        &self.policy
    }

    /// Handle one user message end to end.
    ///
    /// A gated plan is not held back as a whole: tasks ahead of the first
    /// gated task in plan order run, with their side effects, before the
    /// approval request is returned.
    #[instrument(skip_all, fields(session_id = %self.state.session_id))]
    pub async fn process_user_message(&mut self, text: &str) -> TurnOutcome {
        self.state.add_message(MessageRole::User, text);

        match self.content_filter.validate_input(text).await {
            Ok(verdict) if !verdict.allowed => {
                let reason = verdict.reason.unwrap_or_else(|| "input rejected".to_string());
                warn!(reason = %reason, "User input blocked by guardrails");
                self.state
                    .add_guardrail_violation(ViolationKind::InputValidation, reason.clone());
                return TurnOutcome::Blocked {
                    message: format!("Request blocked by security guardrails: {reason}"),
                    reason,
                };
            }
            Ok(_) => {}
            Err(e) => return self.fail_turn(format!("Input validation failed: {e}")),
        }

        let request = PlanningRequest {
            user_query: text.to_string(),
            conversation_context: self.context(),
            tool_catalog: self.registry.catalog(),
            current_plan: None,
            feedback: None,
        };
        self.plan_and_gate(request, Planning::Fresh).await
    }

    /// Ask the generator to revise the active plan.
    #[instrument(skip_all, fields(session_id = %self.state.session_id))]
    pub async fn refine_plan(&mut self, feedback: &str) -> TurnOutcome {
        if !self.state.plan.has_active() {
            return TurnOutcome::Reply {
                message: "No active plan to refine.".to_string(),
                summary: None,
            };
        }

        let satisfied: HashSet<String> = self
            .state
            .plan
            .completed()
            .map(|task| task.id.clone())
            .collect();
        let descriptors: Vec<TaskDescriptor> = self
            .state
            .plan
            .active()
            .map(|task| TaskDescriptor {
                id: task.id.clone(),
                description: task.description.clone(),
                tool: task.tool.to_string(),
                tool_input: task.tool_input.clone(),
                dependencies: task
                    .dependencies
                    .iter()
                    .filter(|dep| !satisfied.contains(*dep))
                    .cloned()
                    .collect(),
                risk_level: task.risk_level,
            })
            .collect();
        let current_plan = match serde_json::to_string_pretty(&descriptors) {
            Ok(json) => json,
            Err(e) => return reject_refinement(format!("Failed to serialize current plan: {e}")),
        };

        self.state
            .add_message(MessageRole::User, format!("Plan feedback: {feedback}"));
        let request = PlanningRequest {
            user_query: feedback.to_string(),
            conversation_context: self.context(),
            tool_catalog: self.registry.catalog(),
            current_plan: Some(current_plan),
            feedback: Some(feedback.to_string()),
        };
        self.plan_and_gate(request, Planning::Refinement { satisfied })
            .await
    }

    /// Generate, validate and adopt a plan. A failed refinement leaves the
    /// active plan and the session error as they were.
    async fn plan_and_gate(&mut self, request: PlanningRequest, mode: Planning) -> TurnOutcome {
        let raw = match self.generator.generate_plan(&request).await {
            Ok(raw) => raw,
            Err(e) => {
                let error = format!("Planning failed: {e}");
                return match mode {
                    Planning::Fresh => self.fail_turn(error),
                    Planning::Refinement { .. } => reject_refinement(error),
                };
            }
        };

        let validated = parse_plan(&raw).and_then(|mut descriptors| {
            if let Planning::Refinement { satisfied } = &mode {
                let ids: HashSet<String> = descriptors.iter().map(|d| d.id.clone()).collect();
                for descriptor in &mut descriptors {
                    descriptor
                        .dependencies
                        .retain(|dep| ids.contains(dep) || !satisfied.contains(dep));
                }
            }
            self.validator.validate(descriptors)
        });
        let plan = match validated {
            Ok(plan) => plan,
            Err(e) => {
                warn!(
                    offending_task = e.offending_task().unwrap_or("-"),
                    error = %e,
                    "Plan rejected"
                );
                let error = format!("Plan rejected: {e}");
                return match mode {
                    Planning::Fresh => self.fail_turn(error),
                    Planning::Refinement { .. } => reject_refinement(error),
                };
            }
        };

        if !self.policy.list_pending().is_empty() {
            info!(
                dropped = self.policy.list_pending().len(),
                "New plan adopted; discarding pending approvals"
            );
            self.policy.clear_pending();
        }
        info!(task_count = plan.len(), generator = self.generator.name(), "Plan adopted");
        self.state.adopt_plan(plan);

        let gated = self.policy.screen(&mut self.state.plan);
        if matches!(mode, Planning::Fresh) {
            return self.execute_and_respond().await;
        }
        self.resumable = true;
        if !gated.is_empty() {
            return self.request_approvals(&gated, None).await;
        }
        TurnOutcome::Reply {
            message: format!(
                "Plan updated with {} task(s). Use 'continue' to execute.",
                self.state.plan.len()
            ),
            summary: None,
        }
    }

    /// Tasks in the plan that are gated and not yet approved.
    fn awaiting_ids(&self) -> Vec<String> {
        self.state
            .plan
            .active()
            .filter(|task| task.status == TaskStatus::Pending && task.awaiting_approval())
            .map(|task| task.id.clone())
            .collect()
    }

    async fn request_approvals(
        &mut self,
        task_ids: &[String],
        summary: Option<ExecutionSummary>,
    ) -> TurnOutcome {
        let user_id = self.state.user_id.clone();
        for id in task_ids {
            let Some(task) = self.state.plan.get(id) else {
                continue;
            };
            if let Err(e) = self.policy.request(task, &user_id).await {
                info!(task_id = %id, error = %e, "Approval already requested");
            }
        }

        let requests = self.policy.list_pending().to_vec();
        let cards = requests
            .iter()
            .map(format_approval_request)
            .collect::<Vec<_>>()
            .join("\n\n");
        let message = format!(
            "HIGH RISK OPERATIONS DETECTED\n\n\
             The following tasks require your approval before execution:\n\n\
             {cards}\n\n\
             Use 'approve <task_id>' or 'deny <task_id>' to respond, then 'continue' to resume execution."
        );

        TurnOutcome::ApprovalRequired {
            message,
            requests,
            summary,
        }
    }

    async fn execute_and_respond(&mut self) -> TurnOutcome {
        let summary = self.executor.run(&mut self.state).await;
        self.resumable = summary.awaiting_approval().is_some();

        if summary.awaiting_approval().is_some() {
            let ids = self.awaiting_ids();
            return self.request_approvals(&ids, Some(summary)).await;
        }
        if let StopReason::Fatal(err) = &summary.stop_reason {
            return TurnOutcome::Failed {
                message: format!("Execution aborted: {err}"),
                error: err.clone(),
            };
        }

        let synthesis = SynthesisRequest {
            conversation_context: self.context(),
            execution_summary: serde_json::to_string_pretty(&summary).unwrap_or_default(),
            tool_outputs: summary
                .results
                .iter()
                .map(|(id, output)| (id.clone(), preview_output(output)))
                .collect(),
        };

        let reply = match self.generator.synthesize(&synthesis).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Response synthesis failed");
                format!("Execution completed but response generation failed: {e}")
            }
        };

        match self.content_filter.validate_output(&reply).await {
            Ok(verdict) if !verdict.allowed => {
                let reason = verdict
                    .reason
                    .unwrap_or_else(|| "output rejected".to_string());
                warn!(reason = %reason, "Agent output blocked by guardrails");
                self.state
                    .add_guardrail_violation(ViolationKind::OutputValidation, reason.clone());
                return TurnOutcome::Blocked {
                    message: BLOCKED_OUTPUT_MESSAGE.to_string(),
                    reason,
                };
            }
            Ok(_) => {}
            Err(e) => return self.fail_turn(format!("Output validation failed: {e}")),
        }

        self.state.add_message(MessageRole::Assistant, reply.clone());
        TurnOutcome::Reply {
            message: reply,
            summary: Some(summary),
        }
    }

    /// Approve a pending request and mark its task runnable.
    pub async fn approve(&mut self, task_id: &str, reason: Option<&str>) -> Option<AuditLog> {
        let log = self.policy.approve(task_id, reason).await?;
        if let Some(task) = self.state.plan.get_mut(task_id) {
            task.approved = true;
        }
        Some(log)
    }

    /// Deny a pending request and drop its task from the plan.
    pub async fn deny(&mut self, task_id: &str, reason: Option<&str>) -> Option<AuditLog> {
        let log = self.policy.deny(task_id, reason).await?;
        if self.state.plan.remove(task_id).is_some() {
            info!(task_id, "Denied task removed from plan");
        }
        Some(log)
    }

    pub async fn approve_all(&mut self, reason: Option<&str>) -> Vec<AuditLog> {
        let ids: Vec<String> = self.pending_ids();
        let mut resolved = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(log) = self.approve(&id, reason).await {
                resolved.push(log);
            }
        }
        resolved
    }

    pub async fn deny_all(&mut self, reason: Option<&str>) -> Vec<AuditLog> {
        let ids: Vec<String> = self.pending_ids();
        let mut resolved = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(log) = self.deny(&id, reason).await {
                resolved.push(log);
            }
        }
        resolved
    }

    pub fn list_pending(&self) -> &[AuditLog] {
        self.policy.list_pending()
    }

    /// Resume execution of the remaining plan.
    ///
    /// Only a run that stopped at an approval gate, or a refined plan that
    /// has not run, can be resumed. Refuses while the next eligible task
    /// still awaits a decision; a plan emptied by denials runs once more to
    /// report its final summary.
    #[instrument(skip_all, fields(session_id = %self.state.session_id))]
    pub async fn continue_execution(&mut self) -> TurnOutcome {
        let halted = self
            .state
            .plan
            .next_eligible()
            .is_some_and(|task| task.awaiting_approval());
        if !self.resumable || self.state.plan.is_empty() || halted {
            return TurnOutcome::Reply {
                message: NOTHING_TO_EXECUTE_MESSAGE.to_string(),
                summary: None,
            };
        }
        self.execute_and_respond().await
    }

    pub fn session_stats(&self) -> SessionStats {
        let counts = self.state.plan.counts();
        SessionStats {
            session_id: self.state.session_id,
            correlation_id: self.state.correlation_id,
            user_id: self.state.user_id.clone(),
            message_count: self.state.messages.len(),
            completed_tasks: counts.completed,
            active_tasks: counts.active(),
            iteration_count: self.state.iteration_count,
            max_iterations: self.state.max_iterations,
            guardrail_violations: self.state.guardrail_violations.len(),
            pending_approvals: self.policy.list_pending().len(),
            error: self.state.error.clone(),
            risk: self.policy.risk_stats(),
        }
    }

    /// Start over with a fresh session identity. Audit history is kept.
    pub fn reset_session(&mut self) {
        let old = self.state.session_id;
        self.state.reset();
        self.resumable = false;
        self.policy.clear_pending();
        info!(old_session = %old, new_session = %self.state.session_id, "Session reset");
    }

    fn pending_ids(&self) -> Vec<String> {
        self.policy
            .list_pending()
            .iter()
            .map(|log| log.task_id.clone())
            .collect()
    }

    fn context(&self) -> String {
        self.state
            .conversation_context(self.config.engine.max_conversation_messages)
    }

    fn fail_turn(&mut self, error: String) -> TurnOutcome {
        warn!(error = %error, "Turn failed");
        self.state.error = Some(error.clone());
        TurnOutcome::Failed {
            message: format!("Error: {error}"),
            error,
        }
    }
}

fn reject_refinement(error: String) -> TurnOutcome {
    warn!(error = %error, "Plan refinement rejected; keeping current plan");
    TurnOutcome::Failed {
        message: format!("Refinement rejected, current plan kept: {error}"),
        error,
    }
}

fn preview_output(output: &serde_json::Value) -> String {
    let text = match output {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match text.char_indices().nth(TOOL_OUTPUT_PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text,
    }
}
