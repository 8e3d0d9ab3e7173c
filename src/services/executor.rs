//! Sequential, dependency-respecting plan executor.
//!
//! Tasks are dispatched one at a time in plan order once all their
//! dependencies have completed. A task awaiting approval halts the whole run;
//! the caller resumes by invoking [`Executor::run`] again.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, instrument, warn};

use crate::domain::errors::DomainError;
use crate::domain::models::{EngineConfig, SessionState};
use crate::services::tool_registry::ToolRegistry;

/// Configuration for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Attempts per task before it is marked failed.
    pub max_retries: u32,
    /// Base delay; attempt `n` is followed by a wait of `n * retry_delay`.
    pub retry_delay: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for ExecutorConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_retries: config.max_retries.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

/// Why a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "detail")]
pub enum StopReason {
    /// No runnable work left.
    Drained,
    /// The next task needs a human decision.
    AwaitingApproval(String),
    /// Pending tasks can never run; they were marked blocked.
    Blocked(Vec<String>),
    /// A high-risk task failed and the session was aborted.
    Fatal(String),
    /// The session's iteration budget is spent.
    IterationLimit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedTask {
    pub task_id: String,
    pub error: String,
}

/// Outcome of one executor run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    /// Completed tasks in the plan, including earlier runs.
    pub completed: usize,
    /// Tasks that failed during this run.
    pub failed: usize,
    /// Tasks in the plan that have not completed.
    pub remaining: usize,
    /// Results of tasks completed during this run.
    pub results: BTreeMap<String, serde_json::Value>,
    pub failed_tasks: Vec<FailedTask>,
    pub stop_reason: StopReason,
}

impl ExecutionSummary {
    /// Task the run stopped on for approval, if any.
    pub fn awaiting_approval(&self) -> Option<&str> {
        match &self.stop_reason {
            StopReason::AwaitingApproval(id) => Some(id),
            _ => None,
        }
    }

    pub fn processed(&self) -> usize {
        self.results.len() + self.failed_tasks.len()
    }
}

/// Drains a session's plan through the tool registry.
#[derive(Debug, Clone)]
pub struct Executor {
    registry: Arc<ToolRegistry>,
    config: ExecutorConfig,
}

impl Executor {
    pub fn new(registry: Arc<ToolRegistry>, config: ExecutorConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run until the plan drains, a task needs approval, a fatal failure
    /// occurs, or the iteration budget is spent.
    #[instrument(skip_all, fields(session_id = %session.session_id))]
    pub async fn run(&self, session: &mut SessionState) -> ExecutionSummary {
        let mut results = BTreeMap::new();
        let mut failed_tasks = Vec::new();

        let stop_reason = loop {
            if !session.should_continue() {
                break match &session.error {
                    Some(err) => StopReason::Fatal(err.clone()),
                    None if session.iteration_count >= session.max_iterations => {
                        warn!(iterations = session.iteration_count, "Iteration limit reached");
                        StopReason::IterationLimit
                    }
                    None => StopReason::Drained,
                };
            }

            if !session.plan.has_active() {
                session.is_complete = true;
                break StopReason::Drained;
            }

            let Some(next) = session.plan.next_eligible() else {
                if session.plan.has_pending() {
                    let blocked = session.plan.block_pending();
                    warn!(blocked = ?blocked, "No runnable task; pending tasks blocked");
                    break StopReason::Blocked(blocked);
                }
                break StopReason::Drained;
            };

            let task_id = next.id.clone();
            if next.awaiting_approval() {
                info!(task_id = %task_id, "Execution halted pending approval");
                break StopReason::AwaitingApproval(task_id);
            }

            match self.execute_task(session, &task_id).await {
                Ok(result) => {
                    results.insert(task_id, result);
                }
                Err(err) => {
                    let severe = session
                        .plan
                        .get(&task_id)
                        .is_some_and(|task| task.risk_level.is_severe());
                    if severe {
                        error!(task_id = %task_id, error = %err, "High-risk task failed; aborting session");
                        session.error = Some(format!("Critical task {task_id} failed: {err}"));
                    }
                    failed_tasks.push(FailedTask { task_id, error: err });
                }
            }
            session.iteration_count += 1;
        };

        let counts = session.plan.counts();
        let summary = ExecutionSummary {
            completed: counts.completed,
            failed: failed_tasks.len(),
            remaining: counts.active(),
            results,
            failed_tasks,
            stop_reason,
        };
        info!(
            completed = summary.completed,
            failed = summary.failed,
            remaining = summary.remaining,
            stop = ?summary.stop_reason,
            "Execution run finished"
        );
        summary
    }

    /// Dispatch one task, retrying with linear backoff.
    async fn execute_task(
        &self,
        session: &mut SessionState,
        task_id: &str,
    ) -> Result<serde_json::Value, String> {
        let (tool, input) = match session.plan.get(task_id) {
            Some(task) => (task.tool, task.tool_input.clone()),
            None => return Err(DomainError::TaskNotFound(task_id.to_string()).to_string()),
        };

        session.plan.start(task_id).map_err(|e| e.to_string())?;

        let Some(backend) = self.registry.get(tool) else {
            let err = DomainError::BackendUnavailable(tool.to_string()).to_string();
            error!(task_id, tool = %tool, error = %err, "Task failed");
            session.plan.fail(task_id, err.clone()).map_err(|e| e.to_string())?;
            return Err(err);
        };

        loop {
            debug!(task_id, tool = %tool, "Invoking backend");
            match backend.invoke(&input).await {
                Ok(result) => {
                    session
                        .plan
                        .complete(task_id, result.clone())
                        .map_err(|e| e.to_string())?;
                    session.tool_outputs.insert(task_id.to_string(), result.clone());
                    info!(task_id, tool = %tool, "Task completed");
                    return Ok(result);
                }
                Err(err) => {
                    let retry_count = match session.plan.get_mut(task_id) {
                        Some(task) => {
                            task.retry_count += 1;
                            task.retry_count
                        }
                        None => return Err(err.to_string()),
                    };

                    if retry_count < self.config.max_retries {
                        let delay = self.config.retry_delay * retry_count;
                        warn!(
                            task_id,
                            tool = %tool,
                            retry_count,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            error = %err,
                            "Task attempt failed; retrying"
                        );
                        sleep(delay).await;
                        continue;
                    }

                    let message = err.to_string();
                    error!(task_id, tool = %tool, retry_count, error = %message, "Task failed");
                    session
                        .plan
                        .fail(task_id, message.clone())
                        .map_err(|e| e.to_string())?;
                    return Err(message);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::DomainResult;
    use crate::domain::models::{Plan, RiskLevel, Task, TaskStatus, ToolInput, ToolKind};
    use crate::domain::ports::ToolBackend;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        kind: ToolKind,
        failures_before_success: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ToolBackend for Flaky {
        fn kind(&self) -> ToolKind {
            self.kind
        }

        async fn invoke(&self, _input: &ToolInput) -> DomainResult<serde_json::Value> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures_before_success {
                Err(DomainError::ToolFailed {
                    tool: self.kind.to_string(),
                    message: format!("attempt {call} failed"),
                })
            } else {
                Ok(serde_json::json!({ "attempt": call }))
            }
        }
    }

    fn executor_with(backend: Arc<Flaky>, max_retries: u32) -> Executor {
        let registry = ToolRegistry::new().with_backend(backend);
        Executor::new(
            Arc::new(registry),
            ExecutorConfig {
                max_retries,
                retry_delay: Duration::ZERO,
            },
        )
    }

    fn session_with(tasks: Vec<Task>) -> SessionState {
        let mut session = SessionState::new("tester", 10);
        session.adopt_plan(Plan::from_validated(tasks));
        session
    }

    fn bash_task(id: &str) -> Task {
        Task::new(id, id, ToolKind::BashCommand, ToolInput::new())
    }

    #[tokio::test]
    async fn test_transient_failure_recovers() {
        let backend = Arc::new(Flaky {
            kind: ToolKind::BashCommand,
            failures_before_success: 2,
            calls: AtomicU32::new(0),
        });
        let executor = executor_with(backend.clone(), 3);
        let mut session = session_with(vec![bash_task("a")]);

        let summary = executor.run(&mut session).await;
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
        assert_eq!(session.plan.get("a").map(|t| t.retry_count), Some(2));
        assert!(session.tool_outputs.contains_key("a"));
        assert!(session.is_complete);
        assert_eq!(summary.stop_reason, StopReason::Drained);
    }

    #[tokio::test]
    async fn test_low_risk_failure_continues() {
        let backend = Arc::new(Flaky {
            kind: ToolKind::BashCommand,
            failures_before_success: 2,
            calls: AtomicU32::new(0),
        });
        let executor = executor_with(backend, 2);
        let mut session = session_with(vec![bash_task("a"), bash_task("b")]);

        let summary = executor.run(&mut session).await;
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failed_tasks[0].task_id, "a");
        // Third call overall succeeds for b
        assert_eq!(summary.completed, 1);
        assert!(session.error.is_none());
        assert_eq!(session.iteration_count, 2);
        assert_eq!(session.plan.get("a").map(|t| t.status), Some(TaskStatus::Failed));
    }

    #[tokio::test]
    async fn test_high_risk_failure_is_fatal() {
        let backend = Arc::new(Flaky {
            kind: ToolKind::BashCommand,
            failures_before_success: u32::MAX,
            calls: AtomicU32::new(0),
        });
        let executor = executor_with(backend, 1);
        let mut session = session_with(vec![
            bash_task("a").with_risk_level(RiskLevel::High),
            bash_task("b"),
        ]);

        let summary = executor.run(&mut session).await;
        assert!(matches!(summary.stop_reason, StopReason::Fatal(_)));
        assert!(session
            .error
            .as_deref()
            .is_some_and(|e| e.starts_with("Critical task a failed")));
        assert_eq!(session.iteration_count, 1);
        assert_eq!(session.plan.get("b").map(|t| t.status), Some(TaskStatus::Pending));
    }

    #[tokio::test]
    async fn test_unapproved_task_halts_run() {
        let backend = Arc::new(Flaky {
            kind: ToolKind::BashCommand,
            failures_before_success: 0,
            calls: AtomicU32::new(0),
        });
        let executor = executor_with(backend.clone(), 3);
        let mut gated = bash_task("b");
        gated.requires_approval = true;
        let mut session = session_with(vec![bash_task("a"), gated, bash_task("c")]);

        let summary = executor.run(&mut session).await;
        assert_eq!(summary.awaiting_approval(), Some("b"));
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.remaining, 2);
        // The whole run stops, so c waits even though it does not depend on b
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.plan.get("b").map(|t| t.status), Some(TaskStatus::Pending));
        assert_eq!(session.plan.get("c").map(|t| t.status), Some(TaskStatus::Pending));
        assert_eq!(session.iteration_count, 1);
    }

    #[tokio::test]
    async fn test_dependents_of_gated_task_wait() {
        let backend = Arc::new(Flaky {
            kind: ToolKind::BashCommand,
            failures_before_success: 0,
            calls: AtomicU32::new(0),
        });
        let executor = executor_with(backend.clone(), 3);
        let mut gated = bash_task("b").with_dependency("a");
        gated.requires_approval = true;
        let mut session = session_with(vec![
            bash_task("a"),
            gated,
            bash_task("c").with_dependency("b"),
        ]);

        let summary = executor.run(&mut session).await;
        assert_eq!(summary.awaiting_approval(), Some("b"));
        assert_eq!(summary.completed, 1);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.plan.get("c").map(|t| t.status), Some(TaskStatus::Pending));
    }

    #[tokio::test]
    async fn test_iteration_limit_stops_run() {
        let backend = Arc::new(Flaky {
            kind: ToolKind::BashCommand,
            failures_before_success: 0,
            calls: AtomicU32::new(0),
        });
        let executor = executor_with(backend, 3);
        let mut session = SessionState::new("tester", 1);
        session.adopt_plan(Plan::from_validated(vec![bash_task("a"), bash_task("b")]));

        let summary = executor.run(&mut session).await;
        assert_eq!(summary.stop_reason, StopReason::IterationLimit);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.remaining, 1);
    }

    #[tokio::test]
    async fn test_missing_backend_fails_without_retry() {
        let executor = Executor::new(Arc::new(ToolRegistry::new()), ExecutorConfig::default());
        let mut session = session_with(vec![bash_task("a")]);

        let summary = executor.run(&mut session).await;
        assert_eq!(summary.failed, 1);
        assert!(summary.failed_tasks[0].error.contains("No backend available"));
        assert_eq!(session.plan.get("a").map(|t| t.retry_count), Some(0));
    }

    #[tokio::test]
    async fn test_empty_plan_is_a_noop() {
        let executor = Executor::new(Arc::new(ToolRegistry::new()), ExecutorConfig::default());
        let mut session = SessionState::new("tester", 10);

        let summary = executor.run(&mut session).await;
        assert_eq!(summary.processed(), 0);
        assert_eq!(summary.stop_reason, StopReason::Drained);
        assert_eq!(session.iteration_count, 0);
    }
}
