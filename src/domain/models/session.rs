//! Session state owned by the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::domain::models::plan::Plan;

/// Who produced a message in the conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Tool => "tool",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Where a guardrail rejection happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    InputValidation,
    OutputValidation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailViolation {
    pub kind: ViolationKind,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Mutable state of one conversation with the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: Uuid,
    pub correlation_id: Uuid,
    pub user_id: String,
    pub messages: Vec<Message>,
    pub plan: Plan,
    /// Raw backend output keyed by task id.
    pub tool_outputs: BTreeMap<String, serde_json::Value>,
    pub iteration_count: u32,
    pub max_iterations: u32,
    pub is_complete: bool,
    pub error: Option<String>,
    pub guardrail_violations: Vec<GuardrailViolation>,
    pub created_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(user_id: impl Into<String>, max_iterations: u32) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            correlation_id: Uuid::new_v4(),
            user_id: user_id.into(),
            messages: Vec::new(),
            plan: Plan::new(),
            tool_outputs: BTreeMap::new(),
            iteration_count: 0,
            max_iterations,
            is_complete: false,
            error: None,
            guardrail_violations: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn add_message(&mut self, role: MessageRole, content: impl Into<String>) {
        self.messages.push(Message::new(role, content));
    }

    pub fn add_guardrail_violation(&mut self, kind: ViolationKind, reason: impl Into<String>) {
        self.guardrail_violations.push(GuardrailViolation {
            kind,
            reason: reason.into(),
            timestamp: Utc::now(),
        });
    }

    /// The executor may keep going.
    pub fn should_continue(&self) -> bool {
        !self.is_complete && self.iteration_count < self.max_iterations && self.error.is_none()
    }

    /// Install a freshly validated plan.
    ///
    /// The iteration count and error slot belong to the session, not the
    /// plan; only [`SessionState::reset`] clears them.
    pub fn adopt_plan(&mut self, plan: Plan) {
        self.plan = plan;
        self.tool_outputs.clear();
        self.is_complete = false;
    }

    /// The last `max_messages` messages rendered as `role: content` lines.
    pub fn conversation_context(&self, max_messages: usize) -> String {
        let start = self.messages.len().saturating_sub(max_messages);
        self.messages[start..]
            .iter()
            .map(|message| format!("{}: {}", message.role, message.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Fresh identity and empty state, keeping the user and iteration bound.
    pub fn reset(&mut self) {
        *self = Self::new(std::mem::take(&mut self.user_id), self.max_iterations);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_continue_predicate() {
        let mut state = SessionState::new("alice", 2);
        assert!(state.should_continue());

        state.iteration_count = 2;
        assert!(!state.should_continue());

        state.iteration_count = 0;
        state.error = Some("boom".to_string());
        assert!(!state.should_continue());

        state.error = None;
        state.is_complete = true;
        assert!(!state.should_continue());
    }

    #[test]
    fn test_conversation_context_keeps_most_recent() {
        let mut state = SessionState::new("alice", 10);
        for i in 0..5 {
            state.add_message(MessageRole::User, format!("m{i}"));
        }
        assert_eq!(state.conversation_context(2), "user: m3\nuser: m4");
        assert_eq!(state.conversation_context(50).lines().count(), 5);
    }

    #[test]
    fn test_reset_creates_new_identity() {
        let mut state = SessionState::new("alice", 7);
        let old_session = state.session_id;
        let old_correlation = state.correlation_id;
        state.add_message(MessageRole::User, "hello");
        state.iteration_count = 3;

        state.reset();
        assert_ne!(state.session_id, old_session);
        assert_ne!(state.correlation_id, old_correlation);
        assert_eq!(state.user_id, "alice");
        assert_eq!(state.max_iterations, 7);
        assert!(state.messages.is_empty());
        assert_eq!(state.iteration_count, 0);
    }

    #[test]
    fn test_adopt_plan_keeps_session_budget_and_error() {
        let mut state = SessionState::new("alice", 3);
        state.iteration_count = 2;
        state.is_complete = true;
        state.error = Some("Critical task t1 failed: boom".to_string());
        state.tool_outputs.insert("t1".to_string(), serde_json::json!("out"));

        state.adopt_plan(Plan::new());
        assert_eq!(state.iteration_count, 2);
        assert!(state.error.is_some());
        assert!(!state.is_complete);
        assert!(state.tool_outputs.is_empty());
        assert!(!state.should_continue());

        state.reset();
        assert_eq!(state.iteration_count, 0);
        assert!(state.error.is_none());
        assert!(state.should_continue());
    }

    #[test]
    fn test_guardrail_violation_recorded() {
        let mut state = SessionState::new("alice", 10);
        state.add_guardrail_violation(ViolationKind::InputValidation, "prompt injection");
        assert_eq!(state.guardrail_violations.len(), 1);
        assert_eq!(state.guardrail_violations[0].kind, ViolationKind::InputValidation);
    }
}
