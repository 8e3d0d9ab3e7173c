//! Task domain model.
//!
//! A task is one tool invocation inside a plan. Tasks form a DAG through
//! their dependency ids; status is the only record of where a task stands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend-specific arguments for a tool invocation.
pub type ToolInput = serde_json::Map<String, serde_json::Value>;

/// Status of a task in the execution pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for dependencies, approval, or its turn
    Pending,
    /// Dispatched to its backend (including retries)
    InProgress,
    /// Finished successfully; result is set
    Completed,
    /// Retries exhausted; error is set
    Failed,
    /// Can never run because a dependency will not complete
    Blocked,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in_progress" | "running" => Some(Self::InProgress),
            "completed" | "complete" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Blocked)
    }

    pub fn valid_transitions(&self) -> Vec<TaskStatus> {
        match self {
            Self::Pending => vec![Self::InProgress, Self::Blocked],
            Self::InProgress => vec![Self::Completed, Self::Failed],
            Self::Completed | Self::Failed | Self::Blocked => vec![],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered risk classification. `Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    #[serde(alias = "LOW", alias = "Low")]
    Low,
    #[serde(alias = "MEDIUM", alias = "Medium")]
    Medium,
    #[serde(alias = "HIGH", alias = "High")]
    High,
    #[serde(alias = "CRITICAL", alias = "Critical")]
    Critical,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    /// Failures at this level abort the whole session.
    pub fn is_severe(&self) -> bool {
        *self >= Self::High
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

/// The closed set of tools a plan may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    DocumentSearch,
    CodeExecution,
    BashCommand,
    WebSearch,
    FileRead,
    FileWrite,
    Screenshot,
    MouseMove,
    MouseClick,
    KeyboardType,
    KeyboardPress,
    KeyboardHotkey,
}

impl ToolKind {
    pub const ALL: [ToolKind; 12] = [
        Self::DocumentSearch,
        Self::CodeExecution,
        Self::BashCommand,
        Self::WebSearch,
        Self::FileRead,
        Self::FileWrite,
        Self::Screenshot,
        Self::MouseMove,
        Self::MouseClick,
        Self::KeyboardType,
        Self::KeyboardPress,
        Self::KeyboardHotkey,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocumentSearch => "document_search",
            Self::CodeExecution => "code_execution",
            Self::BashCommand => "bash_command",
            Self::WebSearch => "web_search",
            Self::FileRead => "file_read",
            Self::FileWrite => "file_write",
            Self::Screenshot => "screenshot",
            Self::MouseMove => "mouse_move",
            Self::MouseClick => "mouse_click",
            Self::KeyboardType => "keyboard_type",
            Self::KeyboardPress => "keyboard_press",
            Self::KeyboardHotkey => "keyboard_hotkey",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }

    /// Input keys a backend cannot run without.
    pub fn required_inputs(&self) -> &'static [&'static str] {
        match self {
            Self::DocumentSearch | Self::WebSearch => &["query"],
            Self::CodeExecution => &["code"],
            Self::BashCommand => &["command"],
            Self::FileRead => &["path"],
            Self::FileWrite => &["path", "content"],
            Self::MouseMove => &["x", "y"],
            Self::KeyboardType => &["text"],
            Self::KeyboardPress => &["key"],
            Self::KeyboardHotkey => &["keys"],
            Self::Screenshot | Self::MouseClick => &[],
        }
    }

    /// Desktop automation tools, only offered when computer use is enabled.
    pub fn is_computer_use(&self) -> bool {
        matches!(
            self,
            Self::Screenshot
                | Self::MouseMove
                | Self::MouseClick
                | Self::KeyboardType
                | Self::KeyboardPress
                | Self::KeyboardHotkey
        )
    }

    /// One-line description used in the planning prompt.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::DocumentSearch => "Search the document knowledge base (input: query)",
            Self::CodeExecution => "Run Python code in a sandboxed interpreter (input: code)",
            Self::BashCommand => "Run a shell command (input: command)",
            Self::WebSearch => "Search the web (input: query)",
            Self::FileRead => "Read a file from the workspace (input: path)",
            Self::FileWrite => "Write a file in the workspace (input: path, content)",
            Self::Screenshot => "Capture the screen",
            Self::MouseMove => "Move the mouse pointer (input: x, y)",
            Self::MouseClick => "Click the mouse (input: button)",
            Self::KeyboardType => "Type text (input: text)",
            Self::KeyboardPress => "Press a key (input: key)",
            Self::KeyboardHotkey => "Press a key combination (input: keys)",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single tool invocation in a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub description: String,
    pub tool: ToolKind,
    #[serde(default)]
    pub tool_input: ToolInput,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub requires_approval: bool,
    #[serde(default)]
    pub approved: bool,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a pending, low-risk task.
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        tool: ToolKind,
        tool_input: ToolInput,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            tool,
            tool_input,
            status: TaskStatus::Pending,
            dependencies: Vec::new(),
            risk_level: RiskLevel::Low,
            requires_approval: false,
            approved: false,
            result: None,
            error: None,
            retry_count: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Add a dependency. Repeated ids are ignored.
    pub fn with_dependency(mut self, task_id: impl Into<String>) -> Self {
        let task_id = task_id.into();
        if !self.dependencies.contains(&task_id) {
            self.dependencies.push(task_id);
        }
        self
    }

    pub fn with_dependencies<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ids.into_iter().fold(self, Self::with_dependency)
    }

    pub fn with_risk_level(mut self, level: RiskLevel) -> Self {
        self.risk_level = level;
        self
    }

    /// Look up a string-valued input, empty when absent.
    pub fn input_str(&self, key: &str) -> &str {
        self.tool_input
            .get(key)
            .and_then(serde_json::Value::as_str)
            .unwrap_or("")
    }

    pub fn can_transition_to(&self, new_status: TaskStatus) -> bool {
        self.status.can_transition_to(new_status)
    }

    /// Transition to a new status, stamping timestamps.
    pub fn transition_to(&mut self, new_status: TaskStatus) -> Result<(), String> {
        if !self.can_transition_to(new_status) {
            return Err(format!(
                "Cannot transition from {} to {}",
                self.status.as_str(),
                new_status.as_str()
            ));
        }

        self.status = new_status;
        match new_status {
            TaskStatus::InProgress => self.started_at = Some(Utc::now()),
            TaskStatus::Completed | TaskStatus::Failed => self.completed_at = Some(Utc::now()),
            _ => {}
        }
        Ok(())
    }

    /// Record a successful result.
    pub fn complete(&mut self, result: serde_json::Value) -> Result<(), String> {
        self.transition_to(TaskStatus::Completed)?;
        self.result = Some(result);
        self.error = None;
        Ok(())
    }

    /// Record a final failure.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), String> {
        self.transition_to(TaskStatus::Failed)?;
        self.error = Some(error.into());
        self.result = None;
        Ok(())
    }

    /// Approval is outstanding: the task must not be dispatched.
    pub fn awaiting_approval(&self) -> bool {
        self.requires_approval && !self.approved
    }

    /// Input keys required by the tool that are missing from `tool_input`.
    pub fn missing_inputs(&self) -> Vec<&'static str> {
        self.tool
            .required_inputs()
            .iter()
            .copied()
            .filter(|key| !self.tool_input.contains_key(*key))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(value: serde_json::Value) -> ToolInput {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
        assert_eq!(RiskLevel::Low.max(RiskLevel::Critical), RiskLevel::Critical);
    }

    #[test]
    fn test_risk_level_parsing_is_case_insensitive() {
        assert_eq!(RiskLevel::from_str("HIGH"), Some(RiskLevel::High));
        assert_eq!(RiskLevel::from_str(" critical "), Some(RiskLevel::Critical));
        assert_eq!(RiskLevel::from_str("extreme"), None);

        let parsed: RiskLevel = serde_json::from_value(json!("MEDIUM")).unwrap();
        assert_eq!(parsed, RiskLevel::Medium);
    }

    #[test]
    fn test_tool_kind_round_trips_names() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(ToolKind::from_str("launch_missiles"), None);
    }

    #[test]
    fn test_with_dependency_deduplicates() {
        let task = Task::new("t2", "second", ToolKind::FileRead, ToolInput::new())
            .with_dependencies(["t1", "t1", "t0"]);
        assert_eq!(task.dependencies, vec!["t1".to_string(), "t0".to_string()]);
    }

    #[test]
    fn test_task_state_transitions() {
        let mut task = Task::new("t1", "read", ToolKind::FileRead, ToolInput::new());
        assert!(task.complete(json!("x")).is_err());

        task.transition_to(TaskStatus::InProgress).unwrap();
        assert!(task.started_at.is_some());
        task.complete(json!({"content": "hi"})).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.result.is_some());
        assert!(task.error.is_none());

        // Completed tasks are frozen
        assert!(task.transition_to(TaskStatus::InProgress).is_err());
        assert!(task.fail("late").is_err());
    }

    #[test]
    fn test_failed_task_keeps_error_not_result() {
        let mut task = Task::new("t1", "run", ToolKind::BashCommand, ToolInput::new());
        task.transition_to(TaskStatus::InProgress).unwrap();
        task.fail("exit status 1").unwrap();
        assert_eq!(task.error.as_deref(), Some("exit status 1"));
        assert!(task.result.is_none());
    }

    #[test]
    fn test_missing_inputs() {
        let task = Task::new(
            "w",
            "write",
            ToolKind::FileWrite,
            input(json!({"path": "out.txt"})),
        );
        assert_eq!(task.missing_inputs(), vec!["content"]);
        assert_eq!(task.input_str("path"), "out.txt");
        assert_eq!(task.input_str("content"), "");
    }

    #[test]
    fn test_awaiting_approval() {
        let mut task = Task::new("b", "rm", ToolKind::BashCommand, ToolInput::new());
        assert!(!task.awaiting_approval());
        task.requires_approval = true;
        assert!(task.awaiting_approval());
        task.approved = true;
        assert!(!task.awaiting_approval());
    }
}
