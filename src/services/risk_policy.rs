//! Risk assessment and the human approval state machine.
//!
//! Assessment is a keyword policy table: each tool has a floor level and
//! input patterns can only raise it. Known false positives (a `curl | sh`
//! that is harmless, a `date --format`) are accepted behaviour of the table.
//!
//! Approval requests live in `pending` until approved or denied, then move
//! to the append-only `history`. Every transition is mirrored to the audit
//! sink; mirror failures are logged and never surface to the caller.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use tracing::{info, warn};

use crate::domain::errors::ApprovalError;
use crate::domain::models::{
    AuditDecision, AuditEvent, AuditEventKind, AuditLog, Config, Plan, RiskLevel, RiskStats, Task,
    ToolKind,
};
use crate::domain::ports::AuditSink;

static DESTRUCTIVE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\brm\s+",
        r"\bunlink\s+",
        r"\bdd\s+",
        r"\bshred\s+",
        r">\s*/",
        r"\btruncate\s+",
        r"\bmkfs\.",
        r"\bformat\b",
        r"\bwipefs\b",
    ])
});

static SYSTEM_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\bsudo\b",
        r"\bchmod\s+777\b",
        r"\bchown\s+root\b",
        r"\bsystemctl\b",
        r"/etc/",
        r"/system/",
    ])
});

static DOWNLOADER: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(&[r"\b(curl|wget)\b"]));
static SHELL_HANDOFF: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(&[r"\|", r"\b(bash|sh)\b"]));

const DANGEROUS_CODE: &[&str] = &["subprocess", "os.system", "eval", "exec"];
const SENSITIVE_PATHS: &[&str] = &[".env", "config", "secret", "key"];
const SENSITIVE_KEYSTROKES: &[&str] = &["password", "token", "key", "secret"];
const FILE_MUTATING_COMMANDS: &[&str] = &["mv", "cp", "mkdir", "touch", "echo"];
const READ_ONLY_COMMANDS: &[&str] = &[
    "ls", "find", "cat", "grep", "head", "tail", "wc", "file", "stat",
];

const CARD_WIDTH: usize = 62;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| match Regex::new(pattern) {
            Ok(regex) => Some(regex),
            Err(e) => {
                warn!(pattern, error = %e, "Skipping invalid risk pattern");
                None
            }
        })
        .collect()
}

fn any_match(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|regex| regex.is_match(text))
}

/// Result of assessing one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub factors: Vec<String>,
}

impl RiskAssessment {
    /// `Risk level: HIGH. Factors: a, b`
    pub fn explanation(&self) -> String {
        if self.factors.is_empty() {
            format!("Risk level: {}. Factors: none", self.level)
        } else {
            format!("Risk level: {}. Factors: {}", self.level, self.factors.join(", "))
        }
    }
}

/// Classify a task. Deterministic and side-effect free.
pub fn assess(task: &Task) -> RiskAssessment {
    let mut factors: Vec<&'static str> = Vec::new();
    let mut level = task.risk_level;
    let mut raise = |to: RiskLevel, factor: &'static str, level: &mut RiskLevel| {
        *level = (*level).max(to);
        factors.push(factor);
    };

    match task.tool {
        ToolKind::CodeExecution => {
            raise(RiskLevel::High, "code_execution_enabled", &mut level);
            let code = task.input_str("code").to_lowercase();
            if DANGEROUS_CODE.iter().any(|needle| code.contains(needle)) {
                raise(RiskLevel::Critical, "dangerous_code_patterns", &mut level);
            }
        }
        ToolKind::FileWrite => {
            raise(RiskLevel::Medium, "file_modification", &mut level);
            let path = task.input_str("path").to_lowercase();
            if SENSITIVE_PATHS.iter().any(|needle| path.contains(needle)) {
                raise(RiskLevel::High, "sensitive_file_access", &mut level);
            }
        }
        ToolKind::WebSearch => raise(RiskLevel::Medium, "external_network_access", &mut level),
        ToolKind::BashCommand => {
            let (rule_level, factor) = classify_command(task.input_str("command"));
            raise(rule_level, factor, &mut level);
        }
        ToolKind::Screenshot => raise(RiskLevel::Low, "screen_capture", &mut level),
        ToolKind::MouseMove | ToolKind::MouseClick => {
            raise(RiskLevel::Medium, "mouse_control", &mut level);
        }
        ToolKind::KeyboardType | ToolKind::KeyboardPress | ToolKind::KeyboardHotkey => {
            raise(RiskLevel::Medium, "keyboard_input", &mut level);
            let typed = keystroke_text(task).to_lowercase();
            if SENSITIVE_KEYSTROKES.iter().any(|needle| typed.contains(needle)) {
                raise(RiskLevel::High, "sensitive_input", &mut level);
            }
        }
        ToolKind::DocumentSearch | ToolKind::FileRead => {}
    }

    RiskAssessment {
        level,
        factors: factors.into_iter().map(str::to_string).collect(),
    }
}

fn classify_command(command: &str) -> (RiskLevel, &'static str) {
    let command = command.to_lowercase();

    if any_match(&DESTRUCTIVE_PATTERNS, &command) {
        return (RiskLevel::Critical, "destructive_operation");
    }
    if any_match(&SYSTEM_PATTERNS, &command) {
        return (RiskLevel::High, "system_modification");
    }
    if any_match(&DOWNLOADER, &command) && any_match(&SHELL_HANDOFF, &command) {
        return (RiskLevel::High, "download_and_execute");
    }

    match command.split_whitespace().next() {
        Some(first) if FILE_MUTATING_COMMANDS.contains(&first) => {
            (RiskLevel::Medium, "file_system_modification")
        }
        Some(first) if READ_ONLY_COMMANDS.contains(&first) => (RiskLevel::Low, "read_only_operation"),
        _ => (RiskLevel::Medium, "shell_command_execution"),
    }
}

fn keystroke_text(task: &Task) -> String {
    ["text", "key", "keys"]
        .iter()
        .filter_map(|key| task.tool_input.get(*key))
        .map(|value| match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Approval gate and audit bookkeeping for one session.
pub struct RiskPolicy {
    threshold: RiskLevel,
    gating_enabled: bool,
    pending: Vec<AuditLog>,
    history: Vec<AuditLog>,
    sink: Arc<dyn AuditSink>,
    log_group: String,
    log_stream: String,
}

impl RiskPolicy {
    pub fn new(threshold: RiskLevel, sink: Arc<dyn AuditSink>) -> Self {
        Self {
            threshold,
            gating_enabled: true,
            pending: Vec::new(),
            history: Vec::new(),
            sink,
            log_group: "/aegis/audit".to_string(),
            log_stream: "task-approvals".to_string(),
        }
    }

    pub fn from_config(config: &Config, sink: Arc<dyn AuditSink>) -> Self {
        Self::new(config.approval.threshold, sink)
            .with_gating(config.approval.enabled)
            .with_destination(&config.audit.log_group, &config.audit.log_stream)
    }

    /// When disabled, screening never marks a task as requiring approval.
    pub fn with_gating(mut self, enabled: bool) -> Self {
        self.gating_enabled = enabled;
        self
    }

    pub fn with_destination(mut self, log_group: &str, log_stream: &str) -> Self {
        self.log_group = log_group.to_string();
        self.log_stream = log_stream.to_string();
        self
    }

    pub fn threshold(&self) -> RiskLevel {
        self.threshold
    }

    pub fn assess(&self, task: &Task) -> RiskAssessment {
        assess(task)
    }

    /// True iff the assessed level is at or above the threshold.
    pub fn requires_approval(&self, task: &Task) -> bool {
        assess(task).level >= self.threshold
    }

    /// Assess every non-completed task, raising its recorded level and
    /// setting its approval flag. Returns ids that need sign-off.
    pub fn screen(&self, plan: &mut Plan) -> Vec<String> {
        let ids: Vec<String> = plan.active().map(|task| task.id.clone()).collect();
        let mut gated = Vec::new();

        for id in ids {
            let Some(task) = plan.get_mut(&id) else {
                continue;
            };
            let assessment = assess(task);
            task.risk_level = assessment.level;
            task.requires_approval = self.gating_enabled && assessment.level >= self.threshold;
            if task.awaiting_approval() {
                info!(
                    task_id = %task.id,
                    tool = %task.tool,
                    risk_level = %assessment.level,
                    factors = ?assessment.factors,
                    "Task requires approval"
                );
                gated.push(id);
            }
        }
        gated
    }

    /// Open an approval request. At most one may be pending per task.
    pub async fn request(&mut self, task: &Task, user_id: &str) -> Result<AuditLog, ApprovalError> {
        if self.is_pending(&task.id) {
            return Err(ApprovalError::AlreadyPending(task.id.clone()));
        }

        let assessment = assess(task);
        let mut log = AuditLog::for_task(task, user_id).with_factors(assessment.factors);
        log.risk_level = assessment.level;

        info!(task_id = %task.id, audit_id = %log.id, risk_level = %log.risk_level, "Approval requested");
        self.pending.push(log.clone());
        self.mirror(AuditEventKind::ApprovalRequested, &log).await;
        Ok(log)
    }

    /// Resolve a pending request as approved. `None` if nothing is pending.
    pub async fn approve(&mut self, task_id: &str, reason: Option<&str>) -> Option<AuditLog> {
        self.resolve(task_id, AuditDecision::Approve, reason).await
    }

    /// Resolve a pending request as denied. `None` if nothing is pending.
    pub async fn deny(&mut self, task_id: &str, reason: Option<&str>) -> Option<AuditLog> {
        self.resolve(task_id, AuditDecision::Deny, reason).await
    }

    async fn resolve(
        &mut self,
        task_id: &str,
        decision: AuditDecision,
        reason: Option<&str>,
    ) -> Option<AuditLog> {
        let position = self.pending.iter().position(|log| log.task_id == task_id)?;
        let mut log = self.pending.remove(position);
        log.resolve(decision, reason);

        info!(
            task_id,
            audit_id = %log.id,
            decision = decision.as_str(),
            reason = log.reason.as_deref().unwrap_or_default(),
            "Approval resolved"
        );
        self.history.push(log.clone());

        let kind = match decision {
            AuditDecision::Approve => AuditEventKind::TaskApproved,
            AuditDecision::Deny => AuditEventKind::TaskDenied,
        };
        self.mirror(kind, &log).await;
        Some(log)
    }

    async fn mirror(&self, kind: AuditEventKind, log: &AuditLog) {
        let event = AuditEvent::from_log(kind, log);
        if let Err(e) = self
            .sink
            .put_event(&self.log_group, &self.log_stream, &event)
            .await
        {
            warn!(
                event = kind.as_str(),
                task_id = %log.task_id,
                error = %e,
                "Failed to mirror audit event"
            );
        }
    }

    pub fn is_pending(&self, task_id: &str) -> bool {
        self.pending.iter().any(|log| log.task_id == task_id)
    }

    /// Pending requests in the order they were opened.
    pub fn list_pending(&self) -> &[AuditLog] {
        &self.pending
    }

    /// Resolved requests, newest first.
    pub fn history(&self, limit: usize) -> Vec<AuditLog> {
        self.history.iter().rev().take(limit).cloned().collect()
    }

    pub fn risk_stats(&self) -> RiskStats {
        let mut stats = RiskStats {
            total_decisions: self.history.len(),
            pending: self.pending.len(),
            ..RiskStats::default()
        };
        for log in &self.history {
            match log.decision {
                Some(AuditDecision::Approve) => stats.approved += 1,
                Some(AuditDecision::Deny) => stats.denied += 1,
                None => {}
            }
            *stats.risk_breakdown.entry(log.risk_level).or_insert(0) += 1;
        }
        if stats.total_decisions > 0 {
            #[allow(clippy::cast_precision_loss)]
            let rate = stats.approved as f64 / stats.total_decisions as f64;
            stats.approval_rate = rate;
        }
        stats
    }

    /// Drop all pending requests, e.g. when the session is reset.
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }
}

/// Render a request as a boxed card for the terminal.
pub fn format_approval_request(log: &AuditLog) -> String {
    let rule = "═".repeat(CARD_WIDTH);
    let mut lines = vec![format!("╔{rule}╗")];
    let mut row = |text: String| {
        let pad = CARD_WIDTH.saturating_sub(text.chars().count() + 1);
        lines.push(format!("║ {text}{}║", " ".repeat(pad)));
    };

    row("APPROVAL REQUIRED".to_string());
    row(String::new());
    row(format!("Task:       {}", log.task_id));
    row(format!("Tool:       {}", log.tool));
    row(format!("Risk level: {}", log.risk_level));
    if !log.risk_factors.is_empty() {
        row(format!("Factors:    {}", log.risk_factors.join(", ")));
    }
    row(format!("Requested:  {}", log.created_at.format("%Y-%m-%d %H:%M:%S UTC")));
    row(String::new());
    for chunk in wrap(&log.task_description, CARD_WIDTH - 2) {
        row(chunk);
    }
    lines.push(format!("╚{rule}╝"));
    lines.join("\n")
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + word.chars().count() + 1 > width {
            out.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}
