use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::models::task::RiskLevel;

/// Main configuration structure for Aegis
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Scheduler bounds and conversation window
    #[serde(default)]
    pub engine: EngineConfig,

    /// Human approval workflow
    #[serde(default)]
    pub approval: ApprovalConfig,

    /// Input/output content filtering
    #[serde(default)]
    pub guardrails: GuardrailsConfig,

    /// Local tool backends
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Persisted approval audit trail
    #[serde(default)]
    pub audit: AuditConfig,

    /// Plan generator (LLM) connection
    #[serde(default)]
    pub planner: PlannerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Executor and session bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    /// Maximum tasks processed per session before the executor stops
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Attempts per task before it is marked failed
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between attempts; attempt `n` waits `n * retry_delay_ms`
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Messages of history handed to the plan generator
    #[serde(default = "default_max_conversation_messages")]
    pub max_conversation_messages: usize,
}

const fn default_max_iterations() -> u32 {
    10
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_retry_delay_ms() -> u64 {
    2000
}

const fn default_max_conversation_messages() -> usize {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            max_conversation_messages: default_max_conversation_messages(),
        }
    }
}

/// Approval workflow configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ApprovalConfig {
    /// When false no task is ever gated
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Tasks assessed at or above this level need sign-off
    #[serde(default = "default_threshold")]
    pub threshold: RiskLevel,

    /// User recorded on approval requests
    #[serde(default = "default_user")]
    pub default_user: String,
}

const fn default_true() -> bool {
    true
}

const fn default_threshold() -> RiskLevel {
    RiskLevel::High
}

fn default_user() -> String {
    "default".to_string()
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: default_threshold(),
            default_user: default_user(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GuardrailsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for GuardrailsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Local tool backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ToolsConfig {
    /// Root directory file tools are confined to
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,

    /// Register desktop automation tools
    #[serde(default)]
    pub enable_computer_use: bool,

    #[serde(default = "default_timeout_secs")]
    pub code_execution_timeout_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub command_timeout_secs: u64,

    #[serde(default = "default_max_file_read_bytes")]
    pub max_file_read_bytes: u64,

    /// Interpreter used by `code_execution`
    #[serde(default = "default_python_binary")]
    pub python_binary: String,
}

fn default_workspace() -> PathBuf {
    PathBuf::from(".")
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_max_file_read_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_python_binary() -> String {
    "python3".to_string()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            enable_computer_use: false,
            code_execution_timeout_secs: default_timeout_secs(),
            command_timeout_secs: default_timeout_secs(),
            max_file_read_bytes: default_max_file_read_bytes(),
            python_binary: default_python_binary(),
        }
    }
}

/// Persisted audit trail configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AuditConfig {
    /// Write approval events to disk
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Root directory for `<group>/<stream>.jsonl` files
    #[serde(default = "default_audit_directory")]
    pub directory: PathBuf,

    #[serde(default = "default_log_group")]
    pub log_group: String,

    #[serde(default = "default_log_stream")]
    pub log_stream: String,
}

fn default_audit_directory() -> PathBuf {
    PathBuf::from(".aegis/audit")
}

fn default_log_group() -> String {
    "/aegis/audit".to_string()
}

fn default_log_stream() -> String {
    "task-approvals".to_string()
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: default_audit_directory(),
            log_group: default_log_group(),
            log_stream: default_log_stream(),
        }
    }
}

/// Anthropic Messages API configuration for plan generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PlannerConfig {
    /// API key (falls back to `ANTHROPIC_API_KEY` when unset)
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Temperature for plan generation; kept low for stable JSON
    #[serde(default = "default_plan_temperature")]
    pub plan_temperature: f32,

    #[serde(default = "default_synthesis_temperature")]
    pub synthesis_temperature: f32,

    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

const fn default_max_tokens() -> u32 {
    4096
}

const fn default_plan_temperature() -> f32 {
    0.3
}

const fn default_synthesis_temperature() -> f32 {
    0.7
}

const fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            api_version: default_api_version(),
            max_tokens: default_max_tokens(),
            plan_temperature: default_plan_temperature(),
            synthesis_temperature: default_synthesis_temperature(),
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl PlannerConfig {
    /// Get API key from config or environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stderr only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Rotation for file output (daily, hourly, never)
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
