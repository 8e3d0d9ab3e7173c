//! Common test utilities for integration tests
//!
//! Scripted collaborators for driving the engine without a network:
//! a plan generator replaying canned output, a backend that counts calls,
//! and an audit sink that records events in memory.

#![allow(dead_code)]

use aegis::domain::errors::{DomainError, DomainResult};
use aegis::domain::models::{AuditEvent, Config, ToolInput, ToolKind};
use aegis::domain::ports::{
    AuditSink, NullContentFilter, PlanGenerator, PlanningRequest, SynthesisRequest, ToolBackend,
};
use aegis::services::{SessionOrchestrator, ToolRegistry};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Setup test logging
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Config with no retry delay so failure paths run instantly.
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.engine.retry_delay_ms = 0;
    config
}

/// Plan generator that replays queued plan outputs.
pub struct ScriptedPlanGenerator {
    plans: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<PlanningRequest>>,
    reply: String,
}

impl ScriptedPlanGenerator {
    pub fn new(plans: impl IntoIterator<Item = String>) -> Self {
        Self {
            plans: Mutex::new(plans.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            reply: "Done.".to_string(),
        }
    }

    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = reply.into();
        self
    }

    pub fn requests(&self) -> Vec<PlanningRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlanGenerator for ScriptedPlanGenerator {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate_plan(&self, request: &PlanningRequest) -> DomainResult<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.plans
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| DomainError::PlanGeneration("no scripted plan left".to_string()))
    }

    async fn synthesize(&self, _request: &SynthesisRequest) -> DomainResult<String> {
        Ok(self.reply.clone())
    }
}

/// Backend that counts invocations and fails on demand.
pub struct CountingBackend {
    kind: ToolKind,
    always_fail: bool,
    calls: AtomicU32,
}

impl CountingBackend {
    pub fn ok(kind: ToolKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            always_fail: false,
            calls: AtomicU32::new(0),
        })
    }

    pub fn failing(kind: ToolKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            always_fail: true,
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolBackend for CountingBackend {
    fn kind(&self) -> ToolKind {
        self.kind
    }

    async fn invoke(&self, input: &ToolInput) -> DomainResult<Value> {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.always_fail {
            return Err(DomainError::ToolFailed {
                tool: self.kind.to_string(),
                message: format!("attempt {attempt} failed"),
            });
        }
        Ok(json!({ "tool": self.kind.as_str(), "input": input }))
    }
}

/// Audit sink keeping every event in memory.
#[derive(Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn put_event(&self, _group: &str, _stream: &str, event: &AuditEvent) -> DomainResult<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Audit sink whose storage is always unavailable.
#[derive(Default)]
pub struct FailingAuditSink {
    attempts: AtomicU32,
}

impl FailingAuditSink {
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuditSink for FailingAuditSink {
    async fn put_event(&self, group: &str, stream: &str, _event: &AuditEvent) -> DomainResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(DomainError::Io(format!("audit stream {group}/{stream} unavailable")))
    }
}

/// One task descriptor as the plan generator would emit it.
pub fn descriptor(
    id: &str,
    tool: &str,
    input: Value,
    deps: &[&str],
    risk: &str,
) -> Value {
    json!({
        "id": id,
        "description": format!("{tool} step {id}"),
        "tool": tool,
        "tool_input": input,
        "dependencies": deps,
        "risk_level": risk,
    })
}

/// The two-task plan: read a file, then delete a directory.
pub fn read_then_delete_plan() -> String {
    json!([
        descriptor("task_1", "file_read", json!({"path": "a.txt"}), &[], "low"),
        descriptor(
            "task_2",
            "bash_command",
            json!({"command": "rm -rf /tmp/x"}),
            &["task_1"],
            "critical"
        ),
    ])
    .to_string()
}

/// A single low-risk read.
pub fn single_read_plan(path: &str) -> String {
    json!([descriptor("read", "file_read", json!({ "path": path }), &[], "low")]).to_string()
}

/// Orchestrator wired to scripted collaborators.
pub struct Harness {
    pub session: SessionOrchestrator,
    pub generator: Arc<ScriptedPlanGenerator>,
    pub audit: Arc<RecordingAuditSink>,
}

pub fn harness(
    config: Config,
    backends: Vec<Arc<dyn ToolBackend>>,
    plans: Vec<String>,
) -> Harness {
    let mut registry = ToolRegistry::new();
    for backend in backends {
        registry.register(backend);
    }
    let generator = Arc::new(ScriptedPlanGenerator::new(plans));
    let audit = Arc::new(RecordingAuditSink::default());

    let session = SessionOrchestrator::new(
        config,
        Arc::new(registry),
        generator.clone(),
        Arc::new(NullContentFilter::new()),
        audit.clone(),
    );
    Harness {
        session,
        generator,
        audit,
    }
}
