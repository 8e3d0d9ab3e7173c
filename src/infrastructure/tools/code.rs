use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, instrument};

use super::process::run_captured;
use crate::domain::errors::DomainResult;
use crate::domain::models::{ToolInput, ToolKind};
use crate::domain::ports::tool_backend::{input_str, require_inputs};
use crate::domain::ports::ToolBackend;
use crate::infrastructure::logging::SecretScrubber;

/// `code_execution`: hands the snippet to a Python interpreter.
#[derive(Debug, Clone)]
pub struct CodeExecutionBackend {
    interpreter: String,
    workspace: PathBuf,
    timeout: Duration,
    scrubber: SecretScrubber,
}

impl CodeExecutionBackend {
    pub fn new(
        interpreter: impl Into<String>,
        workspace: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            interpreter: interpreter.into(),
            workspace: workspace.into(),
            timeout,
            scrubber: SecretScrubber::new(),
        }
    }
}

#[async_trait]
impl ToolBackend for CodeExecutionBackend {
    fn kind(&self) -> ToolKind {
        ToolKind::CodeExecution
    }

    #[instrument(skip(self, input), fields(tool = "code_execution"))]
    async fn invoke(&self, input: &ToolInput) -> DomainResult<Value> {
        require_inputs(self.kind(), input)?;
        let code = input_str(self.kind(), input, "code")?;
        info!(
            interpreter = %self.interpreter,
            code_len = code.len(),
            "Executing code snippet"
        );

        let mut command = Command::new(&self.interpreter);
        command.arg("-c").arg(code).current_dir(&self.workspace);
        run_captured(self.kind(), command, self.timeout, self.scrubber).await
    }
}
