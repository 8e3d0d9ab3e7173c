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

/// `bash_command`: runs the command through `sh -c` in the workspace.
#[derive(Debug, Clone)]
pub struct ShellBackend {
    workspace: PathBuf,
    timeout: Duration,
    scrubber: SecretScrubber,
}

impl ShellBackend {
    pub fn new(workspace: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            workspace: workspace.into(),
            timeout,
            scrubber: SecretScrubber::new(),
        }
    }
}

#[async_trait]
impl ToolBackend for ShellBackend {
    fn kind(&self) -> ToolKind {
        ToolKind::BashCommand
    }

    #[instrument(skip(self, input), fields(tool = "bash_command"))]
    async fn invoke(&self, input: &ToolInput) -> DomainResult<Value> {
        require_inputs(self.kind(), input)?;
        let script = input_str(self.kind(), input, "command")?;
        info!(command = %self.scrubber.scrub(script), "Running shell command");

        let mut command = Command::new("sh");
        command.arg("-c").arg(script).current_dir(&self.workspace);
        run_captured(self.kind(), command, self.timeout, self.scrubber).await
    }
}
