use serde_json::{json, Value};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::ToolKind;
use crate::infrastructure::logging::SecretScrubber;

/// Run a child process to completion and capture its output.
///
/// The child is killed if `timeout` elapses. A non-zero exit is a tool
/// failure carrying stderr. Captured text is scrubbed of credentials.
pub(super) async fn run_captured(
    kind: ToolKind,
    mut command: Command,
    timeout: Duration,
    scrubber: SecretScrubber,
) -> DomainResult<Value> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = tokio::time::timeout(timeout, command.output())
        .await
        .map_err(|_| DomainError::Timeout {
            operation: kind.to_string(),
            seconds: timeout.as_secs(),
        })?
        .map_err(|e| DomainError::ToolFailed {
            tool: kind.to_string(),
            message: format!("failed to spawn process: {e}"),
        })?;

    let stdout = scrubber.scrub(&String::from_utf8_lossy(&output.stdout));
    let stderr = scrubber.scrub(&String::from_utf8_lossy(&output.stderr));
    let exit_code = output.status.code();

    if !output.status.success() {
        warn!(tool = %kind, exit_code = ?exit_code, "Process exited unsuccessfully");
        let detail = if stderr.trim().is_empty() {
            stdout.trim()
        } else {
            stderr.trim()
        };
        return Err(DomainError::ToolFailed {
            tool: kind.to_string(),
            message: match exit_code {
                Some(code) => format!("exit code {code}: {detail}"),
                None => format!("terminated by signal: {detail}"),
            },
        });
    }

    debug!(tool = %kind, stdout_len = stdout.len(), "Process completed");
    Ok(json!({
        "stdout": stdout,
        "stderr": stderr,
        "exit_code": exit_code,
    }))
}
