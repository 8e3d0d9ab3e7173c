//! Local tool backends
//!
//! - `file_read` / `file_write`: confined to the workspace
//! - `bash_command`: `sh -c` with a timeout
//! - `code_execution`: Python interpreter with a timeout
//! - search and desktop tools: registered as unavailable placeholders

pub mod code;
pub mod filesystem;
mod process;
pub mod shell;
pub mod unavailable;

pub use code::CodeExecutionBackend;
pub use filesystem::{FileReadBackend, FileWriteBackend, Workspace};
pub use shell::ShellBackend;
pub use unavailable::UnavailableBackend;

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::domain::models::{ToolKind, ToolsConfig};
use crate::services::ToolRegistry;

/// Build the registry of backends for the configured tool set.
///
/// Desktop automation tools are only registered when computer use is enabled,
/// so plans naming them are otherwise rejected at validation.
pub fn build_registry(config: &ToolsConfig) -> ToolRegistry {
    let workspace = Workspace::new(&config.workspace);

    let mut registry = ToolRegistry::new()
        .with_backend(Arc::new(FileReadBackend::new(
            workspace.clone(),
            config.max_file_read_bytes,
        )))
        .with_backend(Arc::new(FileWriteBackend::new(workspace.clone())))
        .with_backend(Arc::new(ShellBackend::new(
            workspace.root(),
            Duration::from_secs(config.command_timeout_secs),
        )))
        .with_backend(Arc::new(CodeExecutionBackend::new(
            config.python_binary.clone(),
            workspace.root(),
            Duration::from_secs(config.code_execution_timeout_secs),
        )))
        .with_backend(Arc::new(UnavailableBackend::new(ToolKind::DocumentSearch)))
        .with_backend(Arc::new(UnavailableBackend::new(ToolKind::WebSearch)));

    if config.enable_computer_use {
        for kind in ToolKind::ALL.into_iter().filter(ToolKind::is_computer_use) {
            registry.register(Arc::new(UnavailableBackend::new(kind)));
        }
    }

    debug!(tools = ?registry.catalog(), "Tool registry built");
    registry
}
