//! File tools confined to the configured workspace directory.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ToolInput, ToolKind};
use crate::domain::ports::tool_backend::{input_str, require_inputs};
use crate::domain::ports::ToolBackend;
use crate::infrastructure::logging::SecretScrubber;

/// Workspace root that tool paths are resolved against.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self {
            root: normalize(&root),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` inside the workspace, rejecting anything that escapes it.
    pub fn resolve(&self, kind: ToolKind, path: &str) -> DomainResult<PathBuf> {
        let requested = Path::new(path);
        let candidate = if requested.is_absolute() {
            normalize(requested)
        } else {
            normalize(&self.root.join(requested))
        };

        if candidate.starts_with(&self.root) {
            Ok(candidate)
        } else {
            Err(DomainError::InvalidToolInput {
                tool: kind.to_string(),
                message: format!("path '{path}' is outside the workspace"),
            })
        }
    }
}

/// Lexically resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// `file_read`
#[derive(Debug, Clone)]
pub struct FileReadBackend {
    workspace: Workspace,
    max_bytes: u64,
    scrubber: SecretScrubber,
}

impl FileReadBackend {
    pub fn new(workspace: Workspace, max_bytes: u64) -> Self {
        Self {
            workspace,
            max_bytes,
            scrubber: SecretScrubber::new(),
        }
    }
}

#[async_trait]
impl ToolBackend for FileReadBackend {
    fn kind(&self) -> ToolKind {
        ToolKind::FileRead
    }

    #[instrument(skip(self, input), fields(tool = "file_read"))]
    async fn invoke(&self, input: &ToolInput) -> DomainResult<Value> {
        require_inputs(self.kind(), input)?;
        let requested = input_str(self.kind(), input, "path")?;
        let path = self.workspace.resolve(self.kind(), requested)?;

        let metadata = fs::metadata(&path).await.map_err(|e| DomainError::ToolFailed {
            tool: self.kind().to_string(),
            message: format!("cannot read {requested}: {e}"),
        })?;
        if !metadata.is_file() {
            return Err(DomainError::ToolFailed {
                tool: self.kind().to_string(),
                message: format!("{requested} is not a regular file"),
            });
        }
        if metadata.len() > self.max_bytes {
            return Err(DomainError::ToolFailed {
                tool: self.kind().to_string(),
                message: format!(
                    "{requested} is {} bytes, limit is {}",
                    metadata.len(),
                    self.max_bytes
                ),
            });
        }

        let bytes = fs::read(&path).await?;
        let content = self.scrubber.scrub(&String::from_utf8_lossy(&bytes));
        debug!(path = %path.display(), size = bytes.len(), "File read");

        Ok(json!({
            "path": requested,
            "content": content,
            "size": bytes.len(),
        }))
    }
}

/// `file_write`: creates parent directories and replaces existing content.
#[derive(Debug, Clone)]
pub struct FileWriteBackend {
    workspace: Workspace,
}

impl FileWriteBackend {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl ToolBackend for FileWriteBackend {
    fn kind(&self) -> ToolKind {
        ToolKind::FileWrite
    }

    #[instrument(skip(self, input), fields(tool = "file_write"))]
    async fn invoke(&self, input: &ToolInput) -> DomainResult<Value> {
        require_inputs(self.kind(), input)?;
        let requested = input_str(self.kind(), input, "path")?;
        let content = input_str(self.kind(), input, "content")?;
        let path = self.workspace.resolve(self.kind(), requested)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, content).await.map_err(|e| DomainError::ToolFailed {
            tool: self.kind().to_string(),
            message: format!("cannot write {requested}: {e}"),
        })?;
        info!(path = %path.display(), bytes = content.len(), "File written");

        Ok(json!({
            "path": requested,
            "bytes_written": content.len(),
        }))
    }
}
