//! JSON-lines audit sink for approval events
//!
//! Each log group maps to a directory under the sink root and each stream to
//! a `<stream>.jsonl` file inside it. Files are opened in append mode so the
//! trail survives restarts.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::AuditEvent;
use crate::domain::ports::AuditSink;

/// Audit sink writing one JSON object per line
#[derive(Debug)]
pub struct JsonlAuditSink {
    root: PathBuf,
    files: Mutex<HashMap<PathBuf, File>>,
}

impl JsonlAuditSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: Mutex::new(HashMap::new()),
        }
    }

    /// File an event for `group`/`stream` is appended to
    pub fn stream_path(&self, log_group: &str, log_stream: &str) -> PathBuf {
        let mut path = self.root.clone();
        path.extend(safe_components(log_group));
        let stream: Vec<&str> = safe_components(log_stream).collect();
        let file_name = if stream.is_empty() {
            "default".to_string()
        } else {
            stream.join("_")
        };
        path.push(format!("{file_name}.jsonl"));
        path
    }

    async fn open(path: &Path) -> DomainResult<File> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                DomainError::Io(format!(
                    "failed to create audit directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| DomainError::Io(format!("failed to open {}: {e}", path.display())))
    }
}

/// Path segments of a group or stream name with separators and traversal removed
fn safe_components(name: &str) -> impl Iterator<Item = &str> {
    name.split(['/', '\\'])
        .filter(|segment| !segment.is_empty())
        .filter(|segment| matches!(Path::new(segment).components().next(), Some(Component::Normal(_))))
}

#[async_trait]
impl AuditSink for JsonlAuditSink {
    async fn put_event(
        &self,
        log_group: &str,
        log_stream: &str,
        event: &AuditEvent,
    ) -> DomainResult<()> {
        let path = self.stream_path(log_group, log_stream);
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let mut files = self.files.lock().await;
        if !files.contains_key(&path) {
            let file = Self::open(&path).await?;
            files.insert(path.clone(), file);
        }
        let Some(file) = files.get_mut(&path) else {
            return Err(DomainError::Io(format!("audit stream {} unavailable", path.display())));
        };

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!(
            event_type = event.event_type.as_str(),
            task_id = %event.task_id,
            path = %path.display(),
            "Audit event written"
        );
        Ok(())
    }
}
