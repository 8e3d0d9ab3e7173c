//! Audit sink port - durable destination for approval events.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::AuditEvent;

/// Events are addressed by a log group and a stream within it.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn put_event(&self, log_group: &str, log_stream: &str, event: &AuditEvent)
        -> DomainResult<()>;
}

/// A sink that discards every event.
#[derive(Debug, Clone, Default)]
pub struct NullAuditSink;

impl NullAuditSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditSink for NullAuditSink {
    async fn put_event(
        &self,
        _log_group: &str,
        _log_stream: &str,
        _event: &AuditEvent,
    ) -> DomainResult<()> {
        Ok(())
    }
}
