//! Registry mapping each tool kind to its backend.
//!
//! Built once at startup and shared read-only afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::domain::models::ToolKind;
use crate::domain::ports::ToolBackend;

#[derive(Clone, Default)]
pub struct ToolRegistry {
    backends: BTreeMap<ToolKind, Arc<dyn ToolBackend>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend under its own kind, replacing any previous one.
    pub fn register(&mut self, backend: Arc<dyn ToolBackend>) {
        self.backends.insert(backend.kind(), backend);
    }

    pub fn with_backend(mut self, backend: Arc<dyn ToolBackend>) -> Self {
        self.register(backend);
        self
    }

    pub fn get(&self, kind: ToolKind) -> Option<Arc<dyn ToolBackend>> {
        self.backends.get(&kind).cloned()
    }

    pub fn contains(&self, kind: ToolKind) -> bool {
        self.backends.contains_key(&kind)
    }

    /// Registered kinds in declaration order.
    pub fn catalog(&self) -> Vec<ToolKind> {
        self.backends.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.catalog())
            .finish()
    }
}
