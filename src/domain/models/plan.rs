//! Plan arena.
//!
//! Tasks live in a map keyed by id, with a separate vector preserving plan
//! order. Membership in the "active" and "completed" views is derived from
//! task status alone, so a task can never appear in both.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::task::{Task, TaskStatus};

/// Counts of tasks by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub blocked: usize,
}

impl PlanCounts {
    /// Tasks not yet completed.
    pub fn active(&self) -> usize {
        self.pending + self.in_progress + self.failed + self.blocked
    }
}

/// An ordered, dependency-linked set of tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    tasks: HashMap<String, Task>,
    order: Vec<String>,
    completion_order: Vec<String>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an arena from tasks whose ids and dependencies were already
    /// checked. Callers outside the validator should go through it instead.
    pub(crate) fn from_validated(tasks: Vec<Task>) -> Self {
        let mut plan = Self::new();
        for task in tasks {
            if task.status == TaskStatus::Completed {
                plan.completion_order.push(task.id.clone());
            }
            plan.order.push(task.id.clone());
            plan.tasks.insert(task.id.clone(), task);
        }
        plan
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Mutable access to a task that has not completed yet.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks
            .get_mut(id)
            .filter(|task| task.status != TaskStatus::Completed)
    }

    /// Every task in plan order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().filter_map(|id| self.tasks.get(id))
    }

    /// Non-completed tasks in plan order.
    pub fn active(&self) -> impl Iterator<Item = &Task> {
        self.tasks()
            .filter(|task| task.status != TaskStatus::Completed)
    }

    /// Completed tasks in completion order.
    pub fn completed(&self) -> impl Iterator<Item = &Task> {
        self.completion_order
            .iter()
            .filter_map(|id| self.tasks.get(id))
    }

    pub fn completed_ids(&self) -> HashSet<&str> {
        self.completed().map(|task| task.id.as_str()).collect()
    }

    pub fn has_active(&self) -> bool {
        self.active().next().is_some()
    }

    pub fn has_pending(&self) -> bool {
        self.tasks().any(|task| task.status == TaskStatus::Pending)
    }

    /// First pending task, in plan order, whose dependencies have all completed.
    pub fn next_eligible(&self) -> Option<&Task> {
        let completed = self.completed_ids();
        self.tasks().find(|task| {
            task.status == TaskStatus::Pending
                && task
                    .dependencies
                    .iter()
                    .all(|dep| completed.contains(dep.as_str()))
        })
    }

    pub fn counts(&self) -> PlanCounts {
        let mut counts = PlanCounts::default();
        for task in self.tasks.values() {
            match task.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::InProgress => counts.in_progress += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
                TaskStatus::Blocked => counts.blocked += 1,
            }
        }
        counts
    }

    pub fn start(&mut self, id: &str) -> DomainResult<()> {
        self.transition(id, |task| task.transition_to(TaskStatus::InProgress))
    }

    pub fn complete(&mut self, id: &str, result: serde_json::Value) -> DomainResult<()> {
        self.transition(id, |task| task.complete(result))?;
        self.completion_order.push(id.to_string());
        Ok(())
    }

    pub fn fail(&mut self, id: &str, error: impl Into<String>) -> DomainResult<()> {
        let error = error.into();
        self.transition(id, |task| task.fail(error))
    }

    /// Mark every pending task blocked, returning their ids.
    pub fn block_pending(&mut self) -> Vec<String> {
        let ids: Vec<String> = self
            .tasks()
            .filter(|task| task.status == TaskStatus::Pending)
            .map(|task| task.id.clone())
            .collect();
        for id in &ids {
            if let Some(task) = self.tasks.get_mut(id) {
                task.status = TaskStatus::Blocked;
            }
        }
        ids
    }

    /// Drop a task from the plan entirely. Completed tasks are kept.
    pub fn remove(&mut self, id: &str) -> Option<Task> {
        if self.tasks.get(id)?.status == TaskStatus::Completed {
            return None;
        }
        self.order.retain(|existing| existing != id);
        self.tasks.remove(id)
    }

    fn transition<F>(&mut self, id: &str, apply: F) -> DomainResult<()>
    where
        F: FnOnce(&mut Task) -> Result<(), String>,
    {
        let task = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| DomainError::TaskNotFound(id.to_string()))?;
        apply(task).map_err(|reason| DomainError::InvalidStateTransition {
            task_id: id.to_string(),
            reason,
        })
    }
}
