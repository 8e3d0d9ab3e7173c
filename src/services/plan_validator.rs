//! Plan acceptance checks.
//!
//! A candidate plan is accepted only if every task names a registered tool,
//! every dependency resolves inside the candidate, and the dependency graph
//! is acyclic. Any violation rejects the whole candidate.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::errors::PlanError;
use crate::domain::models::{Plan, Task, ToolKind};
use crate::services::plan_parser::{parse_plan, TaskDescriptor};
use crate::services::tool_registry::ToolRegistry;

/// Validates candidate plans against the tool registry.
#[derive(Debug, Clone)]
pub struct PlanValidator {
    registry: Arc<ToolRegistry>,
}

impl PlanValidator {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Parse raw generator output and validate the result.
    pub fn parse_and_validate(&self, output: &str) -> Result<Plan, PlanError> {
        let descriptors = parse_plan(output)?;
        self.validate(descriptors)
    }

    /// Validate descriptors and build the plan arena.
    pub fn validate(&self, descriptors: Vec<TaskDescriptor>) -> Result<Plan, PlanError> {
        let mut seen = HashSet::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            if !seen.insert(descriptor.id.as_str()) {
                return Err(PlanError::DuplicateTaskId(descriptor.id.clone()));
            }
        }

        let mut tasks = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let tool = self.resolve_tool(&descriptor)?;
            let task = Task::new(
                descriptor.id,
                descriptor.description,
                tool,
                descriptor.tool_input,
            )
            .with_dependencies(descriptor.dependencies)
            .with_risk_level(descriptor.risk_level);

            let missing = task.missing_inputs();
            if !missing.is_empty() {
                warn!(task_id = %task.id, tool = %tool, missing = ?missing, "Task is missing required inputs");
            }
            tasks.push(task);
        }

        check_dependencies(&tasks)?;

        if let Some(cycle) = detect_cycle(tasks.iter().map(|t| (t.id.as_str(), t.dependencies.as_slice()))) {
            return Err(PlanError::DependencyCycle(cycle));
        }

        debug!(task_count = tasks.len(), "Plan accepted");
        Ok(Plan::from_validated(tasks))
    }

    fn resolve_tool(&self, descriptor: &TaskDescriptor) -> Result<ToolKind, PlanError> {
        let tool = ToolKind::from_str(&descriptor.tool).ok_or_else(|| PlanError::UnknownTool {
            task_id: descriptor.id.clone(),
            tool: descriptor.tool.clone(),
        })?;

        if !self.registry.contains(tool) {
            return Err(PlanError::ToolNotRegistered {
                task_id: descriptor.id.clone(),
                tool: descriptor.tool.clone(),
            });
        }
        Ok(tool)
    }
}

fn check_dependencies(tasks: &[Task]) -> Result<(), PlanError> {
    let ids: HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
    for task in tasks {
        if let Some(missing) = task.dependencies.iter().find(|dep| !ids.contains(dep.as_str())) {
            return Err(PlanError::DanglingDependency {
                task_id: task.id.clone(),
                dependency: missing.clone(),
            });
        }
    }
    Ok(())
}

/// Find a dependency cycle among `(id, dependencies)` nodes.
///
/// Iterative depth-first search. `on_stack` holds the current path; `cleared`
/// holds nodes whose whole sub-graph is known acyclic, so shared
/// sub-dependencies are walked once. Returns the cycle as a path that starts
/// and ends at the same id. Dependencies naming unknown nodes are ignored.
pub fn detect_cycle<'a, I>(nodes: I) -> Option<Vec<String>>
where
    I: IntoIterator<Item = (&'a str, &'a [String])>,
{
    let mut order: Vec<&str> = Vec::new();
    let mut graph: HashMap<&str, &[String]> = HashMap::new();
    for (id, deps) in nodes {
        order.push(id);
        graph.insert(id, deps);
    }

    let mut cleared: HashSet<&str> = HashSet::with_capacity(order.len());
    let mut on_stack: HashSet<&str> = HashSet::new();
    let mut path: Vec<&str> = Vec::new();

    for root in order {
        if cleared.contains(root) {
            continue;
        }

        let mut stack: Vec<(&str, usize)> = vec![(root, 0)];
        on_stack.insert(root);
        path.push(root);

        while let Some(frame) = stack.last_mut() {
            let (node, next) = *frame;
            let deps = graph.get(node).copied().unwrap_or(&[]);

            if next < deps.len() {
                frame.1 += 1;
                let dep = deps[next].as_str();

                if on_stack.contains(dep) {
                    let start = path.iter().position(|id| *id == dep).unwrap_or(0);
                    let mut cycle: Vec<String> = path[start..].iter().map(|id| (*id).to_string()).collect();
                    cycle.push(dep.to_string());
                    return Some(cycle);
                }
                if cleared.contains(dep) {
                    continue;
                }
                if let Some((&known, _)) = graph.get_key_value(dep) {
                    on_stack.insert(known);
                    path.push(known);
                    stack.push((known, 0));
                }
            } else {
                on_stack.remove(node);
                cleared.insert(node);
                path.pop();
                stack.pop();
            }
        }
    }

    None
}

/// Dependency-respecting order of a plan's tasks.
///
/// Kahn's algorithm, releasing ready tasks in plan order. Dependencies that
/// are no longer in the plan are ignored.
pub fn topological_order(plan: &Plan) -> Vec<String> {
    let tasks: Vec<&Task> = plan.tasks().collect();
    let mut in_degree: HashMap<&str, usize> = HashMap::with_capacity(tasks.len());
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for task in &tasks {
        let known_deps = task.dependencies.iter().filter(|dep| plan.contains(dep));
        let mut degree = 0;
        for dep in known_deps {
            dependents.entry(dep.as_str()).or_default().push(task.id.as_str());
            degree += 1;
        }
        in_degree.insert(task.id.as_str(), degree);
    }

    let mut queue: VecDeque<&str> = tasks
        .iter()
        .map(|t| t.id.as_str())
        .filter(|id| in_degree.get(id) == Some(&0))
        .collect();
    let mut sorted = Vec::with_capacity(tasks.len());

    while let Some(id) = queue.pop_front() {
        sorted.push(id.to_string());
        if let Some(children) = dependents.get(id) {
            for child in children {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(child);
                    }
                }
            }
        }
    }

    sorted
}
