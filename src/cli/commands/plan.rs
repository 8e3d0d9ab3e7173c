//! Offline plan inspection: validation and risk assessment of plan files.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

use crate::cli::output::TableFormatter;
use crate::cli::{output, CommandOutput, PlanCommands};
use crate::domain::models::{Config, Plan, RiskLevel, Task};
use crate::domain::ports::NullAuditSink;
use crate::infrastructure::tools::build_registry;
use crate::services::{topological_order, PlanValidator, RiskAssessment, RiskPolicy};

pub async fn execute(command: PlanCommands, config: &Config, json: bool) -> Result<()> {
    match command {
        PlanCommands::Validate { file } => handle_validate(&file, config, json).await,
        PlanCommands::Assess { file, threshold } => {
            handle_assess(&file, config, threshold, json).await
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ValidationOutput {
    pub file: String,
    pub task_count: usize,
    pub execution_order: Vec<String>,
    #[serde(skip)]
    table: String,
}

impl CommandOutput for ValidationOutput {
    fn to_human(&self) -> String {
        format!(
            "Plan is valid: {} task(s)\n{}\nExecution order: {}",
            self.task_count,
            self.table,
            self.execution_order.join(" -> ")
        )
    }

    fn to_json(&self) -> serde_json::Value {
        json!({
            "valid": true,
            "file": self.file,
            "task_count": self.task_count,
            "execution_order": self.execution_order,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct AssessedTask {
    pub id: String,
    pub tool: String,
    pub nominal: RiskLevel,
    pub assessed: RiskLevel,
    pub requires_approval: bool,
    pub factors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AssessmentOutput {
    pub threshold: RiskLevel,
    pub tasks: Vec<AssessedTask>,
    #[serde(skip)]
    table: String,
}

impl CommandOutput for AssessmentOutput {
    fn to_human(&self) -> String {
        let gated = self.tasks.iter().filter(|t| t.requires_approval).count();
        format!(
            "{}\n{} of {} task(s) require approval at threshold {}",
            self.table,
            gated,
            self.tasks.len(),
            self.threshold
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

async fn load_plan(file: &Path, config: &Config) -> Result<Plan> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read plan file {}", file.display()))?;

    let validator = PlanValidator::new(Arc::new(build_registry(&config.tools)));
    validator
        .parse_and_validate(&text)
        .with_context(|| format!("Plan {} is invalid", file.display()))
}

fn ordered_tasks(plan: &Plan) -> Vec<&Task> {
    topological_order(plan)
        .iter()
        .filter_map(|id| plan.get(id))
        .collect()
}

/// Handle plan validate command
pub async fn handle_validate(file: &Path, config: &Config, json: bool) -> Result<()> {
    let plan = load_plan(file, config).await?;
    let tasks = ordered_tasks(&plan);

    let result = ValidationOutput {
        file: file.display().to_string(),
        task_count: plan.len(),
        execution_order: tasks.iter().map(|task| task.id.clone()).collect(),
        table: TableFormatter::new().format_plan(&tasks),
    };
    output(&result, json);
    Ok(())
}

/// Assess each task in execution order: `(task, assessment, gated)`.
fn assess_plan(plan: &Plan, threshold: RiskLevel, gating: bool) -> Vec<(Task, RiskAssessment, bool)> {
    let policy = RiskPolicy::new(threshold, Arc::new(NullAuditSink::new()));
    ordered_tasks(plan)
        .into_iter()
        .map(|task| {
            let assessment = policy.assess(task);
            let gated = gating && policy.requires_approval(task);
            (task.clone(), assessment, gated)
        })
        .collect()
}

/// Handle plan assess command
pub async fn handle_assess(
    file: &Path,
    config: &Config,
    threshold: Option<RiskLevel>,
    json: bool,
) -> Result<()> {
    let plan = load_plan(file, config).await?;
    let threshold = threshold.unwrap_or(config.approval.threshold);
    let rows = assess_plan(&plan, threshold, config.approval.enabled);

    let result = AssessmentOutput {
        threshold,
        tasks: rows
            .iter()
            .map(|(task, assessment, gated)| AssessedTask {
                id: task.id.clone(),
                tool: task.tool.to_string(),
                nominal: task.risk_level,
                assessed: assessment.level,
                requires_approval: *gated,
                factors: assessment.factors.clone(),
            })
            .collect(),
        table: TableFormatter::new().format_assessment(&rows),
    };
    output(&result, json);
    Ok(())
}
