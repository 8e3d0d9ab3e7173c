//! Table output formatting for CLI commands
//!
//! Risk reports, plan listings and pending approvals rendered with comfy-table.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::env;

use crate::cli::truncate;
use crate::domain::models::{AuditLog, RiskLevel, Task, TaskStatus};
use crate::services::RiskAssessment;

/// Table formatter for CLI output
pub struct TableFormatter {
    use_colors: bool,
    max_width: Option<usize>,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    pub fn with_config(use_colors: bool, max_width: Option<usize>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// Risk report: nominal level from the plan next to the assessed level.
    pub fn format_assessment(&self, rows: &[(Task, RiskAssessment, bool)]) -> String {
        let mut table = self.create_base_table();
        table.set_header(bold_header(&[
            "ID", "Tool", "Nominal", "Assessed", "Approval", "Factors",
        ]));

        for (task, assessment, gated) in rows {
            let approval = if *gated { "required" } else { "-" };
            let approval_cell = if self.use_colors && *gated {
                Cell::new(approval).fg(Color::Yellow).add_attribute(Attribute::Bold)
            } else {
                Cell::new(approval)
            };

            table.add_row(vec![
                Cell::new(&task.id),
                Cell::new(task.tool.as_str()),
                self.risk_cell(task.risk_level),
                self.risk_cell(assessment.level),
                approval_cell,
                Cell::new(truncate(&assessment.factors.join(", "), 60)),
            ]);
        }

        table.to_string()
    }

    /// Plan tasks in execution order.
    pub fn format_plan(&self, tasks: &[&Task]) -> String {
        let mut table = self.create_base_table();
        table.set_header(bold_header(&["#", "ID", "Tool", "Risk", "Status", "Depends On"]));

        for (position, task) in tasks.iter().enumerate() {
            let deps = if task.dependencies.is_empty() {
                "-".to_string()
            } else {
                task.dependencies.join(", ")
            };
            let status_cell = if self.use_colors {
                Cell::new(task.status.as_str()).fg(status_color(task.status))
            } else {
                Cell::new(task.status.as_str())
            };

            table.add_row(vec![
                Cell::new(position + 1),
                Cell::new(&task.id),
                Cell::new(task.tool.as_str()),
                self.risk_cell(task.risk_level),
                status_cell,
                Cell::new(truncate(&deps, 40)),
            ]);
        }

        table.to_string()
    }

    /// Pending approval requests.
    pub fn format_pending(&self, logs: &[AuditLog]) -> String {
        let mut table = self.create_base_table();
        table.set_header(bold_header(&["Task", "Tool", "Risk", "Description", "Requested"]));

        for log in logs {
            table.add_row(vec![
                Cell::new(&log.task_id),
                Cell::new(log.tool.as_str()),
                self.risk_cell(log.risk_level),
                Cell::new(truncate(&log.task_description, 40)),
                Cell::new(log.created_at.format("%H:%M:%S").to_string()),
            ]);
        }

        table.to_string()
    }

    fn risk_cell(&self, level: RiskLevel) -> Cell {
        if self.use_colors {
            Cell::new(level.to_string()).fg(risk_color(level))
        } else {
            Cell::new(level.to_string())
        }
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width {
            table.set_width(width as u16);
        }

        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn bold_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(label).add_attribute(Attribute::Bold))
        .collect()
}

/// Check if color output is supported
fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}

fn risk_color(level: RiskLevel) -> Color {
    match level {
        RiskLevel::Low => Color::Green,
        RiskLevel::Medium => Color::Yellow,
        RiskLevel::High => Color::Red,
        RiskLevel::Critical => Color::Magenta,
    }
}

fn status_color(status: TaskStatus) -> Color {
    match status {
        TaskStatus::Pending => Color::Blue,
        TaskStatus::InProgress => Color::Cyan,
        TaskStatus::Completed => Color::Green,
        TaskStatus::Failed => Color::Red,
        TaskStatus::Blocked => Color::Magenta,
    }
}
