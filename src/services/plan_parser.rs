//! Extract task descriptors from plan generator output.
//!
//! Generators wrap JSON in markdown fences or surround it with prose. The
//! parser strips fences, locates the outermost array, and deserialises it.
//! Anything else is rejected as malformed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::PlanError;
use crate::domain::models::{RiskLevel, ToolInput};

/// A task as proposed by the generator, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub id: String,
    pub description: String,
    /// Tool name, checked against the catalog by the validator
    pub tool: String,
    pub tool_input: ToolInput,
    pub dependencies: Vec<String>,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Deserialize)]
struct RawDescriptor {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    description: String,
    tool: String,
    #[serde(default)]
    tool_input: ToolInput,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    risk_level: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WrappedPlan {
    tasks: Vec<RawDescriptor>,
}

/// Parse generator output into descriptors.
pub fn parse_plan(output: &str) -> Result<Vec<TaskDescriptor>, PlanError> {
    let body = strip_code_fence(output.trim());

    let raw = parse_raw(body)
        .or_else(|| extract_array(body).and_then(parse_raw))
        .ok_or_else(|| {
            PlanError::MalformedOutput(format!(
                "no JSON task array found in: {}",
                preview(output)
            ))
        })?;

    raw.into_iter().map(into_descriptor).collect()
}

/// Generate an id for a descriptor that arrived without one.
pub fn generate_task_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("task_{}", &hex[..8])
}

fn parse_raw(text: &str) -> Option<Vec<RawDescriptor>> {
    serde_json::from_str::<Vec<RawDescriptor>>(text)
        .ok()
        .or_else(|| {
            serde_json::from_str::<WrappedPlan>(text)
                .ok()
                .map(|wrapped| wrapped.tasks)
        })
}

fn into_descriptor(raw: RawDescriptor) -> Result<TaskDescriptor, PlanError> {
    let id = raw
        .id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(generate_task_id);

    let risk_level = match raw.risk_level.as_deref() {
        None => RiskLevel::Low,
        Some(level) => RiskLevel::from_str(level).ok_or_else(|| {
            PlanError::MalformedOutput(format!("task {id} has unknown risk level '{level}'"))
        })?,
    };

    let mut dependencies: Vec<String> = Vec::with_capacity(raw.dependencies.len());
    for dep in raw.dependencies {
        if !dependencies.contains(&dep) {
            dependencies.push(dep);
        }
    }

    Ok(TaskDescriptor {
        id,
        description: raw.description,
        tool: raw.tool,
        tool_input: raw.tool_input,
        dependencies,
        risk_level,
    })
}

/// Return the contents of the first fenced block, or the input unchanged.
fn strip_code_fence(text: &str) -> &str {
    let Some(start) = text.find("```") else {
        return text;
    };
    let after_fence = &text[start + 3..];
    // Skip the language tag on the opening line
    let content_start = after_fence.find('\n').map_or(0, |i| i + 1);
    let content = &after_fence[content_start..];
    match content.find("```") {
        Some(end) => content[..end].trim(),
        None => content.trim(),
    }
}

fn extract_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}

fn preview(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(80) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: &str = r#"[
        {"id": "task_1", "description": "read", "tool": "file_read",
         "tool_input": {"path": "a.txt"}, "dependencies": [], "risk_level": "low"}
    ]"#;

    #[test]
    fn test_parse_plain_array() {
        let tasks = parse_plan(PLAIN).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "task_1");
        assert_eq!(tasks[0].tool, "file_read");
        assert_eq!(tasks[0].tool_input["path"], "a.txt");
    }

    #[test]
    fn test_parse_fenced_json() {
        let fenced = format!("Here is the plan:\n```json\n{PLAIN}\n```\nLet me know.");
        assert_eq!(parse_plan(&fenced).unwrap().len(), 1);

        let bare_fence = format!("```\n{PLAIN}\n```");
        assert_eq!(parse_plan(&bare_fence).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_with_prefix_text() {
        let prefixed = format!("Sure! I will do the following. {PLAIN} That's all.");
        assert_eq!(parse_plan(&prefixed).unwrap()[0].id, "task_1");
    }

    #[test]
    fn test_parse_wrapped_object() {
        let wrapped = format!(r#"{{"tasks": {PLAIN}}}"#);
        assert_eq!(parse_plan(&wrapped).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_fields_get_defaults() {
        let tasks = parse_plan(r#"[{"tool": "web_search", "dependencies": ["x", "x"]}]"#).unwrap();
        assert!(tasks[0].id.starts_with("task_"));
        assert_eq!(tasks[0].id.len(), "task_".len() + 8);
        assert_eq!(tasks[0].risk_level, RiskLevel::Low);
        assert_eq!(tasks[0].dependencies, vec!["x".to_string()]);
        assert!(tasks[0].tool_input.is_empty());
    }

    #[test]
    fn test_uppercase_risk_level_accepted() {
        let tasks = parse_plan(r#"[{"id": "a", "tool": "bash_command", "risk_level": "CRITICAL"}]"#)
            .unwrap();
        assert_eq!(tasks[0].risk_level, RiskLevel::Critical);
    }

    #[test]
    fn test_unknown_risk_level_rejected() {
        let err = parse_plan(r#"[{"id": "a", "tool": "bash_command", "risk_level": "spicy"}]"#)
            .unwrap_err();
        assert!(matches!(err, PlanError::MalformedOutput(_)));
    }

    #[test]
    fn test_unparseable_output_rejected() {
        assert!(matches!(
            parse_plan("I cannot help with that."),
            Err(PlanError::MalformedOutput(_))
        ));
        assert!(matches!(
            parse_plan("[not json at all]"),
            Err(PlanError::MalformedOutput(_))
        ));
    }

    #[test]
    fn test_empty_array_is_a_valid_plan() {
        assert!(parse_plan("[]").unwrap().is_empty());
    }
}
