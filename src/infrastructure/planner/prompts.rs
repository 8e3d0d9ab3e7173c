//! Prompt construction for plan generation and reply synthesis.

use std::fmt::Write;

use crate::domain::models::ToolKind;
use crate::domain::ports::{PlanningRequest, SynthesisRequest};

const PLAN_FORMAT: &str = r#"Format your response as a JSON array of tasks:
[
  {
    "id": "task_1",
    "description": "Search documents for X",
    "tool": "document_search",
    "tool_input": {"query": "..."},
    "dependencies": [],
    "risk_level": "low"
  }
]

Risk Assessment Guidelines:
- LOW: Read-only operations (searches, file reads, screenshots)
- MEDIUM: File writes, non-destructive operations, mouse/keyboard control
- HIGH: Code execution, network requests, system commands
- CRITICAL: File deletion, privileged operations, external API calls

Only return the JSON array, no additional text."#;

/// System prompt describing the planner's role and the available tools.
pub fn system_prompt(catalog: &[ToolKind]) -> String {
    let mut prompt = String::from(
        "You are a task planning expert for an AI agent system. \
         Break user requests into concrete, executable steps.\n\n\
         Guidelines:\n\
         1. Create granular, single-purpose tasks\n\
         2. Identify dependencies between tasks\n\
         3. Assess risk levels accurately\n\
         4. Prefer read operations before write operations\n\
         5. Keep plans focused and efficient\n\n\
         Tool Capabilities:\n",
    );
    for kind in catalog {
        let _ = writeln!(prompt, "- {kind}: {}", kind.describe());
    }
    prompt.push_str(
        "\nSecurity:\n\
         - Flag HIGH/CRITICAL risk for operations that modify state or execute code\n\
         - Never expose secrets or credentials",
    );
    prompt
}

/// User turn for a fresh plan or a refinement of `request.current_plan`.
pub fn planning_prompt(request: &PlanningRequest) -> String {
    let tools = request
        .tool_catalog
        .iter()
        .map(ToolKind::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    let body = match (&request.current_plan, &request.feedback) {
        (Some(current), Some(feedback)) => format!(
            "The current plan needs adjustment based on feedback.\n\n\
             Current Plan:\n{current}\n\n\
             Feedback: {feedback}\n\n\
             Generate an updated plan that addresses this feedback. \
             Return the full plan, not just the changes."
        ),
        _ => format!(
            "Analyze the user's request and create a detailed execution plan.\n\n\
             User Request: {}\n\n\
             Conversation History:\n{}\n\n\
             Create a step-by-step plan to fulfill this request. For each step, provide:\n\
             1. A clear description\n\
             2. The tool to use\n\
             3. Tool inputs as JSON\n\
             4. Dependencies (list of step IDs that must complete first)\n\
             5. Risk level (low, medium, high, critical)",
            request.user_query, request.conversation_context
        ),
    };

    format!("{body}\n\nAvailable Tools: {tools}\n\n{PLAN_FORMAT}")
}

/// User turn asking for the final reply built from execution results.
pub fn synthesis_prompt(request: &SynthesisRequest) -> String {
    let outputs = request
        .tool_outputs
        .iter()
        .map(|(task_id, output)| format!("Tool: {task_id}\nResult: {output}"))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Synthesize the following information into a helpful response for the user.\n\n\
         Conversation History:\n{}\n\n\
         Execution Results:\n{}\n\n\
         Tool Outputs:\n{}\n\n\
         Provide a clear, concise response that answers the user's question \
         using the execution results.",
        request.conversation_context, request.execution_summary, outputs
    )
}
