//! Interactive session REPL.
//!
//! Every line is a user message unless it is one of the session commands.

use anyhow::{Context, Result};
use console::style;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::output::TableFormatter;
use crate::cli::ChatArgs;
use crate::domain::models::{AuditLog, Config};
use crate::infrastructure::build_orchestrator;
use crate::services::{SessionOrchestrator, TurnOutcome};

const HELP: &str = "\
Commands:
  approve <task_id> [reason]  Approve a pending task
  deny <task_id> [reason]     Deny a pending task
  approve_all                 Approve all pending tasks
  deny_all                    Deny all pending tasks
  pending                     List pending approvals
  continue                    Resume execution after approvals
  refine <feedback>           Ask for a revised plan
  stats                       Show session statistics
  reset                       Start a new session
  help                        Show this help
  quit                        Exit";

/// One parsed REPL line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Approve { task_id: String, reason: Option<String> },
    Deny { task_id: String, reason: Option<String> },
    ApproveAll,
    DenyAll,
    Pending,
    Continue,
    Refine(String),
    Stats,
    Reset,
    Help,
    Quit,
    Message(String),
    Usage(&'static str),
    Empty,
}

/// Split a line into a session command or a user message.
///
/// `approve`/`deny` followed by more than an id only count as a decision
/// when the id names a pending task; otherwise the line is a message.
pub fn parse_line(line: &str, is_pending: impl Fn(&str) -> bool) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }

    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    match head.to_lowercase().as_str() {
        "approve" | "deny" => {
            let (task_id, reason) = match rest.split_once(char::is_whitespace) {
                Some((id, reason)) => (id, Some(reason.trim().to_string())),
                None => (rest, None),
            };
            if task_id.is_empty() {
                return ReplCommand::Usage("usage: approve|deny <task_id> [reason]");
            }
            if reason.is_some() && !is_pending(task_id) {
                return ReplCommand::Message(line.to_string());
            }
            let task_id = task_id.to_string();
            if head.eq_ignore_ascii_case("approve") {
                ReplCommand::Approve { task_id, reason }
            } else {
                ReplCommand::Deny { task_id, reason }
            }
        }
        "approve_all" if rest.is_empty() => ReplCommand::ApproveAll,
        "deny_all" if rest.is_empty() => ReplCommand::DenyAll,
        "pending" if rest.is_empty() => ReplCommand::Pending,
        "continue" if rest.is_empty() => ReplCommand::Continue,
        "stats" if rest.is_empty() => ReplCommand::Stats,
        "reset" if rest.is_empty() => ReplCommand::Reset,
        "help" if rest.is_empty() => ReplCommand::Help,
        "quit" | "exit" if rest.is_empty() => ReplCommand::Quit,
        "refine" if rest.is_empty() => ReplCommand::Usage("usage: refine <feedback>"),
        "refine" => ReplCommand::Refine(rest.to_string()),
        _ => ReplCommand::Message(line.to_string()),
    }
}

/// Handle chat command
pub async fn execute(args: ChatArgs, config: Config, json: bool) -> Result<()> {
    let mut session = build_orchestrator(config).context("Failed to start session")?;
    if let Some(user) = args.user {
        session = session.with_user(user);
    }

    if !json {
        println!(
            "{} session {}",
            style("Aegis").bold().cyan(),
            style(session.state().session_id).dim()
        );
        println!("Type 'help' for commands.\n");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if !json {
            print!("{} ", style("you>").green().bold());
            std::io::stdout().flush()?;
        }

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };

        let command = parse_line(&line, |id| {
            session.list_pending().iter().any(|log| log.task_id == id)
        });
        match command {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Usage(usage) => println!("{usage}"),
            ReplCommand::Message(text) => {
                let outcome = session.process_user_message(&text).await;
                print_outcome(&outcome, json)?;
            }
            ReplCommand::Refine(feedback) => {
                let outcome = session.refine_plan(&feedback).await;
                print_outcome(&outcome, json)?;
            }
            ReplCommand::Continue => {
                let outcome = session.continue_execution().await;
                print_outcome(&outcome, json)?;
            }
            ReplCommand::Approve { task_id, reason } => {
                let log = session.approve(&task_id, reason.as_deref()).await;
                print_decision(&task_id, log, "approved", json)?;
            }
            ReplCommand::Deny { task_id, reason } => {
                let log = session.deny(&task_id, reason.as_deref()).await;
                print_decision(&task_id, log, "denied", json)?;
            }
            ReplCommand::ApproveAll => {
                let logs = session.approve_all(None).await;
                print_bulk(&logs, "Approved", json)?;
            }
            ReplCommand::DenyAll => {
                let logs = session.deny_all(None).await;
                print_bulk(&logs, "Denied", json)?;
            }
            ReplCommand::Pending => print_pending(&session, json)?,
            ReplCommand::Stats => {
                let stats = session.session_stats();
                if json {
                    println!("{}", serde_json::to_string(&stats)?);
                } else {
                    println!("{}", serde_json::to_string_pretty(&stats)?);
                }
            }
            ReplCommand::Reset => {
                session.reset_session();
                if json {
                    println!("{}", serde_json::json!({ "reset": true, "session_id": session.state().session_id }));
                } else {
                    println!("Session reset. New session {}", session.state().session_id);
                }
            }
        }
    }

    Ok(())
}

fn print_outcome(outcome: &TurnOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(outcome)?);
        return Ok(());
    }

    let label = match outcome {
        TurnOutcome::Reply { .. } => style("aegis>").cyan().bold(),
        TurnOutcome::ApprovalRequired { .. } => style("aegis>").yellow().bold(),
        TurnOutcome::Blocked { .. } | TurnOutcome::Failed { .. } => style("aegis>").red().bold(),
    };
    println!("{label} {}\n", outcome.message());
    Ok(())
}

fn print_decision(task_id: &str, log: Option<AuditLog>, verb: &str, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::json!({ "task_id": task_id, "decision": verb, "audit": log })
        );
        return Ok(());
    }
    match log {
        Some(_) => println!("Task {task_id} {verb}. Use 'continue' to resume execution."),
        None => println!("Task {task_id} not found in pending approvals."),
    }
    Ok(())
}

fn print_bulk(logs: &[AuditLog], verb: &str, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(logs)?);
    } else {
        println!("{verb} {} task(s).", logs.len());
    }
    Ok(())
}

fn print_pending(session: &SessionOrchestrator, json: bool) -> Result<()> {
    let pending = session.list_pending();
    if json {
        println!("{}", serde_json::to_string(pending)?);
    } else if pending.is_empty() {
        println!("No pending approvals.");
    } else {
        println!("{}", TableFormatter::new().format_pending(pending));
    }
    Ok(())
}
