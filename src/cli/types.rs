//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::models::RiskLevel;

#[derive(Parser)]
#[command(name = "aegis")]
#[command(about = "Aegis - Risk-Gated Task Execution Engine", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .aegis/config.yaml)
    #[arg(short, long, global = true, env = "AEGIS_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive session
    Chat(ChatArgs),

    /// Inspect plan files offline
    #[command(subcommand)]
    Plan(PlanCommands),
}

#[derive(Args, Debug, Clone)]
pub struct ChatArgs {
    /// User recorded on approval requests
    #[arg(short, long)]
    pub user: Option<String>,
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Parse and validate a plan file, then print its execution order
    Validate {
        /// Path to a JSON plan (array of task descriptors)
        file: PathBuf,
    },

    /// Print the risk assessment of every task in a plan file
    Assess {
        /// Path to a JSON plan (array of task descriptors)
        file: PathBuf,

        /// Approval threshold (low, medium, high, critical)
        #[arg(short, long, value_parser = parse_risk_level)]
        threshold: Option<RiskLevel>,
    },
}

fn parse_risk_level(value: &str) -> Result<RiskLevel, String> {
    RiskLevel::from_str(value)
        .ok_or_else(|| format!("unknown risk level '{value}' (expected low, medium, high, critical)"))
}
