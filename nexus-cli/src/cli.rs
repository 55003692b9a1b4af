use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "nexus",
    version,
    about = "Run tasks through the Nexus agent execution core"
)]
pub struct Cli {
    /// Path to nexus.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Overrides `[agent].protocol`: text or native
    #[arg(long, global = true)]
    pub protocol: Option<String>,
    /// Approve risky tool calls and flagged sub-tasks without asking
    #[arg(long, global = true)]
    pub yes: bool,
    /// Disable logging
    #[arg(long, global = true)]
    pub quiet: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one task through the execution loop
    Run {
        /// Pin a scope instead of routing by request text
        #[arg(long)]
        scope: Option<String>,
        /// Print step events while the task runs
        #[arg(long)]
        steps: bool,
        task: Vec<String>,
    },
    /// Decompose a request into sub-tasks and execute the plan
    Plan {
        /// Print the plan without executing it
        #[arg(long)]
        dry_run: bool,
        request: Vec<String>,
    },
}
