mod approval;
mod cli;

use approval::ConsoleApproval;
use clap::Parser;
use cli::{Cli, Command};
use nexus_core::application::agent::{EventSink, RunOptions};
use nexus_core::application::approval::{ApprovalGate, AutoApprove};
use nexus_core::config::{AppConfig, ProtocolMode};
use nexus_core::infrastructure::model::OpenAiGateway;
use nexus_core::infrastructure::tooling::HttpToolGateway;
use nexus_core::Orchestrator;
use serde_json::json;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

const STEP_BUFFER: usize = 64;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(cli.quiet);
    debug!(command = ?cli.command, config = ?cli.config, "CLI arguments parsed");

    let mut config = AppConfig::load(cli.config.as_deref())?;
    match &cli.config {
        Some(path) => info!(path = %path.display(), "Loaded configuration from file"),
        None => info!("Loaded configuration using default path or defaults"),
    }
    if let Some(protocol) = &cli.protocol {
        config.agent.protocol = ProtocolMode::parse(protocol)?;
    }

    let model = Arc::new(OpenAiGateway::from_config(&config.model, config.agent.model_timeout)?);
    let tools = Arc::new(HttpToolGateway::from_config(&config.tool_gateway)?);
    let approval: Arc<dyn ApprovalGate> = if cli.yes {
        Arc::new(AutoApprove)
    } else {
        Arc::new(ConsoleApproval::new())
    };
    let embeds = config.model.embedding_model.is_some();
    let mut orchestrator = Orchestrator::new(config, model.clone(), tools).with_approval(approval);
    if embeds {
        orchestrator = orchestrator.with_embedder(model);
        let indexed = orchestrator.refresh_skills().await;
        debug!(skills = indexed, "Skill index ready");
    }

    match cli.command {
        Command::Run { scope, steps, task } => {
            let task = require_text(task, "task")?;
            let mut options = RunOptions {
                pinned_scope: scope,
                ..RunOptions::default()
            };
            let printer = if steps {
                let (sink, mut rx) = EventSink::channel(STEP_BUFFER);
                options.events = sink;
                Some(tokio::spawn(async move {
                    while let Some(event) = rx.recv().await {
                        if let Ok(line) = serde_json::to_string(&event) {
                            eprintln!("{line}");
                        }
                    }
                }))
            } else {
                None
            };

            info!("Executing task from CLI");
            let outcome = orchestrator.run_with(&task, options).await;
            if let Some(printer) = printer
                && let Err(err) = printer.await
            {
                warn!(error = %err, "Step printer stopped early");
            }
            let output = json!({
                "status": outcome.status.as_str(),
                "scope": outcome.scope_id,
                "response": outcome.response,
                "escalations": outcome.escalations,
                "validation": outcome.validation,
                "trace": outcome.trace,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Plan { dry_run, request } => {
            let request = require_text(request, "request")?;
            let mut plan = orchestrator.plan(&request).await;
            if dry_run {
                println!("{}", serde_json::to_string_pretty(&plan)?);
                return Ok(());
            }
            let summary = orchestrator.execute_plan(&mut plan).await;
            let output = json!({
                "summary": summary,
                "plan": plan,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    info!("Nexus execution finished");
    Ok(())
}

fn init_tracing(quiet: bool) {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = if quiet {
            EnvFilter::new("off")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        };
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_level(true)
            .with_writer(std::io::stderr)
            .init();
    });
}

fn require_text(words: Vec<String>, what: &str) -> Result<String, Box<dyn Error>> {
    let text = words.join(" ").trim().to_string();
    if text.is_empty() {
        warn!("No {what} provided");
        return Err(format!("{what} required").into());
    }
    Ok(text)
}
