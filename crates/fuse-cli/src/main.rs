mod config;

use clap::{Parser, Subcommand};
use config::{load_workflow, parse_config};
use fuse_orchestrator::{
    Collaborators, EventLog, InMemoryStateManager, InMemoryTaskQueue, InMemoryToolRegistrar,
    Orchestrator,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fuse", about = "Fuse — workflow validation, planning and dispatch")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "fuse.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a workflow's structure and capability requirements
    Validate {
        /// Workflow definition (JSON)
        workflow: PathBuf,
    },
    /// Validate, assign agents and print the execution levels
    Plan {
        /// Workflow definition (JSON)
        workflow: PathBuf,
    },
    /// Initiate a workflow against the in-memory task queue
    Run {
        /// Workflow definition (JSON)
        workflow: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();

    let config = parse_config(&cli.config)?;
    let (catalog, directory) = config.seed();
    info!(
        agents = config.agents.len(),
        capabilities = catalog.len(),
        "Agent roster loaded"
    );

    let queue = Arc::new(InMemoryTaskQueue::new());
    let log = Arc::new(EventLog::new());
    let orchestrator = Orchestrator::new(
        Collaborators {
            matcher: Arc::new(catalog),
            directory: Arc::new(directory),
            queue: queue.clone(),
            state_manager: Arc::new(InMemoryStateManager::new()),
            monitor: log.clone(),
            registrar: Some(Arc::new(InMemoryToolRegistrar::new())),
        },
        config.orchestrator.clone(),
    );

    match cli.command {
        Commands::Validate { workflow } => {
            let workflow = load_workflow(&workflow)?;
            match orchestrator.validate(&workflow).await {
                Ok(()) => {
                    println!(
                        "Workflow '{}' is valid ({} task(s))",
                        workflow.id,
                        workflow.tasks.len()
                    );
                }
                Err(e) if !e.violations().is_empty() => {
                    println!("Workflow '{}' is invalid:", workflow.id);
                    for violation in e.violations() {
                        println!("  - {violation}");
                    }
                    return Err(e.into());
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Plan { workflow } => {
            let workflow = load_workflow(&workflow)?;
            let plan = orchestrator.preview(&workflow).await?;
            println!("Execution plan for '{}':", workflow.id);
            for (index, level) in plan.levels.iter().enumerate() {
                println!("  Level {index}:");
                for planned in &level.tasks {
                    println!("    {} -> {}", planned.task.id, planned.agent_id);
                }
            }
            println!(
                "\nTotal: {} task(s) in {} level(s)",
                plan.task_count(),
                plan.level_count()
            );
        }
        Commands::Run { workflow } => {
            let workflow = load_workflow(&workflow)?;
            match orchestrator.initiate(&workflow).await {
                Ok(report) => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    for envelope in queue.accepted() {
                        println!(
                            "  [level {}] {} ({}) -> {}",
                            envelope.level, envelope.task_id, envelope.kind, envelope.agent_id
                        );
                    }
                }
                Err(e) => {
                    println!("{}", serde_json::to_string_pretty(&log.to_json().await)?);
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}
