//! shipwright CLI - generate, publish and report
//!
//! Usage:
//!   shipwright serve                 Accept task descriptors over HTTP
//!   shipwright run <task.json>       Run one task descriptor in the foreground
//!   shipwright init-config [path]    Write a default shipwright.toml

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ship_core::config::CONFIG_FILE;
use ship_core::{ShipConfig, TaskDescriptor};
use ship_orchestrator::{Dispatcher, Orchestrator, RunRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "shipwright")]
#[command(author, version, about = "Generate a site from a brief and publish it")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP front door
    Serve {
        /// Address to bind (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Run a single task descriptor and print the report
    Run {
        /// Task descriptor (JSON)
        file: PathBuf,
    },

    /// Write a default configuration file (secrets come from the environment)
    InitConfig {
        /// Destination (defaults to shipwright.toml)
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Serve { bind } => cmd_serve(&cli.config, bind).await,
        Commands::Run { file } => cmd_run(&cli.config, file).await,
        Commands::InitConfig { path } => cmd_init_config(path),
    }
}

fn load_config(path: &Path) -> Result<Arc<ShipConfig>> {
    let config = ShipConfig::load(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    config.validate().context("Invalid configuration")?;
    Ok(Arc::new(config))
}

async fn cmd_serve(config_path: &Path, bind: Option<String>) -> Result<()> {
    let config = load_config(config_path)?;
    let addr = bind.unwrap_or_else(|| config.server.bind.clone());

    let registry = Arc::new(RunRegistry::with_capacity(config.server.max_tracked_tasks));
    let orchestrator = Orchestrator::from_config(config)
        .context("Failed to build orchestrator")?
        .with_registry(registry.clone());
    let dispatcher = Dispatcher::new(Arc::new(orchestrator));

    println!("shipwright listening on {}", addr);
    println!("Press Ctrl+C to stop");
    ship_server::run(dispatcher, registry, &addr).await
}

async fn cmd_run(config_path: &Path, file: PathBuf) -> Result<()> {
    let content = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let task: TaskDescriptor =
        serde_json::from_str(&content).context("Failed to parse task descriptor JSON")?;

    let config = load_config(config_path)?;
    let orchestrator = Orchestrator::from_config(config).context("Failed to build orchestrator")?;

    info!("Running {} (round {})", task.display_name(), task.round);
    let report = orchestrator.run(&task).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_init_config(path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    ShipConfig::write_default(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Wrote {}", path.display());
    println!("Set GITHUB_USERNAME, GITHUB_TOKEN, GEMINI_API_KEY and APP_SECRET in the environment.");
    Ok(())
}
