//! Waypoint CLI
//!
//! Turns a task description into ordered steps, grounded in the documents
//! passed on the command line.

mod commands;

use clap::{Parser, Subcommand};
use commands::{ChunkCommand, ExtractCommand, PlanCommand, SearchCommand};
use std::path::PathBuf;
use waypoint_core::logging::{self, LogFormat};
use waypoint_core::{config::AppConfig, AppResult};

/// Waypoint - retrieval-augmented task planning
#[derive(Parser, Debug)]
#[command(name = "waypoint")]
#[command(about = "Turn a task into ordered steps grounded in your documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "WAYPOINT_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "WAYPOINT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Generation provider (ollama, openai, claude)
    #[arg(short, long, global = true, env = "WAYPOINT_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "WAYPOINT_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a step-by-step plan for a task
    Plan(PlanCommand),

    /// Show the fragments most similar to a query
    Search(SearchCommand),

    /// Mine steps or UI elements from a document
    Extract(ExtractCommand),

    /// Show how a document is split into fragments
    Chunk(ChunkCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load()?;

    // A config path given only as a flag was not seen by `load`
    if let Some(ref path) = cli.config {
        if config.config_file.as_ref() != Some(path) {
            config = config.merge_yaml(path)?;
        }
    }

    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
        cli.log_json,
    );

    let format = if config.log_json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    logging::init_logging(config.log_level.as_deref(), config.no_color, format)?;

    tracing::info!("Waypoint starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    let command_name = match &cli.command {
        Commands::Plan(_) => "plan",
        Commands::Search(_) => "search",
        Commands::Extract(_) => "extract",
        Commands::Chunk(_) => "chunk",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Plan(cmd) => cmd.execute(&config).await,
        Commands::Search(cmd) => cmd.execute(&config).await,
        Commands::Extract(cmd) => cmd.execute(),
        Commands::Chunk(cmd) => cmd.execute(&config),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
