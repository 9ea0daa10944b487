mod commands;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use qdrant_mcp::{Config, Error, MemoryStore, ToolSurface};
use tracing_subscriber::EnvFilter;

use commands::Commands;
use output::{ErrorResponse, print_json};

/// qdrant-mcp - semantic memory for AI agents over named Qdrant collections
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    /// Config file (default: ~/.config/qdrant-mcp/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level or filter directive; RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode, Error> {
    let command = cli.command.unwrap_or(Commands::Serve);
    if command == Commands::Version {
        return Ok(commands::handle_version(cli.json));
    }

    let config = Config::load(cli.config.as_deref())?;
    let store = MemoryStore::from_config(&config)?;
    let tools = ToolSurface::new(Arc::new(store));
    commands::execute(command, &tools, cli.json).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    let json = cli.json;

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            if json {
                print_json(&ErrorResponse {
                    error: e.to_string(),
                    code: e.code(),
                });
            } else {
                eprintln!("Error: {}", e);
            }
            ExitCode::FAILURE
        }
    }
}
