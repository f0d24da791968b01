// ABOUTME: Entry point for the acr-sweep CLI application.
// ABOUTME: Parses arguments, resolves configuration and dispatches to command handlers.

mod cli;
mod commands;

use acr_sweep::config::Config;
use acr_sweep::error::Result;
use acr_sweep::output::Output;
use clap::Parser;
use cli::{Cli, Commands};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = cli.output_mode();
    let result = run(cli).await;

    if let Err(e) = result {
        Output::new(mode).error(&e.to_string());
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let output = Output::new(cli.output_mode());
    let cwd = env::current_dir()?;
    let overrides = cli.overrides();

    match cli.command {
        Commands::Init { force } => commands::init(&cwd, cli.registry.as_deref(), force, output),
        Commands::Scan => {
            let config = Config::locate(cli.config.as_deref(), &cwd)?.resolve(&overrides)?;
            commands::scan(config, output).await
        }
        Commands::Clean { mode, yes } => {
            let config = Config::locate(cli.config.as_deref(), &cwd)?.resolve(&overrides)?;
            commands::clean(config, mode, yes, output).await
        }
    }
}
