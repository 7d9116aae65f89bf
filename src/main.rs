// src/main.rs

use anyhow::Result;
use clap::Parser;
use diagplug::Settings;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::List => commands::cmd_list(),
        Commands::Plan { run } => commands::cmd_plan(&settings, &run),
        Commands::Collect {
            run,
            output,
            timeout,
            run_commands,
        } => commands::cmd_collect(&settings, &run, &output, timeout, run_commands),
    }
}
