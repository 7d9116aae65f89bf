// src/cli/mod.rs
//! CLI definitions for diagplug
//!
//! Command implementations live in the `commands` module.
//!
//! - `list` - Show registered plugins and their options
//! - `plan` - Show what plugins would collect, without collecting
//! - `collect` - Collect into a directory bundle

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "diagplug")]
#[command(author = "diagplug contributors")]
#[command(version)]
#[command(about = "Diagnostic collection for charmed PostgreSQL and Performance Co-Pilot", long_about = None)]
pub struct Cli {
    /// Run settings file (default: /etc/diagplug/diagplug.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List plugins and their options
    List,

    /// Show the directives plugins would issue
    Plan {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Collect diagnostics into a directory
    Collect {
        #[command(flatten)]
        run: RunArgs,

        /// Output directory for the bundle
        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,

        /// Timeout for each command in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Run commands even when the sysroot is not /
        #[arg(long)]
        run_commands: bool,
    },
}

/// Options shared by `plan` and `collect`
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Plugin to run (repeatable; default: every detected plugin)
    #[arg(short, long = "plugin", value_name = "NAME")]
    pub plugins: Vec<String>,

    /// Root of the system to collect from
    #[arg(long, value_name = "DIR")]
    pub sysroot: Option<PathBuf>,

    /// Plugin option, e.g. pcp.pmloggerfiles=24 (repeatable)
    #[arg(short = 'k', long = "option", value_name = "PLUGIN.OPT=VAL")]
    pub options: Vec<String>,

    /// Collect all logs regardless of size limits
    #[arg(long)]
    pub all_logs: bool,

    /// Default size cap for log files in MB
    #[arg(long, value_name = "MB")]
    pub log_size: Option<i64>,
}
