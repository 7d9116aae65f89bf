// src/commands/collect.rs

//! Collection into a directory bundle

use super::RunContext;
use crate::cli::RunArgs;
use anyhow::{Context, Result};
use diagplug::{run_plugins, LocalHost, Settings};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub fn cmd_collect(
    settings: &Settings,
    args: &RunArgs,
    output: &Path,
    timeout: Option<u64>,
    run_commands: bool,
) -> Result<()> {
    let mut ctx = RunContext::new(settings, args)?;
    info!(
        "Collecting from {} into {}",
        ctx.sysroot.display(),
        output.display()
    );

    let mut host = LocalHost::new(&ctx.sysroot, output)
        .with_context(|| format!("Cannot create bundle at {}", output.display()))?
        .with_options(ctx.options);
    if let Some(timeout) = timeout.map(Duration::from_secs).or(settings.command_timeout()) {
        host = host.with_timeout(timeout);
    }
    if run_commands {
        host = host.run_commands(true);
    }

    let summary = run_plugins(&mut host, &mut ctx.plugins, ctx.explicit)?;

    for plugin in &host.manifest().plugins {
        println!(
            "  {}: {} files, {} commands, {} redactions",
            plugin.name,
            plugin.files.len(),
            plugin.commands.len(),
            plugin.redactions.iter().map(|r| r.replacements).sum::<usize>()
        );
    }
    if !summary.skipped.is_empty() {
        println!("Not detected: {}", summary.skipped.join(", "));
    }
    println!("Bundle written to {}", host.output().display());

    Ok(())
}
