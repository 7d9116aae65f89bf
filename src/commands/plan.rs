// src/commands/plan.rs

//! Dry run: print plugin directives without collecting

use super::RunContext;
use crate::cli::RunArgs;
use anyhow::Result;
use diagplug::local::local_hostname;
use diagplug::{run_plugins, RecordingHost, Settings};
use tracing::info;

pub fn cmd_plan(settings: &Settings, args: &RunArgs) -> Result<()> {
    let mut ctx = RunContext::new(settings, args)?;
    info!("Planning collection from {}", ctx.sysroot.display());

    let mut host = RecordingHost::new(&ctx.sysroot)
        .with_hostname(&local_hostname())
        .with_options(ctx.options);
    let summary = run_plugins(&mut host, &mut ctx.plugins, ctx.explicit)?;

    for plan in host.plans() {
        println!("{}", plan);
        for cmd in &plan.executed {
            println!("  (would run {} during setup)", cmd);
        }
    }

    if summary.ran.is_empty() {
        println!("No plugins detected.");
    }
    if !summary.skipped.is_empty() {
        println!("Not detected: {}", summary.skipped.join(", "));
    }

    Ok(())
}
