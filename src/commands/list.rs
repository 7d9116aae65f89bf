// src/commands/list.rs

//! Plugin listing

use anyhow::Result;
use diagplug::all_plugins;
use diagplug::options::global_options;

/// List registered plugins with their options
pub fn cmd_list() -> Result<()> {
    let plugins = all_plugins();

    println!("Plugins ({}):", plugins.len());
    for plugin in &plugins {
        println!("  {:<20} {}", plugin.name(), plugin.short_desc());
        for opt in plugin.option_list() {
            println!(
                "      {}.{} (default {}): {}",
                plugin.name(),
                opt.name,
                opt.default,
                opt.desc
            );
        }
    }

    println!("\nGlobal options:");
    for opt in global_options() {
        println!("  {} (default {}): {}", opt.name, opt.default, opt.desc);
    }

    Ok(())
}
