// src/commands/mod.rs
//! Command handlers for the diagplug CLI

mod collect;
mod list;
mod plan;

pub use collect::cmd_collect;
pub use list::cmd_list;
pub use plan::cmd_plan;

use crate::cli::RunArgs;
use anyhow::Result;
use diagplug::options::{OptionValue, ALL_LOGS, LOG_SIZE};
use diagplug::{select_plugins, OptionStore, Plugin, Settings};
use std::path::PathBuf;

/// Settings merged with command-line flags
pub(crate) struct RunContext {
    pub sysroot: PathBuf,
    pub options: OptionStore,
    pub plugins: Vec<Box<dyn Plugin>>,
    /// Plugins were named, so detection is bypassed
    pub explicit: bool,
}

impl RunContext {
    pub fn new(settings: &Settings, args: &RunArgs) -> Result<Self> {
        let sysroot = args
            .sysroot
            .clone()
            .or_else(|| settings.sysroot.clone())
            .unwrap_or_else(|| PathBuf::from("/"));

        let mut options = OptionStore::new();
        settings.apply_to(&mut options);
        for spec in &args.options {
            options.set_override(spec)?;
        }
        if args.all_logs {
            options.set(ALL_LOGS, OptionValue::Bool(true));
        }
        if let Some(size) = args.log_size {
            options.set(LOG_SIZE, OptionValue::Int(size));
        }

        let names = if args.plugins.is_empty() {
            &settings.plugins
        } else {
            &args.plugins
        };
        let plugins = select_plugins(names)?;

        Ok(Self {
            sysroot,
            options,
            plugins,
            explicit: !names.is_empty(),
        })
    }
}
