// src/plugins/mod.rs

//! Collection plugins
//!
//! A plugin runs in two phases against a [`Host`]:
//!
//! - `setup`: declare what to copy, forbid and capture
//! - `postproc`: redact secrets from what was collected
//!
//! Neither phase can fail. A plugin that cannot find what it needs logs a
//! warning and collects less.

pub mod charmed_postgresql;
pub mod pcp;

pub use charmed_postgresql::CharmedPostgresql;
pub use pcp::Pcp;

use crate::error::{Error, Result};
use crate::host::Host;
use crate::options::{global_options, OptionValue, PluginOpt};

pub trait Plugin {
    fn name(&self) -> &'static str;

    fn short_desc(&self) -> &'static str;

    /// Options this plugin understands, with defaults
    fn option_list(&self) -> Vec<PluginOpt> {
        Vec::new()
    }

    /// Whether the service looks present on the host
    fn check_enabled(&self, _host: &dyn Host) -> bool {
        true
    }

    fn setup(&mut self, host: &mut dyn Host);

    fn postproc(&mut self, _host: &mut dyn Host) {}
}

/// Resolve an option: user override, then plugin default, then global default
pub fn get_option(plugin: &dyn Plugin, host: &dyn Host, name: &str) -> OptionValue {
    if let Some(value) = host.get_option(plugin.name(), name) {
        return value;
    }
    plugin
        .option_list()
        .into_iter()
        .chain(global_options())
        .find(|opt| opt.name == name)
        .map(|opt| opt.default)
        .unwrap_or(OptionValue::Bool(false))
}

/// Every registered plugin
pub fn all_plugins() -> Vec<Box<dyn Plugin>> {
    vec![Box::new(CharmedPostgresql::new()), Box::new(Pcp::new())]
}

pub fn find_plugin(name: &str) -> Option<Box<dyn Plugin>> {
    all_plugins().into_iter().find(|p| p.name() == name)
}

/// Look up plugins by name; an empty list selects all of them
pub fn select_plugins(names: &[String]) -> Result<Vec<Box<dyn Plugin>>> {
    if names.is_empty() {
        return Ok(all_plugins());
    }
    names
        .iter()
        .map(|name| find_plugin(name).ok_or_else(|| Error::UnknownPlugin(name.clone())))
        .collect()
}
