// src/report.rs

//! Run plugins against a host
//!
//! Each plugin is taken through `setup`, collection and `postproc` before
//! the next one starts, so redactions only ever see that plugin's files.
//! A collection error is logged and `postproc` still runs, so whatever was
//! copied is redacted.

use crate::error::Result;
use crate::host::HostBackend;
use crate::plugins::Plugin;
use tracing::{debug, info, warn};

/// Which plugins ran and which were left out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ran: Vec<String>,
    pub skipped: Vec<String>,
}

/// Run `plugins` in order.
///
/// Plugins whose service is not detected are skipped unless `explicit`, i.e.
/// the user named them.
pub fn run_plugins(
    host: &mut dyn HostBackend,
    plugins: &mut [Box<dyn Plugin>],
    explicit: bool,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();

    for plugin in plugins.iter_mut() {
        let name = plugin.name();

        if !explicit && !plugin.check_enabled(host.as_host()) {
            info!("  [SKIP] {} (not detected)", name);
            summary.skipped.push(name.to_string());
            continue;
        }

        let unknown = host.options().unknown_for(name, &plugin.option_list());
        for key in unknown {
            warn!("Option '{}' is not known to plugin {}", key, name);
        }

        info!("Running plugin {}", name);
        host.begin_plugin(name);
        plugin.setup(host.as_host_mut());
        if let Err(e) = host.collect() {
            warn!("Collection for {} incomplete: {}", name, e);
        }
        plugin.postproc(host.as_host_mut());
        debug!("Plugin {} finished", name);

        summary.ran.push(name.to_string());
    }

    host.finish()?;
    Ok(summary)
}
