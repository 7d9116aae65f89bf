// src/lib.rs

//! diagplug: diagnostic collection plugins
//!
//! Plugins describe what to gather from a host for one service: files to
//! copy, files to keep out, commands whose output to capture, and secrets to
//! redact from the copies afterwards. A [`Host`] carries those directives
//! out.
//!
//! # Architecture
//!
//! - Plugins: `charmed_postgresql` (Patroni, pgBackRest, PgBouncer) and `pcp`
//! - Hosts: [`LocalHost`] writes a directory bundle, [`RecordingHost`]
//!   records directives for planning and tests
//! - Config accessors read service configuration fresh on every call and
//!   never fail; missing values degrade collection instead of aborting it

pub mod command;
pub mod config;
mod error;
pub mod host;
pub mod local;
pub mod options;
pub mod plugins;
pub mod recording;
pub mod redact;
pub mod report;
pub mod selection;
pub mod settings;

pub use command::CommandSpec;
pub use config::{ConnectAddress, PatroniConfig, PcpConf};
pub use error::{Error, Result};
pub use host::{CommandOutput, CopySpec, Host, HostBackend, SizeLimit};
pub use local::{LocalHost, Manifest};
pub use options::{OptionStore, OptionValue, PluginOpt};
pub use plugins::{all_plugins, select_plugins, Plugin};
pub use recording::{PluginPlan, RecordingHost};
pub use redact::RedactionRule;
pub use report::{run_plugins, RunSummary};
pub use settings::Settings;
