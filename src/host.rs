// src/host.rs

//! Host capability interface
//!
//! Plugins never touch the bundle themselves. They describe what to collect
//! through the [`Host`] trait; a host decides how (and whether) to do it.
//! The driver side of a host additionally implements [`HostBackend`].

use crate::command::CommandSpec;
use crate::error::Result;
use crate::options::{OptionStore, OptionValue};
use crate::redact::RedactionRule;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Exit status reported for commands that were never started
pub const STATUS_NOT_RUN: i32 = 127;

/// Size cap applied to one copy spec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "mb")]
pub enum SizeLimit {
    /// The global `log_size` option
    Default,
    /// No cap
    Unlimited,
    /// Cap in MiB; zero means no cap
    Megabytes(u64),
}

/// A path or glob to copy into the bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopySpec {
    pub path: String,
    pub sizelimit: SizeLimit,
    /// Keep the tail of the newest file when it alone exceeds the cap
    pub tailit: bool,
}

impl CopySpec {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sizelimit: SizeLimit::Default,
            tailit: true,
        }
    }

    pub fn sizelimit(mut self, limit: SizeLimit) -> Self {
        self.sizelimit = limit;
        self
    }

    pub fn tailit(mut self, tailit: bool) -> Self {
        self.tailit = tailit;
        self
    }
}

impl From<&str> for CopySpec {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for CopySpec {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

impl From<PathBuf> for CopySpec {
    fn from(path: PathBuf) -> Self {
        Self::new(path.to_string_lossy().into_owned())
    }
}

/// Result of a synchronously executed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: i32,
    pub output: String,
}

impl CommandOutput {
    pub fn new(status: i32, output: impl Into<String>) -> Self {
        Self {
            status,
            output: output.into(),
        }
    }

    pub fn not_run() -> Self {
        Self::new(STATUS_NOT_RUN, "")
    }

    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Capabilities a plugin may use
pub trait Host {
    /// Root under which every plugin path is resolved (`/` in production)
    fn sysroot(&self) -> &Path;

    /// Short hostname of the system being collected
    fn hostname(&self) -> String;

    /// A user override for a plugin (or global) option
    fn get_option(&self, plugin: &str, name: &str) -> Option<OptionValue>;

    fn add_copy_spec(&mut self, spec: CopySpec);

    fn add_forbidden_path(&mut self, glob: &str);

    /// Capture a command's output as a bundle artifact
    fn add_cmd_output(&mut self, cmd: CommandSpec);

    /// Capture the journal of units matching a pattern
    fn add_journal(&mut self, units: &str);

    /// Run a command now and return its output
    fn exec_cmd(&mut self, cmd: &CommandSpec) -> CommandOutput;

    /// Capture a command as a bundle artifact now and return its output
    fn collect_cmd_output(&mut self, cmd: &CommandSpec) -> CommandOutput;

    /// Rewrite collected files matching the rule; returns replacements made
    fn do_path_regex_sub(&mut self, rule: &RedactionRule) -> usize;

    /// Resolve an absolute system path against the sysroot
    fn resolve(&self, path: &Path) -> PathBuf {
        join_sysroot(self.sysroot(), path)
    }

    fn path_exists(&self, path: &Path) -> bool {
        self.resolve(path).exists()
    }
}

/// Driver-facing side of a host
pub trait HostBackend: Host {
    fn as_host(&self) -> &dyn Host;

    fn as_host_mut(&mut self) -> &mut dyn Host;

    fn options(&self) -> &OptionStore;

    /// Subsequent directives belong to `plugin`
    fn begin_plugin(&mut self, plugin: &str);

    /// Carry out the directives queued by the current plugin's setup
    fn collect(&mut self) -> Result<()>;

    /// Called once after the last plugin
    fn finish(&mut self) -> Result<()>;
}

/// Join an absolute path below a sysroot
pub fn join_sysroot(sysroot: &Path, path: &Path) -> PathBuf {
    let relative = path.strip_prefix("/").unwrap_or(path);
    if relative.as_os_str().is_empty() {
        sysroot.to_path_buf()
    } else {
        sysroot.join(relative)
    }
}

/// Inverse of [`join_sysroot`]: the system path of a file below the sysroot
pub fn strip_sysroot(sysroot: &Path, path: &Path) -> PathBuf {
    match path.strip_prefix(sysroot) {
        Ok(rel) => Path::new("/").join(rel),
        Err(_) => path.to_path_buf(),
    }
}
