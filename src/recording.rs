// src/recording.rs

//! A host that records directives instead of acting on them
//!
//! Used for `diagplug plan` and throughout the tests. Synchronous commands
//! are answered from canned responses keyed by their command line; anything
//! without a response reports [`STATUS_NOT_RUN`](crate::host::STATUS_NOT_RUN).

use crate::command::CommandSpec;
use crate::error::Result;
use crate::host::{CommandOutput, CopySpec, Host, HostBackend};
use crate::options::{OptionStore, OptionValue};
use crate::redact::RedactionRule;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// A recorded redaction request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedactionPlan {
    pub path_glob: String,
    pub pattern: String,
    pub replacement: String,
}

/// Everything one plugin asked for
#[derive(Debug, Clone, Default, Serialize)]
pub struct PluginPlan {
    pub name: String,
    pub copy_specs: Vec<CopySpec>,
    pub forbidden: Vec<String>,
    pub commands: Vec<CommandSpec>,
    pub journals: Vec<String>,
    pub executed: Vec<CommandSpec>,
    pub redactions: Vec<RedactionPlan>,
}

impl PluginPlan {
    pub fn copy_paths(&self) -> Vec<&str> {
        self.copy_specs.iter().map(|s| s.path.as_str()).collect()
    }

    pub fn command(&self, artifact: &str) -> Option<&CommandSpec> {
        self.commands.iter().find(|c| c.artifact_name() == artifact)
    }
}

impl fmt::Display for PluginPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}]", self.name)?;
        for path in &self.forbidden {
            writeln!(f, "  forbid   {}", path)?;
        }
        for spec in &self.copy_specs {
            writeln!(f, "  copy     {} ({:?}{})", spec.path, spec.sizelimit, if spec.tailit { "" } else { ", no tail" })?;
        }
        for units in &self.journals {
            writeln!(f, "  journal  {}", units)?;
        }
        for cmd in &self.commands {
            writeln!(f, "  command  {} -> {}", cmd, cmd.artifact_name())?;
        }
        for red in &self.redactions {
            writeln!(f, "  redact   {} /{}/ -> {}", red.path_glob, red.pattern, red.replacement)?;
        }
        Ok(())
    }
}

/// Records plugin directives
#[derive(Debug)]
pub struct RecordingHost {
    sysroot: PathBuf,
    hostname: String,
    options: OptionStore,
    responses: HashMap<String, CommandOutput>,
    plans: Vec<PluginPlan>,
}

impl RecordingHost {
    pub fn new(sysroot: &Path) -> Self {
        Self {
            sysroot: sysroot.to_path_buf(),
            hostname: "localhost".to_string(),
            options: OptionStore::new(),
            responses: HashMap::new(),
            plans: Vec::new(),
        }
    }

    pub fn with_hostname(mut self, hostname: &str) -> Self {
        self.hostname = hostname.to_string();
        self
    }

    pub fn with_options(mut self, options: OptionStore) -> Self {
        self.options = options;
        self
    }

    /// Answer `exec_cmd` for an exact command line
    pub fn respond(&mut self, command_line: &str, output: CommandOutput) {
        self.responses.insert(command_line.to_string(), output);
    }

    pub fn plans(&self) -> &[PluginPlan] {
        &self.plans
    }

    pub fn plan(&self, name: &str) -> Option<&PluginPlan> {
        self.plans.iter().find(|p| p.name == name)
    }

    fn current(&mut self) -> &mut PluginPlan {
        if self.plans.is_empty() {
            self.plans.push(PluginPlan::default());
        }
        let last = self.plans.len() - 1;
        &mut self.plans[last]
    }
}

impl Host for RecordingHost {
    fn sysroot(&self) -> &Path {
        &self.sysroot
    }

    fn hostname(&self) -> String {
        self.hostname.clone()
    }

    fn get_option(&self, plugin: &str, name: &str) -> Option<OptionValue> {
        self.options.get(plugin, name).cloned()
    }

    fn add_copy_spec(&mut self, spec: CopySpec) {
        self.current().copy_specs.push(spec);
    }

    fn add_forbidden_path(&mut self, glob: &str) {
        self.current().forbidden.push(glob.to_string());
    }

    fn add_cmd_output(&mut self, cmd: CommandSpec) {
        self.current().commands.push(cmd);
    }

    fn add_journal(&mut self, units: &str) {
        self.current().journals.push(units.to_string());
    }

    fn exec_cmd(&mut self, cmd: &CommandSpec) -> CommandOutput {
        self.current().executed.push(cmd.clone());
        self.responses
            .get(&cmd.command_line())
            .cloned()
            .unwrap_or_else(CommandOutput::not_run)
    }

    fn collect_cmd_output(&mut self, cmd: &CommandSpec) -> CommandOutput {
        self.current().commands.push(cmd.clone());
        self.responses
            .get(&cmd.command_line())
            .cloned()
            .unwrap_or_else(CommandOutput::not_run)
    }

    fn do_path_regex_sub(&mut self, rule: &RedactionRule) -> usize {
        self.current().redactions.push(RedactionPlan {
            path_glob: rule.path_glob().to_string(),
            pattern: rule.pattern().to_string(),
            replacement: rule.replacement().to_string(),
        });
        0
    }
}

impl HostBackend for RecordingHost {
    fn as_host(&self) -> &dyn Host {
        self
    }

    fn as_host_mut(&mut self) -> &mut dyn Host {
        self
    }

    fn options(&self) -> &OptionStore {
        &self.options
    }

    fn begin_plugin(&mut self, plugin: &str) {
        self.plans.push(PluginPlan {
            name: plugin.to_string(),
            ..Default::default()
        });
    }

    fn collect(&mut self) -> Result<()> {
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}
