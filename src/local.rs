// src/local.rs

//! Local collection into a directory bundle
//!
//! `LocalHost` carries out plugin directives on the machine it runs on:
//!
//! - copy specs are expanded with `glob`, directories are walked, and
//!   forbidden paths (or anything below them) are skipped
//! - size caps select the newest files first (see [`crate::selection`])
//! - commands run with stdin nulled, stdout and stderr written straight to
//!   the artifact file, and a timeout
//! - redactions rewrite the bundle copies of the current plugin's files
//!
//! Commands only run against the live root. With any other sysroot they are
//! skipped unless explicitly enabled, since their output would describe the
//! host rather than the sysroot.
//!
//! ## Bundle layout
//!
//! ```text
//! <out>/etc/pcp.conf                        copied files at their system path
//! <out>/sos_commands/<plugin>/<artifact>    command output
//! <out>/<root_symlink>                      symlink to a command artifact
//! <out>/manifest.json                       what was collected
//! ```

use crate::command::CommandSpec;
use crate::error::{Error, Result};
use crate::host::{
    join_sysroot, strip_sysroot, CommandOutput, CopySpec, Host, HostBackend, SizeLimit,
    STATUS_NOT_RUN,
};
use crate::options::{OptionStore, OptionValue, ALL_LOGS, DEFAULT_LOG_SIZE_MB, LOG_SIZE};
use crate::redact::RedactionRule;
use crate::selection::{self, LogFile, Selected};
use chrono::{DateTime, Utc};
use glob::Pattern;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, UNIX_EPOCH};
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;
use walkdir::WalkDir;

/// Default timeout for a single command (5 minutes)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// File name of the bundle manifest
pub const MANIFEST_NAME: &str = "manifest.json";

const COMMANDS_DIR: &str = "sos_commands";
const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size: u64,
    pub tailed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandRecord {
    pub command: String,
    /// Names of environment variables passed; values are never recorded
    pub env: Vec<String>,
    pub artifact: Option<String>,
    pub status: i32,
    pub timed_out: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RedactionRecord {
    pub path_glob: String,
    pub pattern: String,
    pub files: usize,
    pub replacements: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PluginManifest {
    pub name: String,
    pub files: Vec<FileRecord>,
    /// Left out by a size cap
    pub skipped: Vec<PathBuf>,
    /// Left out because a forbidden path covered them
    pub forbidden: Vec<PathBuf>,
    pub commands: Vec<CommandRecord>,
    pub redactions: Vec<RedactionRecord>,
}

impl PluginManifest {
    pub fn command(&self, artifact: &str) -> Option<&CommandRecord> {
        self.commands
            .iter()
            .find(|c| c.artifact.as_deref() == Some(artifact))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub generated_at: DateTime<Utc>,
    pub sysroot: PathBuf,
    pub hostname: String,
    pub plugins: Vec<PluginManifest>,
}

impl Manifest {
    pub fn plugin(&self, name: &str) -> Option<&PluginManifest> {
        self.plugins.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Default)]
struct Pending {
    copy_specs: Vec<CopySpec>,
    commands: Vec<CommandSpec>,
}

#[derive(Debug)]
struct CollectedFile {
    original: PathBuf,
    bundle: PathBuf,
}

enum RunOutcome {
    NotRun,
    Finished { status: i32, timed_out: bool },
}

/// Host that writes a directory bundle
#[derive(Debug)]
pub struct LocalHost {
    sysroot: PathBuf,
    output: PathBuf,
    options: OptionStore,
    timeout: Duration,
    hostname: String,
    run_commands: bool,
    plugin: String,
    forbidden: Vec<Pattern>,
    seen: HashSet<PathBuf>,
    pending: Pending,
    collected: Vec<CollectedFile>,
    manifest: Manifest,
}

impl LocalHost {
    /// Create a host collecting from `sysroot` into the `output` directory
    pub fn new(sysroot: &Path, output: &Path) -> Result<Self> {
        if output.join(MANIFEST_NAME).exists() {
            return Err(Error::BundleExists(output.to_path_buf()));
        }
        fs::create_dir_all(output)?;

        let hostname = local_hostname();
        Ok(Self {
            sysroot: sysroot.to_path_buf(),
            output: output.to_path_buf(),
            options: OptionStore::new(),
            timeout: DEFAULT_TIMEOUT,
            hostname: hostname.clone(),
            run_commands: sysroot == Path::new("/"),
            plugin: String::new(),
            forbidden: Vec::new(),
            seen: HashSet::new(),
            pending: Pending::default(),
            collected: Vec::new(),
            manifest: Manifest {
                generated_at: Utc::now(),
                sysroot: sysroot.to_path_buf(),
                hostname,
                plugins: Vec::new(),
            },
        })
    }

    pub fn with_options(mut self, options: OptionStore) -> Self {
        self.options = options;
        self
    }

    /// Set custom command timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_hostname(mut self, hostname: &str) -> Self {
        self.hostname = hostname.to_string();
        self.manifest.hostname = hostname.to_string();
        self
    }

    /// Allow or forbid running commands
    pub fn run_commands(mut self, enabled: bool) -> Self {
        self.run_commands = enabled;
        self
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    fn current_manifest(&mut self) -> &mut PluginManifest {
        if self.manifest.plugins.is_empty() {
            self.manifest.plugins.push(PluginManifest::default());
        }
        let last = self.manifest.plugins.len() - 1;
        &mut self.manifest.plugins[last]
    }

    fn option(&self, name: &str) -> Option<&OptionValue> {
        self.options.get(&self.plugin, name)
    }

    /// Byte cap for a copy spec, `None` for unbounded
    fn size_cap(&self, limit: SizeLimit) -> Option<u64> {
        if self.option(ALL_LOGS).is_some_and(OptionValue::as_bool) {
            return None;
        }
        let mb = match limit {
            SizeLimit::Unlimited => return None,
            SizeLimit::Megabytes(mb) => mb,
            SizeLimit::Default => self
                .option(LOG_SIZE)
                .and_then(OptionValue::as_int)
                .unwrap_or(DEFAULT_LOG_SIZE_MB)
                .max(0) as u64,
        };
        if mb == 0 {
            None
        } else {
            Some(mb.saturating_mul(MIB))
        }
    }

    fn is_forbidden(&self, original: &Path) -> bool {
        original
            .ancestors()
            .any(|a| self.forbidden.iter().any(|p| p.matches_path(a)))
    }

    /// Glob for a system path pattern, rooted at the sysroot
    fn sysroot_pattern(&self, pattern: &str) -> String {
        if self.sysroot == Path::new("/") {
            return pattern.to_string();
        }
        let root = self.sysroot.to_string_lossy();
        format!(
            "{}/{}",
            Pattern::escape(root.trim_end_matches('/')),
            pattern.trim_start_matches('/')
        )
    }

    fn expand(&self, spec: &CopySpec) -> Vec<PathBuf> {
        let pattern = self.sysroot_pattern(&spec.path);
        let paths = match glob::glob(&pattern) {
            Ok(paths) => paths,
            Err(e) => {
                warn!("Invalid copy spec '{}': {}", spec.path, e);
                return Vec::new();
            }
        };

        let mut found = Vec::new();
        for path in paths.flatten() {
            let is_dir = fs::symlink_metadata(&path)
                .map(|m| m.is_dir())
                .unwrap_or(false);
            if is_dir {
                found.extend(
                    WalkDir::new(&path)
                        .follow_links(false)
                        .into_iter()
                        .filter_map(|e| e.ok())
                        .filter(|e| !e.file_type().is_dir())
                        .map(|e| e.into_path()),
                );
            } else {
                found.push(path);
            }
        }
        found
    }

    fn copy_spec(&mut self, spec: &CopySpec) {
        let mut candidates = Vec::new();
        for path in self.expand(spec) {
            let original = strip_sysroot(&self.sysroot, &path);
            if self.seen.contains(&original) {
                continue;
            }
            if self.is_forbidden(&original) {
                debug!("Skipping forbidden path {}", original.display());
                self.current_manifest().forbidden.push(original);
                continue;
            }
            let Ok(meta) = fs::symlink_metadata(&path) else {
                continue;
            };
            candidates.push(LogFile {
                path,
                size: meta.len(),
                modified: meta.modified().unwrap_or(UNIX_EPOCH),
            });
        }

        if candidates.is_empty() {
            debug!("Copy spec '{}' matched nothing", spec.path);
            return;
        }

        let cap = self.size_cap(spec.sizelimit);
        let all: Vec<PathBuf> = candidates.iter().map(|f| f.path.clone()).collect();
        let selected = selection::within_size(candidates, cap, spec.tailit);
        let chosen: HashSet<&Path> = selected.iter().map(|s| s.file().path.as_path()).collect();
        let skipped: Vec<PathBuf> = all
            .iter()
            .filter(|p| !chosen.contains(p.as_path()))
            .map(|p| strip_sysroot(&self.sysroot, p))
            .collect();
        if !skipped.is_empty() {
            info!(
                "Size limit reached for '{}': skipping {} file(s)",
                spec.path,
                skipped.len()
            );
        }

        for sel in &selected {
            let (file, tail) = match sel {
                Selected::Whole(f) => (f, None),
                Selected::Tail(f, bytes) => (f, Some(*bytes)),
            };
            let original = strip_sysroot(&self.sysroot, &file.path);
            match self.copy_file(&file.path, &original, tail) {
                Ok(bundle) => {
                    self.seen.insert(original.clone());
                    self.collected.push(CollectedFile {
                        original: original.clone(),
                        bundle,
                    });
                    self.current_manifest().files.push(FileRecord {
                        path: original,
                        size: tail.unwrap_or(file.size),
                        tailed: tail.is_some(),
                    });
                }
                Err(e) => warn!("Failed to copy {}: {}", original.display(), e),
            }
        }
        self.current_manifest().skipped.extend(skipped);
    }

    fn copy_file(&self, src: &Path, original: &Path, tail: Option<u64>) -> io::Result<PathBuf> {
        let dest = join_sysroot(&self.output, original);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        let meta = fs::symlink_metadata(src)?;
        if meta.file_type().is_symlink() {
            symlink(fs::read_link(src)?, &dest)?;
            return Ok(dest);
        }

        match tail {
            Some(bytes) => {
                let mut input = File::open(src)?;
                let len = input.metadata()?.len();
                input.seek(SeekFrom::Start(len.saturating_sub(bytes)))?;
                let mut out = File::create(&dest)?;
                io::copy(&mut input, &mut out)?;
            }
            None => {
                fs::copy(src, &dest)?;
            }
        }
        Ok(dest)
    }

    /// Spawn `cmd` with stdout and stderr going to `out`
    fn run(&self, cmd: &CommandSpec, out: File) -> RunOutcome {
        if !self.run_commands {
            debug!("Not running '{}': commands disabled for this sysroot", cmd);
            return RunOutcome::NotRun;
        }
        for program in [cmd.program.as_str(), cmd.effective_program()] {
            if which::which(program).is_err() {
                info!("  [SKIP] '{}': '{}' not found", cmd, program);
                return RunOutcome::NotRun;
            }
        }
        let err = match out.try_clone() {
            Ok(f) => f,
            Err(e) => {
                warn!("Cannot capture output of '{}': {}", cmd, e);
                return RunOutcome::NotRun;
            }
        };

        debug!("Running: {}", cmd);
        let spawned = Command::new(&cmd.program)
            .args(&cmd.args)
            .envs(&cmd.env)
            .stdin(Stdio::null())
            .stdout(Stdio::from(out))
            .stderr(Stdio::from(err))
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to spawn '{}': {}", cmd, e);
                return RunOutcome::NotRun;
            }
        };

        match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => RunOutcome::Finished {
                status: status.code().unwrap_or(-1),
                timed_out: false,
            },
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                warn!(
                    "'{}' timed out after {} seconds",
                    cmd,
                    self.timeout.as_secs()
                );
                RunOutcome::Finished {
                    status: -1,
                    timed_out: true,
                }
            }
            Err(e) => {
                let _ = child.kill();
                warn!("Failed waiting for '{}': {}", cmd, e);
                RunOutcome::NotRun
            }
        }
    }

    /// Run `cmd` into an artifact under `sos_commands/<plugin>/` and record
    /// it. Returns the artifact path when the command ran.
    fn capture(&mut self, cmd: &CommandSpec) -> (Option<PathBuf>, i32) {
        let dir = self.output.join(COMMANDS_DIR).join(&self.plugin);
        let opened = fs::create_dir_all(&dir).and_then(|_| {
            let artifact = unique_name(&dir, &cmd.artifact_name());
            File::create(dir.join(&artifact)).map(|file| (artifact, file))
        });

        let (artifact, status, timed_out) = match opened {
            Err(e) => {
                warn!("Cannot create artifact for '{}' in {}: {}", cmd, dir.display(), e);
                (None, STATUS_NOT_RUN, false)
            }
            Ok((artifact, file)) => match self.run(cmd, file) {
                RunOutcome::NotRun => {
                    let _ = fs::remove_file(dir.join(&artifact));
                    (None, STATUS_NOT_RUN, false)
                }
                RunOutcome::Finished { status, timed_out } => (Some(artifact), status, timed_out),
            },
        };

        if let (Some(name), Some(artifact)) = (&cmd.root_symlink, &artifact) {
            let link = self.output.join(name);
            if fs::symlink_metadata(&link).is_err() {
                let target = Path::new(COMMANDS_DIR).join(&self.plugin).join(artifact);
                if let Err(e) = symlink(&target, &link) {
                    warn!("Failed to create symlink {}: {}", link.display(), e);
                }
            }
        }

        let path = artifact.as_ref().map(|name| dir.join(name));
        self.current_manifest().commands.push(CommandRecord {
            command: cmd.command_line(),
            env: cmd.env.keys().cloned().collect(),
            artifact,
            status,
            timed_out,
        });
        (path, status)
    }
}

impl Host for LocalHost {
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
        self.pending.copy_specs.push(spec);
    }

    fn add_forbidden_path(&mut self, glob: &str) {
        match Pattern::new(glob) {
            Ok(pattern) => self.forbidden.push(pattern),
            Err(e) => warn!("Ignoring invalid forbidden path '{}': {}", glob, e),
        }
    }

    fn add_cmd_output(&mut self, cmd: CommandSpec) {
        self.pending.commands.push(cmd);
    }

    fn add_journal(&mut self, units: &str) {
        self.pending.commands.push(
            CommandSpec::new("journalctl").args(["--no-pager", "--unit", units]),
        );
    }

    fn exec_cmd(&mut self, cmd: &CommandSpec) -> CommandOutput {
        let mut scratch = match tempfile::tempfile() {
            Ok(f) => f,
            Err(e) => {
                warn!("Cannot create scratch file for '{}': {}", cmd, e);
                return CommandOutput::not_run();
            }
        };
        let out = match scratch.try_clone() {
            Ok(f) => f,
            Err(e) => {
                warn!("Cannot capture output of '{}': {}", cmd, e);
                return CommandOutput::not_run();
            }
        };

        match self.run(cmd, out) {
            RunOutcome::NotRun => CommandOutput::not_run(),
            RunOutcome::Finished { status, .. } => {
                let mut bytes = Vec::new();
                let read = scratch
                    .seek(SeekFrom::Start(0))
                    .and_then(|_| scratch.read_to_end(&mut bytes));
                if let Err(e) = read {
                    warn!("Failed to read output of '{}': {}", cmd, e);
                }
                CommandOutput::new(status, String::from_utf8_lossy(&bytes))
            }
        }
    }

    fn collect_cmd_output(&mut self, cmd: &CommandSpec) -> CommandOutput {
        match self.capture(cmd) {
            (None, _) => CommandOutput::not_run(),
            (Some(path), status) => match fs::read(&path) {
                Ok(bytes) => CommandOutput::new(status, String::from_utf8_lossy(&bytes)),
                Err(e) => {
                    warn!("Failed to read back {}: {}", path.display(), e);
                    CommandOutput::new(status, "")
                }
            },
        }
    }

    fn do_path_regex_sub(&mut self, rule: &RedactionRule) -> usize {
        let mut files = 0;
        let mut replacements = 0;

        for file in self.collected.iter().filter(|f| rule.matches_path(&f.original)) {
            let is_link = fs::symlink_metadata(&file.bundle)
                .map(|m| m.file_type().is_symlink())
                .unwrap_or(true);
            if is_link {
                continue;
            }
            let content = match fs::read(&file.bundle) {
                Ok(content) => content,
                Err(e) => {
                    warn!("Failed to read {} for redaction: {}", file.original.display(), e);
                    continue;
                }
            };
            let (out, n) = rule.apply(&content);
            if n == 0 {
                continue;
            }
            if let Err(e) = fs::write(&file.bundle, &out) {
                warn!("Failed to write redacted {}: {}", file.original.display(), e);
                continue;
            }
            debug!("Redacted {} match(es) in {}", n, file.original.display());
            files += 1;
            replacements += n;
        }

        self.current_manifest().redactions.push(RedactionRecord {
            path_glob: rule.path_glob().to_string(),
            pattern: rule.pattern().to_string(),
            files,
            replacements,
        });
        replacements
    }
}

impl HostBackend for LocalHost {
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
        self.plugin = plugin.to_string();
        self.pending = Pending::default();
        self.collected.clear();
        self.manifest.plugins.push(PluginManifest {
            name: plugin.to_string(),
            ..Default::default()
        });
    }

    fn collect(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.pending);
        info!(
            "Collecting {}: {} copy spec(s), {} command(s)",
            self.plugin,
            pending.copy_specs.len(),
            pending.commands.len()
        );
        for spec in &pending.copy_specs {
            self.copy_spec(spec);
        }
        for cmd in &pending.commands {
            self.capture(cmd);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.manifest)?;
        fs::write(self.output.join(MANIFEST_NAME), json)?;
        info!("Bundle written to {}", self.output.display());
        Ok(())
    }
}

/// Hostname of the machine running the collection
pub fn local_hostname() -> String {
    match nix::unistd::gethostname() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            warn!("Cannot determine hostname: {}", e);
            String::new()
        }
    }
}

fn unique_name(dir: &Path, name: &str) -> String {
    if !dir.join(name).exists() {
        return name.to_string();
    }
    (1..)
        .map(|i| format!("{}.{}", name, i))
        .find(|candidate| !dir.join(candidate).exists())
        .unwrap_or_else(|| name.to_string())
}
