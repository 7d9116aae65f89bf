// src/plugins/pcp.rs

//! Performance Co-Pilot
//!
//! Directory locations come from `/etc/pcp.conf`. The bulky per-host
//! archives are bounded: pmmgr data by total size, pmlogger archives by
//! count (newest first). Either cap is lifted by the global `all_logs`.
//!
//! The default pmlogger layout is `PCP_LOG_DIR/pmlogger/<host>/` holding
//! `YYYYMMDD.HH.MM.{N,N.index,N.meta}` archives, `Latest` and
//! `pmlogger.log{,.prior}`. Only the collecting host's directory is taken.

use super::{get_option, Plugin};
use crate::command::CommandSpec;
use crate::config::pcp::PCP_CONF_PATH;
use crate::config::PcpConf;
use crate::host::{CopySpec, Host, SizeLimit, STATUS_NOT_RUN};
use crate::options::{OptionValue, PluginOpt, ALL_LOGS};
use crate::selection::{take_listed, take_newest, LogFile};
use glob::Pattern;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

/// Option: size cap in MiB for pmmgr data
pub const OPT_PMMGRLOGS: &str = "pmmgrlogs";
/// Option: number of pmlogger files to collect
pub const OPT_PMLOGGERFILES: &str = "pmloggerfiles";

const DEFAULT_PMMGRLOGS_MB: i64 = 100;
const DEFAULT_PMLOGGERFILES: i64 = 12;

/// Stock copies shipped by the packages; many small files
const VAR_CONFIG_SKIP: [&str; 4] = ["pmchart", "pmlogconf", "pmieconf", "pmlogrewrite"];

#[derive(Debug, Default)]
pub struct Pcp {
    conf: Option<PcpConf>,
}

impl Pcp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directories read from pcp.conf during the last setup
    pub fn conf(&self) -> Option<&PcpConf> {
        self.conf.as_ref()
    }

    /// pmmgr size cap, unlimited under `all_logs` or for a zero/negative size
    fn size_limit(&self, host: &dyn Host) -> SizeLimit {
        if get_option(self, host, ALL_LOGS).as_bool() {
            return SizeLimit::Unlimited;
        }
        match get_option(self, host, OPT_PMMGRLOGS).as_int() {
            Some(mb) if mb > 0 => SizeLimit::Megabytes(mb as u64),
            _ => SizeLimit::Unlimited,
        }
    }

    /// pmlogger count cap; `None` means every file
    fn count_limit(&self, host: &dyn Host) -> Option<usize> {
        if get_option(self, host, ALL_LOGS).as_bool() {
            return None;
        }
        get_option(self, host, OPT_PMLOGGERFILES)
            .as_int()
            .filter(|n| *n > 0)
            .map(|n| n as usize)
    }

    /// Newest-first entries of the pmlogger directory, as system paths.
    ///
    /// Order comes from `ls -t1`; when that cannot run, from a scan of the
    /// directory.
    fn pmlogger_files(&self, host: &mut dyn Host, dir: &Path, limit: Option<usize>) -> Vec<PathBuf> {
        let listing = CommandSpec::new("ls")
            .arg("-t1")
            .arg(host.resolve(dir).to_string_lossy());
        let res = host.exec_cmd(&listing);
        if res.status == STATUS_NOT_RUN {
            return Self::scan_newest(&*host, dir, limit);
        }
        if !res.success() {
            debug!("Listing {} failed with status {}", dir.display(), res.status);
            return Vec::new();
        }
        let names = res
            .output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|name| dir.join(name));
        take_listed(names, limit)
    }

    /// Newest regular files of `dir` by modification time, as system paths
    fn scan_newest(host: &dyn Host, dir: &Path, limit: Option<usize>) -> Vec<PathBuf> {
        let entries = match fs::read_dir(host.resolve(dir)) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot read {}: {}", dir.display(), e);
                return Vec::new();
            }
        };
        let files = entries
            .flatten()
            .filter_map(|entry| {
                let meta = entry.metadata().ok()?;
                meta.is_file().then(|| LogFile {
                    path: dir.join(entry.file_name()),
                    size: meta.len(),
                    modified: meta.modified().unwrap_or(UNIX_EPOCH),
                })
            })
            .collect();
        take_newest(files, limit).into_iter().map(|f| f.path).collect()
    }

    /// Archive named on the ` pmlogger:` line of `pcp` output
    pub fn pmlogger_archive(pcp_output: &str) -> Option<&str> {
        pcp_output
            .lines()
            .find(|line| line.starts_with(" pmlogger:"))
            .and_then(|line| line.split_whitespace().last())
    }
}

impl Plugin for Pcp {
    fn name(&self) -> &'static str {
        "pcp"
    }

    fn short_desc(&self) -> &'static str {
        "Performance Co-Pilot data"
    }

    fn option_list(&self) -> Vec<PluginOpt> {
        vec![
            PluginOpt::new(
                OPT_PMMGRLOGS,
                OptionValue::Int(DEFAULT_PMMGRLOGS_MB),
                "size limit in MB of pmmgr logs",
            ),
            PluginOpt::new(
                OPT_PMLOGGERFILES,
                OptionValue::Int(DEFAULT_PMLOGGERFILES),
                "number of pmlogger files to collect",
            ),
        ]
    }

    fn check_enabled(&self, host: &dyn Host) -> bool {
        host.path_exists(Path::new(PCP_CONF_PATH))
    }

    fn setup(&mut self, host: &mut dyn Host) {
        let sizelimit = self.size_limit(&*host);
        let countlimit = self.count_limit(&*host);

        let conf = match PcpConf::read(&host.resolve(Path::new(PCP_CONF_PATH))) {
            Ok(conf) => conf,
            Err(e) => {
                warn!("could not parse {}: {}", PCP_CONF_PATH, e);
                self.conf = None;
                return;
            }
        };

        // A pcp.conf pointing PCP_SYSCONF_DIR at '/' would pull in everything.
        let var_conf_dir = conf.var_dir.join("config");
        host.add_copy_spec(CopySpec::from(conf.sysconf_dir.clone()));
        host.add_copy_spec(CopySpec::new(PCP_CONF_PATH));
        host.add_copy_spec(CopySpec::from(var_conf_dir.clone()));

        for name in VAR_CONFIG_SKIP {
            host.add_forbidden_path(&var_conf_dir.join(name).to_string_lossy());
        }

        // Without a hostname the per-host globs would match every host.
        let hostname = host.hostname();
        if hostname.is_empty() {
            warn!("hostname unknown; skipping pmmgr and pmlogger data");
        } else {
            let pmmgr = conf.log_dir.join("pmmgr").join(&hostname).join("*");
            host.add_copy_spec(CopySpec::from(pmmgr).sizelimit(sizelimit).tailit(false));

            let pmlogger_dir = conf.log_dir.join("pmlogger").join(&hostname);
            // Listed names are literal paths, not globs
            for file in self.pmlogger_files(host, &pmlogger_dir, countlimit) {
                let literal = Pattern::escape(&file.to_string_lossy());
                host.add_copy_spec(CopySpec::new(literal).sizelimit(SizeLimit::Unlimited));
            }
        }

        for path in [
            conf.log_dir.join("pmcd"),
            conf.log_dir.join("NOTICES*"),
            conf.var_dir.join("pmns"),
            conf.log_dir.join("*/*.log*"),
            conf.log_dir.join("*/*/*.log*"),
            conf.log_dir.join("*/*/config*"),
        ] {
            host.add_copy_spec(CopySpec::from(path));
        }

        // Summary for the current day
        let res = host.collect_cmd_output(&CommandSpec::new("pcp"));
        if res.success() {
            if let Some(archive) = Self::pmlogger_archive(&res.output) {
                host.add_cmd_output(
                    CommandSpec::new("pmstat")
                        .args(["-S", "00:00", "-T", "23:59", "-t", "5m", "-x", "-a", archive])
                        .root_symlink("pmstat"),
                );
            }
        }

        self.conf = Some(conf);
    }
}
