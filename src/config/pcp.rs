// src/config/pcp.rs

//! `/etc/pcp.conf` reader
//!
//! The file is a shell-style environment file. Only plain `KEY=value` lines
//! are understood; comments and anything else are skipped.

use super::{ConfigError, ConfigResult};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Default location of the PCP environment file
pub const PCP_CONF_PATH: &str = "/etc/pcp.conf";

/// The directories the pcp plugin needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcpConf {
    pub sysconf_dir: PathBuf,
    pub var_dir: PathBuf,
    pub log_dir: PathBuf,
}

/// Parse `KEY=value` lines.
///
/// A line counts only if it splits on `=` into exactly two parts; a value
/// that itself contains `=` is therefore ignored along with its key.
pub fn parse_env_lines(content: &str) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    for line in content.lines() {
        if line.starts_with('#') {
            continue;
        }
        let parts: Vec<&str> = line.trim().split('=').collect();
        if let [key, value] = parts.as_slice() {
            vars.insert(key.to_string(), value.to_string());
        }
    }
    vars
}

impl PcpConf {
    /// Parse the file content; all three directory keys are required
    pub fn parse(content: &str) -> ConfigResult<Self> {
        let mut vars = parse_env_lines(content);
        let mut take = |key: &'static str| -> ConfigResult<PathBuf> {
            vars.remove(key)
                .map(PathBuf::from)
                .ok_or(ConfigError::MissingKey(key))
        };
        Ok(Self {
            sysconf_dir: take("PCP_SYSCONF_DIR")?,
            var_dir: take("PCP_VAR_DIR")?,
            log_dir: take("PCP_LOG_DIR")?,
        })
    }

    pub fn read(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }
}
