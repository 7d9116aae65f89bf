// src/settings.rs

//! Run settings
//!
//! Optional TOML file with defaults for a run. Command-line flags override
//! anything set here.
//!
//! ```toml
//! sysroot = "/"
//! all_logs = false
//! log_size = 25
//! command_timeout_secs = 300
//! plugins = ["charmed_postgresql"]
//!
//! [options]
//! "pcp.pmloggerfiles" = 24
//! "charmed_postgresql.metrics" = false
//! ```

use crate::error::Result;
use crate::options::{OptionStore, OptionValue, ALL_LOGS, LOG_SIZE};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Default path for the settings file
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/diagplug/diagplug.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub sysroot: Option<PathBuf>,
    pub all_logs: bool,
    pub log_size: Option<i64>,
    pub command_timeout_secs: Option<u64>,
    /// Plugins to run; empty means every enabled plugin
    pub plugins: Vec<String>,
    /// `plugin.option` (or global option) overrides
    pub options: BTreeMap<String, OptionValue>,
}

impl Settings {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load settings from `path`, or the default path when `None`.
    ///
    /// A missing default file yields default settings; an explicitly named
    /// file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p, true),
            None => (Path::new(DEFAULT_SETTINGS_PATH), false),
        };
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == ErrorKind::NotFound && !explicit => {
                debug!("No settings file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }

    /// Seed an option store with these settings
    pub fn apply_to(&self, store: &mut OptionStore) {
        for (key, value) in &self.options {
            store.set(key.clone(), value.clone());
        }
        if self.all_logs {
            store.set(ALL_LOGS, OptionValue::Bool(true));
        }
        if let Some(size) = self.log_size {
            store.set(LOG_SIZE, OptionValue::Int(size));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_parse_full() {
        let settings = Settings::parse(
            r#"
sysroot = "/mnt/root"
all_logs = true
log_size = 50
command_timeout_secs = 10
plugins = ["pcp"]

[options]
"pcp.pmloggerfiles" = 24
"charmed_postgresql.metrics" = false
"#,
        )
        .unwrap();

        assert_eq!(settings.sysroot, Some(PathBuf::from("/mnt/root")));
        assert_eq!(settings.command_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(settings.plugins, vec!["pcp".to_string()]);

        let mut store = OptionStore::new();
        settings.apply_to(&mut store);
        assert_eq!(store.get("pcp", "pmloggerfiles"), Some(&OptionValue::Int(24)));
        assert_eq!(store.get("charmed_postgresql", "metrics"), Some(&OptionValue::Bool(false)));
        assert_eq!(store.get("pcp", ALL_LOGS), Some(&OptionValue::Bool(true)));
        assert_eq!(store.get("pcp", LOG_SIZE), Some(&OptionValue::Int(50)));
    }

    #[test]
    fn test_empty_is_default() {
        assert_eq!(Settings::parse("").unwrap(), Settings::default());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(matches!(Settings::parse("bogus = 1"), Err(Error::SettingsError(_))));
    }

    #[test]
    fn test_load_missing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("diagplug.toml");
        assert!(matches!(Settings::load(Some(&missing)), Err(Error::IoError(_))));
    }
}
