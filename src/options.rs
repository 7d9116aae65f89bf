// src/options.rs

//! Plugin options
//!
//! Plugins declare their tunables as [`PluginOpt`]s with a default value.
//! Users override them with `plugin.option=value` strings; a key without a
//! plugin prefix addresses a global option such as `all_logs`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Global option: collect every log regardless of size or count caps
pub const ALL_LOGS: &str = "all_logs";

/// Global option: default per-copy-spec size cap in MiB
pub const LOG_SIZE: &str = "log_size";

/// Default for [`LOG_SIZE`]
pub const DEFAULT_LOG_SIZE_MB: i64 = 25;

/// A typed option value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl OptionValue {
    /// Parse a raw override string.
    ///
    /// `true/on/yes` and `false/off/no` become booleans, anything that
    /// parses as an integer becomes an integer, everything else is a string.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.to_ascii_lowercase().as_str() {
            "true" | "on" | "yes" => return Self::Bool(true),
            "false" | "off" | "no" => return Self::Bool(false),
            _ => {}
        }
        match raw.parse::<i64>() {
            Ok(n) => Self::Int(n),
            Err(_) => Self::Str(raw.to_string()),
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(n) => *n != 0,
            Self::Str(s) => matches!(s.to_ascii_lowercase().as_str(), "true" | "on" | "yes"),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Str(s) => s.trim().parse().ok(),
            Self::Bool(_) => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(n) => write!(f, "{}", n),
            Self::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Declaration of a plugin option
#[derive(Debug, Clone)]
pub struct PluginOpt {
    pub name: &'static str,
    pub default: OptionValue,
    pub desc: &'static str,
}

impl PluginOpt {
    pub fn new(name: &'static str, default: OptionValue, desc: &'static str) -> Self {
        Self { name, default, desc }
    }
}

/// Options every plugin can read
pub fn global_options() -> Vec<PluginOpt> {
    vec![
        PluginOpt::new(
            ALL_LOGS,
            OptionValue::Bool(false),
            "collect all logs regardless of size or count limits",
        ),
        PluginOpt::new(
            LOG_SIZE,
            OptionValue::Int(DEFAULT_LOG_SIZE_MB),
            "default size limit in MiB for collected logs",
        ),
    ]
}

/// User overrides, keyed `plugin.option` or bare `option` for globals
#[derive(Debug, Clone, Default)]
pub struct OptionStore {
    values: BTreeMap<String, OptionValue>,
}

impl OptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and store a `key=value` override
    pub fn set_override(&mut self, spec: &str) -> Result<()> {
        let (key, value) = spec
            .split_once('=')
            .ok_or_else(|| Error::InvalidOption(spec.to_string()))?;
        let key = key.trim();
        if key.is_empty() || key.starts_with('.') || key.ends_with('.') {
            return Err(Error::InvalidOption(spec.to_string()));
        }
        self.values.insert(key.to_string(), OptionValue::parse(value));
        Ok(())
    }

    pub fn set(&mut self, key: impl Into<String>, value: OptionValue) {
        self.values.insert(key.into(), value);
    }

    /// Look up an override; the plugin-scoped key wins over the global one
    pub fn get(&self, plugin: &str, name: &str) -> Option<&OptionValue> {
        self.values
            .get(&format!("{}.{}", plugin, name))
            .or_else(|| self.values.get(name))
    }

    /// Plugin-scoped keys that name a plugin but no declared option
    pub fn unknown_for(&self, plugin: &str, declared: &[PluginOpt]) -> Vec<String> {
        let prefix = format!("{}.", plugin);
        self.values
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter(|name| !declared.iter().any(|o| o.name == *name))
            .map(str::to_string)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionValue)> {
        self.values.iter()
    }
}
