// src/config/mod.rs

//! Service configuration readers
//!
//! These read configuration files owned by the monitored services. They are
//! read fresh on every access and never written. Callers that cannot afford
//! a failure use the `load` helpers, which degrade to "nothing known".

pub mod patroni;
pub mod pcp;

pub use patroni::{ConnectAddress, PatroniConfig};
pub use pcp::PcpConf;

use thiserror::Error;

/// Errors from reading a service configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML config: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Required key missing: {0}")]
    MissingKey(&'static str),
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;
