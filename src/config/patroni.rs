// src/config/patroni.rs

//! Patroni YAML configuration
//!
//! Only the handful of fields the plugins need are modelled. Every level is
//! optional, unknown keys are ignored, and scalar fields accept numbers and
//! booleans as well as strings (a cluster named `2024` is still a name).
//!
//! ```yaml
//! scope: cluster1
//! restapi:
//!   connect_address: 10.0.0.5:8008
//! postgresql:
//!   connect_address: 10.0.0.5:5432
//!   authentication:
//!     superuser:
//!       username: operator
//!       password: s3cr3t
//! ```

use super::{ConfigError, ConfigResult};
use serde::{Deserialize, Deserializer};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};

/// Parsed Patroni configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PatroniConfig {
    #[serde(default, deserialize_with = "scalar_string")]
    pub scope: Option<String>,
    #[serde(default)]
    pub restapi: Option<RestApi>,
    #[serde(default)]
    pub postgresql: Option<Postgresql>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RestApi {
    #[serde(default, deserialize_with = "scalar_string")]
    pub connect_address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Postgresql {
    #[serde(default, deserialize_with = "scalar_string")]
    pub connect_address: Option<String>,
    #[serde(default)]
    pub authentication: Option<Authentication>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Authentication {
    #[serde(default)]
    pub superuser: Option<Credentials>,
}

#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    #[serde(default, deserialize_with = "scalar_string")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub password: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A `host:port` pair; either half may be missing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectAddress {
    pub host: Option<String>,
    pub port: Option<String>,
}

impl ConnectAddress {
    /// Split at the last colon, so `[::1]:5432` keeps its brackets.
    /// Empty halves are treated as absent.
    pub fn parse(address: &str) -> Self {
        let address = address.trim();
        let (host, port) = match address.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (address, None),
        };
        Self {
            host: non_empty(host),
            port: port.and_then(non_empty),
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Accept strings, numbers and booleans; anything else is absent
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_yaml::Value::String(s) => Some(s),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

impl PatroniConfig {
    /// Parse YAML text. An empty document, `null` or a non-mapping
    /// document yields an empty configuration.
    pub fn parse(content: &str) -> ConfigResult<Self> {
        let blank = content
            .lines()
            .map(str::trim)
            .all(|l| l.is_empty() || l.starts_with('#'));
        if blank {
            return Ok(Self::default());
        }
        let value: serde_yaml::Value = serde_yaml::from_str(content)?;
        if !value.is_mapping() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_value(value)?)
    }

    /// Read and parse a file
    pub fn read(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Read a file, treating any failure as an empty configuration
    pub fn load(path: &Path) -> Self {
        match Self::read(path) {
            Ok(config) => config,
            Err(ConfigError::ReadError(e)) if e.kind() == ErrorKind::NotFound => {
                debug!("Patroni config not found at {}", path.display());
                Self::default()
            }
            Err(e) => {
                warn!("Ignoring Patroni config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn cluster_name(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn restapi_address(&self) -> Option<&str> {
        self.restapi.as_ref()?.connect_address.as_deref()
    }

    pub fn postgresql_address(&self) -> Option<ConnectAddress> {
        let address = self.postgresql.as_ref()?.connect_address.as_deref()?;
        Some(ConnectAddress::parse(address))
    }

    pub fn postgresql_host(&self) -> Option<String> {
        self.postgresql_address()?.host
    }

    pub fn postgresql_port(&self) -> Option<String> {
        self.postgresql_address()?.port
    }

    fn superuser(&self) -> Option<&Credentials> {
        self.postgresql.as_ref()?.authentication.as_ref()?.superuser.as_ref()
    }

    pub fn superuser_username(&self) -> Option<&str> {
        self.superuser()?.username.as_deref()
    }

    pub fn superuser_password(&self) -> Option<&str> {
        self.superuser()?.password.as_deref()
    }
}
