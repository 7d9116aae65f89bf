// src/error.rs

//! Error types for diagplug
//!
//! Plugin code never returns these: a plugin degrades to "less data
//! collected" instead. They surface from the pieces that do real I/O on
//! behalf of the caller (settings, bundle creation, manifest writing).

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised outside of plugin setup/postproc
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse settings: {0}")]
    SettingsError(#[from] toml::de::Error),

    #[error("Failed to serialize manifest: {0}")]
    ManifestError(#[from] serde_json::Error),

    #[error("Invalid option override '{0}': expected plugin.option=value")]
    InvalidOption(String),

    #[error("Unknown plugin: {0}")]
    UnknownPlugin(String),

    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidGlob { pattern: String, reason: String },

    #[error("Invalid redaction pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Output directory already contains a bundle: {0}")]
    BundleExists(PathBuf),
}

/// Result type for diagplug operations
pub type Result<T> = std::result::Result<T, Error>;
