// src/redact.rs

//! Post-collection secret redaction
//!
//! A [`RedactionRule`] pairs a path glob with a regex and a replacement
//! template. Rules only rewrite the secret part of a match and keep the key
//! and quoting around it, so applying a rule to its own output is a no-op.
//!
//! Rules work on bytes: a file with a stray Latin-1 comment is redacted like
//! any other. Patterns are compiled without Unicode mode so `[^\r\n]` and
//! friends match any byte, and values stop before `\r` to keep CRLF endings.

use crate::error::{Error, Result};
use glob::Pattern;
use regex::bytes::{Captures, Regex};
use std::borrow::Cow;
use std::path::Path;
use std::sync::LazyLock;

/// Placeholder written in place of secrets
pub const PLACEHOLDER: &str = "*********";

/// Block-style `password: <value>` in YAML; the key and separator are kept
pub static YAML_PASSWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m-u)^([^{\r\n]*password:[ \t]+)\S[^\r\n]*").unwrap());

/// `password: <value>` inside a flow mapping; the value ends at `,`, `}` or `]`
pub static YAML_FLOW_PASSWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m-u)(\{[^\r\n]*?password:[ \t]+)(?:"[^"\r\n]*"|'[^'\r\n]*'|[^\s,}\]][^,}\]\r\n]*)"#,
    )
    .unwrap()
});

/// `repoN-s3-key=...` and `repoN-s3-key-secret=...` in pgbackrest.conf
pub static INI_S3_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m-u)^([^=\r\n]*s3-key[^=\r\n]*=)[^\r\n]*").unwrap());

/// `"user" "secret"` lines of a PgBouncer auth file
pub static USERLIST_SECRET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m-u)^([ \t]*(?:"[^"\r\n]*")+[ \t]+)"[^\r\n]*""#).unwrap()
});

/// A (path glob, pattern, replacement) triple
#[derive(Debug, Clone)]
pub struct RedactionRule {
    path_glob: String,
    glob: Pattern,
    pattern: Regex,
    replacement: String,
}

impl RedactionRule {
    /// Build a rule from an already compiled pattern.
    ///
    /// The replacement uses `regex` expansion syntax (`${1}`).
    pub fn new(path_glob: &str, pattern: &Regex, replacement: &str) -> Result<Self> {
        let glob = Pattern::new(path_glob).map_err(|e| Error::InvalidGlob {
            pattern: path_glob.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            path_glob: path_glob.to_string(),
            glob,
            pattern: pattern.clone(),
            replacement: replacement.to_string(),
        })
    }

    /// Build a rule from a pattern string
    pub fn compile(path_glob: &str, pattern: &str, replacement: &str) -> Result<Self> {
        let regex = Regex::new(pattern)?;
        Self::new(path_glob, &regex, replacement)
    }

    pub fn path_glob(&self) -> &str {
        &self.path_glob
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// Whether a collected file (by its original absolute path) is covered
    pub fn matches_path(&self, path: &Path) -> bool {
        self.glob.matches_path(path)
    }

    /// Apply the rule to file content.
    ///
    /// Returns the rewritten content and the number of matches whose
    /// replacement actually changed something.
    pub fn apply<'t>(&self, content: &'t [u8]) -> (Cow<'t, [u8]>, usize) {
        let mut changed = 0;
        let out = self.pattern.replace_all(content, |caps: &Captures| {
            let mut dst = Vec::new();
            caps.expand(self.replacement.as_bytes(), &mut dst);
            if dst.as_slice() != &caps[0] {
                changed += 1;
            }
            dst
        });
        if changed == 0 {
            return (Cow::Borrowed(content), 0);
        }
        (out, changed)
    }
}
