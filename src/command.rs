// src/command.rs

//! Command descriptions for collected command output
//!
//! A [`CommandSpec`] is an argument vector plus an environment map. It is
//! never turned into a shell string for execution; [`CommandSpec::command_line`]
//! exists only for logs, plans and artifact names and quotes every word.
//! Environment values are treated as secrets and are never rendered.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Longest artifact name derived from a command line
const MAX_ARTIFACT_NAME: usize = 255;

/// A command whose output is collected
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    #[serde(serialize_with = "serialize_env_keys")]
    pub env: BTreeMap<String, String>,
    pub suggest_filename: Option<String>,
    pub root_symlink: Option<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            suggest_filename: None,
            root_symlink: None,
        }
    }

    /// Run `program` as `user` through `runuser -u <user> --`
    pub fn run_as(user: &str, program: impl Into<String>) -> Self {
        Self::new("runuser").args(["-u", user, "--"]).arg(program)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append `flag value` only when the value is known
    pub fn opt_arg(self, flag: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.arg(flag).arg(v),
            None => self,
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn suggest_filename(mut self, name: impl Into<String>) -> Self {
        self.suggest_filename = Some(name.into());
        self
    }

    pub fn root_symlink(mut self, name: impl Into<String>) -> Self {
        self.root_symlink = Some(name.into());
        self
    }

    /// Quoted command line, without environment
    pub fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|w| shell_quote(w))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Name of the artifact holding this command's output
    pub fn artifact_name(&self) -> String {
        match &self.suggest_filename {
            Some(name) => name.clone(),
            None => mangle_command(&self.command_line()),
        }
    }

    /// The first word that is actually executed, looking through `runuser`
    pub fn effective_program(&self) -> &str {
        if self.program == "runuser" {
            if let Some(pos) = self.args.iter().position(|a| a == "--") {
                if let Some(prog) = self.args.get(pos + 1) {
                    return prog;
                }
            }
        }
        &self.program
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("env", &self.env.keys().collect::<Vec<_>>())
            .field("suggest_filename", &self.suggest_filename)
            .field("root_symlink", &self.root_symlink)
            .finish()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())?;
        if !self.env.is_empty() {
            let keys: Vec<&str> = self.env.keys().map(String::as_str).collect();
            write!(f, " [env: {}]", keys.join(", "))?;
        }
        Ok(())
    }
}

fn serialize_env_keys<S>(env: &BTreeMap<String, String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(env.keys())
}

/// Quote a word for display in a POSIX shell
pub fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r#"'"'"'"#))
    }
}

/// Turn a command line into a file name
pub fn mangle_command(command_line: &str) -> String {
    let mut out = String::with_capacity(command_line.len());
    let mut last_underscore = false;
    for c in command_line.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
            out.push(c);
            last_underscore = false;
        } else if !last_underscore {
            out.push('_');
            last_underscore = true;
        }
    }
    let trimmed = out.trim_matches('_');
    let mut name: String = trimmed.chars().take(MAX_ARTIFACT_NAME).collect();
    if name.is_empty() {
        name.push_str("unknown");
    }
    name
}
