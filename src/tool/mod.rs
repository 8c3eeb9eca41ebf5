//! External tool invocation
//!
//! Builders never spawn processes directly. They describe a
//! [`ToolInvocation`] and hand it to a [`ToolRunner`], which keeps phase
//! logic testable without a toolchain installed.

mod process;
mod working_dir;

pub use process::ProcessRunner;
pub use working_dir::{absolutize, WorkingDirGuard};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool '{tool}' not found (attempted command: {command})")]
    NotFound { tool: String, command: String },

    #[error("Command `{command}` failed with {}\n{}", exit_label(.code), captured(.stdout, .stderr))]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Failed to run `{command}`")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "a signal".to_string(),
    }
}

fn captured(stdout: &str, stderr: &str) -> String {
    let mut out = String::new();
    if !stdout.trim().is_empty() {
        out.push_str("--- stdout ---\n");
        out.push_str(stdout.trim_end());
        out.push('\n');
    }
    if !stderr.trim().is_empty() {
        out.push_str("--- stderr ---\n");
        out.push_str(stderr.trim_end());
        out.push('\n');
    }
    out
}

/// A fully resolved external command.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Variables added on top of the inherited environment for this call only.
    pub env: BTreeMap<String, String>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: BTreeMap::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env.extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn command_line(&self) -> String {
        render_command_line(&self.program.display().to_string(), &self.args)
    }
}

pub(crate) fn render_command_line(program: &str, args: &[String]) -> String {
    let mut parts = vec![program.to_string()];
    parts.extend(args.iter().map(|a| {
        if a.is_empty() || a.contains(char::is_whitespace) {
            format!("'{}'", a)
        } else {
            a.clone()
        }
    }));
    parts.join(" ")
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ToolOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Turns a non-zero exit into [`ToolError::NonZeroExit`].
    pub fn check(self, command: &str) -> Result<Self, ToolError> {
        if self.success() {
            Ok(self)
        } else {
            Err(ToolError::NonZeroExit {
                command: command.to_string(),
                code: self.code,
                stdout: self.stdout,
                stderr: self.stderr,
            })
        }
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait ToolRunner: Send + Sync {
    /// Finds `tool`, preferring `search_dirs` in order over `PATH`.
    fn resolve(&self, tool: &str, search_dirs: &[PathBuf]) -> Option<PathBuf>;

    /// Runs the invocation to completion, returning its exit status and
    /// captured streams. Only failures to spawn are errors here.
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError>;
}

/// Returns `dir/tool` when it exists as a file.
pub(crate) fn find_in_dir(dir: &Path, tool: &str) -> Option<PathBuf> {
    let candidate = dir.join(tool);
    candidate.is_file().then_some(candidate)
}
