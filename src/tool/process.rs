use super::{find_in_dir, ToolError, ToolInvocation, ToolOutput, ToolRunner};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::debug;

/// Runs tools as child processes of the current process.
///
/// The invocation's environment is applied to the child only; the parent
/// environment is never modified.
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

impl ToolRunner for ProcessRunner {
    fn resolve(&self, tool: &str, search_dirs: &[PathBuf]) -> Option<PathBuf> {
        search_dirs
            .iter()
            .find_map(|dir| find_in_dir(dir, tool))
            .or_else(|| which::which(tool).ok())
    }

    fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        let command_line = invocation.command_line();
        debug!(command = %command_line, cwd = %invocation.cwd.display(), "spawning tool");

        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ToolError::Io {
                command: command_line.clone(),
                source,
            })?;

        let result = ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !result.stderr.is_empty() {
            debug!(command = %command_line, stderr = %result.stderr.trim_end(), "tool stderr");
        }
        debug!(command = %command_line, code = ?result.code, "tool exited");

        Ok(result)
    }
}
