//! The process port: synchronous external commands.

use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use tracing::debug;

/// Captured result of an external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl ProcessOutput {
    /// Error text when the command wrote to stderr or failed.
    pub fn failure_text(&self) -> Option<String> {
        if !self.stderr.trim().is_empty() {
            Some(self.stderr.trim_end().to_string())
        } else if !self.success {
            Some("command failed".into())
        } else {
            None
        }
    }
}

pub trait ProcessRunner {
    /// Run `command` in `cwd` and wait for it to exit.
    fn run(&mut self, command: &str, cwd: &Path) -> Result<ProcessOutput>;
}

/// Runs commands through `sh -c`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRunner;

impl ProcessRunner for ShellRunner {
    fn run(&mut self, command: &str, cwd: &Path) -> Result<ProcessOutput> {
        debug!(command, cwd = %cwd.display(), "running external command");
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(cwd)
            .output()
            .with_context(|| format!("failed to run {command}"))?;
        Ok(ProcessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            success: output.status.success(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_text_prefers_stderr() {
        let output = ProcessOutput {
            stdout: String::new(),
            stderr: "boom\n".into(),
            success: false,
        };
        assert_eq!(output.failure_text().unwrap(), "boom");
        let ok = ProcessOutput {
            stdout: "x".into(),
            stderr: String::new(),
            success: true,
        };
        assert_eq!(ok.failure_text(), None);
    }

    #[cfg(unix)]
    #[test]
    fn shell_runner_captures_output() {
        let output = ShellRunner.run("echo hi; echo oops >&2", Path::new(".")).unwrap();
        assert_eq!(output.stdout, "hi\n");
        assert_eq!(output.stderr, "oops\n");
        assert!(output.success);
    }
}
