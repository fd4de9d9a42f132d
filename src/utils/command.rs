//! Command execution primitives with consistent error handling.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use crate::error::{Error, Result, ToolCommandFailedDetails};

/// Result of running an external binary to completion.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    fn from_output(output: Output) -> Self {
        Self {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }

    /// Prefers stderr, falls back to stdout if stderr is empty.
    pub fn error_text(&self) -> &str {
        if self.stderr.is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }

    pub fn failure_details(&self, args: &[&str]) -> ToolCommandFailedDetails {
        ToolCommandFailedDetails {
            command: args.join(" "),
            exit_code: self.exit_code,
            stderr: self.error_text().to_string(),
        }
    }
}

/// Run a program and capture its output without interpreting the exit status.
pub fn capture(program: &str, args: &[&str], dir: Option<&Path>) -> Result<ToolOutput> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }
    let output = cmd.output().map_err(|e| {
        Error::internal_io(
            format!("failed to run {}: {}", program, e),
            Some(format!("{} {}", program, args.join(" "))),
        )
    })?;
    Ok(ToolOutput::from_output(output))
}

/// Run a program feeding `input` on stdin and capture its output.
pub fn capture_with_stdin(program: &str, args: &[&str], input: &str) -> Result<ToolOutput> {
    let context = format!("{} {}", program, args.join(" "));
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::internal_io(format!("failed to run {}: {}", program, e), Some(context.clone())))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input.as_bytes())
            .map_err(|e| Error::internal_io(e.to_string(), Some(context.clone())))?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| Error::internal_io(e.to_string(), Some(context)))?;
    Ok(ToolOutput::from_output(output))
}

/// Run a command and return trimmed stdout on success.
pub fn run(program: &str, args: &[&str], context: &str) -> Result<String> {
    let output = capture(program, args, None)?;
    require_success(&output, context)?;
    Ok(output.stdout)
}

/// Run a command in a specific directory and return trimmed stdout on success.
pub fn run_in(dir: &Path, program: &str, args: &[&str], context: &str) -> Result<String> {
    let output = capture(program, args, Some(dir))?;
    require_success(&output, context)?;
    Ok(output.stdout)
}

/// Run a command in a directory, returning None on failure or empty output.
pub fn run_in_optional(dir: &Path, program: &str, args: &[&str]) -> Option<String> {
    let output = capture(program, args, Some(dir)).ok()?;
    if !output.success || output.stdout.is_empty() {
        return None;
    }
    Some(output.stdout)
}

/// Check whether a binary can be executed at all.
pub fn is_available(program: &str, version_args: &[&str]) -> bool {
    Command::new(program)
        .args(version_args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

fn require_success(output: &ToolOutput, context: &str) -> Result<()> {
    if output.success {
        Ok(())
    } else {
        Err(Error::internal_io(
            format!("{} failed: {}", context, output.error_text()),
            Some(context.to_string()),
        ))
    }
}
