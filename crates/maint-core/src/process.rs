//! Subprocess invocation shared by the git, build and deploy collaborators.
//!
//! Every external tool runs to completion with stdout and stderr captured.
//! A non-zero exit is reported as [`MaintError::ExecutionFailed`] carrying the
//! exit status and captured output, unless the caller asks for the raw result.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{MaintError, Result};

/// Captured result of a finished subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Resolve `program` on PATH.
pub fn locate(program: &str) -> Result<PathBuf> {
    which::which(program).map_err(|_| MaintError::ToolNotFound(program.to_string()))
}

/// Run a program and return its output regardless of exit status.
pub fn run(program: &Path, args: &[&str], cwd: &Path) -> Result<ExecOutput> {
    tracing::debug!(program = %program.display(), ?args, cwd = %cwd.display(), "exec");
    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| MaintError::SpawnFailed {
            program: program.display().to_string(),
            reason: e.to_string(),
        })?;

    Ok(ExecOutput {
        // Killed by a signal: no code.
        code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Run a program, turning a non-zero exit into `ExecutionFailed`.
pub fn run_checked(program: &Path, args: &[&str], cwd: &Path) -> Result<ExecOutput> {
    let out = run(program, args, cwd)?;
    if !out.success() {
        return Err(execution_failed(program, args, out));
    }
    Ok(out)
}

pub fn execution_failed(program: &Path, args: &[&str], out: ExecOutput) -> MaintError {
    let name = program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string());
    MaintError::ExecutionFailed {
        command: format!("{name} {}", args.join(" ")),
        code: out.code,
        stdout: cap_output(&out.stdout),
        stderr: cap_output(&out.stderr),
    }
}

/// Cap captured output to 10KB, keeping the tail.
fn cap_output(s: &str) -> String {
    const MAX_OUTPUT: usize = 10 * 1024;
    let trimmed = s.trim();
    if trimmed.len() <= MAX_OUTPUT {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - MAX_OUTPUT;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    trimmed[start..].to_string()
}
