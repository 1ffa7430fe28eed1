use crate::error::Result;
use crate::process;
use std::path::Path;

/// Exit status and captured stdout of one build invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    pub exit_code: i32,
    pub stdout: String,
}

impl BuildOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs build and transpile commands in a checkout directory.
///
/// A failing build is reported through `exit_code`, not as an error; errors
/// are reserved for the runner not being able to start at all.
pub trait BuildRunner: Send + Sync {
    fn build(&self, dir: &Path, args: &[String]) -> Result<BuildOutput>;
}

/// [`BuildRunner`] that runs a configured program, `grunt` by default.
#[derive(Debug, Clone)]
pub struct CommandBuildRunner {
    program: String,
    base_args: Vec<String>,
}

impl CommandBuildRunner {
    pub fn new(program: impl Into<String>, base_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            base_args,
        }
    }
}

impl BuildRunner for CommandBuildRunner {
    fn build(&self, dir: &Path, args: &[String]) -> Result<BuildOutput> {
        let program = process::locate(&self.program)?;
        let all: Vec<&str> = self
            .base_args
            .iter()
            .chain(args.iter())
            .map(String::as_str)
            .collect();
        let out = process::run(&program, &all, dir)?;
        if !out.success() {
            tracing::warn!(dir = %dir.display(), code = out.code, "build exited non-zero");
        }
        Ok(BuildOutput {
            exit_code: out.code,
            stdout: out.stdout,
        })
    }
}
