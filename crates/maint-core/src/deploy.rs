use crate::error::{MaintError, Result};
use crate::process;
use crate::types::SimVersion;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStage {
    ReleaseCandidate,
    Production,
}

impl DeployStage {
    pub fn as_str(self) -> &'static str {
        match self {
            DeployStage::ReleaseCandidate => "rc",
            DeployStage::Production => "production",
        }
    }
}

impl fmt::Display for DeployStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest {
    pub repo: String,
    pub branch: String,
    pub brands: Vec<String>,
    pub locales: String,
    pub message: String,
}

pub trait Deployer: Send + Sync {
    fn release_candidate(&self, request: &DeployRequest) -> Result<SimVersion>;

    fn production(&self, request: &DeployRequest) -> Result<SimVersion>;
}

/// Runs `<program> <args> <stage> --repo=.. --branch=.. --brands=..
/// --locales=.. --message=..` from the maintenance root. The deployed
/// version is the last non-empty stdout line, either a JSON version object
/// or its `1.2.3-rc.4` display form.
#[derive(Debug, Clone)]
pub struct CommandDeployer {
    program: String,
    args: Vec<String>,
    cwd: PathBuf,
}

impl CommandDeployer {
    pub fn new(program: impl Into<String>, args: Vec<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: cwd.into(),
        }
    }

    fn deploy(&self, stage: DeployStage, request: &DeployRequest) -> Result<SimVersion> {
        let program = process::locate(&self.program)?;
        let flags = [
            format!("--repo={}", request.repo),
            format!("--branch={}", request.branch),
            format!("--brands={}", request.brands.join(",")),
            format!("--locales={}", request.locales),
            format!("--message={}", request.message),
        ];
        let mut args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        args.push(stage.as_str());
        args.extend(flags.iter().map(String::as_str));

        tracing::info!(repo = %request.repo, branch = %request.branch, %stage, "deploying");
        let out = process::run_checked(&program, &args, &self.cwd)?;
        parse_deployed_version(&out.stdout)
    }
}

impl Deployer for CommandDeployer {
    fn release_candidate(&self, request: &DeployRequest) -> Result<SimVersion> {
        self.deploy(DeployStage::ReleaseCandidate, request)
    }

    fn production(&self, request: &DeployRequest) -> Result<SimVersion> {
        self.deploy(DeployStage::Production, request)
    }
}

fn parse_deployed_version(stdout: &str) -> Result<SimVersion> {
    let line = stdout
        .lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .ok_or_else(|| MaintError::InvalidVersion("deployer printed nothing".to_string()))?;
    if line.starts_with('{') {
        return Ok(serde_json::from_str(line)?);
    }
    line.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_from_last_line() {
        let v = parse_deployed_version("building...\nuploading\n1.2.3-rc.2\n\n").unwrap();
        assert_eq!(v, SimVersion::release_candidate(1, 2, 3, 2));

        let json = r#"{"major": 1, "minor": 2, "maintenance": 4, "testType": null, "testNumber": null, "buildTimestamp": "2024-01-01"}"#;
        let v = parse_deployed_version(&format!("log\n{json}")).unwrap();
        assert_eq!(v.to_string(), "1.2.4");
        assert!(!v.is_release_candidate());

        assert!(parse_deployed_version("").is_err());
        assert!(parse_deployed_version("done").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn command_receives_stage_and_flags() {
        let dir = tempfile::TempDir::new().unwrap();
        let deployer = CommandDeployer::new(
            "sh",
            vec!["-c".to_string(), r#"echo "$@" > args.txt; echo 2.0.1-rc.1"#.to_string(), "deploy".to_string()],
            dir.path(),
        );
        let request = DeployRequest {
            repo: "sim-a".to_string(),
            branch: "2.0".to_string(),
            brands: vec!["phet".to_string(), "phet-io".to_string()],
            locales: "*".to_string(),
            message: "fix one, fix two".to_string(),
        };
        let version = deployer.release_candidate(&request).unwrap();
        assert_eq!(version.to_string(), "2.0.1-rc.1");
        let args = std::fs::read_to_string(dir.path().join("args.txt")).unwrap();
        assert!(args.starts_with("rc --repo=sim-a --branch=2.0 --brands=phet,phet-io"));
        assert!(args.trim_end().ends_with("--message=fix one, fix two"));
    }
}
