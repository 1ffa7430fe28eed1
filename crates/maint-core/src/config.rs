use crate::error::Result;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// RepoLayout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoLayout {
    /// Branch every working copy is returned to after an operation.
    pub primary_branch: String,
    pub dependencies_file: String,
    pub package_file: String,
    /// Newline-separated list of simulation repos, relative to the root.
    pub active_sims_file: String,
    pub release_branches_dir: String,
    /// Clone URL, `{repo}` is substituted.
    pub remote_url_template: String,
}

impl Default for RepoLayout {
    fn default() -> Self {
        Self {
            primary_branch: "main".to_string(),
            dependencies_file: "dependencies.json".to_string(),
            package_file: "package.json".to_string(),
            active_sims_file: "perennial/data/active-sims".to_string(),
            release_branches_dir: "release-branches".to_string(),
            remote_url_template: "https://github.com/phetsims/{repo}.git".to_string(),
        }
    }
}

impl RepoLayout {
    pub fn remote_url(&self, repo: &str) -> String {
        self.remote_url_template.replace("{repo}", repo)
    }
}

// ---------------------------------------------------------------------------
// ServicesConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub metadata_url: String,
    pub github_api_url: String,
    pub github_owner: String,
    /// Environment variable consulted for the GitHub token before build-local.json.
    pub github_token_env: String,
    pub issue_labels: Vec<String>,
    pub issue_assignees: Vec<String>,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            metadata_url: "https://phet.colorado.edu".to_string(),
            github_api_url: "https://api.github.com".to_string(),
            github_owner: "phetsims".to_string(),
            github_token_env: "GITHUB_TOKEN".to_string(),
            issue_labels: vec!["status:ready-for-review".to_string()],
            issue_assignees: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// BuildConfig / DeployConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Arguments passed when transpiling, run inside the chipper checkout.
    pub transpile_args: Vec<String>,
    pub concurrency: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            program: "grunt".to_string(),
            args: Vec::new(),
            transpile_args: vec!["output-js-project".to_string()],
            concurrency: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub program: String,
    pub args: Vec<String>,
    pub locales: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            program: "grunt".to_string(),
            args: vec!["--noninteractive".to_string()],
            locales: "*".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// LinkHosts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkHosts {
    pub dev: String,
    pub production: String,
    pub phetio_production: String,
}

impl Default for LinkHosts {
    fn default() -> Self {
        Self {
            dev: "https://phet-dev.colorado.edu".to_string(),
            production: "https://phet.colorado.edu".to_string(),
            phetio_production: "https://phet-io.colorado.edu".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub repos: RepoLayout,
    pub services: ServicesConfig,
    pub build: BuildConfig,
    pub deploy: DeployConfig,
    pub links: LinkHosts,
}

impl Config {
    /// Load `.maintenance/config.yaml`; a missing file means all defaults.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        match crate::io::read_if_exists(&path)? {
            Some(data) => Ok(serde_yaml::from_str(&data)?),
            None => Ok(Self::default()),
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.build.concurrency == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "build.concurrency must be at least 1".to_string(),
            });
        } else if self.build.concurrency > 32 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "build.concurrency={} (>32 is unusual for a single checkout host)",
                    self.build.concurrency
                ),
            });
        }

        if !self.repos.remote_url_template.contains("{repo}") {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "repos.remote_url_template must contain '{repo}'".to_string(),
            });
        }

        if self.repos.primary_branch.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "repos.primary_branch is empty".to_string(),
            });
        }

        if self.deploy.program.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "deploy.program is empty; deployments will fail".to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.repos.primary_branch, "main");
        assert_eq!(cfg.build.concurrency, 5);
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = "repos:\n  primary_branch: master\nbuild:\n  concurrency: 2\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.repos.primary_branch, "master");
        assert_eq!(cfg.repos.dependencies_file, "dependencies.json");
        assert_eq!(cfg.build.concurrency, 2);
        assert_eq!(cfg.build.program, "grunt");
    }

    #[test]
    fn config_file_is_read_from_root() {
        let dir = TempDir::new().unwrap();
        let path = paths::config_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "deploy:\n  locales: en,es\n").unwrap();
        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.deploy.locales, "en,es");
        assert_eq!(loaded.deploy.program, "grunt");
    }

    #[test]
    fn validate_flags_bad_values() {
        let mut cfg = Config::default();
        cfg.build.concurrency = 0;
        cfg.repos.remote_url_template = "https://example.com/fixed.git".to_string();
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| w.level == WarnLevel::Error));
    }

    #[test]
    fn remote_url_substitutes_repo() {
        let layout = RepoLayout::default();
        assert_eq!(
            layout.remote_url("chipper"),
            "https://github.com/phetsims/chipper.git"
        );
    }
}
