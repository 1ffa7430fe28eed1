use crate::config::ServicesConfig;
use crate::error::{MaintError, Result};
use crate::paths;
use reqwest::blocking::Client;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IssueOptions {
    pub body: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
}

pub trait IssueTracker: Send + Sync {
    fn create_issue(&self, repo: &str, title: &str, options: &IssueOptions) -> Result<()>;
}

// ---------------------------------------------------------------------------
// GitHub
// ---------------------------------------------------------------------------

/// Creates issues through the GitHub REST API.
pub struct GithubIssueTracker {
    client: Client,
    api_url: String,
    owner: String,
    token: Option<String>,
}

#[derive(Serialize)]
struct NewIssue<'a> {
    title: &'a str,
    body: &'a str,
    labels: &'a [String],
    assignees: &'a [String],
}

impl GithubIssueTracker {
    pub fn new(api_url: impl Into<String>, owner: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            owner: owner.into(),
            token,
        }
    }

    /// Token from the configured environment variable, else from
    /// `~/.phet/build-local.json`.
    pub fn from_config(services: &ServicesConfig) -> Self {
        let token = std::env::var(&services.github_token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| paths::build_local_path().and_then(|p| token_from_build_local(&p)));
        Self::new(&services.github_api_url, &services.github_owner, token)
    }
}

/// The `developerGithubAccessToken` entry of a build-local file, if any.
fn token_from_build_local(path: &Path) -> Option<String> {
    let data = std::fs::read_to_string(path).ok()?;
    let value: serde_json::Value = serde_json::from_str(&data).ok()?;
    value
        .get("developerGithubAccessToken")?
        .as_str()
        .map(str::to_string)
}

impl IssueTracker for GithubIssueTracker {
    fn create_issue(&self, repo: &str, title: &str, options: &IssueOptions) -> Result<()> {
        let Some(token) = &self.token else {
            return Err(MaintError::IssueTracker(
                "no GitHub token configured".to_string(),
            ));
        };
        let url = format!("{}/repos/{}/{repo}/issues", self.api_url, self.owner);
        let payload = NewIssue {
            title,
            body: &options.body,
            labels: &options.labels,
            assignees: &options.assignees,
        };
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("token {token}"))
            .header("User-Agent", "maint")
            .header("Accept", "application/vnd.github+json")
            .json(&payload)
            .send()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(MaintError::IssueTracker(format!(
                "creating issue in {repo} returned {status}: {body}"
            )));
        }
        tracing::info!(repo, title, "issue created");
        Ok(())
    }
}
