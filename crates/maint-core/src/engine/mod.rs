//! The maintenance operations.
//!
//! Every operation works on the loaded [`Maintenance`] state and persists it
//! after each durable decision, so the state file is always a valid
//! recovery point. The operations are split by concern:
//!
//! - `patches`: patch and needed-patch bookkeeping
//! - `apply`: cherry-picking needed patches
//! - `dependencies`: manifest updates and dependency branch pushes
//! - `deploy`: release-candidate and production deploys, unreleased issues
//! - `checkouts`: release-branch checkout directories and builds
//! - `report`: read-only listings

mod apply;
mod checkouts;
mod dependencies;
mod deploy;
mod patches;
mod report;

pub use apply::ApplyReport;
pub use checkouts::{BranchFailure, BuildOptions, CheckReport, CheckedPage, CheckoutOptions, CheckoutReport};
pub use report::{BranchSummary, LinkGroup, MaintenanceSummary, PatchSummary};

use crate::build::{BuildRunner, CommandBuildRunner};
use crate::capability::{Capability, CapabilityProbe};
use crate::config::{Config, RepoLayout};
use crate::deploy::{CommandDeployer, Deployer};
use crate::discovery;
use crate::error::{MaintError, Result};
use crate::issues::{GithubIssueTracker, IssueTracker};
use crate::metadata::{HttpMetadataService, MetadataService};
use crate::release_branch::ReleaseBranch;
use crate::state::Maintenance;
use crate::vcs::{GitCli, VersionControl};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The external systems an engine talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub vcs: Arc<dyn VersionControl>,
    pub build: Arc<dyn BuildRunner>,
    pub metadata: Arc<dyn MetadataService>,
    pub issues: Arc<dyn IssueTracker>,
    pub deployer: Arc<dyn Deployer>,
}

impl Collaborators {
    /// Real implementations: git, the configured build and deploy commands,
    /// the HTTP metadata service and GitHub.
    pub fn from_config(root: &Path, config: &Config) -> Self {
        Self {
            vcs: Arc::new(GitCli::new(root, config.repos.clone())),
            build: Arc::new(CommandBuildRunner::new(&config.build.program, Vec::new())),
            metadata: Arc::new(HttpMetadataService::new(&config.services.metadata_url)),
            issues: Arc::new(GithubIssueTracker::from_config(&config.services)),
            deployer: Arc::new(CommandDeployer::new(
                &config.deploy.program,
                config.deploy.args.clone(),
                root,
            )),
        }
    }
}

pub struct MaintenanceEngine {
    root: PathBuf,
    config: Config,
    services: Collaborators,
    state: Maintenance,
    probe: CapabilityProbe,
}

impl MaintenanceEngine {
    pub fn new(root: impl Into<PathBuf>, config: Config, services: Collaborators, state: Maintenance) -> Self {
        let probe = CapabilityProbe::new(services.vcs.clone(), config.repos.clone());
        Self {
            root: root.into(),
            config,
            services,
            state,
            probe,
        }
    }

    /// Load the state file under `root`.
    pub fn load(root: &Path, config: Config, services: Collaborators) -> Result<Self> {
        let state = Maintenance::load(root)?;
        Ok(Self::new(root, config, services, state))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> &Maintenance {
        &self.state
    }

    pub fn save(&self) -> Result<()> {
        self.state.save(&self.root)
    }

    /// Discard all patches, modified branches and the discovery cache.
    pub fn reset(&mut self) -> Result<()> {
        self.state = Maintenance::default();
        self.save()?;
        tracing::info!("maintenance state reset");
        Ok(())
    }

    fn layout(&self) -> &RepoLayout {
        &self.config.repos
    }

    fn primary_branch(&self) -> &str {
        &self.config.repos.primary_branch
    }

    fn repo_dir(&self, repo: &str) -> PathBuf {
        crate::paths::repo_dir(&self.root, repo)
    }

    // -----------------------------------------------------------------------
    // Release branches
    // -----------------------------------------------------------------------

    /// The cached release branches, discovered first when the cache is
    /// empty or `refresh` is set.
    pub fn release_branches(&mut self, refresh: bool) -> Result<Vec<Arc<ReleaseBranch>>> {
        if refresh || self.state.all_release_branches.is_empty() {
            let found = discovery::discover_release_branches(
                self.services.vcs.as_ref(),
                self.services.metadata.as_ref(),
                &self.root,
                &self.config.repos,
            )?;
            self.state.all_release_branches = found.into_iter().map(Arc::new).collect();
            self.save()?;
        }
        Ok(self.state.all_release_branches.clone())
    }

    /// Resolve (repo, branch) against the release-branch cache.
    pub fn find_release_branch(&mut self, repo: &str, branch: &str) -> Result<Arc<ReleaseBranch>> {
        if let Some(mb) = self.state.modified_branch(repo, branch) {
            return Ok(mb.release_branch.clone());
        }
        self.release_branches(false)?
            .into_iter()
            .find(|rb| rb.repo == repo && rb.branch == branch)
            .ok_or_else(|| MaintError::ReleaseBranchNotFound {
                repo: repo.to_string(),
                branch: branch.to_string(),
            })
    }

    pub fn capabilities(&mut self, repo: &str, branch: &str) -> Result<BTreeMap<Capability, bool>> {
        let rb = self.find_release_branch(repo, branch)?;
        self.probe.all(&rb)
    }

    fn has_capability(&self, rb: &ReleaseBranch, capability: Capability) -> Result<bool> {
        self.probe.has(rb, capability)
    }
}
