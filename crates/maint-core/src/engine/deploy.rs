use super::MaintenanceEngine;
use crate::deploy::{DeployRequest, DeployStage};
use crate::error::{MaintError, Result};
use crate::filter::ModifiedBranchFilter;
use crate::issues::IssueOptions;
use crate::release_branch::ReleaseBranch;
use crate::types::SimVersion;

impl MaintenanceEngine {
    // -----------------------------------------------------------------------
    // Staged deploys
    // -----------------------------------------------------------------------

    /// Deploy a release candidate of every released branch that has pushed
    /// fixes and nothing deployed yet. Stops at the first failure.
    pub fn deploy_release_candidates<F: ModifiedBranchFilter>(&mut self, filter: F) -> Result<usize> {
        self.deploy_stage(DeployStage::ReleaseCandidate, filter)
    }

    /// Deploy to production every released branch whose release candidate
    /// is deployed. Pushed messages are cleared once production is live.
    pub fn deploy_production<F: ModifiedBranchFilter>(&mut self, filter: F) -> Result<usize> {
        self.deploy_stage(DeployStage::Production, filter)
    }

    fn deploy_stage<F: ModifiedBranchFilter>(&mut self, stage: DeployStage, mut filter: F) -> Result<usize> {
        let deployer = self.services.deployer.clone();
        let mut deployed = 0;

        for index in 0..self.state.modified_branches.len() {
            let mb = &self.state.modified_branches[index];
            let ready = match stage {
                DeployStage::ReleaseCandidate => mb.is_ready_for_release_candidate(),
                DeployStage::Production => mb.is_ready_for_production(),
            };
            if !ready || !mb.release_branch.is_released || !filter.accept(mb)? {
                continue;
            }

            let request = self.deploy_request(&mb.release_branch, mb.pushed_messages.join(", "));
            tracing::info!(stage = %stage, repo = %request.repo, branch = %request.branch, "deploying");
            let result = match stage {
                DeployStage::ReleaseCandidate => deployer.release_candidate(&request),
                DeployStage::Production => deployer.production(&request),
            };
            let version = match result {
                Ok(version) => version,
                Err(source) => {
                    self.save()?;
                    return Err(MaintError::Deploy {
                        stage: stage.as_str(),
                        repo: request.repo,
                        branch: request.branch,
                        source: Box::new(source),
                    });
                }
            };

            let mb = &mut self.state.modified_branches[index];
            mb.deployed_version = Some(version.clone());
            if stage == DeployStage::Production {
                mb.pushed_messages.clear();
            }
            self.save()?;
            deployed += 1;
            tracing::info!(stage = %stage, repo = %request.repo, branch = %request.branch, version = %version, "deployed");
        }
        Ok(deployed)
    }

    fn deploy_request(&self, rb: &ReleaseBranch, message: String) -> DeployRequest {
        DeployRequest {
            repo: rb.repo.clone(),
            branch: rb.branch.clone(),
            brands: rb.brand_list(),
            locales: self.config.deploy.locales.clone(),
            message,
        }
    }

    /// Redeploy every released branch, release candidate first, then
    /// production. Modified-branch state is left alone.
    pub fn redeploy_all_production(&mut self, message: &str) -> Result<Vec<(String, String, SimVersion)>> {
        let deployer = self.services.deployer.clone();
        let mut out = Vec::new();
        for rb in self.release_branches(false)? {
            if !rb.is_released {
                continue;
            }
            let request = self.deploy_request(&rb, message.to_string());
            let wrap = |stage: DeployStage, source: MaintError| MaintError::Deploy {
                stage: stage.as_str(),
                repo: rb.repo.clone(),
                branch: rb.branch.clone(),
                source: Box::new(source),
            };
            let rc = deployer
                .release_candidate(&request)
                .map_err(|e| wrap(DeployStage::ReleaseCandidate, e))?;
            tracing::info!(branch = %rb, version = %rc, "release candidate redeployed");
            let version = deployer
                .production(&request)
                .map_err(|e| wrap(DeployStage::Production, e))?;
            tracing::info!(branch = %rb, version = %version, "production redeployed");
            out.push((rb.repo.clone(), rb.branch.clone(), version));
        }
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Unreleased branches
    // -----------------------------------------------------------------------

    /// Open an issue for each unreleased branch that received fixes, so the
    /// fixes get checked before that branch ships.
    pub fn create_unreleased_issues(&mut self, additional_notes: &str) -> Result<usize> {
        let issues = self.services.issues.clone();
        let labels = self.config.services.issue_labels.clone();
        let assignees = self.config.services.issue_assignees.clone();

        let mut created = 0;
        for index in 0..self.state.modified_branches.len() {
            let mb = &self.state.modified_branches[index];
            if mb.release_branch.is_released || mb.pushed_messages.is_empty() {
                continue;
            }
            let repo = mb.repo().to_string();
            let branch = mb.branch().to_string();
            let title = format!("Maintenance patches applied to unreleased branch {branch}");
            let mut body = format!(
                "The following maintenance patches were applied to the unreleased branch {branch} \
                 and should be verified before it is published:\n\n"
            );
            for message in &mb.pushed_messages {
                body.push_str(&format!("- {message}\n"));
            }
            if !additional_notes.trim().is_empty() {
                body.push('\n');
                body.push_str(additional_notes.trim());
                body.push('\n');
            }

            let options = IssueOptions {
                body,
                labels: labels.clone(),
                assignees: assignees.clone(),
            };
            issues.create_issue(&repo, &title, &options)?;
            self.state.modified_branches[index].pushed_messages.clear();
            self.save()?;
            created += 1;
            tracing::info!(repo = %repo, branch = %branch, "created unreleased-branch issue");
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{engine_with, release_branch};
    use super::*;
    use crate::filter::modified_repo_filter;
    use crate::modified_branch::ModifiedBranch;
    use crate::state::Maintenance;
    use crate::types::{BRAND_PHET, BRAND_PHET_IO};
    use std::sync::Arc;

    fn with_pushed(engine: &mut MaintenanceEngine, rb: ReleaseBranch, pushed: &[&str]) {
        let mut mb = ModifiedBranch::new(Arc::new(rb));
        mb.pushed_messages = pushed.iter().map(|m| m.to_string()).collect();
        engine.state.modified_branches.push(mb);
        engine.state.sort_modified_branches();
    }

    fn all() -> impl FnMut(&crate::modified_branch::ModifiedBranch) -> Result<bool> {
        modified_repo_filter(Vec::new())
    }

    #[test]
    fn release_candidate_then_production() {
        let (_dir, fakes, mut engine) = engine_with(Vec::new());
        let rb = ReleaseBranch::new("sim-a", "1.2", [BRAND_PHET, BRAND_PHET_IO], true);
        with_pushed(&mut engine, rb, &["joist#5", "scenery#2"]);

        assert_eq!(engine.deploy_production(all()).unwrap(), 0);
        assert_eq!(engine.deploy_release_candidates(all()).unwrap(), 1);
        let mb = engine.state().modified_branch("sim-a", "1.2").unwrap();
        assert_eq!(mb.deployed_version, Some(SimVersion::release_candidate(1, 2, 1, 1)));
        assert!(mb.is_ready_for_production());

        // Already deployed as rc, nothing more to do at that stage.
        assert_eq!(engine.deploy_release_candidates(all()).unwrap(), 0);

        assert_eq!(engine.deploy_production(all()).unwrap(), 1);
        let mb = engine.state().modified_branch("sim-a", "1.2").unwrap();
        assert_eq!(mb.deployed_version, Some(SimVersion::new(1, 2, 1)));
        assert!(mb.pushed_messages.is_empty());

        let requests = fakes.deployer.requests();
        assert_eq!(requests.len(), 2);
        let (stage, request) = &requests[0];
        assert_eq!(*stage, DeployStage::ReleaseCandidate);
        assert_eq!(request.message, "joist#5, scenery#2");
        assert_eq!(request.brands, vec!["phet", "phet-io"]);
        assert_eq!(request.locales, "*");

        let saved = Maintenance::load(engine.root()).unwrap();
        assert_eq!(saved.to_file(), engine.state().to_file());
    }

    #[test]
    fn unreleased_and_filtered_branches_are_skipped() {
        let (_dir, fakes, mut engine) = engine_with(Vec::new());
        with_pushed(&mut engine, ReleaseBranch::new("sim-a", "1.3", [BRAND_PHET], false), &["x"]);
        with_pushed(&mut engine, release_branch("sim-b", "2.0"), &["y"]);

        let deployed = engine
            .deploy_release_candidates(modified_repo_filter(vec!["sim-a".to_string()]))
            .unwrap();
        assert_eq!(deployed, 0);
        assert!(fakes.deployer.requests().is_empty());
    }

    #[test]
    fn failure_stops_remaining_branches() {
        let (_dir, fakes, mut engine) = engine_with(Vec::new());
        with_pushed(&mut engine, release_branch("sim-a", "1.2"), &["x"]);
        with_pushed(&mut engine, release_branch("sim-b", "2.0"), &["y"]);
        with_pushed(&mut engine, release_branch("sim-c", "1.0"), &["z"]);
        fakes.deployer.fail_for("sim-b");

        let err = engine.deploy_release_candidates(all()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "failure with rc deploy for sim-b to 2.0: `deploy rc sim-b` failed with exit code 1: injected failure"
        );
        let repos: Vec<_> = fakes.deployer.requests().into_iter().map(|(_, r)| r.repo).collect();
        assert_eq!(repos, vec!["sim-a", "sim-b"]);

        let saved = Maintenance::load(engine.root()).unwrap();
        assert!(saved.modified_branches[0].deployed_version.is_some());
        assert!(saved.modified_branches[1].deployed_version.is_none());
    }

    #[test]
    fn redeploy_covers_released_cache_entries() {
        let unreleased = ReleaseBranch::new("sim-b", "3.0", [BRAND_PHET], false);
        let (_dir, fakes, mut engine) = engine_with(vec![release_branch("sim-a", "1.2"), unreleased]);

        let out = engine.redeploy_all_production("rebuild for new chipper").unwrap();
        assert_eq!(out, vec![("sim-a".to_string(), "1.2".to_string(), SimVersion::new(1, 2, 1))]);
        let stages: Vec<_> = fakes.deployer.requests().into_iter().map(|(s, _)| s).collect();
        assert_eq!(stages, vec![DeployStage::ReleaseCandidate, DeployStage::Production]);
        assert!(engine.state().modified_branches.is_empty());
    }

    #[test]
    fn issues_for_unreleased_branches_with_pushed_fixes() {
        let (_dir, fakes, mut engine) = engine_with(Vec::new());
        with_pushed(
            &mut engine,
            ReleaseBranch::new("sim-a", "1.3", [BRAND_PHET], false),
            &["joist#5", "scenery#2"],
        );
        with_pushed(&mut engine, ReleaseBranch::new("sim-b", "2.1", [BRAND_PHET], false), &[]);
        with_pushed(&mut engine, release_branch("sim-c", "1.0"), &["joist#5"]);

        assert_eq!(engine.create_unreleased_issues("Please retest.").unwrap(), 1);
        let issues = fakes.issues.issues();
        assert_eq!(issues.len(), 1);
        let (repo, title, options) = &issues[0];
        assert_eq!(repo, "sim-a");
        assert_eq!(title, "Maintenance patches applied to unreleased branch 1.3");
        assert!(options.body.contains("- joist#5\n- scenery#2\n"));
        assert!(options.body.ends_with("Please retest.\n"));
        assert_eq!(options.labels, vec!["status:ready-for-review"]);

        assert!(engine
            .state()
            .modified_branch("sim-a", "1.3")
            .unwrap()
            .pushed_messages
            .is_empty());
        assert_eq!(engine.state().modified_branch("sim-c", "1.0").unwrap().pushed_messages.len(), 1);
    }
}
