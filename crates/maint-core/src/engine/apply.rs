use super::MaintenanceEngine;
use crate::error::{MaintError, Result};
use crate::manifest::DependencyManifest;
use crate::patch::PatchRef;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    /// Patches cherry-picked during this run.
    pub applied: usize,
    /// False when some patch had no candidate sha that applied.
    pub success: bool,
}

impl MaintenanceEngine {
    /// Cherry-pick every needed patch onto the branch it is needed by.
    ///
    /// Candidate shas are tried in order and the first one that applies
    /// wins. A patch whose candidates all conflict stays needed. Any other
    /// failure saves the state and stops.
    pub fn apply_patches(&mut self) -> Result<ApplyReport> {
        let mut report = ApplyReport {
            applied: 0,
            success: true,
        };

        for index in 0..self.state.modified_branches.len() {
            let mb = &self.state.modified_branches[index];
            if mb.needed_patches.is_empty() {
                continue;
            }
            let repo = mb.repo().to_string();
            let branch = mb.branch().to_string();
            let needed = mb.needed_patches.clone();
            let mut touched = false;

            for patch in &needed {
                let patch_repo = patch.borrow().repo.clone();
                if patch.borrow().shas.is_empty() {
                    tracing::debug!(patch = %patch.borrow().name, "no shas yet, skipping");
                    continue;
                }
                touched = true;
                match self.apply_patch(index, patch) {
                    Ok(true) => report.applied += 1,
                    Ok(false) => {
                        report.success = false;
                        tracing::warn!(
                            patch = %patch.borrow().name,
                            repo = %repo,
                            branch = %branch,
                            "no sha could be cherry-picked"
                        );
                    }
                    Err(source) => {
                        self.save()?;
                        return Err(MaintError::PatchApplication {
                            patch_repo,
                            repo,
                            branch,
                            source: Box::new(source),
                        });
                    }
                }
            }

            if !touched {
                continue;
            }
            if let Err(source) = self.services.vcs.checkout(&repo, self.primary_branch()) {
                self.save()?;
                return Err(MaintError::PatchApplication {
                    patch_repo: repo.clone(),
                    repo,
                    branch,
                    source: Box::new(source),
                });
            }
        }

        self.save()?;
        tracing::info!(applied = report.applied, success = report.success, "apply patches finished");
        Ok(report)
    }

    fn apply_patch(&mut self, index: usize, patch: &PatchRef) -> Result<bool> {
        let vcs = self.services.vcs.clone();
        let (patch_repo, shas, message) = {
            let p = patch.borrow();
            (p.repo.clone(), p.shas.clone(), p.message.clone())
        };
        let mb = &self.state.modified_branches[index];
        let repo = mb.repo().to_string();
        let branch = mb.branch().to_string();

        // A patch to the branch's own repo builds on the branch tip, so the
        // result can later be fast-forwarded onto the branch.
        let base = match mb.changed_dependencies.get(&patch_repo) {
            Some(sha) => sha.clone(),
            None if patch_repo == repo => {
                vcs.checkout(&repo, &branch)?;
                vcs.pull(&repo)?;
                vcs.current_revision(&repo, "HEAD")?
            }
            None => {
                vcs.checkout(&repo, &branch)?;
                let path = self.repo_dir(&repo).join(&self.layout().dependencies_file);
                let manifest = DependencyManifest::parse(&std::fs::read_to_string(path)?)?;
                vcs.checkout(&repo, self.primary_branch())?;
                manifest
                    .sha(&patch_repo)
                    .map(str::to_string)
                    .ok_or_else(|| MaintError::MissingDependency {
                        repo: repo.clone(),
                        dependency: patch_repo.clone(),
                    })?
            }
        };

        vcs.checkout(&patch_repo, &base)?;
        for sha in &shas {
            if !vcs.has_commit(&patch_repo, sha)? {
                return Err(MaintError::CommitNotFound {
                    repo: patch_repo,
                    sha: sha.clone(),
                });
            }
            if !vcs.cherry_pick(&patch_repo, sha)?.applied {
                tracing::info!(repo = %patch_repo, sha = %sha, "cherry-pick conflicted, trying next sha");
                continue;
            }

            let head = vcs.current_revision(&patch_repo, "HEAD")?;
            let mb = &mut self.state.modified_branches[index];
            mb.changed_dependencies.insert(patch_repo.clone(), head.clone());
            mb.remove_needed_patch(patch);
            mb.add_pending_message(&message);
            self.save()?;
            tracing::info!(
                patch_repo = %patch_repo,
                sha = %sha,
                repo = %repo,
                branch = %branch,
                head = %head,
                "cherry-pick applied"
            );
            return Ok(true);
        }
        Ok(false)
    }
}
