use super::MaintenanceEngine;
use crate::error::{MaintError, Result};
use crate::filter::ModifiedBranchFilter;
use crate::manifest::DependencyManifest;

impl MaintenanceEngine {
    /// Push every changed dependency of the accepted modified branches to
    /// its `{repo}-{branch}` branch, then commit and push the rewritten
    /// dependency manifest on the release branch.
    ///
    /// Returns the number of release branches updated.
    pub fn update_dependencies<F: ModifiedBranchFilter>(&mut self, mut filter: F) -> Result<usize> {
        let mut selected = Vec::new();
        for (index, mb) in self.state.modified_branches.iter().enumerate() {
            if !mb.changed_dependencies.is_empty() && filter.accept(mb)? {
                selected.push(index);
            }
        }

        for &index in &selected {
            if let Err(source) = self.update_branch_dependencies(index) {
                self.save()?;
                let mb = &self.state.modified_branches[index];
                return Err(MaintError::DependencyUpdate {
                    repo: mb.repo().to_string(),
                    branch: mb.branch().to_string(),
                    source: Box::new(source),
                });
            }
        }
        Ok(selected.len())
    }

    fn update_branch_dependencies(&mut self, index: usize) -> Result<()> {
        let vcs = self.services.vcs.clone();
        let rb = self.state.modified_branches[index].release_branch.clone();
        let (repo, branch) = (rb.repo.as_str(), rb.branch.as_str());
        let dependency_branch = rb.dependency_branch_name();
        let deps_file = self.layout().dependencies_file.clone();
        let manifest_path = self.repo_dir(repo).join(&deps_file);
        let changed: Vec<(String, String)> = self.state.modified_branches[index]
            .changed_dependencies
            .iter()
            .map(|(dep, sha)| (dep.clone(), sha.clone()))
            .collect();

        vcs.checkout(repo, branch)?;
        // A patch to the simulation itself lands on the release branch directly.
        if let Some((_, sha)) = changed.iter().find(|(dep, _)| dep == repo) {
            vcs.merge_ff(repo, sha)?;
        }
        let mut manifest = DependencyManifest::parse(&std::fs::read_to_string(&manifest_path)?)?;
        manifest.set_sha(repo, &vcs.current_revision(repo, branch)?);

        for (dependency, sha) in &changed {
            if dependency != repo {
                if vcs.list_branches(dependency)?.contains(&dependency_branch) {
                    vcs.checkout(dependency, &dependency_branch)?;
                    vcs.pull(dependency)?;
                    if vcs.current_revision(dependency, "HEAD")? != *sha {
                        vcs.merge_ff(dependency, sha)?;
                        vcs.push(dependency, &dependency_branch)?;
                    }
                } else {
                    vcs.checkout(dependency, sha)?;
                    vcs.create_branch(dependency, &dependency_branch)?;
                    vcs.push(dependency, &dependency_branch)?;
                }
                manifest.set_sha(dependency, sha);
            }

            let mb = &mut self.state.modified_branches[index];
            mb.changed_dependencies.remove(dependency);
            mb.deployed_version = None;
            self.save()?;
            tracing::info!(
                dependency = %dependency,
                branch = %dependency_branch,
                sha = %sha,
                "dependency branch updated"
            );
        }

        crate::io::atomic_write(&manifest_path, manifest.to_pretty_string()?.as_bytes())?;
        let message = format!(
            "updated dependencies.json for {}",
            self.state.modified_branches[index].pending_messages.join(" and ")
        );
        vcs.commit_file(repo, &deps_file, &message)?;
        vcs.push(repo, branch)?;

        self.state.modified_branches[index].mark_pending_pushed();
        self.save()?;
        vcs.checkout(repo, self.primary_branch())?;
        tracing::info!(repo, branch, "dependencies updated and pushed");
        Ok(())
    }
}
