use super::MaintenanceEngine;
use crate::capability::Capability;
use crate::error::{MaintError, Result};
use crate::filter::{ContentFilter, ReleaseBranchFilter};
use crate::manifest::DependencyManifest;
use crate::patch::{Patch, PatchRef};
use crate::release_branch::ReleaseBranch;
use crate::types::BRAND_PHET;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

impl MaintenanceEngine {
    // -----------------------------------------------------------------------
    // Patch CRUD
    // -----------------------------------------------------------------------

    /// Create a patch named `name`, or `repo` when no name is given.
    pub fn create_patch(&mut self, repo: &str, message: &str, name: Option<&str>) -> Result<()> {
        let name = name.unwrap_or(repo);
        if self.state.has_patch(name) {
            return Err(MaintError::PatchExists(name.to_string()));
        }
        self.state.patches.push(Patch::new(repo, name, message).into_ref());
        self.save()?;
        tracing::info!(patch = name, repo, "created patch");
        Ok(())
    }

    pub fn remove_patch(&mut self, name: &str) -> Result<()> {
        let patch = self.state.find_patch(name)?;
        if self.state.is_patch_needed(&patch) {
            return Err(MaintError::PatchInUse(name.to_string()));
        }
        self.state.patches.retain(|p| !Rc::ptr_eq(p, &patch));
        self.save()?;
        tracing::info!(patch = name, "removed patch");
        Ok(())
    }

    pub fn add_patch_sha(&mut self, name: &str, sha: &str) -> Result<()> {
        let patch = self.state.find_patch(name)?;
        if patch.borrow_mut().add_sha(sha) {
            self.save()?;
            tracing::info!(patch = name, sha, "added sha");
        } else {
            tracing::info!(patch = name, sha, "sha already listed");
        }
        Ok(())
    }

    pub fn remove_patch_sha(&mut self, name: &str, sha: &str) -> Result<()> {
        let patch = self.state.find_patch(name)?;
        if !patch.borrow_mut().remove_sha(sha) {
            return Err(MaintError::ShaNotInPatch {
                patch: name.to_string(),
                sha: sha.to_string(),
            });
        }
        self.save()?;
        tracing::info!(patch = name, sha, "removed sha");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Needed patches, single branch
    // -----------------------------------------------------------------------

    pub fn add_needed_patch(&mut self, repo: &str, branch: &str, name: &str) -> Result<()> {
        let patch = self.state.find_patch(name)?;
        let rb = self.find_release_branch(repo, branch)?;
        self.mark_needed(rb, &patch);
        self.save()
    }

    /// Like [`Self::add_needed_patch`] for a release branch given by value.
    pub fn add_needed_patch_release_branch(&mut self, release_branch: &ReleaseBranch, name: &str) -> Result<()> {
        let patch = self.state.find_patch(name)?;
        let rb = match self.state.release_branch(&release_branch.repo, &release_branch.branch) {
            Some(cached) if *cached == *release_branch => cached,
            _ => Arc::new(release_branch.clone()),
        };
        self.mark_needed(rb, &patch);
        self.save()
    }

    pub fn remove_needed_patch(&mut self, repo: &str, branch: &str, name: &str) -> Result<()> {
        let patch = self.state.find_patch(name)?;
        let mb = self
            .state
            .modified_branch_mut(repo, branch)
            .ok_or_else(|| MaintError::ModifiedBranchNotFound {
                repo: repo.to_string(),
                branch: branch.to_string(),
            })?;
        if !mb.remove_needed_patch(&patch) {
            return Err(MaintError::NeededPatchNotFound {
                patch: name.to_string(),
                repo: repo.to_string(),
                branch: branch.to_string(),
            });
        }
        if self.state.remove_if_unused(repo, branch) {
            tracing::debug!(repo, branch, "modified branch no longer used");
        }
        self.save()?;
        tracing::info!(patch = name, repo, branch, "removed needed patch");
        Ok(())
    }

    fn mark_needed(&mut self, rb: Arc<ReleaseBranch>, patch: &PatchRef) -> bool {
        let label = rb.to_string();
        let added = self.state.ensure_modified_branch(rb).add_needed_patch(patch);
        if added {
            tracing::info!(patch = %patch.borrow().name, branch = %label, "added needed patch");
        }
        added
    }

    // -----------------------------------------------------------------------
    // Needed patches, batch
    // -----------------------------------------------------------------------

    /// Mark the patch needed on every release branch the filter accepts.
    /// The filter runs over all branches before anything is changed.
    /// Returns the number of branches newly needing the patch.
    pub fn add_needed_patches<F: ReleaseBranchFilter>(&mut self, name: &str, mut filter: F) -> Result<usize> {
        let patch = self.state.find_patch(name)?;
        let mut selected = Vec::new();
        for rb in self.release_branches(false)? {
            if filter.accept(&rb)? {
                selected.push(rb);
            }
        }
        let added = selected
            .into_iter()
            .filter(|rb| self.mark_needed(Arc::clone(rb), &patch))
            .count();
        self.save()?;
        tracing::info!(patch = name, added, "added needed patches");
        Ok(added)
    }

    pub fn add_all_needed_patches(&mut self, name: &str) -> Result<usize> {
        self.add_needed_patches(name, |_: &ReleaseBranch| -> Result<bool> { Ok(true) })
    }

    /// Branches that pin the patch repo at a commit not containing `sha`.
    pub fn add_needed_patches_before(&mut self, name: &str, sha: &str) -> Result<usize> {
        let patch_repo = self.state.find_patch(name)?.borrow().repo.clone();
        let vcs = self.services.vcs.clone();
        let layout = self.layout().clone();
        self.add_needed_patches(name, move |rb: &ReleaseBranch| -> Result<bool> {
            rb.is_missing_sha(vcs.as_ref(), &layout, &patch_repo, sha)
        })
    }

    /// Branches whose pin of the patch repo already contains `sha`.
    pub fn add_needed_patches_after(&mut self, name: &str, sha: &str) -> Result<usize> {
        let patch_repo = self.state.find_patch(name)?.borrow().repo.clone();
        let vcs = self.services.vcs.clone();
        let layout = self.layout().clone();
        self.add_needed_patches(name, move |rb: &ReleaseBranch| -> Result<bool> {
            rb.includes_sha(vcs.as_ref(), &layout, &patch_repo, sha)
        })
    }

    /// Check out and build every release branch in the main working copies,
    /// and mark the patch needed where the built phet HTML passes `filter`.
    /// Branches whose build fails are skipped.
    pub fn add_needed_patches_build_filter<F: ContentFilter>(&mut self, name: &str, mut filter: F) -> Result<usize> {
        self.state.find_patch(name)?;
        let mut selected = Vec::new();
        for rb in self.release_branches(false)? {
            let outcome = self.build_and_read_html(&rb);
            let touched = self.checkout_primary_for(&rb);
            let html = outcome?;
            touched?;
            match html {
                Some(html) if filter.accept(&html)? => selected.push(rb),
                Some(_) => {}
                None => tracing::warn!(branch = %rb, "build failed, skipping"),
            }
        }

        let patch = self.state.find_patch(name)?;
        let added = selected
            .into_iter()
            .filter(|rb| self.mark_needed(Arc::clone(rb), &patch))
            .count();
        self.save()?;
        tracing::info!(patch = name, added, "added needed patches from build filter");
        Ok(added)
    }

    fn build_and_read_html(&self, rb: &ReleaseBranch) -> Result<Option<String>> {
        self.checkout_release_branch(rb, None, false)?;
        let mut args = self.config.build.args.clone();
        args.push(format!("--brands={BRAND_PHET}"));
        args.push("--lint=false".to_string());
        let out = self.services.build.build(&self.repo_dir(&rb.repo), &args)?;
        if !out.success() {
            return Ok(None);
        }
        let path = self.built_html_path(&self.repo_dir(&rb.repo), rb)?;
        Ok(Some(std::fs::read_to_string(path)?))
    }

    /// Built phet HTML for `rb` inside the repo directory `repo_dir`.
    pub(super) fn built_html_path(&self, repo_dir: &std::path::Path, rb: &ReleaseBranch) -> Result<PathBuf> {
        let repo = &rb.repo;
        Ok(if self.has_capability(rb, Capability::NestedBrandBuildLayout)? {
            repo_dir.join("build").join(BRAND_PHET).join(format!("{repo}_en_{BRAND_PHET}.html"))
        } else {
            repo_dir.join("build").join(format!("{repo}_en.html"))
        })
    }

    /// Return the branch's repo and everything its manifest pins to the
    /// primary branch.
    pub(super) fn checkout_primary_for(&self, rb: &ReleaseBranch) -> Result<()> {
        let vcs = &self.services.vcs;
        let manifest_path = self.repo_dir(&rb.repo).join(&self.layout().dependencies_file);
        let deps = match crate::io::read_if_exists(&manifest_path)? {
            Some(data) => DependencyManifest::parse(&data)?
                .repos()
                .into_iter()
                .map(str::to_string)
                .collect(),
            None => Vec::new(),
        };
        vcs.checkout(&rb.repo, self.primary_branch())?;
        for dep in deps.iter().filter(|d| **d != rb.repo) {
            vcs.checkout(dep, self.primary_branch())?;
        }
        Ok(())
    }

    /// Remove the patch from every modified branch the filter accepts.
    pub fn remove_needed_patches<F: ReleaseBranchFilter>(&mut self, name: &str, mut filter: F) -> Result<usize> {
        let patch = self.state.find_patch(name)?;
        let mut selected = Vec::new();
        for mb in &self.state.modified_branches {
            if mb.needs_patch(&patch) && filter.accept(&mb.release_branch)? {
                selected.push((mb.repo().to_string(), mb.branch().to_string()));
            }
        }
        for (repo, branch) in &selected {
            if let Some(mb) = self.state.modified_branch_mut(repo, branch) {
                mb.remove_needed_patch(&patch);
            }
            self.state.remove_if_unused(repo, branch);
            tracing::info!(patch = name, repo = %repo, branch = %branch, "removed needed patch");
        }
        self.save()?;
        Ok(selected.len())
    }

    pub fn remove_needed_patches_before(&mut self, name: &str, sha: &str) -> Result<usize> {
        let patch_repo = self.state.find_patch(name)?.borrow().repo.clone();
        let vcs = self.services.vcs.clone();
        let layout = self.layout().clone();
        self.remove_needed_patches(name, move |rb: &ReleaseBranch| -> Result<bool> {
            rb.is_missing_sha(vcs.as_ref(), &layout, &patch_repo, sha)
        })
    }

    pub fn remove_needed_patches_after(&mut self, name: &str, sha: &str) -> Result<usize> {
        let patch_repo = self.state.find_patch(name)?.borrow().repo.clone();
        let vcs = self.services.vcs.clone();
        let layout = self.layout().clone();
        self.remove_needed_patches(name, move |rb: &ReleaseBranch| -> Result<bool> {
            rb.includes_sha(vcs.as_ref(), &layout, &patch_repo, sha)
        })
    }
}
