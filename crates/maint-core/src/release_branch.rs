use crate::config::RepoLayout;
use crate::error::Result;
use crate::manifest::DependencyManifest;
use crate::paths;
use crate::vcs::VersionControl;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// Branches that are never maintained, whatever the metadata says.
/// The metadata service still reports a phet-io suffix branch that was
/// abandoned before it shipped.
pub const EXCLUDED_RELEASE_BRANCHES: &[(&str, &str)] = &[("forces-and-motion-basics", "2.3-phetio")];

/// One deployable branch of one repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseBranch {
    pub repo: String,
    pub branch: String,
    pub brands: BTreeSet<String>,
    pub is_released: bool,
}

impl ReleaseBranch {
    pub fn new<I, S>(repo: impl Into<String>, branch: impl Into<String>, brands: I, is_released: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            repo: repo.into(),
            branch: branch.into(),
            brands: brands.into_iter().map(Into::into).collect(),
            is_released,
        }
    }

    pub fn has_brand(&self, brand: &str) -> bool {
        self.brands.contains(brand)
    }

    pub fn brand_list(&self) -> Vec<String> {
        self.brands.iter().cloned().collect()
    }

    pub fn is_excluded(&self) -> bool {
        EXCLUDED_RELEASE_BRANCHES
            .iter()
            .any(|(repo, branch)| self.repo == *repo && self.branch == *branch)
    }

    /// Name of the branch created in dependency repos to hold this release
    /// branch's patched commits.
    pub fn dependency_branch_name(&self) -> String {
        format!("{}-{}", self.repo, self.branch)
    }

    pub fn checkout_dir(&self, root: &Path, layout: &RepoLayout) -> PathBuf {
        paths::release_branch_checkout_dir(root, &layout.release_branches_dir, &self.repo, &self.branch)
    }

    /// The dependency manifest at the branch tip, read without a checkout.
    pub fn dependencies(&self, vcs: &dyn VersionControl, layout: &RepoLayout) -> Result<DependencyManifest> {
        let data = vcs.read_file_at_revision(&self.repo, &self.branch, &layout.dependencies_file)?;
        DependencyManifest::parse(&data)
    }

    /// Commit of `repo` as seen by this branch: the branch tip for the
    /// branch's own repo, otherwise the manifest pin.
    pub fn dependency_sha(
        &self,
        vcs: &dyn VersionControl,
        layout: &RepoLayout,
        repo: &str,
    ) -> Result<Option<String>> {
        if repo == self.repo {
            return vcs.current_revision(&self.repo, &self.branch).map(Some);
        }
        Ok(self.dependencies(vcs, layout)?.sha(repo).map(str::to_string))
    }

    /// True when `sha` is an ancestor of this branch's pin of `repo`.
    /// An unpinned repo gives `false`.
    pub fn includes_sha(&self, vcs: &dyn VersionControl, layout: &RepoLayout, repo: &str, sha: &str) -> Result<bool> {
        match self.dependency_sha(vcs, layout, repo)? {
            Some(pinned) => vcs.is_ancestor(repo, sha, &pinned),
            None => Ok(false),
        }
    }

    /// True when this branch pins `repo` and the pin does not contain `sha`.
    /// An unpinned repo gives `false` as well, so branches without the
    /// dependency are never selected.
    pub fn is_missing_sha(&self, vcs: &dyn VersionControl, layout: &RepoLayout, repo: &str, sha: &str) -> Result<bool> {
        match self.dependency_sha(vcs, layout, repo)? {
            Some(pinned) => Ok(!vcs.is_ancestor(repo, sha, &pinned)?),
            None => Ok(false),
        }
    }
}

impl fmt::Display for ReleaseBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.repo, self.branch)
    }
}

/// Merge entries naming the same (repo, branch) by brand union, sort by
/// (repo, branch) and drop excluded branches.
pub fn combine_release_branches(branches: impl IntoIterator<Item = ReleaseBranch>) -> Vec<ReleaseBranch> {
    let mut merged: BTreeMap<(String, String), ReleaseBranch> = BTreeMap::new();
    for rb in branches {
        match merged.get_mut(&(rb.repo.clone(), rb.branch.clone())) {
            Some(existing) => {
                existing.brands.extend(rb.brands);
                existing.is_released |= rb.is_released;
            }
            None => {
                merged.insert((rb.repo.clone(), rb.branch.clone()), rb);
            }
        }
    }
    merged.into_values().filter(|rb| !rb.is_excluded()).collect()
}
