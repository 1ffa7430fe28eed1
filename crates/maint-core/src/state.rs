use crate::error::{MaintError, Result};
use crate::modified_branch::ModifiedBranch;
use crate::patch::{Patch, PatchRef};
use crate::paths;
use crate::release_branch::ReleaseBranch;
use crate::types::SimVersion;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// On-disk shape
// ---------------------------------------------------------------------------

/// `.maintenance.json` as written to disk. Modified branches name their
/// needed patches; [`Maintenance`] re-links the names to shared handles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateFile {
    #[serde(default)]
    pub patches: Vec<Patch>,
    #[serde(default)]
    pub modified_branches: Vec<ModifiedBranchFile>,
    #[serde(default)]
    pub all_release_branches: Vec<ReleaseBranch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifiedBranchFile {
    pub release_branch: ReleaseBranch,
    #[serde(default)]
    pub changed_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub needed_patches: Vec<String>,
    #[serde(default)]
    pub pending_messages: Vec<String>,
    #[serde(default)]
    pub pushed_messages: Vec<String>,
    #[serde(default)]
    pub deployed_version: Option<SimVersion>,
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

/// The maintenance state aggregate.
#[derive(Debug, Clone, Default)]
pub struct Maintenance {
    pub patches: Vec<PatchRef>,
    /// Sorted by (repo, branch).
    pub modified_branches: Vec<ModifiedBranch>,
    /// Discovery cache; empty until the first discovery.
    pub all_release_branches: Vec<Arc<ReleaseBranch>>,
}

impl Maintenance {
    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Load the state file; a missing file is an empty state.
    pub fn load(root: &Path) -> Result<Self> {
        match crate::io::read_if_exists(&paths::state_path(root))? {
            Some(data) => Self::from_json(&data),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let data = self.to_json()?;
        crate::io::atomic_write(&paths::state_path(root), data.as_bytes())
    }

    pub fn from_json(data: &str) -> Result<Self> {
        Self::from_file(serde_json::from_str(data)?)
    }

    pub fn to_json(&self) -> Result<String> {
        let mut s = serde_json::to_string_pretty(&self.to_file())?;
        s.push('\n');
        Ok(s)
    }

    pub fn from_file(file: StateFile) -> Result<Self> {
        let patches: Vec<PatchRef> = file.patches.into_iter().map(Patch::into_ref).collect();
        let all_release_branches: Vec<Arc<ReleaseBranch>> =
            file.all_release_branches.into_iter().map(Arc::new).collect();

        let mut modified_branches = Vec::with_capacity(file.modified_branches.len());
        for entry in file.modified_branches {
            let release_branch = all_release_branches
                .iter()
                .find(|rb| ***rb == entry.release_branch)
                .cloned()
                .unwrap_or_else(|| Arc::new(entry.release_branch.clone()));

            let mut needed_patches = Vec::with_capacity(entry.needed_patches.len());
            for name in &entry.needed_patches {
                let patch = patches
                    .iter()
                    .find(|p| p.borrow().name == *name)
                    .ok_or_else(|| MaintError::UnknownPatchReference {
                        patch: name.clone(),
                        repo: entry.release_branch.repo.clone(),
                        branch: entry.release_branch.branch.clone(),
                    })?;
                needed_patches.push(Rc::clone(patch));
            }

            modified_branches.push(ModifiedBranch {
                release_branch,
                changed_dependencies: entry.changed_dependencies,
                needed_patches,
                pending_messages: entry.pending_messages,
                pushed_messages: entry.pushed_messages,
                deployed_version: entry.deployed_version,
            });
        }

        let mut state = Self {
            patches,
            modified_branches,
            all_release_branches,
        };
        state.sort_modified_branches();
        Ok(state)
    }

    pub fn to_file(&self) -> StateFile {
        StateFile {
            patches: self.patches.iter().map(|p| p.borrow().clone()).collect(),
            modified_branches: self
                .modified_branches
                .iter()
                .map(|mb| ModifiedBranchFile {
                    release_branch: (*mb.release_branch).clone(),
                    changed_dependencies: mb.changed_dependencies.clone(),
                    needed_patches: mb.needed_patches.iter().map(|p| p.borrow().name.clone()).collect(),
                    pending_messages: mb.pending_messages.clone(),
                    pushed_messages: mb.pushed_messages.clone(),
                    deployed_version: mb.deployed_version.clone(),
                })
                .collect(),
            all_release_branches: self.all_release_branches.iter().map(|rb| (**rb).clone()).collect(),
        }
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    pub fn find_patch(&self, name: &str) -> Result<PatchRef> {
        self.patches
            .iter()
            .find(|p| p.borrow().name == name)
            .cloned()
            .ok_or_else(|| MaintError::PatchNotFound(name.to_string()))
    }

    pub fn has_patch(&self, name: &str) -> bool {
        self.patches.iter().any(|p| p.borrow().name == name)
    }

    pub fn is_patch_needed(&self, patch: &PatchRef) -> bool {
        self.modified_branches.iter().any(|mb| mb.needs_patch(patch))
    }

    pub fn modified_branch(&self, repo: &str, branch: &str) -> Option<&ModifiedBranch> {
        self.modified_branches.iter().find(|mb| mb.is(repo, branch))
    }

    pub fn modified_branch_mut(&mut self, repo: &str, branch: &str) -> Option<&mut ModifiedBranch> {
        self.modified_branches.iter_mut().find(|mb| mb.is(repo, branch))
    }

    pub fn release_branch(&self, repo: &str, branch: &str) -> Option<Arc<ReleaseBranch>> {
        self.all_release_branches
            .iter()
            .find(|rb| rb.repo == repo && rb.branch == branch)
            .cloned()
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// The modified branch for `release_branch`, created if not yet tracked.
    pub fn ensure_modified_branch(&mut self, release_branch: Arc<ReleaseBranch>) -> &mut ModifiedBranch {
        let index = match self
            .modified_branches
            .iter()
            .position(|mb| mb.is(&release_branch.repo, &release_branch.branch))
        {
            Some(index) => index,
            None => {
                let key = (release_branch.repo.clone(), release_branch.branch.clone());
                let index = self
                    .modified_branches
                    .partition_point(|mb| (mb.repo(), mb.branch()) < (key.0.as_str(), key.1.as_str()));
                self.modified_branches
                    .insert(index, ModifiedBranch::new(release_branch));
                index
            }
        };
        &mut self.modified_branches[index]
    }

    /// Drop the modified branch if it no longer tracks anything.
    pub fn remove_if_unused(&mut self, repo: &str, branch: &str) -> bool {
        let before = self.modified_branches.len();
        self.modified_branches
            .retain(|mb| !(mb.is(repo, branch) && mb.is_unused()));
        self.modified_branches.len() < before
    }

    pub fn sort_modified_branches(&mut self) {
        self.modified_branches.sort_by(|a, b| {
            (a.repo(), a.branch()).cmp(&(b.repo(), b.branch()))
        });
    }
}
