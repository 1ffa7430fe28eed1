//! Feature detection on release branches.
//!
//! Each capability was introduced by one known commit in one dependency
//! repo. A branch has the capability when its pin of that repo (read from
//! the manifest at the branch tip, no checkout) descends from the
//! introducing commit. Legacy capabilities are the negation: the branch
//! still predates the commit that removed the old behavior.

use crate::config::RepoLayout;
use crate::error::Result;
use crate::manifest::DependencyManifest;
use crate::release_branch::ReleaseBranch;
use crate::vcs::VersionControl;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    /// Query parameters are declared through initialize-globals.
    InitializeGlobalsQueryParameters,
    /// Standalone mode uses the dotted `phet-io.standalone` parameter.
    OldPhetioStandalone,
    /// Wrappers locate the sim with `relativeSimPath`.
    RelativeSimPath,
    /// Studio replaced the instance-proxies wrapper.
    PhetioStudio,
    /// Studio is served from its own top-level index.
    PhetioStudioIndex,
    /// Build output is nested under `build/<brand>/`.
    NestedBrandBuildLayout,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::InitializeGlobalsQueryParameters,
        Capability::OldPhetioStandalone,
        Capability::RelativeSimPath,
        Capability::PhetioStudio,
        Capability::PhetioStudioIndex,
        Capability::NestedBrandBuildLayout,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Capability::InitializeGlobalsQueryParameters => "initialize-globals-query-parameters",
            Capability::OldPhetioStandalone => "old-phetio-standalone",
            Capability::RelativeSimPath => "relative-sim-path",
            Capability::PhetioStudio => "phetio-studio",
            Capability::PhetioStudioIndex => "phetio-studio-index",
            Capability::NestedBrandBuildLayout => "nested-brand-build-layout",
        }
    }

    /// Repo whose pinned commit decides the answer.
    pub fn dependency_repo(self) -> &'static str {
        match self {
            Capability::PhetioStudioIndex => "studio",
            _ => "chipper",
        }
    }

    pub fn introducing_commit(self) -> &'static str {
        match self {
            Capability::InitializeGlobalsQueryParameters => "4bd7ca8b3dd5f1f6e8f7b7a1d1a83d6b12c2f8e5",
            Capability::OldPhetioStandalone => "4814d6966c54f250b1c0f3909b71f2b9cfcc7665",
            Capability::RelativeSimPath => "e454f88ff51d1e3fabdb3a076d7407a2a9e9133c",
            Capability::PhetioStudio => "7b7dac3de8a1ba1e9e5e48d7a8fd3e57c7e8a0ce",
            Capability::PhetioStudioIndex => "7cd6c4b1f1d4dc86e4a8f8ee71c0e2e98c3cbbc6",
            Capability::NestedBrandBuildLayout => "f6b6a80e36d9d4e7e1f0fd4e50d2f0a0c5b3f5a1",
        }
    }

    /// The commit removed the behavior this capability names.
    pub fn is_legacy(self) -> bool {
        matches!(self, Capability::OldPhetioStandalone)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Answers capability questions, memoized per (branch tip, capability).
pub struct CapabilityProbe {
    vcs: Arc<dyn VersionControl>,
    layout: RepoLayout,
    cache: RefCell<HashMap<(String, Capability), bool>>,
}

impl CapabilityProbe {
    pub fn new(vcs: Arc<dyn VersionControl>, layout: RepoLayout) -> Self {
        Self {
            vcs,
            layout,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn has(&self, branch: &ReleaseBranch, capability: Capability) -> Result<bool> {
        let tip = self.vcs.current_revision(&branch.repo, &branch.branch)?;
        let key = (tip, capability);
        if let Some(answer) = self.cache.borrow().get(&key) {
            return Ok(*answer);
        }

        let dep = capability.dependency_repo();
        let pinned = if dep == branch.repo {
            Some(key.0.clone())
        } else {
            let data = self
                .vcs
                .read_file_at_revision(&branch.repo, &key.0, &self.layout.dependencies_file)?;
            DependencyManifest::parse(&data)?
                .sha(dep)
                .map(str::to_string)
        };
        let introduced = match pinned {
            Some(pinned) => self.vcs.is_ancestor(dep, capability.introducing_commit(), &pinned)?,
            None => false,
        };
        let answer = introduced != capability.is_legacy();
        tracing::debug!(branch = %branch, capability = %capability, answer, "capability probe");

        self.cache.borrow_mut().insert(key, answer);
        Ok(answer)
    }

    pub fn all(&self, branch: &ReleaseBranch) -> Result<BTreeMap<Capability, bool>> {
        Capability::ALL
            .iter()
            .map(|&c| self.has(branch, c).map(|answer| (c, answer)))
            .collect()
    }
}
