use super::MaintenanceEngine;
use crate::error::Result;
use crate::filter::ModifiedBranchFilter;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchSummary {
    pub repo: String,
    pub branch: String,
    pub brands: Vec<String>,
    pub is_released: bool,
    pub deployed_version: Option<String>,
    pub needed_patches: Vec<String>,
    pub pending_messages: Vec<String>,
    pub pushed_messages: Vec<String>,
    pub changed_dependencies: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchSummary {
    pub name: String,
    pub repo: String,
    pub message: String,
    pub shas: Vec<String>,
    /// `repo branch` of every modified branch needing the patch.
    pub needed_by: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceSummary {
    pub branches: Vec<BranchSummary>,
    pub patches: Vec<PatchSummary>,
}

impl fmt::Display for MaintenanceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.branches {
            write!(f, "{} {} {}", b.repo, b.branch, b.brands.join(","))?;
            if !b.is_released {
                f.write_str(" (unpublished)")?;
            }
            writeln!(f)?;
            if let Some(version) = &b.deployed_version {
                writeln!(f, "  deployed: {version}")?;
            }
            if !b.needed_patches.is_empty() {
                writeln!(f, "  needs: {}", b.needed_patches.join(","))?;
            }
            if !b.pushed_messages.is_empty() {
                writeln!(f, "  pushed messages:")?;
                for m in &b.pushed_messages {
                    writeln!(f, "    {m}")?;
                }
            }
            if !b.pending_messages.is_empty() {
                writeln!(f, "  pending messages:")?;
                for m in &b.pending_messages {
                    writeln!(f, "    {m}")?;
                }
            }
            if !b.changed_dependencies.is_empty() {
                writeln!(f, "  deps:")?;
                for (dep, sha) in &b.changed_dependencies {
                    writeln!(f, "    {dep}: {sha}")?;
                }
            }
        }
        for p in &self.patches {
            write!(f, "[{}]", p.name)?;
            if p.name != p.repo {
                write!(f, " ({})", p.repo)?;
            }
            writeln!(f, " {}", p.message)?;
            for sha in &p.shas {
                writeln!(f, "  {sha}")?;
            }
            for branch in &p.needed_by {
                writeln!(f, "    {branch}")?;
            }
        }
        Ok(())
    }
}

/// Deployed test links of one modified branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkGroup {
    pub repo: String,
    pub branch: String,
    pub lines: Vec<String>,
}

impl MaintenanceEngine {
    pub fn list(&self) -> MaintenanceSummary {
        let branches = self
            .state
            .modified_branches
            .iter()
            .map(|mb| BranchSummary {
                repo: mb.repo().to_string(),
                branch: mb.branch().to_string(),
                brands: mb.release_branch.brand_list(),
                is_released: mb.release_branch.is_released,
                deployed_version: mb.deployed_version.as_ref().map(ToString::to_string),
                needed_patches: mb.needed_patches.iter().map(|p| p.borrow().name.clone()).collect(),
                pending_messages: mb.pending_messages.clone(),
                pushed_messages: mb.pushed_messages.clone(),
                changed_dependencies: mb.changed_dependencies.clone(),
            })
            .collect();

        let patches = self
            .state
            .patches
            .iter()
            .map(|patch| {
                let p = patch.borrow();
                PatchSummary {
                    name: p.name.clone(),
                    repo: p.repo.clone(),
                    message: p.message.clone(),
                    shas: p.shas.clone(),
                    needed_by: self
                        .state
                        .modified_branches
                        .iter()
                        .filter(|mb| mb.needs_patch(patch))
                        .map(|mb| mb.release_branch.to_string())
                        .collect(),
                }
            })
            .collect();

        MaintenanceSummary { branches, patches }
    }

    /// Test links for every deployed modified branch the filter accepts.
    pub fn list_links<F: ModifiedBranchFilter>(&self, mut filter: F) -> Result<Vec<LinkGroup>> {
        let mut groups = Vec::new();
        for mb in &self.state.modified_branches {
            if mb.deployed_version.is_none() || !filter.accept(mb)? {
                continue;
            }
            groups.push(LinkGroup {
                repo: mb.repo().to_string(),
                branch: mb.branch().to_string(),
                lines: mb.deployed_link_lines(&self.probe, &self.config.links)?,
            });
        }
        Ok(groups)
    }
}
