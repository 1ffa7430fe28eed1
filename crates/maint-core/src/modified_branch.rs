use crate::capability::{Capability, CapabilityProbe};
use crate::config::LinkHosts;
use crate::error::Result;
use crate::patch::PatchRef;
use crate::release_branch::ReleaseBranch;
use crate::types::{SimVersion, BRAND_PHET, BRAND_PHET_IO};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

/// Working state of one release branch during a maintenance cycle.
#[derive(Debug, Clone)]
pub struct ModifiedBranch {
    pub release_branch: Arc<ReleaseBranch>,
    /// Dependency repo to the locally created commit not yet pushed.
    pub changed_dependencies: BTreeMap<String, String>,
    pub needed_patches: Vec<PatchRef>,
    /// Messages of cherry-picks applied but not yet pushed.
    pub pending_messages: Vec<String>,
    pub pushed_messages: Vec<String>,
    pub deployed_version: Option<SimVersion>,
}

impl ModifiedBranch {
    pub fn new(release_branch: Arc<ReleaseBranch>) -> Self {
        Self {
            release_branch,
            changed_dependencies: BTreeMap::new(),
            needed_patches: Vec::new(),
            pending_messages: Vec::new(),
            pushed_messages: Vec::new(),
            deployed_version: None,
        }
    }

    pub fn repo(&self) -> &str {
        &self.release_branch.repo
    }

    pub fn branch(&self) -> &str {
        &self.release_branch.branch
    }

    pub fn is(&self, repo: &str, branch: &str) -> bool {
        self.repo() == repo && self.branch() == branch
    }

    // -----------------------------------------------------------------------
    // Readiness
    // -----------------------------------------------------------------------

    pub fn is_unused(&self) -> bool {
        self.needed_patches.is_empty()
            && self.changed_dependencies.is_empty()
            && self.pending_messages.is_empty()
            && self.pushed_messages.is_empty()
    }

    pub fn is_ready_for_release_candidate(&self) -> bool {
        self.needed_patches.is_empty() && !self.pushed_messages.is_empty() && self.deployed_version.is_none()
    }

    pub fn is_ready_for_production(&self) -> bool {
        self.needed_patches.is_empty()
            && !self.pushed_messages.is_empty()
            && self
                .deployed_version
                .as_ref()
                .is_some_and(SimVersion::is_release_candidate)
    }

    // -----------------------------------------------------------------------
    // Needed patches and messages
    // -----------------------------------------------------------------------

    pub fn needs_patch(&self, patch: &PatchRef) -> bool {
        self.needed_patches.iter().any(|p| Rc::ptr_eq(p, patch))
    }

    /// Returns `false` if the patch was already needed.
    pub fn add_needed_patch(&mut self, patch: &PatchRef) -> bool {
        if self.needs_patch(patch) {
            return false;
        }
        self.needed_patches.push(Rc::clone(patch));
        true
    }

    /// Returns `false` if the patch was not needed.
    pub fn remove_needed_patch(&mut self, patch: &PatchRef) -> bool {
        let before = self.needed_patches.len();
        self.needed_patches.retain(|p| !Rc::ptr_eq(p, patch));
        self.needed_patches.len() < before
    }

    pub fn add_pending_message(&mut self, message: &str) {
        if !self.pending_messages.iter().any(|m| m == message) {
            self.pending_messages.push(message.to_string());
        }
    }

    /// Move pending messages to pushed, skipping ones already pushed.
    pub fn mark_pending_pushed(&mut self) {
        for message in std::mem::take(&mut self.pending_messages) {
            if !self.pushed_messages.contains(&message) {
                self.pushed_messages.push(message);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Deployed links
    // -----------------------------------------------------------------------

    /// Markdown checklist lines linking to the deployed version, one per
    /// brand entry point. Empty when nothing is deployed.
    pub fn deployed_link_lines(&self, probe: &CapabilityProbe, hosts: &LinkHosts) -> Result<Vec<String>> {
        let Some(version) = &self.deployed_version else {
            return Ok(Vec::new());
        };
        let rb = &*self.release_branch;
        let repo = rb.repo.as_str();
        let has_phet = rb.has_brand(BRAND_PHET);
        let has_phetio = rb.has_brand(BRAND_PHET_IO);
        let version_string = version.to_string();

        let standalone_params = if probe.has(rb, Capability::OldPhetioStandalone)? {
            "phet-io.standalone"
        } else {
            "phetioStandalone"
        };
        let proxies_params = if probe.has(rb, Capability::RelativeSimPath)? {
            "relativeSimPath"
        } else {
            "launchLocalVersion"
        };
        let studio = has_phetio && probe.has(rb, Capability::PhetioStudio)?;
        let (studio_name, studio_title) = if studio {
            ("studio", "Studio")
        } else {
            ("instance-proxies", "Instance Proxies")
        };
        let nested = probe.has(rb, Capability::NestedBrandBuildLayout)?;
        let (phet_folder, phetio_folder, phet_suffix) = if nested {
            ("/phet", "/phet-io", "_phet")
        } else {
            ("", "", "")
        };
        let phetio_suffix = if nested { "_all_phet-io" } else { "_en-phetio" };
        let phetio_brand_suffix = if nested { "" } else { "-phetio" };
        let studio_path_suffix = if probe.has(rb, Capability::PhetioStudioIndex)? {
            String::new()
        } else {
            format!("/{studio_name}.html?sim={repo}&{proxies_params}")
        };

        let mut suffixes = Vec::new();
        if version.is_release_candidate() {
            let dev = hosts.dev.trim_end_matches('/');
            let phetio_dev_version = if nested {
                version_string.clone()
            } else {
                version_string.replace('-', "-phetio")
            };
            if has_phet {
                suffixes.push(format!(
                    "]({dev}/html/{repo}/{version_string}{phet_folder}/{repo}_all{phet_suffix}.html)"
                ));
            }
            if has_phetio {
                let base = format!("{dev}/html/{repo}/{phetio_dev_version}{phetio_folder}");
                suffixes.push(format!(" phet-io]({base}/{repo}{phetio_suffix}.html?{standalone_params})"));
                suffixes.push(format!(
                    " phet-io {studio_title}]({base}/wrappers/{studio_name}{studio_path_suffix})"
                ));
            }
        } else {
            let production = hosts.production.trim_end_matches('/');
            let phetio_production = hosts.phetio_production.trim_end_matches('/');
            if has_phet {
                suffixes.push(format!(
                    "]({production}/sims/html/{repo}/{version_string}/{repo}_all.html)"
                ));
            }
            if has_phetio {
                let base = format!("{phetio_production}/sims/{repo}/{version_string}{phetio_brand_suffix}");
                suffixes.push(format!(" phet-io]({base}/{repo}{phetio_suffix}.html?{standalone_params})"));
                suffixes.push(format!(
                    " phet-io {studio_title}]({base}/wrappers/{studio_name}{studio_path_suffix})"
                ));
            }
        }

        Ok(suffixes
            .into_iter()
            .map(|link| format!("- [ ] [{repo} {version_string}{link}"))
            .collect())
    }
}
