//! Release-branch discovery.
//!
//! Released branches come from the two metadata feeds. Unreleased branches
//! are `{major}.{minor}` branches of active simulations that are newer than
//! the published version. The combined list is all-or-nothing: any failure
//! aborts discovery.

use crate::config::RepoLayout;
use crate::error::Result;
use crate::metadata::{MetadataService, PhetioQuery};
use crate::release_branch::{combine_release_branches, ReleaseBranch};
use crate::types::{BRAND_PHET, BRAND_PHET_IO};
use crate::vcs::VersionControl;
use crate::{io, paths};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// The `phet` section of a simulation's package file.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackagePhet {
    #[serde(default)]
    ignore_for_automated_maintenance_releases: bool,
    #[serde(default)]
    supported_brands: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Package {
    #[serde(default)]
    phet: PackagePhet,
}

impl Package {
    fn read(vcs: &dyn VersionControl, repo: &str, revision: &str, layout: &RepoLayout) -> Result<Self> {
        let data = vcs.read_file_at_revision(repo, revision, &layout.package_file)?;
        Ok(serde_json::from_str(&data)?)
    }
}

pub fn discover_release_branches(
    vcs: &dyn VersionControl,
    metadata: &dyn MetadataService,
    root: &Path,
    layout: &RepoLayout,
) -> Result<Vec<ReleaseBranch>> {
    let mut found = Vec::new();
    let mut production: HashMap<String, (u32, u32)> = HashMap::new();

    let published = metadata.published_simulations()?;
    tracing::info!(count = published.len(), "published phet simulations");
    for project in &published {
        let repo = project.repo().to_string();
        let (major, minor) = (project.version.major, project.version.minor);
        production.insert(repo.clone(), (major, minor));
        found.push(ReleaseBranch::new(repo, format!("{major}.{minor}"), [BRAND_PHET], true));
    }

    let phetio = metadata.phetio_simulations(&PhetioQuery {
        active: true,
        latest: true,
    })?;
    tracing::info!(count = phetio.len(), "active phet-io simulations");
    for project in &phetio {
        found.push(ReleaseBranch::new(&project.name, project.branch(), [BRAND_PHET_IO], true));
    }

    let released: HashSet<(String, String)> = found
        .iter()
        .map(|rb| (rb.repo.clone(), rb.branch.clone()))
        .collect();

    let active_sims = io::read_lines(&root.join(&layout.active_sims_file))?;
    for repo in &active_sims {
        found.extend(unreleased_branches(
            vcs,
            layout,
            repo,
            production.get(repo).copied(),
            &released,
        )?);
    }

    let combined = combine_release_branches(found);
    tracing::info!(count = combined.len(), "release branches discovered");
    Ok(combined)
}

fn unreleased_branches(
    vcs: &dyn VersionControl,
    layout: &RepoLayout,
    repo: &str,
    production: Option<(u32, u32)>,
    released: &HashSet<(String, String)>,
) -> Result<Vec<ReleaseBranch>> {
    if Package::read(vcs, repo, &layout.primary_branch, layout)?
        .phet
        .ignore_for_automated_maintenance_releases
    {
        tracing::debug!(repo, "opted out of automated maintenance releases");
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    for branch in vcs.list_branches(repo)? {
        if released.contains(&(repo.to_string(), branch.clone())) {
            continue;
        }
        let Some(version) = paths::parse_release_branch(&branch) else {
            continue;
        };
        if production.is_some_and(|p| version <= p) {
            continue;
        }

        let package = Package::read(vcs, repo, &branch, layout)?;
        if package.phet.ignore_for_automated_maintenance_releases {
            continue;
        }
        let mut brands = vec![BRAND_PHET];
        if package.phet.supported_brands.iter().any(|b| b == BRAND_PHET_IO) {
            brands.push(BRAND_PHET_IO);
        }
        tracing::debug!(repo, branch = %branch, "unreleased branch");
        out.push(ReleaseBranch::new(repo, branch, brands, false));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{PhetioProject, ProjectVersion, PublishedProject};
    use crate::testing::{FakeMetadata, FakeVcs};
    use tempfile::TempDir;

    fn published(repo: &str, major: u32, minor: u32) -> PublishedProject {
        PublishedProject {
            name: format!("html/{repo}"),
            version: ProjectVersion { major, minor, dev: None },
        }
    }

    fn phetio(repo: &str, major: u32, minor: u32, suffix: &str) -> PhetioProject {
        PhetioProject {
            name: repo.to_string(),
            version_major: major,
            version_minor: minor,
            version_suffix: suffix.to_string(),
            active: true,
            latest: true,
        }
    }

    fn root_with_sims(sims: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(RepoLayout::default().active_sims_file);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, sims.join("\n")).unwrap();
        dir
    }

    #[test]
    fn released_feeds_combine_by_brand_union() {
        let dir = root_with_sims(&[]);
        let metadata = FakeMetadata::new(
            vec![published("sim-a", 1, 2), published("forces-and-motion-basics", 2, 3)],
            vec![
                phetio("sim-a", 1, 2, ""),
                phetio("sim-c", 1, 0, "phetio"),
                phetio("forces-and-motion-basics", 2, 3, "phetio"),
            ],
        );
        let vcs = FakeVcs::new();
        let branches = discover_release_branches(&vcs, &metadata, dir.path(), &RepoLayout::default()).unwrap();

        assert_eq!(
            branches,
            vec![
                ReleaseBranch::new("forces-and-motion-basics", "2.3", [BRAND_PHET], true),
                ReleaseBranch::new("sim-a", "1.2", [BRAND_PHET, BRAND_PHET_IO], true),
                ReleaseBranch::new("sim-c", "1.0-phetio", [BRAND_PHET_IO], true),
            ]
        );
    }

    #[test]
    fn unreleased_branches_newer_than_production() {
        let dir = root_with_sims(&["sim-a", "sim-new", "sim-optout"]);
        let metadata = FakeMetadata::new(vec![published("sim-a", 1, 2)], Vec::new());
        let vcs = FakeVcs::new();
        vcs.add_file("sim-a", "main", "package.json", r#"{"phet": {}}"#);
        for branch in ["1.1", "1.2", "1.3", "2.0", "feature-x"] {
            vcs.add_branch("sim-a", branch, &format!("sha-{branch}"));
        }
        vcs.add_file("sim-a", "1.3", "package.json", r#"{"phet": {"supportedBrands": ["phet", "phet-io"]}}"#);
        vcs.add_file(
            "sim-a",
            "2.0",
            "package.json",
            r#"{"phet": {"ignoreForAutomatedMaintenanceReleases": true}}"#,
        );

        vcs.add_file("sim-new", "main", "package.json", r#"{"name": "sim-new"}"#);
        vcs.add_branch("sim-new", "1.0", "n1");
        vcs.add_file("sim-new", "1.0", "package.json", r#"{"phet": {"supportedBrands": ["phet"]}}"#);

        vcs.add_file(
            "sim-optout",
            "main",
            "package.json",
            r#"{"phet": {"ignoreForAutomatedMaintenanceReleases": true}}"#,
        );
        vcs.add_branch("sim-optout", "1.0", "o1");

        let branches = discover_release_branches(&vcs, &metadata, dir.path(), &RepoLayout::default()).unwrap();
        assert_eq!(
            branches,
            vec![
                ReleaseBranch::new("sim-a", "1.2", [BRAND_PHET], true),
                ReleaseBranch::new("sim-a", "1.3", [BRAND_PHET, BRAND_PHET_IO], false),
                ReleaseBranch::new("sim-new", "1.0", [BRAND_PHET], false),
            ]
        );
    }

    #[test]
    fn metadata_failure_aborts() {
        let dir = root_with_sims(&[]);
        let metadata = FakeMetadata::failing();
        let vcs = FakeVcs::new();
        assert!(discover_release_branches(&vcs, &metadata, dir.path(), &RepoLayout::default()).is_err());
    }
}
