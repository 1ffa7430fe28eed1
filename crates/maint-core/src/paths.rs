use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// File and directory constants
// ---------------------------------------------------------------------------

pub const STATE_FILE: &str = ".maintenance.json";
pub const CONFIG_DIR: &str = ".maintenance";
pub const CONFIG_FILE: &str = ".maintenance/config.yaml";

/// Developer-local settings shared with the rest of the build tooling.
pub const BUILD_LOCAL_FILE: &str = ".phet/build-local.json";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn state_path(root: &Path) -> PathBuf {
    root.join(STATE_FILE)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn repo_dir(root: &Path, repo: &str) -> PathBuf {
    root.join(repo)
}

/// Directory holding the full set of repositories checked out for one
/// release branch, e.g. `release-branches/acid-base-solutions-1.2`.
pub fn release_branch_checkout_dir(
    root: &Path,
    release_branches_dir: &str,
    repo: &str,
    branch: &str,
) -> PathBuf {
    root.join(release_branches_dir).join(format!("{repo}-{branch}"))
}

pub fn build_local_path() -> Option<PathBuf> {
    home::home_dir().map(|h| h.join(BUILD_LOCAL_FILE))
}

// ---------------------------------------------------------------------------
// Branch name patterns
// ---------------------------------------------------------------------------

static RELEASE_BRANCH_RE: OnceLock<Regex> = OnceLock::new();

fn release_branch_re() -> &'static Regex {
    RELEASE_BRANCH_RE.get_or_init(|| Regex::new(r"^(\d+)\.(\d+)$").unwrap())
}

/// Parse a strict `{major}.{minor}` release branch name.
pub fn parse_release_branch(branch: &str) -> Option<(u32, u32)> {
    let caps = release_branch_re().captures(branch)?;
    let major = caps[1].parse().ok()?;
    let minor = caps[2].parse().ok()?;
    Some((major, minor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_branch_names() {
        assert_eq!(parse_release_branch("1.2"), Some((1, 2)));
        assert_eq!(parse_release_branch("10.31"), Some((10, 31)));
        for branch in ["main", "1.2-phetio", "1", "1.2.3", "v1.2", ""] {
            assert!(parse_release_branch(branch).is_none(), "expected no match: {branch}");
        }
    }

    #[test]
    fn checkout_dir_layout() {
        let dir = release_branch_checkout_dir(Path::new("/work"), "release-branches", "sim-a", "1.2");
        assert_eq!(dir, PathBuf::from("/work/release-branches/sim-a-1.2"));
    }
}
