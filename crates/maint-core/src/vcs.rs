//! Version-control contract and its git subprocess implementation.
//!
//! Every operation names a repository; the client resolves it to
//! `<root>/<repo>`. The same client can be re-rooted at a release-branch
//! checkout directory with [`VersionControl::for_root`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::RepoLayout;
use crate::error::Result;
use crate::process::{self, ExecOutput};

/// Outcome of a cherry-pick. When `applied` is false the working copy has
/// already been returned to a clean state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CherryPickResult {
    pub applied: bool,
}

pub trait VersionControl: Send + Sync {
    /// Directory containing the repository working copies.
    fn root(&self) -> &Path;

    /// The same client operating on working copies under another root.
    fn for_root(&self, root: &Path) -> Arc<dyn VersionControl>;

    fn checkout(&self, repo: &str, target: &str) -> Result<()>;

    fn pull(&self, repo: &str) -> Result<()>;

    fn has_commit(&self, repo: &str, sha: &str) -> Result<bool>;

    fn cherry_pick(&self, repo: &str, sha: &str) -> Result<CherryPickResult>;

    fn abort_cherry_pick(&self, repo: &str) -> Result<()>;

    fn is_ancestor(&self, repo: &str, ancestor: &str, descendant: &str) -> Result<bool>;

    /// Contents of `path` at `revision`, without touching the working copy.
    fn read_file_at_revision(&self, repo: &str, revision: &str, path: &str) -> Result<String>;

    fn current_revision(&self, repo: &str, reference: &str) -> Result<String>;

    /// Branch names that exist upstream.
    fn list_branches(&self, repo: &str) -> Result<Vec<String>>;

    /// Fast-forward the checked-out branch to `sha`.
    fn merge_ff(&self, repo: &str, sha: &str) -> Result<()>;

    /// Create `branch` at the current HEAD and switch to it.
    fn create_branch(&self, repo: &str, branch: &str) -> Result<()>;

    fn push(&self, repo: &str, branch: &str) -> Result<()>;

    /// Stage `path` and commit it with `message`.
    fn commit_file(&self, repo: &str, path: &str, message: &str) -> Result<()>;

    /// Clone `repo` under the root, or fetch if the working copy exists.
    fn clone_or_fetch(&self, repo: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// GitCli
// ---------------------------------------------------------------------------

/// [`VersionControl`] backed by the `git` executable. The executable is
/// resolved on PATH at each call, so constructing the client never fails.
#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
    layout: RepoLayout,
}

impl GitCli {
    pub fn new(root: impl Into<PathBuf>, layout: RepoLayout) -> Self {
        Self {
            root: root.into(),
            layout,
        }
    }

    fn repo_dir(&self, repo: &str) -> PathBuf {
        self.root.join(repo)
    }

    fn git(&self, repo: &str, args: &[&str]) -> Result<ExecOutput> {
        process::run_checked(&process::locate("git")?, args, &self.repo_dir(repo))
    }

    fn git_status(&self, repo: &str, args: &[&str]) -> Result<ExecOutput> {
        process::run(&process::locate("git")?, args, &self.repo_dir(repo))
    }

    /// Release branches often exist only upstream; retry a bare branch name
    /// as `origin/<name>` before giving up.
    fn with_remote_fallback<T>(
        &self,
        repo: &str,
        revision: &str,
        op: impl Fn(&str) -> Result<T>,
    ) -> Result<T> {
        match op(revision) {
            Ok(v) => Ok(v),
            Err(e) if revision != "HEAD" && !revision.contains('/') => {
                tracing::debug!(repo, revision, "retrying against origin");
                op(&format!("origin/{revision}")).map_err(|_| e)
            }
            Err(e) => Err(e),
        }
    }
}

impl VersionControl for GitCli {
    fn root(&self) -> &Path {
        &self.root
    }

    fn for_root(&self, root: &Path) -> Arc<dyn VersionControl> {
        Arc::new(Self::new(root, self.layout.clone()))
    }

    fn checkout(&self, repo: &str, target: &str) -> Result<()> {
        self.git(repo, &["checkout", target])?;
        Ok(())
    }

    fn pull(&self, repo: &str) -> Result<()> {
        self.git(repo, &["pull"])?;
        Ok(())
    }

    fn has_commit(&self, repo: &str, sha: &str) -> Result<bool> {
        let object = format!("{sha}^{{commit}}");
        Ok(self.git_status(repo, &["cat-file", "-e", &object])?.success())
    }

    fn cherry_pick(&self, repo: &str, sha: &str) -> Result<CherryPickResult> {
        let out = self.git_status(repo, &["cherry-pick", sha])?;
        if out.success() {
            return Ok(CherryPickResult { applied: true });
        }
        tracing::debug!(repo, sha, stderr = %out.stderr.trim(), "cherry-pick failed, aborting");
        self.abort_cherry_pick(repo)?;
        Ok(CherryPickResult { applied: false })
    }

    fn abort_cherry_pick(&self, repo: &str) -> Result<()> {
        self.git(repo, &["cherry-pick", "--abort"])?;
        Ok(())
    }

    fn is_ancestor(&self, repo: &str, ancestor: &str, descendant: &str) -> Result<bool> {
        let args = ["merge-base", "--is-ancestor", ancestor, descendant];
        let out = self.git_status(repo, &args)?;
        match out.code {
            0 => Ok(true),
            1 => Ok(false),
            _ => Err(process::execution_failed(Path::new("git"), &args, out)),
        }
    }

    fn read_file_at_revision(&self, repo: &str, revision: &str, path: &str) -> Result<String> {
        self.with_remote_fallback(repo, revision, |rev| {
            let object = format!("{rev}:{path}");
            Ok(self.git(repo, &["show", &object])?.stdout)
        })
    }

    fn current_revision(&self, repo: &str, reference: &str) -> Result<String> {
        self.with_remote_fallback(repo, reference, |rev| {
            Ok(self.git(repo, &["rev-parse", "--verify", rev])?.stdout.trim().to_string())
        })
    }

    fn list_branches(&self, repo: &str) -> Result<Vec<String>> {
        let out = self.git(repo, &["ls-remote", "--heads", "origin"])?;
        Ok(out
            .stdout
            .lines()
            .filter_map(|line| line.split_whitespace().nth(1))
            .filter_map(|r| r.strip_prefix("refs/heads/"))
            .map(str::to_string)
            .collect())
    }

    fn merge_ff(&self, repo: &str, sha: &str) -> Result<()> {
        self.git(repo, &["merge", "--ff-only", sha])?;
        Ok(())
    }

    fn create_branch(&self, repo: &str, branch: &str) -> Result<()> {
        self.git(repo, &["checkout", "-b", branch])?;
        Ok(())
    }

    fn push(&self, repo: &str, branch: &str) -> Result<()> {
        self.git(repo, &["push", "-u", "origin", branch])?;
        Ok(())
    }

    fn commit_file(&self, repo: &str, path: &str, message: &str) -> Result<()> {
        self.git(repo, &["add", path])?;
        self.git(repo, &["commit", "-m", message])?;
        Ok(())
    }

    fn clone_or_fetch(&self, repo: &str) -> Result<()> {
        if self.repo_dir(repo).join(".git").exists() {
            self.git(repo, &["fetch", "--all"])?;
            return Ok(());
        }
        std::fs::create_dir_all(&self.root)?;
        let url = self.layout.remote_url(repo);
        process::run_checked(&process::locate("git")?, &["clone", &url, repo], &self.root)?;
        Ok(())
    }
}
