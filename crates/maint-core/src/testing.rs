//! In-memory collaborators for unit tests.
//!
//! `FakeVcs` models refs and ancestry, not file trees: files are registered
//! per (repo, revision) and written into the working copy on checkout when
//! the fake has a real root directory. A successful cherry-pick of `s` onto
//! HEAD `h` creates commit `h+s`.

use crate::build::{BuildOutput, BuildRunner};
use crate::deploy::{DeployRequest, DeployStage, Deployer};
use crate::engine::Collaborators;
use crate::error::{MaintError, Result};
use crate::issues::{IssueOptions, IssueTracker};
use crate::metadata::{MetadataService, PhetioProject, PhetioQuery, PublishedProject};
use crate::types::SimVersion;
use crate::vcs::{CherryPickResult, VersionControl};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

fn injected(command: String) -> MaintError {
    MaintError::ExecutionFailed {
        command,
        code: 1,
        stdout: String::new(),
        stderr: "injected failure".to_string(),
    }
}

/// Run a shell script in `dir`, panicking on failure.
#[cfg(unix)]
pub fn sh(dir: &Path, script: &str) {
    let sh = crate::process::locate("sh").unwrap();
    crate::process::run_checked(&sh, &["-c", script], dir).unwrap();
}

// ---------------------------------------------------------------------------
// FakeVcs
// ---------------------------------------------------------------------------

#[derive(Default)]
struct VcsState {
    /// Upstream refs: repo -> branch -> tip.
    branches: BTreeMap<String, BTreeMap<String, String>>,
    files: HashMap<(String, String), BTreeMap<String, String>>,
    /// repo -> (parent, child) edges.
    edges: HashMap<String, HashSet<(String, String)>>,
    commits: HashSet<(String, String)>,
    conflicts: HashSet<(String, String)>,
    /// Working copy state per (root, repo).
    head: HashMap<(PathBuf, String), String>,
    checked_out: HashMap<(PathBuf, String), String>,
    failures: Vec<String>,
    calls: Vec<(PathBuf, String)>,
    pushes: Vec<(String, String, String)>,
    commit_messages: Vec<(String, String, String)>,
    next_commit: u32,
}

pub struct FakeVcs {
    root: PathBuf,
    materialize: bool,
    inner: Arc<Mutex<VcsState>>,
}

impl Default for FakeVcs {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeVcs {
    /// A fake with no working copies on disk.
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("fake-root"),
            materialize: false,
            inner: Arc::new(Mutex::new(VcsState::default())),
        }
    }

    /// A fake whose checkouts write registered files under `root`.
    pub fn with_root(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            materialize: true,
            inner: Arc::new(Mutex::new(VcsState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, VcsState> {
        self.inner.lock().unwrap()
    }

    pub fn add_branch(&self, repo: &str, branch: &str, sha: &str) {
        let mut st = self.state();
        st.branches
            .entry(repo.to_string())
            .or_default()
            .insert(branch.to_string(), sha.to_string());
        st.commits.insert((repo.to_string(), sha.to_string()));
    }

    pub fn add_commit(&self, repo: &str, sha: &str) {
        self.state().commits.insert((repo.to_string(), sha.to_string()));
    }

    pub fn add_file(&self, repo: &str, revision: &str, path: &str, content: &str) {
        self.state()
            .files
            .entry((repo.to_string(), revision.to_string()))
            .or_default()
            .insert(path.to_string(), content.to_string());
    }

    pub fn add_ancestor(&self, repo: &str, ancestor: &str, descendant: &str) {
        let mut st = self.state();
        st.edges
            .entry(repo.to_string())
            .or_default()
            .insert((ancestor.to_string(), descendant.to_string()));
        st.commits.insert((repo.to_string(), ancestor.to_string()));
        st.commits.insert((repo.to_string(), descendant.to_string()));
    }

    /// Cherry-picking `sha` in `repo` conflicts.
    pub fn add_conflict(&self, repo: &str, sha: &str) {
        let mut st = self.state();
        st.conflicts.insert((repo.to_string(), sha.to_string()));
        st.commits.insert((repo.to_string(), sha.to_string()));
    }

    /// Calls whose log line starts with `prefix` fail.
    pub fn fail_on(&self, prefix: &str) {
        self.state().failures.push(prefix.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn calls_under(&self, root: &Path) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter(|(r, _)| r == root)
            .map(|(_, c)| c.clone())
            .collect()
    }

    pub fn count_calls(&self, op: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|(_, c)| c.split(' ').next() == Some(op))
            .count()
    }

    /// (repo, branch, pushed tip) in push order.
    pub fn pushes(&self) -> Vec<(String, String, String)> {
        self.state().pushes.clone()
    }

    /// (repo, message, committed file content) in commit order.
    pub fn commit_messages(&self) -> Vec<(String, String, String)> {
        self.state().commit_messages.clone()
    }

    pub fn tip(&self, repo: &str, branch: &str) -> Option<String> {
        self.state().branches.get(repo)?.get(branch).cloned()
    }

    pub fn checked_out(&self, repo: &str) -> Option<String> {
        self.state().checked_out.get(&(self.root.clone(), repo.to_string())).cloned()
    }

    fn record(&self, st: &mut VcsState, call: String) -> Result<()> {
        let fail = st.failures.iter().any(|f| call.starts_with(f.as_str()));
        st.calls.push((self.root.clone(), call.clone()));
        if fail {
            return Err(injected(call));
        }
        Ok(())
    }

    fn key(&self, repo: &str) -> (PathBuf, String) {
        (self.root.clone(), repo.to_string())
    }

    fn advance(&self, st: &mut VcsState, repo: &str, new_sha: String) {
        let key = self.key(repo);
        if let Some(old) = st.head.get(&key).cloned() {
            st.edges
                .entry(repo.to_string())
                .or_default()
                .insert((old, new_sha.clone()));
        }
        st.commits.insert((repo.to_string(), new_sha.clone()));
        if let Some(current) = st.checked_out.get(&key).cloned() {
            if let Some(tip) = st.branches.get_mut(repo).and_then(|b| b.get_mut(&current)) {
                *tip = new_sha.clone();
            }
        }
        st.head.insert(key, new_sha);
    }

    fn write_files(&self, st: &VcsState, repo: &str, revisions: &[String]) -> Result<()> {
        if !self.materialize {
            return Ok(());
        }
        let dir = self.root.join(repo);
        std::fs::create_dir_all(&dir)?;
        for rev in revisions {
            if let Some(files) = st.files.get(&(repo.to_string(), rev.clone())) {
                for (path, content) in files {
                    let target = dir.join(path);
                    if let Some(parent) = target.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(target, content)?;
                }
                return Ok(());
            }
        }
        Ok(())
    }
}

fn is_ancestor_in(st: &VcsState, repo: &str, ancestor: &str, descendant: &str) -> bool {
    if ancestor == descendant {
        return true;
    }
    let Some(edges) = st.edges.get(repo) else {
        return false;
    };
    let mut stack = vec![descendant.to_string()];
    let mut seen = HashSet::new();
    while let Some(node) = stack.pop() {
        for (parent, child) in edges {
            if *child == node && seen.insert(parent.clone()) {
                if parent == ancestor {
                    return true;
                }
                stack.push(parent.clone());
            }
        }
    }
    false
}

impl VersionControl for FakeVcs {
    fn root(&self) -> &Path {
        &self.root
    }

    fn for_root(&self, root: &Path) -> Arc<dyn VersionControl> {
        Arc::new(FakeVcs {
            root: root.to_path_buf(),
            materialize: true,
            inner: Arc::clone(&self.inner),
        })
    }

    fn checkout(&self, repo: &str, target: &str) -> Result<()> {
        let mut st = self.state();
        self.record(&mut st, format!("checkout {repo} {target}"))?;
        let sha = st
            .branches
            .get(repo)
            .and_then(|b| b.get(target))
            .cloned()
            .unwrap_or_else(|| target.to_string());
        st.head.insert(self.key(repo), sha.clone());
        st.checked_out.insert(self.key(repo), target.to_string());
        let mut revisions = vec![target.to_string(), sha.clone()];
        if let Some(refs) = st.branches.get(repo) {
            revisions.extend(refs.iter().filter(|(_, tip)| **tip == sha).map(|(name, _)| name.clone()));
        }
        self.write_files(&st, repo, &revisions)
    }

    fn pull(&self, repo: &str) -> Result<()> {
        let mut st = self.state();
        self.record(&mut st, format!("pull {repo}"))?;
        let key = self.key(repo);
        if let Some(current) = st.checked_out.get(&key).cloned() {
            if let Some(tip) = st.branches.get(repo).and_then(|b| b.get(&current)).cloned() {
                st.head.insert(key, tip);
            }
        }
        Ok(())
    }

    fn has_commit(&self, repo: &str, sha: &str) -> Result<bool> {
        let mut st = self.state();
        self.record(&mut st, format!("has_commit {repo} {sha}"))?;
        Ok(st.commits.contains(&(repo.to_string(), sha.to_string())))
    }

    fn cherry_pick(&self, repo: &str, sha: &str) -> Result<CherryPickResult> {
        let mut st = self.state();
        self.record(&mut st, format!("cherry_pick {repo} {sha}"))?;
        if st.conflicts.contains(&(repo.to_string(), sha.to_string())) {
            return Ok(CherryPickResult { applied: false });
        }
        let head = st.head.get(&self.key(repo)).cloned().unwrap_or_default();
        self.advance(&mut st, repo, format!("{head}+{sha}"));
        Ok(CherryPickResult { applied: true })
    }

    fn abort_cherry_pick(&self, repo: &str) -> Result<()> {
        let mut st = self.state();
        self.record(&mut st, format!("abort_cherry_pick {repo}"))
    }

    fn is_ancestor(&self, repo: &str, ancestor: &str, descendant: &str) -> Result<bool> {
        let mut st = self.state();
        self.record(&mut st, format!("is_ancestor {repo} {ancestor} {descendant}"))?;
        Ok(is_ancestor_in(&st, repo, ancestor, descendant))
    }

    fn read_file_at_revision(&self, repo: &str, revision: &str, path: &str) -> Result<String> {
        let mut st = self.state();
        let call = format!("read_file_at_revision {repo} {revision} {path}");
        self.record(&mut st, call.clone())?;
        // Files may be registered under the branch name or its tip.
        let mut revisions = vec![revision.to_string()];
        if let Some(refs) = st.branches.get(repo) {
            revisions.extend(refs.get(revision).cloned());
            revisions.extend(
                refs.iter()
                    .filter(|(_, tip)| tip.as_str() == revision)
                    .map(|(name, _)| name.clone()),
            );
        }
        revisions
            .into_iter()
            .find_map(|rev| st.files.get(&(repo.to_string(), rev))?.get(path).cloned())
            .ok_or_else(|| injected(call))
    }

    fn current_revision(&self, repo: &str, reference: &str) -> Result<String> {
        let mut st = self.state();
        let call = format!("current_revision {repo} {reference}");
        self.record(&mut st, call.clone())?;
        if reference == "HEAD" {
            return st.head.get(&self.key(repo)).cloned().ok_or_else(|| injected(call));
        }
        if let Some(tip) = st.branches.get(repo).and_then(|b| b.get(reference)) {
            return Ok(tip.clone());
        }
        if st.commits.contains(&(repo.to_string(), reference.to_string())) {
            return Ok(reference.to_string());
        }
        Err(injected(call))
    }

    fn list_branches(&self, repo: &str) -> Result<Vec<String>> {
        let mut st = self.state();
        self.record(&mut st, format!("list_branches {repo}"))?;
        Ok(st
            .branches
            .get(repo)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn merge_ff(&self, repo: &str, sha: &str) -> Result<()> {
        let mut st = self.state();
        let call = format!("merge_ff {repo} {sha}");
        self.record(&mut st, call.clone())?;
        let key = self.key(repo);
        if let Some(head) = st.head.get(&key) {
            if !is_ancestor_in(&st, repo, head, sha) {
                return Err(MaintError::ExecutionFailed {
                    command: call,
                    code: 128,
                    stdout: String::new(),
                    stderr: "fatal: Not possible to fast-forward, aborting.".to_string(),
                });
            }
        }
        if let Some(current) = st.checked_out.get(&key).cloned() {
            if let Some(tip) = st.branches.get_mut(repo).and_then(|b| b.get_mut(&current)) {
                *tip = sha.to_string();
            }
        }
        st.head.insert(key, sha.to_string());
        Ok(())
    }

    fn create_branch(&self, repo: &str, branch: &str) -> Result<()> {
        let mut st = self.state();
        self.record(&mut st, format!("create_branch {repo} {branch}"))?;
        let key = self.key(repo);
        let head = st.head.get(&key).cloned().unwrap_or_default();
        st.branches
            .entry(repo.to_string())
            .or_default()
            .insert(branch.to_string(), head);
        st.checked_out.insert(key, branch.to_string());
        Ok(())
    }

    fn push(&self, repo: &str, branch: &str) -> Result<()> {
        let mut st = self.state();
        self.record(&mut st, format!("push {repo} {branch}"))?;
        let tip = st
            .branches
            .get(repo)
            .and_then(|b| b.get(branch))
            .cloned()
            .unwrap_or_default();
        st.pushes.push((repo.to_string(), branch.to_string(), tip));
        Ok(())
    }

    fn commit_file(&self, repo: &str, path: &str, message: &str) -> Result<()> {
        let mut st = self.state();
        self.record(&mut st, format!("commit_file {repo} {path}"))?;
        let content = if self.materialize {
            std::fs::read_to_string(self.root.join(repo).join(path))?
        } else {
            String::new()
        };
        st.commit_messages
            .push((repo.to_string(), message.to_string(), content));
        st.next_commit += 1;
        let sha = format!("{repo}-commit-{}", st.next_commit);
        self.advance(&mut st, repo, sha);
        Ok(())
    }

    fn clone_or_fetch(&self, repo: &str) -> Result<()> {
        let mut st = self.state();
        self.record(&mut st, format!("clone_or_fetch {repo}"))?;
        if self.materialize {
            std::fs::create_dir_all(self.root.join(repo))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeMetadata
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeMetadata {
    published: Vec<PublishedProject>,
    phetio: Vec<PhetioProject>,
    fail: bool,
}

impl FakeMetadata {
    pub fn new(published: Vec<PublishedProject>, phetio: Vec<PhetioProject>) -> Self {
        Self {
            published,
            phetio,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

impl MetadataService for FakeMetadata {
    fn published_simulations(&self) -> Result<Vec<PublishedProject>> {
        if self.fail {
            return Err(MaintError::Metadata("service unavailable".to_string()));
        }
        Ok(self.published.clone())
    }

    fn phetio_simulations(&self, query: &PhetioQuery) -> Result<Vec<PhetioProject>> {
        if self.fail {
            return Err(MaintError::Metadata("service unavailable".to_string()));
        }
        Ok(self
            .phetio
            .iter()
            .filter(|p| (!query.active || p.active) && (!query.latest || p.latest))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// FakeBuildRunner
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeBuildRunner {
    calls: Mutex<Vec<(PathBuf, Vec<String>)>>,
    failing: Mutex<Vec<PathBuf>>,
    outputs: Mutex<Vec<(PathBuf, String, String)>>,
}

impl FakeBuildRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds run in `dir` exit non-zero.
    pub fn fail_in(&self, dir: &Path) {
        self.failing.lock().unwrap().push(dir.to_path_buf());
    }

    /// A build in `dir` writes `content` to `dir/relative`.
    pub fn write_on_build(&self, dir: &Path, relative: &str, content: &str) {
        self.outputs
            .lock()
            .unwrap()
            .push((dir.to_path_buf(), relative.to_string(), content.to_string()));
    }

    pub fn calls(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl BuildRunner for FakeBuildRunner {
    fn build(&self, dir: &Path, args: &[String]) -> Result<BuildOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((dir.to_path_buf(), args.to_vec()));
        if self.failing.lock().unwrap().iter().any(|d| d == dir) {
            return Ok(BuildOutput {
                exit_code: 1,
                stdout: "build failed".to_string(),
            });
        }
        for (out_dir, relative, content) in self.outputs.lock().unwrap().iter() {
            if out_dir == dir {
                let target = dir.join(relative);
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(target, content)?;
            }
        }
        Ok(BuildOutput {
            exit_code: 0,
            stdout: "done".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// FakeDeployer
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeDeployer {
    requests: Mutex<Vec<(DeployStage, DeployRequest)>>,
    failing_repos: Mutex<HashSet<String>>,
}

impl FakeDeployer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, repo: &str) {
        self.failing_repos.lock().unwrap().insert(repo.to_string());
    }

    pub fn requests(&self) -> Vec<(DeployStage, DeployRequest)> {
        self.requests.lock().unwrap().clone()
    }

    fn deploy(&self, stage: DeployStage, request: &DeployRequest) -> Result<SimVersion> {
        let mut requests = self.requests.lock().unwrap();
        requests.push((stage, request.clone()));
        if self.failing_repos.lock().unwrap().contains(&request.repo) {
            return Err(injected(format!("deploy {stage} {}", request.repo)));
        }
        let numbers = request.branch.split('-').next().unwrap_or_default();
        let mut parts = numbers.split('.').map(|n| n.parse::<u32>().unwrap_or(0));
        let (major, minor) = (parts.next().unwrap_or(0), parts.next().unwrap_or(0));
        Ok(match stage {
            DeployStage::ReleaseCandidate => {
                let n = requests
                    .iter()
                    .filter(|(s, r)| *s == stage && r.repo == request.repo && r.branch == request.branch)
                    .count();
                SimVersion::release_candidate(major, minor, 1, n as u32)
            }
            DeployStage::Production => SimVersion::new(major, minor, 1),
        })
    }
}

impl Deployer for FakeDeployer {
    fn release_candidate(&self, request: &DeployRequest) -> Result<SimVersion> {
        self.deploy(DeployStage::ReleaseCandidate, request)
    }

    fn production(&self, request: &DeployRequest) -> Result<SimVersion> {
        self.deploy(DeployStage::Production, request)
    }
}

// ---------------------------------------------------------------------------
// FakeIssueTracker
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeIssueTracker {
    issues: Mutex<Vec<(String, String, IssueOptions)>>,
}

impl FakeIssueTracker {
    pub fn issues(&self) -> Vec<(String, String, IssueOptions)> {
        self.issues.lock().unwrap().clone()
    }
}

impl IssueTracker for FakeIssueTracker {
    fn create_issue(&self, repo: &str, title: &str, options: &IssueOptions) -> Result<()> {
        self.issues
            .lock()
            .unwrap()
            .push((repo.to_string(), title.to_string(), options.clone()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fakes bundle
// ---------------------------------------------------------------------------

/// One fake per collaborator, with handles kept for assertions.
pub struct Fakes {
    pub vcs: Arc<FakeVcs>,
    pub metadata: Arc<FakeMetadata>,
    pub build: Arc<FakeBuildRunner>,
    pub deployer: Arc<FakeDeployer>,
    pub issues: Arc<FakeIssueTracker>,
}

impl Fakes {
    pub fn new(root: &Path) -> Self {
        Self::with_metadata(root, FakeMetadata::default())
    }

    pub fn with_metadata(root: &Path, metadata: FakeMetadata) -> Self {
        Self {
            vcs: Arc::new(FakeVcs::with_root(root)),
            metadata: Arc::new(metadata),
            build: Arc::new(FakeBuildRunner::new()),
            deployer: Arc::new(FakeDeployer::new()),
            issues: Arc::new(FakeIssueTracker::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            vcs: self.vcs.clone(),
            build: self.build.clone(),
            metadata: self.metadata.clone(),
            issues: self.issues.clone(),
            deployer: self.deployer.clone(),
        }
    }
}
