//! Release-branch checkouts.
//!
//! Each release branch gets its own directory holding the simulation and
//! every repo its manifest pins, so many branches can be built side by side.
//! Updating them fans out over a bounded worker pool; one branch failing
//! never stops the others.

use super::MaintenanceEngine;
use crate::build::BuildRunner;
use crate::capability::Capability;
use crate::error::{MaintError, Result};
use crate::filter::ReleaseBranchFilter;
use crate::manifest::DependencyManifest;
use crate::release_branch::ReleaseBranch;
use crate::types::BRAND_PHET;
use crate::vcs::VersionControl;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const TRANSPILE_REPO: &str = "chipper";

// ---------------------------------------------------------------------------
// Options and reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    pub lint: bool,
    /// Brands to build; the branch's own brands when `None`.
    pub brands: Option<Vec<String>>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            lint: true,
            brands: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutOptions {
    pub concurrency: usize,
    pub build: bool,
    pub transpile: bool,
    pub build_options: BuildOptions,
}

impl Default for CheckoutOptions {
    fn default() -> Self {
        Self {
            concurrency: 5,
            build: true,
            transpile: true,
            build_options: BuildOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchFailure {
    pub repo: String,
    pub branch: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckoutReport {
    pub succeeded: usize,
    pub checkout_failures: Vec<BranchFailure>,
    pub build_failures: Vec<BranchFailure>,
}

/// A page to load for one checked branch, relative to the checkout directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckedPage {
    pub repo: String,
    pub branch: String,
    pub page: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub checked: Vec<CheckedPage>,
    pub failures: Vec<BranchFailure>,
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

enum Outcome {
    Updated,
    CheckoutFailed(String),
    BuildFailed(String),
}

/// Everything one worker needs, detached from the engine.
struct CheckoutJob {
    release_branch: Arc<ReleaseBranch>,
    dir: PathBuf,
    vcs: Arc<dyn VersionControl>,
    build: Arc<dyn BuildRunner>,
    dependencies_file: String,
    transpile_args: Option<Vec<String>>,
    build_args: Option<Vec<String>>,
}

impl CheckoutJob {
    fn run(self) -> Outcome {
        if let Err(e) = self.update_checkout() {
            return Outcome::CheckoutFailed(e.to_string());
        }
        if let Some(args) = &self.transpile_args {
            match self.build.build(&self.dir.join(TRANSPILE_REPO), args) {
                Ok(out) if out.success() => {}
                Ok(out) => return Outcome::BuildFailed(format!("transpile exited with code {}", out.exit_code)),
                Err(e) => return Outcome::BuildFailed(e.to_string()),
            }
        }
        if let Some(args) = &self.build_args {
            match self.build.build(&self.dir.join(&self.release_branch.repo), args) {
                Ok(out) if out.success() => {}
                Ok(out) => return Outcome::BuildFailed(format!("build exited with code {}", out.exit_code)),
                Err(e) => return Outcome::BuildFailed(e.to_string()),
            }
        }
        Outcome::Updated
    }

    fn update_checkout(&self) -> Result<()> {
        let rb = &self.release_branch;
        std::fs::create_dir_all(&self.dir)?;
        let vcs = self.vcs.for_root(&self.dir);

        vcs.clone_or_fetch(&rb.repo)?;
        vcs.checkout(&rb.repo, &rb.branch)?;
        vcs.pull(&rb.repo)?;

        let path = self.dir.join(&rb.repo).join(&self.dependencies_file);
        let manifest = DependencyManifest::parse(&std::fs::read_to_string(path)?)?;
        for dep in manifest.repos().into_iter().filter(|d| *d != rb.repo) {
            let Some(sha) = manifest.sha(dep) else {
                continue;
            };
            vcs.clone_or_fetch(dep)?;
            vcs.checkout(dep, sha)?;
        }
        tracing::debug!(branch = %rb, dir = %self.dir.display(), "checkout updated");
        Ok(())
    }
}

async fn run_checkouts(jobs: Vec<CheckoutJob>, concurrency: usize) -> Vec<(Arc<ReleaseBranch>, Outcome)> {
    let semaphore = Arc::new(tokio::sync::Semaphore::new(concurrency.max(1)));
    let mut handles = Vec::new();

    for job in jobs {
        let sem = semaphore.clone();
        let rb = job.release_branch.clone();
        let handle = tokio::spawn(async move {
            let _permit = match sem.acquire().await {
                Ok(p) => p,
                Err(_) => return Outcome::CheckoutFailed("semaphore closed".to_string()),
            };
            tokio::task::spawn_blocking(move || job.run())
                .await
                .unwrap_or_else(|e| Outcome::CheckoutFailed(format!("task join error: {e}")))
        });
        handles.push((rb, handle));
    }

    let mut results = Vec::new();
    for (rb, handle) in handles {
        let outcome = handle
            .await
            .unwrap_or_else(|e| Outcome::CheckoutFailed(format!("task join error: {e}")));
        results.push((rb, outcome));
    }
    results
}

fn failure(rb: &ReleaseBranch, error: String) -> BranchFailure {
    BranchFailure {
        repo: rb.repo.clone(),
        branch: rb.branch.clone(),
        error,
    }
}

// ---------------------------------------------------------------------------
// Engine operations
// ---------------------------------------------------------------------------

impl MaintenanceEngine {
    /// Bring the checkout directory of every accepted release branch up to
    /// date, optionally transpiling and building it.
    pub fn update_checkouts<F: ReleaseBranchFilter>(
        &mut self,
        mut filter: F,
        options: &CheckoutOptions,
    ) -> Result<CheckoutReport> {
        let mut selected = Vec::new();
        for rb in self.release_branches(false)? {
            if filter.accept(&rb)? {
                selected.push(rb);
            }
        }
        tracing::info!(
            branches = selected.len(),
            concurrency = options.concurrency,
            "updating release-branch checkouts"
        );

        let jobs: Vec<CheckoutJob> = selected
            .into_iter()
            .map(|rb| self.checkout_job(rb, options))
            .collect();
        let runtime = tokio::runtime::Runtime::new()?;
        let results = runtime.block_on(run_checkouts(jobs, options.concurrency));

        let mut report = CheckoutReport::default();
        for (rb, outcome) in results {
            match outcome {
                Outcome::Updated => report.succeeded += 1,
                Outcome::CheckoutFailed(error) => {
                    tracing::warn!(branch = %rb, error = %error, "checkout failed");
                    report.checkout_failures.push(failure(&rb, error));
                }
                Outcome::BuildFailed(error) => {
                    tracing::warn!(branch = %rb, error = %error, "build failed");
                    report.build_failures.push(failure(&rb, error));
                }
            }
        }
        tracing::info!(
            succeeded = report.succeeded,
            checkout_failures = report.checkout_failures.len(),
            build_failures = report.build_failures.len(),
            "checkouts updated"
        );
        Ok(report)
    }

    fn checkout_job(&self, rb: Arc<ReleaseBranch>, options: &CheckoutOptions) -> CheckoutJob {
        let build_args = options.build.then(|| {
            let brands = options
                .build_options
                .brands
                .clone()
                .unwrap_or_else(|| rb.brand_list());
            let mut args = self.config.build.args.clone();
            args.push(format!("--brands={}", brands.join(",")));
            if !options.build_options.lint {
                args.push("--lint=false".to_string());
            }
            args
        });
        CheckoutJob {
            dir: rb.checkout_dir(&self.root, self.layout()),
            release_branch: rb,
            vcs: self.services.vcs.clone(),
            build: self.services.build.clone(),
            dependencies_file: self.layout().dependencies_file.clone(),
            transpile_args: options.transpile.then(|| self.config.build.transpile_args.clone()),
            build_args,
        }
    }

    /// Check that each existing checkout has its unbuilt entry point.
    pub fn check_unbuilt_checkouts(&mut self) -> Result<CheckReport> {
        self.check_checkouts(false)
    }

    /// Check that each existing checkout has its built phet HTML.
    pub fn check_built_checkouts(&mut self) -> Result<CheckReport> {
        self.check_checkouts(true)
    }

    fn check_checkouts(&mut self, built: bool) -> Result<CheckReport> {
        let mut report = CheckReport::default();
        for rb in self.release_branches(false)? {
            let dir = rb.checkout_dir(&self.root, self.layout());
            if !dir.is_dir() {
                continue;
            }
            let repo_dir = dir.join(&rb.repo);
            let page = if built {
                self.built_html_path(&repo_dir, &rb)?
            } else {
                repo_dir.join(format!("{}_en.html", rb.repo))
            };

            match std::fs::metadata(&page) {
                Ok(meta) if meta.len() > 0 => {
                    let query = self.fuzz_query(&rb, built)?;
                    let relative = page.strip_prefix(&dir).unwrap_or(&page);
                    report.checked.push(CheckedPage {
                        repo: rb.repo.clone(),
                        branch: rb.branch.clone(),
                        page: format!("{}?{query}", relative.display()),
                    });
                }
                Ok(_) => report.failures.push(failure(&rb, format!("{} is empty", page.display()))),
                Err(_) => report.failures.push(failure(&rb, format!("{} is missing", page.display()))),
            }
        }
        tracing::info!(
            checked = report.checked.len(),
            failures = report.failures.len(),
            built,
            "checkouts checked"
        );
        Ok(report)
    }

    fn fuzz_query(&self, rb: &ReleaseBranch, built: bool) -> Result<String> {
        let fuzz = if self.has_capability(rb, Capability::InitializeGlobalsQueryParameters)? {
            "fuzz"
        } else {
            "fuzzMouse"
        };
        Ok(if built {
            fuzz.to_string()
        } else {
            format!("brand={BRAND_PHET}&ea&{fuzz}")
        })
    }

    /// Check out a release branch in the main working copies, with the
    /// modified branch's unpushed dependency commits layered on top.
    pub fn checkout_branch(&mut self, repo: &str, branch: &str, transpile: bool) -> Result<()> {
        let rb = self.find_release_branch(repo, branch)?;
        let overrides = self
            .state
            .modified_branch(repo, branch)
            .map(|mb| mb.changed_dependencies.clone());
        self.checkout_release_branch(&rb, overrides.as_ref(), transpile)?;
        tracing::info!(branch = %rb, "checked out");
        Ok(())
    }

    pub(super) fn checkout_release_branch(
        &self,
        rb: &ReleaseBranch,
        overrides: Option<&BTreeMap<String, String>>,
        transpile: bool,
    ) -> Result<()> {
        let vcs = &self.services.vcs;
        let pinned = |repo: &str| overrides.and_then(|o| o.get(repo));

        vcs.checkout(&rb.repo, &rb.branch)?;
        let path = self.repo_dir(&rb.repo).join(&self.layout().dependencies_file);
        let manifest = DependencyManifest::parse(&std::fs::read_to_string(path)?)?;
        if let Some(sha) = pinned(&rb.repo) {
            vcs.checkout(&rb.repo, sha)?;
        }
        for dep in manifest.repos().into_iter().filter(|d| *d != rb.repo) {
            let sha = match pinned(dep) {
                Some(sha) => sha.as_str(),
                None => match manifest.sha(dep) {
                    Some(sha) => sha,
                    None => continue,
                },
            };
            vcs.checkout(dep, sha)?;
        }

        if transpile {
            transpile_in(self.services.build.as_ref(), &self.repo_dir(TRANSPILE_REPO), &self.config.build.transpile_args)?;
        }
        Ok(())
    }
}

fn transpile_in(build: &dyn BuildRunner, dir: &Path, args: &[String]) -> Result<()> {
    let out = build.build(dir, args)?;
    if !out.success() {
        return Err(MaintError::ExecutionFailed {
            command: format!("transpile in {}", dir.display()),
            code: out.exit_code,
            stdout: out.stdout,
            stderr: String::new(),
        });
    }
    Ok(())
}
