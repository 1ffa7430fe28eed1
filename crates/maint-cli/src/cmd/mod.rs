pub mod checkout;
pub mod patch;
pub mod release;
pub mod state;

use anyhow::Context;
use clap::Subcommand;
use maint_core::config::{Config, WarnLevel};
use maint_core::engine::{Collaborators, MaintenanceEngine};
use std::path::Path;

#[derive(Subcommand)]
pub enum Commands {
    /// Discard all patches, modified branches and cached release branches
    Reset,

    /// Show modified branches and patches
    List,

    /// Show test links for deployed modified branches
    ListLinks {
        /// Only these repos (repeatable)
        #[arg(long = "repo")]
        repos: Vec<String>,
    },

    /// Create a patch for fixes in a repo
    CreatePatch {
        repo: String,
        message: String,
        /// Patch name (defaults to the repo)
        #[arg(long)]
        name: Option<String>,
    },

    /// Remove a patch no branch needs any more
    RemovePatch { name: String },

    /// Add a candidate sha to a patch
    AddPatchSha { name: String, sha: String },

    /// Remove a candidate sha from a patch
    RemovePatchSha { name: String, sha: String },

    /// Mark a patch as needed by one release branch
    AddNeededPatch {
        repo: String,
        branch: String,
        name: String,
    },

    /// Mark a patch as needed by a release branch given in full
    AddNeededPatchReleaseBranch {
        repo: String,
        branch: String,
        name: String,
        /// Brands of the release branch, comma separated
        #[arg(long, value_delimiter = ',', default_value = "phet")]
        brands: Vec<String>,
        /// The release branch has not been published
        #[arg(long)]
        unreleased: bool,
    },

    /// Mark a patch as needed by every release branch
    AddAllNeededPatches { name: String },

    /// Mark a patch as needed where the patch repo does not contain a sha yet
    AddNeededPatchesBefore { name: String, sha: String },

    /// Mark a patch as needed where the patch repo already contains a sha
    AddNeededPatchesAfter { name: String, sha: String },

    /// Build every release branch and mark the patch as needed where the
    /// built HTML matches
    AddNeededPatchesBuildFilter {
        name: String,
        /// Literal text the built HTML must contain
        #[arg(long, conflicts_with = "regex", required_unless_present = "regex")]
        contains: Option<String>,
        /// Regular expression the built HTML must match
        #[arg(long)]
        regex: Option<String>,
        /// Select branches that do not match instead
        #[arg(long)]
        invert: bool,
    },

    /// Remove a patch from one modified branch
    RemoveNeededPatch {
        repo: String,
        branch: String,
        name: String,
    },

    /// Remove a patch where the patch repo does not contain a sha
    RemoveNeededPatchesBefore { name: String, sha: String },

    /// Remove a patch where the patch repo already contains a sha
    RemoveNeededPatchesAfter { name: String, sha: String },

    /// Check out a release branch and its dependencies in the working copies
    CheckoutBranch {
        repo: String,
        branch: String,
        /// Transpile after checking out
        #[arg(long)]
        transpile: bool,
    },

    /// Cherry-pick needed patches into their release branches
    ApplyPatches,

    /// Push dependency branches and commit updated dependency manifests
    UpdateDependencies {
        #[arg(long = "repo")]
        repos: Vec<String>,
    },

    /// Deploy release candidates of branches with pushed fixes
    DeployReleaseCandidates {
        #[arg(long = "repo")]
        repos: Vec<String>,
    },

    /// Deploy branches whose release candidate is out to production
    DeployProduction {
        #[arg(long = "repo")]
        repos: Vec<String>,
    },

    /// Update (and build) the per-branch checkout directories
    UpdateCheckouts {
        #[arg(long = "repo")]
        repos: Vec<String>,
        /// Maximum branches processed at once (defaults to build.concurrency)
        #[arg(long)]
        concurrency: Option<usize>,
        /// Skip the build step
        #[arg(long)]
        no_build: bool,
        /// Skip transpiling
        #[arg(long)]
        no_transpile: bool,
        /// Disable linting during the build
        #[arg(long)]
        no_lint: bool,
        /// Brands to build, comma separated (defaults to the branch's brands)
        #[arg(long, value_delimiter = ',')]
        brands: Option<Vec<String>>,
    },

    /// Verify each checkout has its unbuilt entry point
    CheckUnbuiltCheckouts,

    /// Verify each checkout has its built HTML
    CheckBuiltCheckouts,

    /// Redeploy every released branch to production
    RedeployAllProduction { message: String },

    /// Open issues for unreleased branches that received fixes
    CreateUnreleasedIssues {
        /// Extra text appended to each issue body
        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Rediscover release branches
    RefreshBranches,

    /// Show detected capabilities of a release branch
    Capabilities { repo: String, branch: String },

    /// Interactive session (reads commands from stdin)
    Repl,
}

/// Load config and state under `root` with the real collaborators.
pub fn open_engine(root: &Path) -> anyhow::Result<MaintenanceEngine> {
    let config = Config::load(root).context("failed to load config")?;
    for warning in config.validate() {
        match warning.level {
            WarnLevel::Error => tracing::error!("config: {}", warning.message),
            WarnLevel::Warning => tracing::warn!("config: {}", warning.message),
        }
    }
    let services = Collaborators::from_config(root, &config);
    MaintenanceEngine::load(root, config, services).context("failed to load maintenance state")
}

pub fn run(engine: &mut MaintenanceEngine, command: Commands, json: bool) -> anyhow::Result<()> {
    match command {
        Commands::Reset => state::reset(engine, json),
        Commands::List => state::list(engine, json),
        Commands::ListLinks { repos } => state::list_links(engine, repos, json),
        Commands::RefreshBranches => state::refresh_branches(engine, json),
        Commands::Capabilities { repo, branch } => state::capabilities(engine, &repo, &branch, json),

        Commands::CreatePatch { repo, message, name } => {
            patch::create(engine, &repo, &message, name.as_deref(), json)
        }
        Commands::RemovePatch { name } => patch::remove(engine, &name, json),
        Commands::AddPatchSha { name, sha } => patch::add_sha(engine, &name, &sha, json),
        Commands::RemovePatchSha { name, sha } => patch::remove_sha(engine, &name, &sha, json),
        Commands::AddNeededPatch { repo, branch, name } => {
            patch::add_needed(engine, &repo, &branch, &name, json)
        }
        Commands::AddNeededPatchReleaseBranch {
            repo,
            branch,
            name,
            brands,
            unreleased,
        } => patch::add_needed_release_branch(engine, &repo, &branch, &name, brands, !unreleased, json),
        Commands::AddAllNeededPatches { name } => patch::add_all_needed(engine, &name, json),
        Commands::AddNeededPatchesBefore { name, sha } => {
            patch::add_needed_before(engine, &name, &sha, json)
        }
        Commands::AddNeededPatchesAfter { name, sha } => {
            patch::add_needed_after(engine, &name, &sha, json)
        }
        Commands::AddNeededPatchesBuildFilter {
            name,
            contains,
            regex,
            invert,
        } => patch::add_needed_build_filter(engine, &name, contains, regex, invert, json),
        Commands::RemoveNeededPatch { repo, branch, name } => {
            patch::remove_needed(engine, &repo, &branch, &name, json)
        }
        Commands::RemoveNeededPatchesBefore { name, sha } => {
            patch::remove_needed_before(engine, &name, &sha, json)
        }
        Commands::RemoveNeededPatchesAfter { name, sha } => {
            patch::remove_needed_after(engine, &name, &sha, json)
        }

        Commands::ApplyPatches => release::apply_patches(engine, json),
        Commands::UpdateDependencies { repos } => release::update_dependencies(engine, repos, json),
        Commands::DeployReleaseCandidates { repos } => {
            release::deploy_release_candidates(engine, repos, json)
        }
        Commands::DeployProduction { repos } => release::deploy_production(engine, repos, json),
        Commands::RedeployAllProduction { message } => {
            release::redeploy_all_production(engine, &message, json)
        }
        Commands::CreateUnreleasedIssues { notes } => {
            release::create_unreleased_issues(engine, &notes, json)
        }

        Commands::CheckoutBranch {
            repo,
            branch,
            transpile,
        } => checkout::checkout_branch(engine, &repo, &branch, transpile, json),
        Commands::UpdateCheckouts {
            repos,
            concurrency,
            no_build,
            no_transpile,
            no_lint,
            brands,
        } => {
            let options = checkout::options(engine, concurrency, !no_build, !no_transpile, !no_lint, brands);
            checkout::update_checkouts(engine, repos, &options, json)
        }
        Commands::CheckUnbuiltCheckouts => checkout::check(engine, false, json),
        Commands::CheckBuiltCheckouts => checkout::check(engine, true, json),

        Commands::Repl => anyhow::bail!("already in an interactive session"),
    }
}
