use thiserror::Error;

#[derive(Debug, Error)]
pub enum MaintError {
    #[error("patch not found: {0}")]
    PatchNotFound(String),

    #[error("patch already exists: {0} (multiple patches with the same name are not supported)")]
    PatchExists(String),

    #[error("patch '{0}' is marked as needed by at least one branch")]
    PatchInUse(String),

    #[error("sha {sha} not found on patch '{patch}'")]
    ShaNotInPatch { patch: String, sha: String },

    #[error("could not find a release branch for repo={repo} branch={branch}")]
    ReleaseBranchNotFound { repo: String, branch: String },

    #[error("could not find a tracked modified branch for {repo} {branch}")]
    ModifiedBranchNotFound { repo: String, branch: String },

    #[error("patch '{patch}' is not needed on {repo} {branch}")]
    NeededPatchNotFound {
        patch: String,
        repo: String,
        branch: String,
    },

    #[error("modified branch {repo} {branch} references unknown patch '{patch}'")]
    UnknownPatchReference {
        patch: String,
        repo: String,
        branch: String,
    },

    #[error("sha not found in {repo}: {sha}")]
    CommitNotFound { repo: String, sha: String },

    #[error("dependency '{dependency}' is not pinned in the manifest of {repo}")]
    MissingDependency { repo: String, dependency: String },

    #[error("invalid dependency manifest: {0}")]
    InvalidManifest(String),

    #[error("invalid version '{0}'")]
    InvalidVersion(String),

    #[error("'{0}' not found on PATH")]
    ToolNotFound(String),

    #[error("failed to spawn {program}: {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("`{command}` failed with exit code {code}: {}", stderr.trim())]
    ExecutionFailed {
        command: String,
        code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("metadata service error: {0}")]
    Metadata(String),

    #[error("issue tracker error: {0}")]
    IssueTracker(String),

    #[error("failure applying patch {patch_repo} to {repo} {branch}: {source}")]
    PatchApplication {
        patch_repo: String,
        repo: String,
        branch: String,
        #[source]
        source: Box<MaintError>,
    },

    #[error("failure updating dependencies for {repo} to {branch}: {source}")]
    DependencyUpdate {
        repo: String,
        branch: String,
        #[source]
        source: Box<MaintError>,
    },

    #[error("failure with {stage} deploy for {repo} to {branch}: {source}")]
    Deploy {
        stage: &'static str,
        repo: String,
        branch: String,
        #[source]
        source: Box<MaintError>,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MaintError>;
