use crate::output::report;
use anyhow::Context;
use maint_core::engine::MaintenanceEngine;
use maint_core::filter::{ContainsText, ContentFilter, MatchesRegex, Not};
use maint_core::release_branch::ReleaseBranch;

pub fn create(
    engine: &mut MaintenanceEngine,
    repo: &str,
    message: &str,
    name: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    engine.create_patch(repo, message, name)?;
    let name = name.unwrap_or(repo);
    report(
        json,
        &serde_json::json!({ "name": name, "repo": repo, "message": message }),
        || format!("Created patch [{name}] for {repo}"),
    )
}

pub fn remove(engine: &mut MaintenanceEngine, name: &str, json: bool) -> anyhow::Result<()> {
    engine.remove_patch(name)?;
    report(json, &serde_json::json!({ "removed": name }), || {
        format!("Removed patch [{name}]")
    })
}

pub fn add_sha(engine: &mut MaintenanceEngine, name: &str, sha: &str, json: bool) -> anyhow::Result<()> {
    engine.add_patch_sha(name, sha)?;
    report(json, &serde_json::json!({ "name": name, "sha": sha }), || {
        format!("Added sha {sha} to [{name}]")
    })
}

pub fn remove_sha(engine: &mut MaintenanceEngine, name: &str, sha: &str, json: bool) -> anyhow::Result<()> {
    engine.remove_patch_sha(name, sha)?;
    report(json, &serde_json::json!({ "name": name, "removed_sha": sha }), || {
        format!("Removed sha {sha} from [{name}]")
    })
}

pub fn add_needed(
    engine: &mut MaintenanceEngine,
    repo: &str,
    branch: &str,
    name: &str,
    json: bool,
) -> anyhow::Result<()> {
    engine.add_needed_patch(repo, branch, name)?;
    needed_added(repo, branch, name, json)
}

pub fn add_needed_release_branch(
    engine: &mut MaintenanceEngine,
    repo: &str,
    branch: &str,
    name: &str,
    brands: Vec<String>,
    is_released: bool,
    json: bool,
) -> anyhow::Result<()> {
    let release_branch = ReleaseBranch::new(repo, branch, brands, is_released);
    engine.add_needed_patch_release_branch(&release_branch, name)?;
    needed_added(repo, branch, name, json)
}

fn needed_added(repo: &str, branch: &str, name: &str, json: bool) -> anyhow::Result<()> {
    report(
        json,
        &serde_json::json!({ "name": name, "repo": repo, "branch": branch }),
        || format!("[{name}] needed by {repo} {branch}"),
    )
}

pub fn remove_needed(
    engine: &mut MaintenanceEngine,
    repo: &str,
    branch: &str,
    name: &str,
    json: bool,
) -> anyhow::Result<()> {
    engine.remove_needed_patch(repo, branch, name)?;
    report(
        json,
        &serde_json::json!({ "name": name, "repo": repo, "branch": branch, "removed": true }),
        || format!("[{name}] no longer needed by {repo} {branch}"),
    )
}

fn batch(name: &str, verb: &str, count: usize, json: bool) -> anyhow::Result<()> {
    report(json, &serde_json::json!({ "name": name, "action": verb, "count": count }), || {
        format!("[{name}] {verb} on {count} branch(es)")
    })
}

pub fn add_all_needed(engine: &mut MaintenanceEngine, name: &str, json: bool) -> anyhow::Result<()> {
    let count = engine.add_all_needed_patches(name)?;
    batch(name, "added", count, json)
}

pub fn add_needed_before(engine: &mut MaintenanceEngine, name: &str, sha: &str, json: bool) -> anyhow::Result<()> {
    let count = engine
        .add_needed_patches_before(name, sha)
        .with_context(|| format!("failed to select branches missing {sha}"))?;
    batch(name, "added", count, json)
}

pub fn add_needed_after(engine: &mut MaintenanceEngine, name: &str, sha: &str, json: bool) -> anyhow::Result<()> {
    let count = engine
        .add_needed_patches_after(name, sha)
        .with_context(|| format!("failed to select branches containing {sha}"))?;
    batch(name, "added", count, json)
}

type BoxedFilter = Box<dyn FnMut(&str) -> maint_core::Result<bool>>;

fn boxed<F: ContentFilter + 'static>(mut filter: F) -> BoxedFilter {
    Box::new(move |html: &str| filter.accept(html))
}

pub fn add_needed_build_filter(
    engine: &mut MaintenanceEngine,
    name: &str,
    contains: Option<String>,
    regex: Option<String>,
    invert: bool,
    json: bool,
) -> anyhow::Result<()> {
    let filter = match (contains, regex) {
        (Some(text), _) => boxed(ContainsText(text)),
        (None, Some(pattern)) => {
            let re = regex::Regex::new(&pattern).with_context(|| format!("invalid regex '{pattern}'"))?;
            boxed(MatchesRegex(re))
        }
        (None, None) => anyhow::bail!("one of --contains or --regex is required"),
    };
    let filter = if invert { boxed(Not(filter)) } else { filter };
    let count = engine.add_needed_patches_build_filter(name, filter)?;
    batch(name, "added", count, json)
}

pub fn remove_needed_before(engine: &mut MaintenanceEngine, name: &str, sha: &str, json: bool) -> anyhow::Result<()> {
    let count = engine.remove_needed_patches_before(name, sha)?;
    batch(name, "removed", count, json)
}

pub fn remove_needed_after(engine: &mut MaintenanceEngine, name: &str, sha: &str, json: bool) -> anyhow::Result<()> {
    let count = engine.remove_needed_patches_after(name, sha)?;
    batch(name, "removed", count, json)
}
