use crate::output::{print_json, print_table, report};
use maint_core::engine::MaintenanceEngine;
use maint_core::filter::modified_repo_filter;

pub fn apply_patches(engine: &mut MaintenanceEngine, json: bool) -> anyhow::Result<()> {
    let result = engine.apply_patches()?;
    report(json, &result, || {
        let mut text = format!("Applied {} patch(es)", result.applied);
        if !result.success {
            text.push_str("\nSome patches could not be cherry-picked; see the log above and add more shas");
        }
        text
    })
}

pub fn update_dependencies(engine: &mut MaintenanceEngine, repos: Vec<String>, json: bool) -> anyhow::Result<()> {
    let count = engine.update_dependencies(modified_repo_filter(repos))?;
    report(json, &serde_json::json!({ "updated": count }), || {
        format!("Updated dependencies on {count} branch(es)")
    })
}

pub fn deploy_release_candidates(
    engine: &mut MaintenanceEngine,
    repos: Vec<String>,
    json: bool,
) -> anyhow::Result<()> {
    let count = engine.deploy_release_candidates(modified_repo_filter(repos))?;
    deployed(engine, "rc", count, json)
}

pub fn deploy_production(engine: &mut MaintenanceEngine, repos: Vec<String>, json: bool) -> anyhow::Result<()> {
    let count = engine.deploy_production(modified_repo_filter(repos))?;
    deployed(engine, "production", count, json)
}

fn deployed(engine: &MaintenanceEngine, stage: &str, count: usize, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&serde_json::json!({ "stage": stage, "deployed": count }));
    }
    println!("Deployed {count} {stage} version(s)");
    let rows: Vec<Vec<String>> = engine
        .state()
        .modified_branches
        .iter()
        .filter_map(|mb| {
            let version = mb.deployed_version.as_ref()?;
            Some(vec![mb.repo().to_string(), mb.branch().to_string(), version.to_string()])
        })
        .collect();
    if count > 0 && !rows.is_empty() {
        print_table(&["REPO", "BRANCH", "DEPLOYED"], rows);
    }
    Ok(())
}

pub fn redeploy_all_production(engine: &mut MaintenanceEngine, message: &str, json: bool) -> anyhow::Result<()> {
    let versions = engine.redeploy_all_production(message)?;
    if json {
        let entries: Vec<_> = versions
            .iter()
            .map(|(repo, branch, version)| {
                serde_json::json!({ "repo": repo, "branch": branch, "version": version.to_string() })
            })
            .collect();
        return print_json(&entries);
    }
    let rows = versions
        .into_iter()
        .map(|(repo, branch, version)| vec![repo, branch, version.to_string()])
        .collect();
    print_table(&["REPO", "BRANCH", "VERSION"], rows);
    Ok(())
}

pub fn create_unreleased_issues(engine: &mut MaintenanceEngine, notes: &str, json: bool) -> anyhow::Result<()> {
    let count = engine.create_unreleased_issues(notes)?;
    report(json, &serde_json::json!({ "issues": count }), || {
        format!("Created {count} issue(s)")
    })
}
