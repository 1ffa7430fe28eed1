use crate::output::{print_json, print_table, report};
use anyhow::Context;
use maint_core::engine::MaintenanceEngine;
use maint_core::filter::modified_repo_filter;

pub fn reset(engine: &mut MaintenanceEngine, json: bool) -> anyhow::Result<()> {
    engine.reset().context("failed to reset maintenance state")?;
    report(json, &serde_json::json!({ "reset": true }), || {
        "Maintenance state reset".to_string()
    })
}

pub fn list(engine: &MaintenanceEngine, json: bool) -> anyhow::Result<()> {
    let summary = engine.list();
    if json {
        return print_json(&summary);
    }
    if summary.branches.is_empty() && summary.patches.is_empty() {
        println!("No patches or modified branches.");
    } else {
        print!("{summary}");
    }
    Ok(())
}

pub fn list_links(engine: &MaintenanceEngine, repos: Vec<String>, json: bool) -> anyhow::Result<()> {
    let groups = engine.list_links(modified_repo_filter(repos))?;
    if json {
        return print_json(&groups);
    }
    if groups.is_empty() {
        println!("No deployed branches.");
    }
    for group in &groups {
        println!("{} {}", group.repo, group.branch);
        for line in &group.lines {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn refresh_branches(engine: &mut MaintenanceEngine, json: bool) -> anyhow::Result<()> {
    let branches = engine
        .release_branches(true)
        .context("release branch discovery failed")?;
    if json {
        let plain: Vec<_> = branches.iter().map(|rb| rb.as_ref()).collect();
        return print_json(&plain);
    }
    let rows = branches
        .iter()
        .map(|rb| {
            vec![
                rb.repo.clone(),
                rb.branch.clone(),
                rb.brand_list().join(","),
                if rb.is_released { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();
    print_table(&["REPO", "BRANCH", "BRANDS", "RELEASED"], rows);
    Ok(())
}

pub fn capabilities(engine: &mut MaintenanceEngine, repo: &str, branch: &str, json: bool) -> anyhow::Result<()> {
    let caps = engine.capabilities(repo, branch)?;
    if json {
        let map: serde_json::Map<String, serde_json::Value> = caps
            .iter()
            .map(|(c, has)| (c.name().to_string(), serde_json::Value::Bool(*has)))
            .collect();
        return print_json(&map);
    }
    let rows = caps
        .iter()
        .map(|(c, has)| vec![c.name().to_string(), has.to_string()])
        .collect();
    print_table(&["CAPABILITY", "PRESENT"], rows);
    Ok(())
}
