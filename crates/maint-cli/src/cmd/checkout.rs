use crate::output::{print_json, print_table, report};
use maint_core::engine::{BranchFailure, BuildOptions, CheckoutOptions, MaintenanceEngine};
use maint_core::filter::repo_filter;

pub fn options(
    engine: &MaintenanceEngine,
    concurrency: Option<usize>,
    build: bool,
    transpile: bool,
    lint: bool,
    brands: Option<Vec<String>>,
) -> CheckoutOptions {
    CheckoutOptions {
        concurrency: concurrency.unwrap_or(engine.config().build.concurrency),
        build,
        transpile,
        build_options: BuildOptions { lint, brands },
    }
}

pub fn checkout_branch(
    engine: &mut MaintenanceEngine,
    repo: &str,
    branch: &str,
    transpile: bool,
    json: bool,
) -> anyhow::Result<()> {
    engine.checkout_branch(repo, branch, transpile)?;
    report(
        json,
        &serde_json::json!({ "repo": repo, "branch": branch, "transpiled": transpile }),
        || format!("Checked out {repo} {branch}"),
    )
}

pub fn update_checkouts(
    engine: &mut MaintenanceEngine,
    repos: Vec<String>,
    options: &CheckoutOptions,
    json: bool,
) -> anyhow::Result<()> {
    let result = engine.update_checkouts(repo_filter(repos), options)?;
    if json {
        return print_json(&result);
    }
    println!("{} checkout(s) updated", result.succeeded);
    print_failures("checkout", &result.checkout_failures);
    print_failures("build", &result.build_failures);
    Ok(())
}

pub fn check(engine: &mut MaintenanceEngine, built: bool, json: bool) -> anyhow::Result<()> {
    let result = if built {
        engine.check_built_checkouts()?
    } else {
        engine.check_unbuilt_checkouts()?
    };
    if json {
        return print_json(&result);
    }
    if !result.checked.is_empty() {
        let rows = result
            .checked
            .iter()
            .map(|p| vec![p.repo.clone(), p.branch.clone(), p.page.clone()])
            .collect();
        print_table(&["REPO", "BRANCH", "PAGE"], rows);
    }
    println!("{} checked, {} failure(s)", result.checked.len(), result.failures.len());
    print_failures("check", &result.failures);
    Ok(())
}

fn print_failures(kind: &str, failures: &[BranchFailure]) {
    if failures.is_empty() {
        return;
    }
    println!("{} {kind} failure(s):", failures.len());
    for f in failures {
        println!("  {} {}: {}", f.repo, f.branch, f.error);
    }
}
