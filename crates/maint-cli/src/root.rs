use std::path::{Path, PathBuf};

/// Resolve the maintenance root directory.
///
/// Priority:
/// 1. `--root` flag / `MAINT_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.maintenance.json` or `.maintenance/`
/// 3. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_root_from(&cwd).unwrap_or(cwd)
}

fn find_root_from(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| {
            dir.join(maint_core::paths::STATE_FILE).is_file()
                || dir.join(maint_core::paths::CONFIG_DIR).is_dir()
        })
        .map(Path::to_path_buf)
}
