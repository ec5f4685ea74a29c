use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

fn main() {
    // Askama templates and sqlx migrations are embedded at compile time.
    rerun_if_changed_dir("templates", "html");
    let migrations = rerun_if_changed_dir("migrations", "sql");
    println!("cargo:rerun-if-changed=migrations");

    // Version prefix of the newest migration, e.g. "20260201000000".
    let schema_version = migrations
        .iter()
        .filter_map(|p| p.file_name()?.to_str()?.split('_').next().map(str::to_string))
        .max()
        .unwrap_or_else(|| "none".to_string());
    println!("cargo:rustc-env=USM_SCHEMA_VERSION={}", schema_version);

    let build_id = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "dev".to_string());
    println!("cargo:rustc-env=USM_BUILD_ID={}", build_id);
}

/// Emits a rerun hint for every `ext` file under `dir` and returns their paths.
fn rerun_if_changed_dir(dir: impl AsRef<Path>, ext: &str) -> Vec<PathBuf> {
    let dir = dir.as_ref();
    let mut found = Vec::new();
    if !dir.exists() {
        return found;
    }
    let mut stack: Vec<PathBuf> = vec![dir.to_path_buf()];
    while let Some(path) = stack.pop() {
        let Ok(entries) = fs::read_dir(&path) else {
            continue;
        };
        for entry in entries.flatten() {
            let p = entry.path();
            if p.is_dir() {
                stack.push(p);
                continue;
            }
            if p.extension().and_then(|s| s.to_str()) == Some(ext) {
                println!("cargo:rerun-if-changed={}", p.display());
                found.push(p);
            }
        }
    }
    found
}
