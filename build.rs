use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

fn main() {
    // Askama reads templates and sqlx::migrate! reads migrations at compile time.
    rerun_if_changed_dir("templates", "html");
    rerun_if_changed_dir("migrations", "sql");

    // Shown in /health and the startup log to tell binaries apart.
    let build_id = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "dev".to_string());
    println!("cargo:rustc-env=CAMPDESK_BUILD_ID={}", build_id);
}

fn rerun_if_changed_dir(dir: impl AsRef<Path>, extension: &str) {
    let dir = dir.as_ref();
    if !dir.exists() {
        return;
    }
    println!("cargo:rerun-if-changed={}", dir.display());
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
            if p.extension().and_then(|s| s.to_str()) == Some(extension) {
                println!("cargo:rerun-if-changed={}", p.display());
            }
        }
    }
}
