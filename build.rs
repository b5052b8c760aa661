use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-env-changed=TSGEN_GIT_COMMIT");

    let version = env::var("CARGO_PKG_VERSION").unwrap_or_default();
    let commit = match env::var("TSGEN_GIT_COMMIT") {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => {
            println!("cargo:rerun-if-changed=.git/HEAD");
            println!("cargo:rerun-if-changed=.git/index");
            git_commit().map(|mut commit| {
                if git_dirty().unwrap_or(false) {
                    commit.push_str("-dirty");
                }
                commit
            })
        }
    };

    match commit {
        Some(commit) => {
            println!("cargo:rustc-env=TSGEN_GIT_COMMIT={commit}");
            println!("cargo:rustc-env=TSGEN_VERSION={version} ({commit})");
        }
        None => println!("cargo:rustc-env=TSGEN_VERSION={version}"),
    }
}

fn git_commit() -> Option<String> {
    let out = Command::new("git")
        .args(["rev-parse", "--short=12", "HEAD"])
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    let s = String::from_utf8_lossy(&out.stdout).trim().to_string();
    if s.is_empty() { None } else { Some(s) }
}

fn git_dirty() -> Option<bool> {
    let wt = Command::new("git")
        .args(["diff", "--no-ext-diff", "--quiet", "--exit-code"])
        .status()
        .ok()?;
    if !wt.success() {
        return Some(true);
    }
    let idx = Command::new("git")
        .args(["diff", "--cached", "--no-ext-diff", "--quiet", "--exit-code"])
        .status()
        .ok()?;
    Some(!idx.success())
}
