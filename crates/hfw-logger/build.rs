use std::env;
use std::process::Command;

fn main() {
    // Explicit stamp wins, e.g. for packaged builds without a git checkout
    let version = env::var("HFW_VERSION")
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(git_revision)
        .unwrap_or_else(|| env::var("CARGO_PKG_VERSION").unwrap_or_default());

    println!("cargo:rustc-env=HFW_BUILD_VERSION={}", version);
    println!("cargo:rerun-if-env-changed=HFW_VERSION");
    println!("cargo:rerun-if-changed=../../.git/HEAD");
}

fn git_revision() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output();

    match output {
        Ok(out) if out.status.success() => {
            let revision = String::from_utf8_lossy(&out.stdout).trim().to_string();
            if revision.is_empty() {
                None
            } else {
                Some(revision)
            }
        }
        _ => None,
    }
}
