// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-env-changed=CAS_SHARPEN_VERSION");

    // Packagers may pin the reported version
    let version = std::env::var("CAS_SHARPEN_VERSION")
        .ok()
        .or_else(git_version)
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// Package version with the short commit hash appended, when built from git
fn git_version() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Some(format!("{}-{}", env!("CARGO_PKG_VERSION"), hash))
}
