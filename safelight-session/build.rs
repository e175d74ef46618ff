//! Build script for safelight-session
//!
//! Captures build identification at compile time so the CLI and the
//! reference module can report which build they are:
//! - Git commit hash (short form)
//! - Build profile (debug/release)

use std::process::Command;

fn main() {
    let git_hash = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                String::from_utf8(output.stdout).ok()
            } else {
                None
            }
        })
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=SAFELIGHT_GIT_HASH={}", git_hash);
    println!("cargo:rustc-env=SAFELIGHT_BUILD_PROFILE={}", profile);
    // No rerun-if-changed directives: the hash must follow new commits.
}
