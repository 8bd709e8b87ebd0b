//! Build script for goup.
//!
//! Embeds the short commit hash shown by `goup --version`.

use std::process::Command;

fn main() {
    let commit = git_output(&["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "unknown".into());
    println!("cargo:rustc-env=GOUP_GIT_COMMIT={commit}");

    if let Some(root) = git_output(&["rev-parse", "--show-toplevel"]) {
        println!("cargo:rerun-if-changed={root}/.git/HEAD");
    }
    println!("cargo:rerun-if-changed=build.rs");
}

/// Runs git and returns its trimmed stdout, or `None` if git is unavailable
/// or the command fails.
fn git_output(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}
