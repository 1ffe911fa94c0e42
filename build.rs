//! Embeds the git revision and cargo profile for `--version` and `/health`.
//!
//! `SLOWRELAY_GIT_SHORT_OVERRIDE` wins over git, for builds from a tarball
//! or a container context without `.git`.

use std::process::Command;

fn git_short_sha() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let sha = String::from_utf8(output.stdout).ok()?.trim().to_string();
    (!sha.is_empty()).then_some(sha)
}

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs");
    println!("cargo:rerun-if-env-changed=SLOWRELAY_GIT_SHORT_OVERRIDE");

    let git = std::env::var("SLOWRELAY_GIT_SHORT_OVERRIDE")
        .ok()
        .filter(|s| !s.is_empty())
        .or_else(git_short_sha)
        .unwrap_or_else(|| "unknown".into());
    println!("cargo:rustc-env=SLOWRELAY_GIT_SHORT={git}");

    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".into());
    println!("cargo:rustc-env=SLOWRELAY_BUILD_PROFILE={profile}");
}
