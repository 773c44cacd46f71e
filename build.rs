//! Embeds the git commit, build time and target triple for `sso-creds version`.

use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn main() {
  let git_hash = Command::new("git")
    .args(["rev-parse", "--short", "HEAD"])
    .output()
    .ok()
    .filter(|output| output.status.success())
    .and_then(|output| String::from_utf8(output.stdout).ok())
    .map(|hash| hash.trim().to_string())
    .filter(|hash| !hash.is_empty())
    .unwrap_or_else(|| "unknown".to_string());

  let built_at = SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|elapsed| elapsed.as_secs())
    .unwrap_or_default();

  println!("cargo:rustc-env=GIT_HASH={git_hash}");
  println!("cargo:rustc-env=BUILD_TIMESTAMP={built_at}");
  println!("cargo:rustc-env=TARGET={}", std::env::var("TARGET").unwrap_or_default());

  println!("cargo:rerun-if-changed=build.rs");
  println!("cargo:rerun-if-changed=.git/HEAD");
}
