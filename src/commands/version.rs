//! `sso-creds version`: build metadata plus the SSO defaults this binary ships
//! with.

use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::ValueEnum;

use crate::auth::device::CLIENT_NAME;
use crate::color::ColorScheme;
use crate::config::DEFAULT_SSO_REGION;
use crate::format::ExportFormat;
use crate::sso::models::ACCOUNT_ACCESS_SCOPE;

#[derive(Debug)]
struct VersionInfo {
  version: &'static str,
  git_commit: &'static str,
  built_at: String,
  target: &'static str,
  oidc_client_name: &'static str,
  scope: &'static str,
  default_sso_region: &'static str,
  export_formats: Vec<String>,
}

impl VersionInfo {
  fn current() -> Self {
    Self {
      version: env!("CARGO_PKG_VERSION"),
      git_commit: env!("GIT_HASH"),
      built_at: format_timestamp(env!("BUILD_TIMESTAMP")),
      target: env!("TARGET"),
      oidc_client_name: CLIENT_NAME,
      scope: ACCOUNT_ACCESS_SCOPE,
      default_sso_region: DEFAULT_SSO_REGION,
      export_formats: ExportFormat::value_variants()
        .iter()
        .filter_map(|format| format.to_possible_value())
        .map(|value| value.get_name().to_string())
        .collect(),
    }
  }

  fn to_json(&self) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&serde_json::json!({
      "version": self.version,
      "git_commit": self.git_commit,
      "built_at": self.built_at,
      "target": self.target,
      "sso": {
        "oidc_client_name": self.oidc_client_name,
        "scope": self.scope,
        "default_region": self.default_sso_region,
      },
      "export_formats": self.export_formats,
    }))
  }

  fn render_human(&self, colors: &ColorScheme) -> String {
    [
      format!("{} {}", colors.emphasis("sso-creds"), colors.number(self.version)),
      format!("{}: {}", colors.emphasis("Git commit"), colors.code(self.git_commit)),
      format!("{}: {}", colors.emphasis("Built"), colors.dimmed(&self.built_at)),
      format!("{}: {}", colors.emphasis("Target"), self.target),
      format!(
        "{}: {} ({})",
        colors.emphasis("OIDC client"),
        self.oidc_client_name,
        self.scope
      ),
      format!("{}: {}", colors.emphasis("Default SSO region"), self.default_sso_region),
      format!("{}: {}", colors.emphasis("Export formats"), self.export_formats.join(", ")),
    ]
    .join("\n")
  }
}

/// Print version information.
///
/// # Arguments
/// * `json` - Emit a JSON document instead of colored text.
/// * `short` - Print only the semantic version.
pub(crate) fn handle_version_command(json: bool, short: bool, colors: &ColorScheme) -> ExitCode {
  let info = VersionInfo::current();

  if short {
    println!("{}", info.version);
    return ExitCode::SUCCESS;
  }

  if !json {
    println!("{}", info.render_human(colors));
    return ExitCode::SUCCESS;
  }

  match info.to_json() {
    Ok(document) => {
      println!("{document}");
      ExitCode::SUCCESS
    }
    Err(e) => {
      eprintln!("{} failed to serialize version info: {e}", colors.error("Error:"));
      ExitCode::FAILURE
    }
  }
}

/// Unix seconds from the build script as `YYYY-MM-DD HH:MM:SS UTC`, or the raw
/// value when it does not parse.
fn format_timestamp(timestamp: &str) -> String {
  timestamp
    .parse::<i64>()
    .ok()
    .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
    .map(|datetime| datetime.format("%Y-%m-%d %H:%M:%S UTC").to_string())
    .unwrap_or_else(|| timestamp.to_string())
}
