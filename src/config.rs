//! SSO settings loading.
//!
//! The [`SsoConfig`] is read once per invocation from environment variables,
//! optionally pre-seeded from a `.env` file. Real environment variables always
//! win over values from the file.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use tracing::debug;
use url::Url;

/// Environment variable holding the SSO portal start URL.
pub const START_URL_VAR: &str = "AWS_SSO_START_URL";

/// Environment variable holding the region of the Identity Center instance.
pub const SSO_REGION_VAR: &str = "AWS_SSO_REGION";

/// Environment variable holding the region exported alongside credentials.
pub const DEFAULT_REGION_VAR: &str = "AWS_DEFAULT_REGION";

/// Region used when `AWS_SSO_REGION` is not set.
pub const DEFAULT_SSO_REGION: &str = "eu-west-2";

/// Immutable SSO settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsoConfig {
  pub start_url: String,
  pub sso_region: String,
  pub default_region: String,
}

impl SsoConfig {
  /// Build and validate a configuration.
  ///
  /// # Errors
  /// Returns an error when the start URL is not an `http(s)` URL or either
  /// region does not look like an AWS region name.
  pub fn new(
    start_url: impl Into<String>,
    sso_region: impl Into<String>,
    default_region: impl Into<String>,
  ) -> Result<Self> {
    let config = Self {
      start_url: start_url.into().trim().to_string(),
      sso_region: sso_region.into().trim().to_string(),
      default_region: default_region.into().trim().to_string(),
    };
    config.validate()?;
    Ok(config)
  }

  /// Build a configuration from a map of variables.
  pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
    let start_url = vars
      .get(START_URL_VAR)
      .filter(|value| !value.trim().is_empty())
      .ok_or_else(|| anyhow!("{START_URL_VAR} is not set. Set it in the environment or a .env file"))?;

    let sso_region = vars
      .get(SSO_REGION_VAR)
      .filter(|value| !value.trim().is_empty())
      .cloned()
      .unwrap_or_else(|| DEFAULT_SSO_REGION.to_string());

    let default_region = vars
      .get(DEFAULT_REGION_VAR)
      .filter(|value| !value.trim().is_empty())
      .cloned()
      .unwrap_or_else(|| sso_region.clone());

    Self::new(start_url.clone(), sso_region, default_region)
  }

  fn validate(&self) -> Result<()> {
    let parsed = Url::parse(&self.start_url).with_context(|| format!("Invalid SSO start URL: {}", self.start_url))?;
    if !matches!(parsed.scheme(), "http" | "https") {
      bail!("Invalid SSO start URL: {}. Must start with https:// or http://", self.start_url);
    }

    if !is_valid_region(&self.sso_region) {
      bail!("Invalid SSO region: {}", self.sso_region);
    }

    if !is_valid_region(&self.default_region) {
      bail!("Invalid default region: {}", self.default_region);
    }

    Ok(())
  }
}

/// Load the SSO settings from the process environment.
///
/// When `env_file` is given it must exist; otherwise `./.env` is read if
/// present. Variables from the file only fill gaps left by the environment.
///
/// # Errors
/// Returns an error when the `.env` file cannot be parsed or the resulting
/// settings are missing or invalid.
pub fn load_sso_config(env_file: Option<&Path>) -> Result<SsoConfig> {
  load_sso_config_from(env_file, |key| env::var(key).ok())
}

/// [`load_sso_config`] with the environment supplied by `lookup`.
pub fn load_sso_config_from(env_file: Option<&Path>, lookup: impl Fn(&str) -> Option<String>) -> Result<SsoConfig> {
  let mut vars: HashMap<String, String> = HashMap::new();

  let file = match env_file {
    Some(path) => Some(path.to_path_buf()),
    None => Some(PathBuf::from(".env")).filter(|path| path.exists()),
  };

  if let Some(path) = file {
    debug!(path = %path.display(), "Reading SSO settings from .env file");
    let entries = dotenvy::from_path_iter(&path).with_context(|| format!("Failed to open {}", path.display()))?;
    for entry in entries {
      let (key, value) = entry.with_context(|| format!("Failed to parse {}", path.display()))?;
      vars.insert(key, value);
    }
  }

  for key in [START_URL_VAR, SSO_REGION_VAR, DEFAULT_REGION_VAR] {
    if let Some(value) = lookup(key) {
      vars.insert(key.to_string(), value);
    }
  }

  SsoConfig::from_vars(&vars)
}

/// Location of the AWS CLI config file, honouring `AWS_CONFIG_FILE`.
pub fn aws_config_path() -> Option<PathBuf> {
  if let Ok(path) = env::var("AWS_CONFIG_FILE") {
    return Some(PathBuf::from(path));
  }

  dirs::home_dir().map(|home| home.join(".aws").join("config"))
}

/// Directory where the AWS CLI caches SSO access tokens.
pub fn aws_sso_cache_dir() -> Option<PathBuf> {
  dirs::home_dir().map(|home| home.join(".aws").join("sso").join("cache"))
}

/// AWS regions follow the `xx-xxxx-N` naming convention.
fn is_valid_region(region: &str) -> bool {
  let parts: Vec<&str> = region.split('-').collect();
  parts.len() >= 3
    && parts.iter().all(|part| !part.trim().is_empty())
    && parts.last().is_some_and(|last| last.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn vars(entries: &[(&str, &str)]) -> HashMap<String, String> {
    entries.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
  }

  #[test]
  fn test_from_vars_applies_defaults() {
    let config = SsoConfig::from_vars(&vars(&[(START_URL_VAR, "https://example.awsapps.com/start")])).unwrap();

    assert_eq!(config.start_url, "https://example.awsapps.com/start");
    assert_eq!(config.sso_region, DEFAULT_SSO_REGION);
    assert_eq!(config.default_region, DEFAULT_SSO_REGION);
  }

  #[test]
  fn test_from_vars_default_region_follows_sso_region() {
    let config = SsoConfig::from_vars(&vars(&[
      (START_URL_VAR, "https://example.awsapps.com/start"),
      (SSO_REGION_VAR, "us-east-1"),
    ]))
    .unwrap();

    assert_eq!(config.default_region, "us-east-1");
  }

  #[test]
  fn test_from_vars_requires_start_url() {
    let err = SsoConfig::from_vars(&vars(&[(SSO_REGION_VAR, "us-east-1")])).unwrap_err();
    assert!(err.to_string().contains(START_URL_VAR));
  }

  #[test]
  fn test_rejects_non_http_start_url() {
    assert!(SsoConfig::new("ftp://example.com/start", "us-east-1", "us-east-1").is_err());
    assert!(SsoConfig::new("example.awsapps.com/start", "us-east-1", "us-east-1").is_err());
  }

  #[test]
  fn test_rejects_malformed_region() {
    assert!(SsoConfig::new("https://example.awsapps.com/start", "useast1", "us-east-1").is_err());
    assert!(SsoConfig::new("https://example.awsapps.com/start", "us-east-1", "eu-west-x").is_err());
  }

  #[test]
  fn test_region_validation() {
    assert!(is_valid_region("eu-west-2"));
    assert!(is_valid_region("ap-southeast-1"));
    assert!(is_valid_region("us-gov-west-1"));
    assert!(!is_valid_region("eu-west"));
    assert!(!is_valid_region("eu--2"));
  }

  #[test]
  fn test_load_from_explicit_env_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sso.env");
    std::fs::write(
      &path,
      "# SSO settings\nAWS_SSO_START_URL=\"https://corp.awsapps.com/start\"\nAWS_SSO_REGION=ap-southeast-2\n",
    )
    .unwrap();

    let config = load_sso_config_from(Some(&path), |_| None).unwrap();

    assert_eq!(config.start_url, "https://corp.awsapps.com/start");
    assert_eq!(config.sso_region, "ap-southeast-2");
    assert_eq!(config.default_region, "ap-southeast-2");
  }

  #[test]
  fn test_environment_overrides_env_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sso.env");
    std::fs::write(
      &path,
      "AWS_SSO_START_URL=https://corp.awsapps.com/start\nAWS_SSO_REGION=ap-southeast-2\n",
    )
    .unwrap();

    let config = load_sso_config_from(Some(&path), |key| match key {
      SSO_REGION_VAR => Some("us-east-1".to_string()),
      DEFAULT_REGION_VAR => Some("eu-central-1".to_string()),
      _ => None,
    })
    .unwrap();

    assert_eq!(config.start_url, "https://corp.awsapps.com/start");
    assert_eq!(config.sso_region, "us-east-1");
    assert_eq!(config.default_region, "eu-central-1");
  }

  #[test]
  fn test_missing_explicit_env_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_sso_config(Some(&dir.path().join("missing.env"))).is_err());
  }
}
