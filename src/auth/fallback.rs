//! Interactive fallback driven by the AWS CLI.
//!
//! The AWS CLI keeps SSO access tokens in `~/.aws/sso/cache/*.json`. This
//! authenticator reuses a still-valid token from there when one exists for
//! the configured start URL. Otherwise it makes sure an SSO profile exists in
//! the AWS CLI config, runs `aws sso login` (which drives the browser), and
//! reads the freshly cached token back.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{AuthError, Authenticator};
use crate::config::SsoConfig;
use crate::credentials::Credentials;
use crate::format::{has_section, merge_section};
use crate::identity::{CallerIdentity, IdentityCheck};
use crate::output::write_atomic;
use crate::session::{SESSION_SAFETY_MARGIN, Session};
use crate::sso::models::ACCOUNT_ACCESS_SCOPE;

/// AWS CLI profile used for the interactive login.
pub const FALLBACK_PROFILE: &str = "sso-session";

/// Runs an interactive sign-in that leaves a token in the AWS CLI cache.
#[async_trait]
pub trait InteractiveLogin: Send + Sync {
  /// Run the sign-in to completion, stopping early when `cancel` fires.
  async fn login(&self, config: &SsoConfig, cancel: &CancellationToken) -> Result<()>;

  /// Steps a person can follow by hand when [`InteractiveLogin::login`] fails.
  fn manual_steps(&self, config: &SsoConfig) -> Vec<String>;
}

/// `aws sso login` against a dedicated profile in the AWS CLI config.
pub struct AwsCliLogin {
  program: String,
  profile: String,
  config_path: PathBuf,
}

impl AwsCliLogin {
  /// # Arguments
  /// * `config_path` - AWS CLI config file the SSO profile lives in.
  pub fn new(config_path: impl Into<PathBuf>) -> Self {
    Self {
      program: "aws".to_string(),
      profile: FALLBACK_PROFILE.to_string(),
      config_path: config_path.into(),
    }
  }

  /// Use a different executable in place of `aws`.
  pub fn with_program(mut self, program: impl Into<String>) -> Self {
    self.program = program.into();
    self
  }

  /// Add the SSO profile to the AWS CLI config unless it is already there.
  ///
  /// An existing profile is left untouched, as is everything else in the
  /// file.
  ///
  /// # Returns
  /// `true` when the profile was added.
  pub fn ensure_profile(&self, config: &SsoConfig) -> Result<bool> {
    let existing = match std::fs::read_to_string(&self.config_path) {
      Ok(text) => text,
      Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
      Err(e) => return Err(e).with_context(|| format!("Failed to read {}", self.config_path.display())),
    };

    let header = format!("profile {}", self.profile);
    if has_section(&existing, &header) {
      debug!(profile = %self.profile, "AWS CLI SSO profile already configured");
      return Ok(false);
    }

    let section = format!(
      "[{header}]\nsso_start_url = {}\nsso_region = {}\nsso_registration_scopes = {ACCOUNT_ACCESS_SCOPE}\n",
      config.start_url, config.sso_region
    );
    write_atomic(&self.config_path, &merge_section(&existing, &header, &section))?;

    info!(profile = %self.profile, path = %self.config_path.display(), "Added AWS CLI SSO profile");
    Ok(true)
  }

  /// `aws <args>` against our AWS CLI config, killed when dropped.
  fn command(&self, args: &[&str]) -> Command {
    let mut command = Command::new(&self.program);
    command
      .args(args)
      .env("AWS_CONFIG_FILE", &self.config_path)
      .kill_on_drop(true);
    command
  }

  fn spawn(&self, command: &mut Command) -> Result<Child> {
    command.spawn().map_err(|e| match e.kind() {
      io::ErrorKind::NotFound => anyhow::anyhow!("AWS CLI not found ({}). Install AWS CLI v2", self.program),
      _ => anyhow::Error::new(e).context(format!("Failed to start {}", self.program)),
    })
  }
}

#[async_trait]
impl InteractiveLogin for AwsCliLogin {
  async fn login(&self, config: &SsoConfig, cancel: &CancellationToken) -> Result<()> {
    self.ensure_profile(config)?;

    // The export owns stdout, so the CLI's chatter goes to stderr.
    let mut child = self.spawn(
      self
        .command(&["sso", "login", "--profile", self.profile.as_str()])
        .stdin(Stdio::inherit())
        .stdout(Stdio::from(io::stderr()))
        .stderr(Stdio::inherit()),
    )?;

    let status = tokio::select! {
      biased;
      () = cancel.cancelled() => None,
      status = child.wait() => Some(status.context("Failed to wait for aws sso login")?),
    };

    let Some(status) = status else {
      let _ = child.kill().await;
      bail!("aws sso login was cancelled");
    };

    if !status.success() {
      bail!("aws sso login exited with {status}");
    }
    Ok(())
  }

  fn manual_steps(&self, config: &SsoConfig) -> Vec<String> {
    vec![
      format!("Open {} in a browser and sign in", config.start_url),
      format!(
        "Run: AWS_CONFIG_FILE={} aws sso login --profile {}",
        self.config_path.display(),
        self.profile
      ),
      "Re-run: sso-creds credentials".to_string(),
    ]
  }
}

#[async_trait]
impl IdentityCheck for AwsCliLogin {
  async fn caller_identity(&self, credentials: &Credentials, cancel: &CancellationToken) -> Result<CallerIdentity> {
    let child = self.spawn(
      self
        .command(&["sts", "get-caller-identity", "--output", "json"])
        .env_remove("AWS_PROFILE")
        .env("AWS_ACCESS_KEY_ID", credentials.access_key_id.expose())
        .env("AWS_SECRET_ACCESS_KEY", credentials.secret_access_key.expose())
        .env("AWS_SESSION_TOKEN", credentials.session_token.expose())
        .env("AWS_DEFAULT_REGION", &credentials.region)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped()),
    )?;

    let output = tokio::select! {
      biased;
      () = cancel.cancelled() => bail!("aws sts get-caller-identity was cancelled"),
      output = child.wait_with_output() => output.context("Failed to wait for aws sts get-caller-identity")?,
    };

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      bail!("aws sts get-caller-identity exited with {}: {}", output.status, stderr.trim());
    }

    serde_json::from_slice(&output.stdout).context("Unexpected output from aws sts get-caller-identity")
  }
}

/// Token entry written by the AWS CLI.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedToken {
  #[serde(default)]
  start_url: Option<String>,
  #[serde(default)]
  access_token: Option<String>,
  #[serde(default)]
  expires_at: Option<String>,
  #[serde(default)]
  region: Option<String>,
}

/// [`Authenticator`] backed by the AWS CLI and its token cache.
pub struct FallbackAuthenticator {
  cache_dir: PathBuf,
  login: Box<dyn InteractiveLogin>,
  margin: Duration,
}

impl FallbackAuthenticator {
  pub fn new(cache_dir: impl Into<PathBuf>, login: Box<dyn InteractiveLogin>) -> Self {
    Self {
      cache_dir: cache_dir.into(),
      login,
      margin: SESSION_SAFETY_MARGIN,
    }
  }

  /// Find a token in the AWS CLI cache for `config.start_url` that is still
  /// valid past the safety margin.
  ///
  /// Unreadable or unrelated cache entries are skipped.
  pub async fn cached_session(&self, config: &SsoConfig) -> Option<Session> {
    let mut entries = match tokio::fs::read_dir(&self.cache_dir).await {
      Ok(entries) => entries,
      Err(e) => {
        debug!(dir = %self.cache_dir.display(), error = %e, "AWS CLI SSO cache not readable");
        return None;
      }
    };

    let now = Utc::now();
    let mut best: Option<Session> = None;

    while let Ok(Some(entry)) = entries.next_entry().await {
      let path = entry.path();
      if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
        continue;
      }

      let Some(session) = read_cached_token(&path, config).await else {
        continue;
      };

      if session.is_valid_at(now, self.margin) && best.as_ref().is_none_or(|b| session.expires_at > b.expires_at) {
        best = Some(session);
      }
    }

    best
  }
}

#[async_trait]
impl Authenticator for FallbackAuthenticator {
  fn name(&self) -> &'static str {
    "aws-cli"
  }

  async fn authenticate(&self, config: &SsoConfig, cancel: &CancellationToken) -> Result<Session, AuthError> {
    if let Some(session) = self.cached_session(config).await {
      info!("Reusing SSO session from the AWS CLI cache");
      return Ok(session);
    }

    tokio::select! {
      biased;
      () = cancel.cancelled() => return Err(AuthError::Cancelled),
      result = self.login.login(config, cancel) => {
        if cancel.is_cancelled() {
          return Err(AuthError::Cancelled);
        }
        result.map_err(|e| AuthError::Fallback(format!("{e:#}")))?;
      }
    }

    self.cached_session(config).await.ok_or_else(|| {
      warn!(dir = %self.cache_dir.display(), "No usable token in the AWS CLI cache after login");
      AuthError::Fallback("sign-in finished but no valid SSO token was cached".to_string())
    })
  }

  fn manual_steps(&self, config: &SsoConfig) -> Vec<String> {
    self.login.manual_steps(config)
  }
}

async fn read_cached_token(path: &Path, config: &SsoConfig) -> Option<Session> {
  let text = tokio::fs::read_to_string(path).await.ok()?;
  let token: CachedToken = serde_json::from_str(&text).ok()?;

  if token.start_url.as_deref().map(normalize_url) != Some(normalize_url(&config.start_url)) {
    return None;
  }

  let expires_at = parse_expiry(token.expires_at.as_deref()?)?;
  let access_token = token.access_token.filter(|value| !value.is_empty())?;
  let region = token.region.unwrap_or_else(|| config.sso_region.clone());

  Some(Session::new(access_token, expires_at, region))
}

/// The AWS CLI writes either RFC 3339 or a `...UTC` suffix.
fn parse_expiry(value: &str) -> Option<DateTime<Utc>> {
  let value = value.trim();
  let normalized = match value.strip_suffix("UTC") {
    Some(stripped) => format!("{}Z", stripped.trim_end()),
    None => value.to_string(),
  };

  DateTime::parse_from_rfc3339(&normalized)
    .ok()
    .map(|time| time.with_timezone(&Utc))
}

fn normalize_url(url: &str) -> &str {
  url.trim().trim_end_matches('/')
}
