//! Temporary role credentials issued for one account and role.
//!
//! Credentials only leave this type in full through the export renderer. Every
//! other view (logs, status lines, `Debug`) goes through [`Credentials::masked`]
//! or the masking built into [`Secret`].

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::secret::Secret;

/// Prefixes of AWS access key ids: `ASIA` for temporary keys, `AKIA` for
/// long-term ones.
pub const ACCESS_KEY_PREFIXES: &[&str] = &["ASIA", "AKIA"];

/// Credentials that cannot be handed to the AWS SDKs as they are.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MalformedCredentials {
  #[error("{0} is empty")]
  EmptyField(&'static str),

  /// Carries the masked access key id.
  #[error("access key id {0} does not start with ASIA or AKIA")]
  UnexpectedAccessKey(String),
}

/// Access key id, secret access key, and session token for one account/role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
  pub access_key_id: Secret,
  pub secret_access_key: Secret,
  pub session_token: Secret,
  pub expiration: DateTime<Utc>,
  pub account_id: String,
  pub role_name: String,
  pub region: String,
}

/// Masked view of [`Credentials`] for status output and logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskedCredentials {
  pub access_key_id: String,
  pub secret_access_key: String,
  pub session_token: String,
  pub expiration: DateTime<Utc>,
  pub account_id: String,
  pub role_name: String,
}

impl fmt::Display for MaskedCredentials {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{}/{} key={} secret={} token={} expires={}",
      self.account_id,
      self.role_name,
      self.access_key_id,
      self.secret_access_key,
      self.session_token,
      self.expiration.to_rfc3339()
    )
  }
}

impl Credentials {
  pub fn masked(&self) -> MaskedCredentials {
    MaskedCredentials {
      access_key_id: self.access_key_id.masked(),
      secret_access_key: self.secret_access_key.masked(),
      session_token: self.session_token.masked(),
      expiration: self.expiration,
      account_id: self.account_id.clone(),
      role_name: self.role_name.clone(),
    }
  }

  /// Reject empty fields and access key ids of an unknown kind.
  pub fn check_shape(&self) -> Result<(), MalformedCredentials> {
    let fields = [
      ("access key id", &self.access_key_id),
      ("secret access key", &self.secret_access_key),
      ("session token", &self.session_token),
    ];
    for (name, value) in fields {
      if value.expose().trim().is_empty() {
        return Err(MalformedCredentials::EmptyField(name));
      }
    }

    let key = self.access_key_id.expose();
    if !ACCESS_KEY_PREFIXES.iter().any(|prefix| key.starts_with(prefix)) {
      return Err(MalformedCredentials::UnexpectedAccessKey(self.access_key_id.masked()));
    }

    Ok(())
  }

  pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
    now >= self.expiration
  }

  /// Human-readable time remaining before the credentials lapse.
  pub fn time_until_expiry_at(&self, now: DateTime<Utc>) -> String {
    if self.is_expired_at(now) {
      return "Expired".to_string();
    }

    let remaining = self.expiration - now;
    let minutes = remaining.num_minutes();
    let hours = remaining.num_hours();

    if hours < 1 {
      format!("{minutes} minutes")
    } else if hours < 24 {
      format!("{hours} hours")
    } else {
      format!("{} days", remaining.num_days())
    }
  }

  pub fn time_until_expiry(&self) -> String {
    self.time_until_expiry_at(Utc::now())
  }
}
