//! Error taxonomy for a credential retrieval invocation.
//!
//! Every failure that escapes the orchestrator is one of the [`SsoError`]
//! variants below, and each variant maps onto exactly one process exit code.
//! None of the variants carry unmasked secret material.

use thiserror::Error;

/// Process exit codes reported by the CLI.
pub mod exit_code {
  pub const SUCCESS: u8 = 0;
  /// Exchange, authentication, or network failure.
  pub const FAILURE: u8 = 1;
  /// The fallback path is exhausted; the user has to finish sign-in by hand.
  pub const MANUAL_ACTION_REQUIRED: u8 = 2;
  /// Missing or invalid SSO settings or account registry.
  pub const CONFIGURATION: u8 = 3;
  /// The command line could not be parsed.
  pub const INVALID_ARGUMENTS: u8 = 4;
}

/// Top-level failure of a credential retrieval.
#[derive(Debug, Error)]
pub enum SsoError {
  #[error("configuration error: {0}")]
  Configuration(String),

  #[error("authentication failed: {0}. Re-run the command to start a new sign-in")]
  Authentication(String),

  #[error("SSO session expired and re-authentication did not produce a usable session")]
  SessionExpired,

  #[error("network error after {attempts} attempt(s): {message}")]
  Network { attempts: u32, message: String },

  #[error("account '{requested}' not found. Known accounts: {}", .available.join(", "))]
  AccountNotFound { requested: String, available: Vec<String> },

  #[error(
    "account '{account}' ({account_id}) with role '{role}' is not authorized for this identity. Known accounts: {}",
    .available.join(", ")
  )]
  AccountNotAuthorized {
    account: String,
    account_id: String,
    role: String,
    available: Vec<String>,
  },

  #[error("manual sign-in required at {verification_url}")]
  ManualActionRequired { verification_url: String, steps: Vec<String> },

  #[error("cancelled")]
  Cancelled,

  #[error("the SSO portal returned unusable credentials: {0}")]
  InvalidCredentials(String),

  #[error("failed to write output: {0}")]
  Output(String),
}

impl SsoError {
  /// Exit code the CLI reports for this failure.
  pub fn exit_code(&self) -> u8 {
    match self {
      Self::Configuration(_) => exit_code::CONFIGURATION,
      Self::ManualActionRequired { .. } => exit_code::MANUAL_ACTION_REQUIRED,
      Self::Authentication(_)
      | Self::SessionExpired
      | Self::Network { .. }
      | Self::AccountNotFound { .. }
      | Self::AccountNotAuthorized { .. }
      | Self::Cancelled
      | Self::InvalidCredentials(_)
      | Self::Output(_) => exit_code::FAILURE,
    }
  }

  /// Short category label used in the CLI error line.
  pub fn category(&self) -> &'static str {
    match self {
      Self::Configuration(_) => "ConfigurationError",
      Self::Authentication(_) => "AuthenticationError",
      Self::SessionExpired => "SessionExpired",
      Self::Network { .. } => "NetworkError",
      Self::AccountNotFound { .. } => "AccountNotFound",
      Self::AccountNotAuthorized { .. } => "AccountNotAuthorized",
      Self::ManualActionRequired { .. } => "ManualActionRequired",
      Self::Cancelled => "Cancelled",
      Self::InvalidCredentials(_) => "InvalidCredentials",
      Self::Output(_) => "OutputError",
    }
  }
}
