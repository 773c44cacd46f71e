//! Session authentication.
//!
//! Two [`Authenticator`] implementations produce an equivalent [`Session`]:
//! the programmatic device-authorization flow ([`DeviceAuthenticator`]) and
//! the AWS CLI-driven interactive path ([`FallbackAuthenticator`]). Which
//! failures of the first hand over to the second is decided by a
//! [`FallbackPolicy`] value rather than by inspecting authenticator types.

pub mod device;
pub mod fallback;
pub mod poll;

use async_trait::async_trait;
pub use device::{DeviceAuthenticator, DeviceCodePrompt};
pub use fallback::{AwsCliLogin, FallbackAuthenticator, InteractiveLogin};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::SsoConfig;
use crate::session::Session;

/// Why an authenticator could not produce a session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
  #[error("device authorization was denied")]
  Denied,

  #[error("device authorization expired before it was approved")]
  Expired,

  #[error("authentication cancelled")]
  Cancelled,

  #[error("network error after {attempts} attempt(s): {message}")]
  Network { attempts: u32, message: String },

  /// The programmatic flow is turned off for this identity or client.
  #[error("device authorization is disabled: {0}")]
  Disabled(String),

  /// The server answered with something outside the protocol.
  #[error("unexpected SSO response: {0}")]
  Protocol(String),

  /// The interactive path ran but did not yield a session.
  #[error("interactive sign-in failed: {0}")]
  Fallback(String),
}

/// A way of obtaining an SSO [`Session`].
#[async_trait]
pub trait Authenticator: Send + Sync {
  /// Short name used in log lines.
  fn name(&self) -> &'static str;

  /// Run the authentication flow to completion.
  ///
  /// # Errors
  /// Returns [`AuthError::Cancelled`] as soon as `cancel` fires.
  async fn authenticate(&self, config: &SsoConfig, cancel: &CancellationToken) -> Result<Session, AuthError>;

  /// Instructions for finishing sign-in by hand once this authenticator has
  /// given up.
  fn manual_steps(&self, config: &SsoConfig) -> Vec<String> {
    vec![
      format!("Open {} in a browser and sign in", config.start_url),
      "Re-run: sso-creds credentials".to_string(),
    ]
  }
}

/// Failure classes of the primary authenticator that hand over to the
/// fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackPolicy {
  /// Network failures that exhausted their retries.
  pub on_network: bool,
  /// The device flow is administratively disabled.
  pub on_disabled: bool,
}

impl Default for FallbackPolicy {
  fn default() -> Self {
    Self {
      on_network: true,
      on_disabled: true,
    }
  }
}

impl FallbackPolicy {
  /// A policy under which nothing falls back.
  pub fn disabled() -> Self {
    Self {
      on_network: false,
      on_disabled: false,
    }
  }

  pub fn should_fall_back(&self, error: &AuthError) -> bool {
    match error {
      AuthError::Network { .. } => self.on_network,
      AuthError::Disabled(_) => self.on_disabled,
      AuthError::Denied
      | AuthError::Expired
      | AuthError::Cancelled
      | AuthError::Protocol(_)
      | AuthError::Fallback(_) => false,
    }
  }
}
