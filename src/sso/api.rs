//! Trait definitions for talking to IAM Identity Center.

use async_trait::async_trait;
use thiserror::Error;

use super::models::{DeviceAuthorization, RegisteredClient, RoleCredentials, TokenPoll};
use crate::secret::Secret;

/// Wire-level failure of a single SSO API call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
  /// The request never produced an HTTP response (DNS, connect, timeout).
  #[error("transport error: {0}")]
  Transport(String),

  /// The server answered with a non-success status.
  #[error("HTTP {status}{}: {message}", code_suffix(.code))]
  Status {
    status: u16,
    code: Option<String>,
    message: String,
  },

  /// The response body did not match the expected shape.
  #[error("unexpected response: {0}")]
  Decode(String),
}

impl ApiError {
  /// Transport failures, throttling, and server errors are worth retrying.
  pub fn is_transient(&self) -> bool {
    match self {
      Self::Transport(_) => true,
      Self::Status { status, .. } => *status == 429 || *status >= 500,
      Self::Decode(_) => false,
    }
  }

  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Status { status, .. } => Some(*status),
      _ => None,
    }
  }

  pub fn code(&self) -> Option<&str> {
    match self {
      Self::Status { code, .. } => code.as_deref(),
      _ => None,
    }
  }
}

fn code_suffix(code: &Option<String>) -> String {
  code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default()
}

/// Trait for IAM Identity Center operations (enables testing with fake
/// implementations).
#[async_trait]
pub trait SsoApi: Send + Sync {
  /// Register a public OIDC client.
  ///
  /// # Arguments
  /// * `client_name` - Friendly name recorded by the OIDC service.
  async fn register_client(&self, client_name: &str) -> Result<RegisteredClient, ApiError>;

  /// Start a device authorization for the given portal.
  ///
  /// # Arguments
  /// * `client` - Client returned by [`SsoApi::register_client`].
  /// * `start_url` - SSO portal start URL.
  ///
  /// # Returns
  /// The device code to poll with plus the user code and verification URI to
  /// show the user.
  async fn start_device_authorization(
    &self,
    client: &RegisteredClient,
    start_url: &str,
  ) -> Result<DeviceAuthorization, ApiError>;

  /// Poll the token endpoint once.
  ///
  /// Protocol states (pending, slow down, denied, expired) come back as
  /// [`TokenPoll`] values rather than errors.
  async fn create_token(&self, client: &RegisteredClient, device_code: &Secret) -> Result<TokenPoll, ApiError>;

  /// Exchange an access token for role credentials.
  ///
  /// # Arguments
  /// * `access_token` - Session access token.
  /// * `account_id` - 12-digit AWS account id.
  /// * `role_name` - Permission set / role to assume.
  async fn get_role_credentials(
    &self,
    access_token: &Secret,
    account_id: &str,
    role_name: &str,
  ) -> Result<RoleCredentials, ApiError>;
}
