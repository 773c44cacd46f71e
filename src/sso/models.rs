//! Wire models for the IAM Identity Center OIDC and portal APIs.
//!
//! The `*Response` structs mirror the JSON bodies; the public types wrap every
//! secret in [`Secret`] before it reaches the rest of the crate.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::secret::Secret;

/// Grant type used when polling the token endpoint.
pub const DEVICE_CODE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Scope requested for the registered client.
pub const ACCOUNT_ACCESS_SCOPE: &str = "sso:account:access";

/// Poll interval assumed when the server omits one.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// A public OIDC client registered for this invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredClient {
  pub client_id: String,
  pub client_secret: Secret,
  pub expires_at: DateTime<Utc>,
}

impl RegisteredClient {
  pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
    now < self.expires_at
  }
}

/// Codes and timing returned by `StartDeviceAuthorization`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAuthorization {
  pub device_code: Secret,
  pub user_code: String,
  pub verification_uri: String,
  pub verification_uri_complete: Option<String>,
  pub expires_in: u64,
  pub interval: u64,
}

/// Access token granted at the end of the device flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
  pub access_token: Secret,
  pub expires_in: u64,
}

/// Outcome of one `CreateToken` poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenPoll {
  Granted(TokenGrant),
  Pending,
  SlowDown,
  Denied,
  Expired,
}

impl TokenPoll {
  /// Map an OAuth error code from the token endpoint to a poll outcome.
  ///
  /// Both the RFC 8628 spelling and the AWS exception name are accepted.
  pub fn from_error_code(code: &str) -> Option<Self> {
    match code {
      "authorization_pending" | "AuthorizationPendingException" => Some(Self::Pending),
      "slow_down" | "SlowDownException" => Some(Self::SlowDown),
      "access_denied" | "AccessDeniedException" => Some(Self::Denied),
      "expired_token" | "ExpiredTokenException" => Some(Self::Expired),
      _ => None,
    }
  }
}

/// Role credentials returned by the portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleCredentials {
  pub access_key_id: Secret,
  pub secret_access_key: Secret,
  pub session_token: Secret,
  pub expiration: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegisterClientRequest<'a> {
  pub client_name: &'a str,
  pub client_type: &'a str,
  pub scopes: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegisterClientResponse {
  pub client_id: String,
  pub client_secret: String,
  pub client_secret_expires_at: i64,
}

impl From<RegisterClientResponse> for RegisteredClient {
  fn from(response: RegisterClientResponse) -> Self {
    Self {
      client_id: response.client_id,
      client_secret: Secret::new(response.client_secret),
      expires_at: epoch_seconds(response.client_secret_expires_at),
    }
  }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StartDeviceAuthorizationRequest<'a> {
  pub client_id: &'a str,
  pub client_secret: &'a str,
  pub start_url: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StartDeviceAuthorizationResponse {
  pub device_code: String,
  pub user_code: String,
  pub verification_uri: String,
  #[serde(default)]
  pub verification_uri_complete: Option<String>,
  pub expires_in: u64,
  #[serde(default)]
  pub interval: Option<u64>,
}

impl From<StartDeviceAuthorizationResponse> for DeviceAuthorization {
  fn from(response: StartDeviceAuthorizationResponse) -> Self {
    Self {
      device_code: Secret::new(response.device_code),
      user_code: response.user_code,
      verification_uri: response.verification_uri,
      verification_uri_complete: response.verification_uri_complete,
      expires_in: response.expires_in,
      interval: response
        .interval
        .filter(|interval| *interval > 0)
        .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
    }
  }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateTokenRequest<'a> {
  pub client_id: &'a str,
  pub client_secret: &'a str,
  pub grant_type: &'a str,
  pub device_code: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateTokenResponse {
  pub access_token: String,
  pub expires_in: u64,
}

/// Error body shared by the OIDC and portal endpoints.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorResponse {
  #[serde(default)]
  pub error: Option<String>,
  #[serde(default)]
  pub error_description: Option<String>,
  #[serde(default, rename = "__type")]
  pub error_type: Option<String>,
  #[serde(default, alias = "Message")]
  pub message: Option<String>,
}

impl ErrorResponse {
  /// The error code, with any `namespace#` prefix removed.
  pub fn code(&self) -> Option<String> {
    self
      .error
      .clone()
      .or_else(|| self.error_type.clone())
      .map(|code| code.rsplit('#').next().unwrap_or(&code).to_string())
  }

  pub fn description(&self) -> String {
    self
      .error_description
      .clone()
      .or_else(|| self.message.clone())
      .unwrap_or_default()
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GetRoleCredentialsResponse {
  pub role_credentials: RoleCredentialsBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RoleCredentialsBody {
  pub access_key_id: String,
  pub secret_access_key: String,
  pub session_token: String,
  /// Milliseconds since the Unix epoch.
  pub expiration: i64,
}

impl From<RoleCredentialsBody> for RoleCredentials {
  fn from(body: RoleCredentialsBody) -> Self {
    Self {
      access_key_id: Secret::new(body.access_key_id),
      secret_access_key: Secret::new(body.secret_access_key),
      session_token: Secret::new(body.session_token),
      expiration: Utc
        .timestamp_millis_opt(body.expiration)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC),
    }
  }
}

fn epoch_seconds(seconds: i64) -> DateTime<Utc> {
  Utc
    .timestamp_opt(seconds, 0)
    .single()
    .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
