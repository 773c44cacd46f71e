//! Fake IAM Identity Center API for testing
//!
//! Responses are scripted per operation and every call is counted, so tests
//! can drive the whole retrieval workflow without a network.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sso_creds::auth::{AuthError, Authenticator, DeviceCodePrompt};
use sso_creds::config::SsoConfig;
use sso_creds::credentials::Credentials;
use sso_creds::identity::{CallerIdentity, IdentityCheck};
use sso_creds::secret::Secret;
use sso_creds::session::Session;
use sso_creds::sso::{
  ApiError, DeviceAuthorization, RegisteredClient, RoleCredentials, SsoApi, TokenGrant, TokenPoll,
};
use tokio_util::sync::CancellationToken;

use crate::common::fixtures;

/// A fake SSO API that returns scripted responses.
///
/// With nothing scripted, registration and device authorization succeed, the
/// first token poll is granted, and role credentials are issued.
#[derive(Default)]
pub struct FakeSsoApi {
  register_failure: Mutex<Option<ApiError>>,
  polls: Mutex<VecDeque<Result<TokenPoll, ApiError>>>,
  roles: Mutex<VecDeque<Result<RoleCredentials, ApiError>>>,
  role_requests: Mutex<Vec<RoleRequest>>,
  pub registrations: AtomicUsize,
  pub authorizations: AtomicUsize,
  pub token_polls: AtomicUsize,
}

/// Arguments of one `get_role_credentials` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRequest {
  pub access_token: String,
  pub account_id: String,
  pub role_name: String,
}

impl FakeSsoApi {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn fail_registration(self, error: ApiError) -> Self {
    *self.register_failure.lock().unwrap() = Some(error);
    self
  }

  pub fn with_polls(self, polls: Vec<Result<TokenPoll, ApiError>>) -> Self {
    self.polls.lock().unwrap().extend(polls);
    self
  }

  pub fn with_role_results(self, results: Vec<Result<RoleCredentials, ApiError>>) -> Self {
    self.roles.lock().unwrap().extend(results);
    self
  }

  pub fn role_requests(&self) -> Vec<RoleRequest> {
    self.role_requests.lock().unwrap().clone()
  }

  pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl SsoApi for FakeSsoApi {
  async fn register_client(&self, _client_name: &str) -> Result<RegisteredClient, ApiError> {
    self.registrations.fetch_add(1, Ordering::SeqCst);

    if let Some(error) = self.register_failure.lock().unwrap().clone() {
      return Err(error);
    }

    Ok(RegisteredClient {
      client_id: "fake-client-id".to_string(),
      client_secret: Secret::new("fake-client-secret"),
      expires_at: Utc::now() + Duration::days(90),
    })
  }

  async fn start_device_authorization(
    &self,
    _client: &RegisteredClient,
    start_url: &str,
  ) -> Result<DeviceAuthorization, ApiError> {
    assert_eq!(start_url, fixtures::START_URL);
    self.authorizations.fetch_add(1, Ordering::SeqCst);

    Ok(DeviceAuthorization {
      device_code: Secret::new("fake-device-code"),
      user_code: "WXYZ-1234".to_string(),
      verification_uri: "https://device.sso.eu-west-2.amazonaws.com/".to_string(),
      verification_uri_complete: Some("https://device.sso.eu-west-2.amazonaws.com/?user_code=WXYZ-1234".to_string()),
      expires_in: 600,
      interval: 1,
    })
  }

  async fn create_token(&self, _client: &RegisteredClient, _device_code: &Secret) -> Result<TokenPoll, ApiError> {
    self.token_polls.fetch_add(1, Ordering::SeqCst);

    let scripted = self.polls.lock().unwrap().pop_front();
    scripted.unwrap_or_else(|| {
      // Each device authorization yields a distinct access token.
      let generation = self.authorizations.load(Ordering::SeqCst);
      Ok(TokenPoll::Granted(TokenGrant {
        access_token: Secret::new(format!("session-token-{generation}")),
        expires_in: 28_800,
      }))
    })
  }

  async fn get_role_credentials(
    &self,
    access_token: &Secret,
    account_id: &str,
    role_name: &str,
  ) -> Result<RoleCredentials, ApiError> {
    self.role_requests.lock().unwrap().push(RoleRequest {
      access_token: access_token.expose().to_string(),
      account_id: account_id.to_string(),
      role_name: role_name.to_string(),
    });

    let scripted = self.roles.lock().unwrap().pop_front();
    scripted.unwrap_or_else(|| Ok(fixtures::role_credentials()))
  }
}

/// Prompt that records how often the device code was shown.
#[derive(Default)]
pub struct CountingPrompt {
  pub shown: std::sync::Arc<AtomicUsize>,
}

impl DeviceCodePrompt for CountingPrompt {
  fn present(&self, _authorization: &DeviceAuthorization) {
    self.shown.fetch_add(1, Ordering::SeqCst);
  }
}

/// Authenticator with a fixed outcome, standing in for the AWS CLI fallback.
pub struct StaticAuthenticator {
  outcome: Result<Session, AuthError>,
  pub calls: std::sync::Arc<AtomicUsize>,
}

impl StaticAuthenticator {
  pub fn succeeding() -> Self {
    Self {
      outcome: Ok(Session::new(
        "fallback-session-token",
        Utc::now() + Duration::hours(8),
        "eu-west-2",
      )),
      calls: Default::default(),
    }
  }

  pub fn failing() -> Self {
    Self {
      outcome: Err(AuthError::Fallback("aws sso login exited with status 1".to_string())),
      calls: Default::default(),
    }
  }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
  fn name(&self) -> &'static str {
    "static"
  }

  async fn authenticate(&self, _config: &SsoConfig, _cancel: &CancellationToken) -> Result<Session, AuthError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.outcome.clone()
  }

  fn manual_steps(&self, config: &SsoConfig) -> Vec<String> {
    vec![
      format!("Open {} in a browser and sign in", config.start_url),
      "Run: aws sso login --profile sso-session".to_string(),
    ]
  }
}

/// Identity check with a fixed answer, standing in for `aws sts get-caller-identity`.
pub struct StaticIdentity {
  outcome: Result<CallerIdentity, String>,
  pub calls: std::sync::Arc<AtomicUsize>,
}

impl StaticIdentity {
  pub fn account(account_id: &str) -> Self {
    Self {
      outcome: Ok(CallerIdentity {
        account: account_id.to_string(),
        arn: format!("arn:aws:sts::{account_id}:assumed-role/Engineer/dev@example.com"),
        user_id: "AROAEXAMPLE:dev@example.com".to_string(),
      }),
      calls: Default::default(),
    }
  }

  pub fn failing(message: &str) -> Self {
    Self {
      outcome: Err(message.to_string()),
      calls: Default::default(),
    }
  }
}

#[async_trait]
impl IdentityCheck for StaticIdentity {
  async fn caller_identity(
    &self,
    _credentials: &Credentials,
    _cancel: &CancellationToken,
  ) -> anyhow::Result<CallerIdentity> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.outcome.clone().map_err(anyhow::Error::msg)
  }
}
