//! Programmatic device-authorization flow against IAM Identity Center.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::poll::{PollEvent, PollState, next_interval, transition};
use super::{AuthError, Authenticator};
use crate::config::SsoConfig;
use crate::retry::{RetryExhausted, RetryPolicy};
use crate::session::Session;
use crate::sso::{ApiError, DeviceAuthorization, RegisteredClient, SsoApi, TokenGrant};

/// Name the OIDC client registers under.
pub const CLIENT_NAME: &str = "sso-creds";

/// Longest session lifetime accepted from the token endpoint (30 days).
const MAX_SESSION_LIFETIME_SECS: u64 = 30 * 24 * 60 * 60;

/// Upper bound on the device code lifetime and poll interval taken from the
/// server (1 day).
const MAX_DEVICE_WAIT_SECS: u64 = 24 * 60 * 60;

/// Error codes meaning the device flow is turned off for this client.
const DISABLED_ERROR_CODES: &[&str] = &["unauthorized_client", "AccessDeniedException", "UnauthorizedClientException"];

/// Shows the user code and verification URI to the person at the keyboard.
pub trait DeviceCodePrompt: Send + Sync {
  fn present(&self, authorization: &DeviceAuthorization);
}

/// [`Authenticator`] running the OAuth device-authorization grant.
pub struct DeviceAuthenticator {
  api: Arc<dyn SsoApi>,
  prompt: Box<dyn DeviceCodePrompt>,
  retry: RetryPolicy,
  registration: Mutex<Option<RegisteredClient>>,
}

impl DeviceAuthenticator {
  pub fn new(api: Arc<dyn SsoApi>, prompt: Box<dyn DeviceCodePrompt>) -> Self {
    Self {
      api,
      prompt,
      retry: RetryPolicy::default(),
      registration: Mutex::new(None),
    }
  }

  pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  /// Register the OIDC client, reusing an unexpired registration from earlier
  /// in this run.
  ///
  /// # Errors
  /// [`AuthError::Disabled`] when the service refuses the registration,
  /// [`AuthError::Network`] once transient failures exhaust the retry policy.
  pub async fn register_client(&self) -> Result<RegisteredClient, AuthError> {
    let mut registration = self.registration.lock().await;

    if let Some(client) = registration.as_ref()
      && client.is_valid_at(Utc::now())
    {
      debug!(client_id = %client.client_id, "Reusing OIDC client registration");
      return Ok(client.clone());
    }

    let client = self
      .retry
      .run("register_client", || self.api.register_client(CLIENT_NAME))
      .await
      .map_err(setup_error)?;

    *registration = Some(client.clone());
    Ok(client)
  }

  /// Start a device authorization for the configured portal.
  ///
  /// # Arguments
  /// * `client` - Registration from [`DeviceAuthenticator::register_client`].
  /// * `config` - Supplies the portal start URL.
  pub async fn start_device_authorization(
    &self,
    client: &RegisteredClient,
    config: &SsoConfig,
  ) -> Result<DeviceAuthorization, AuthError> {
    let authorization = self
      .retry
      .run("start_device_authorization", || {
        self.api.start_device_authorization(client, &config.start_url)
      })
      .await
      .map_err(setup_error)?;

    debug!(
      user_code = %authorization.user_code,
      expires_in = authorization.expires_in,
      interval = authorization.interval,
      "Device authorization started"
    );
    Ok(authorization)
  }

  /// Poll the token endpoint until the user approves, denies, or the device
  /// code expires.
  ///
  /// Waits `interval` seconds before each poll and grows the interval on
  /// `slow_down`. The loop never runs past `expires_in` and returns as soon as
  /// `cancel` fires, including while a poll request is in flight.
  ///
  /// # Errors
  /// [`AuthError::Denied`], [`AuthError::Expired`], [`AuthError::Cancelled`],
  /// or [`AuthError::Network`] after too many consecutive transient failures.
  pub async fn poll_for_token(
    &self,
    client: &RegisteredClient,
    authorization: &DeviceAuthorization,
    cancel: &CancellationToken,
  ) -> Result<TokenGrant, AuthError> {
    let deadline = Instant::now() + Duration::from_secs(authorization.expires_in.min(MAX_DEVICE_WAIT_SECS));
    let mut interval = Duration::from_secs(authorization.interval.clamp(1, MAX_DEVICE_WAIT_SECS));
    let mut state = PollState::Pending;
    let mut consecutive_failures = 0;

    loop {
      let wake = Instant::now()
        .checked_add(interval)
        .map_or(deadline, |wake| wake.min(deadline));

      let event = tokio::select! {
        biased;
        () = cancel.cancelled() => PollEvent::Cancelled,
        () = sleep_until(wake) => {
          if Instant::now() >= deadline {
            PollEvent::DeadlineReached
          } else {
            tokio::select! {
              biased;
              () = cancel.cancelled() => PollEvent::Cancelled,
              () = sleep_until(deadline) => PollEvent::DeadlineReached,
              result = self.api.create_token(client, &authorization.device_code) => match result {
                Ok(poll) => {
                  consecutive_failures = 0;
                  PollEvent::Server(poll)
                }
                Err(error) => {
                  consecutive_failures += 1;
                  self.poll_failure(error, consecutive_failures)?;
                  continue;
                }
              },
            }
          }
        }
      };

      state = transition(state, event);
      interval = next_interval(&state, interval);

      match state {
        PollState::Authenticated(grant) => return Ok(grant),
        PollState::Denied => return Err(AuthError::Denied),
        PollState::Expired => return Err(AuthError::Expired),
        PollState::Cancelled => return Err(AuthError::Cancelled),
        PollState::SlowDown => debug!(interval_secs = interval.as_secs(), "Server asked to slow down"),
        PollState::Pending => {}
      }
    }
  }

  /// Decide whether a failed poll ends the loop.
  fn poll_failure(&self, error: ApiError, consecutive: u32) -> Result<(), AuthError> {
    if !error.is_transient() {
      return Err(AuthError::Protocol(error.to_string()));
    }

    if consecutive >= self.retry.max_attempts.max(1) {
      return Err(AuthError::Network {
        attempts: consecutive,
        message: error.to_string(),
      });
    }

    warn!(attempt = consecutive, %error, "Token poll failed, will retry");
    Ok(())
  }
}

#[async_trait]
impl Authenticator for DeviceAuthenticator {
  fn name(&self) -> &'static str {
    "device-authorization"
  }

  async fn authenticate(&self, config: &SsoConfig, cancel: &CancellationToken) -> Result<Session, AuthError> {
    let client = tokio::select! {
      biased;
      () = cancel.cancelled() => return Err(AuthError::Cancelled),
      result = self.register_client() => result?,
    };

    let authorization = tokio::select! {
      biased;
      () = cancel.cancelled() => return Err(AuthError::Cancelled),
      result = self.start_device_authorization(&client, config) => result?,
    };

    self.prompt.present(&authorization);

    let grant = self.poll_for_token(&client, &authorization, cancel).await?;
    info!("Device authorization approved");

    let lifetime = grant.expires_in.min(MAX_SESSION_LIFETIME_SECS) as i64;
    Ok(Session::new(
      grant.access_token,
      Utc::now() + chrono::Duration::seconds(lifetime),
      config.sso_region.clone(),
    ))
  }
}

fn is_disabled(error: &ApiError) -> bool {
  error.status() == Some(403) || error.code().is_some_and(|code| DISABLED_ERROR_CODES.contains(&code))
}

/// Classify a failure from client registration or device authorization.
fn setup_error(exhausted: RetryExhausted) -> AuthError {
  let RetryExhausted { attempts, error } = exhausted;

  if is_disabled(&error) {
    AuthError::Disabled(error.to_string())
  } else if error.is_transient() {
    AuthError::Network {
      attempts,
      message: error.to_string(),
    }
  } else {
    AuthError::Protocol(error.to_string())
  }
}
