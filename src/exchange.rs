//! Exchange of an SSO session for role credentials.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::accounts::Account;
use crate::credentials::{Credentials, MalformedCredentials};
use crate::retry::{RetryExhausted, RetryPolicy};
use crate::session::Session;
use crate::sso::{ApiError, SsoApi};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExchangeError {
  /// The portal no longer accepts the session's access token.
  #[error("SSO session expired")]
  SessionExpired,

  /// This identity may not assume the role in the account.
  #[error("not authorized: {0}")]
  NotAuthorized(String),

  #[error("network error after {attempts} attempt(s): {message}")]
  Network { attempts: u32, message: String },

  /// The portal answered with credentials that are unusable.
  #[error("malformed credentials: {0}")]
  Malformed(#[from] MalformedCredentials),
}

/// Turns a [`Session`] plus an [`Account`] into temporary [`Credentials`].
pub struct CredentialExchanger {
  api: Arc<dyn SsoApi>,
  retry: RetryPolicy,
}

impl CredentialExchanger {
  pub fn new(api: Arc<dyn SsoApi>) -> Self {
    Self {
      api,
      retry: RetryPolicy::default(),
    }
  }

  pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  /// Fetch role credentials for `account`.
  ///
  /// Transient failures are retried under the exchanger's [`RetryPolicy`].
  /// An expired session is reported straight away so the caller can
  /// re-authenticate.
  ///
  /// # Arguments
  /// * `session` - Valid SSO session.
  /// * `account` - Account and role to assume.
  /// * `region` - Region exported with the credentials.
  pub async fn exchange(&self, session: &Session, account: &Account, region: &str) -> Result<Credentials, ExchangeError> {
    info!(account = %account.name, account_id = %account.account_id, role = %account.role, "Requesting role credentials");

    let role = self
      .retry
      .run("get_role_credentials", || {
        self
          .api
          .get_role_credentials(&session.access_token, &account.account_id, &account.role)
      })
      .await
      .map_err(classify)?;

    let credentials = Credentials {
      access_key_id: role.access_key_id,
      secret_access_key: role.secret_access_key,
      session_token: role.session_token,
      expiration: role.expiration,
      account_id: account.account_id.clone(),
      role_name: account.role.clone(),
      region: region.to_string(),
    };
    credentials.check_shape()?;

    debug!(credentials = %credentials.masked(), "Received role credentials");
    Ok(credentials)
  }
}

fn classify(exhausted: RetryExhausted) -> ExchangeError {
  let RetryExhausted { attempts, error } = exhausted;

  match error.status() {
    Some(401) => ExchangeError::SessionExpired,
    Some(403 | 404) => ExchangeError::NotAuthorized(error.to_string()),
    _ => ExchangeError::Network {
      attempts,
      message: error.to_string(),
    },
  }
}
