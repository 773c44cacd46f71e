//! Credential retrieval workflow for one invocation.
//!
//! resolve account → session cache → authenticate (primary, then fallback per
//! policy) → exchange → optional identity check → render → emit. Any unrecovered failure aborts the run
//! with a single [`SsoError`].

use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::accounts::{Account, AccountRegistry};
use crate::auth::{AuthError, Authenticator, FallbackPolicy};
use crate::config::SsoConfig;
use crate::credentials::Credentials;
use crate::error::SsoError;
use crate::exchange::{CredentialExchanger, ExchangeError};
use crate::format::{ExportFormat, render};
use crate::identity::{IdentityCheck, IdentityOutcome, verify_identity};
use crate::output::{Emitted, emit};
use crate::session::{Session, SessionCache};

/// Interactive choice among the registry's accounts.
pub trait AccountSelector: Send + Sync {
  /// Index of the chosen account, or `None` if the user backed out.
  fn select(&self, registry: &AccountRegistry) -> anyhow::Result<Option<usize>>;
}

/// What the caller asked for.
#[derive(Debug, Clone, Default)]
pub struct RetrievalRequest<'a> {
  /// Account name; the default account (or a prompt) when absent.
  pub account: Option<&'a str>,
  pub format: ExportFormat,
  /// credentials-file section name; defaults to the account name.
  pub profile: Option<&'a str>,
  /// Prompt for the account when none is named.
  pub choose: bool,
}

/// Result of a successful retrieval.
#[derive(Debug, Clone)]
pub struct Retrieval {
  pub account: Account,
  pub credentials: Credentials,
  pub profile: String,
  pub rendered: String,
  /// Outcome of the identity check, when one is configured.
  pub identity: Option<IdentityOutcome>,
}

pub struct CredentialRetrieval {
  config: SsoConfig,
  registry: AccountRegistry,
  primary: Box<dyn Authenticator>,
  fallback: Option<Box<dyn Authenticator>>,
  policy: FallbackPolicy,
  exchanger: CredentialExchanger,
  selector: Option<Box<dyn AccountSelector>>,
  identity: Option<Box<dyn IdentityCheck>>,
  cache: SessionCache,
}

impl CredentialRetrieval {
  pub fn new(
    config: SsoConfig,
    registry: AccountRegistry,
    primary: Box<dyn Authenticator>,
    exchanger: CredentialExchanger,
  ) -> Self {
    Self {
      config,
      registry,
      primary,
      fallback: None,
      policy: FallbackPolicy::disabled(),
      exchanger,
      selector: None,
      identity: None,
      cache: SessionCache::new(),
    }
  }

  /// Hand eligible primary failures to `fallback`, as decided by `policy`.
  pub fn with_fallback(mut self, fallback: Box<dyn Authenticator>, policy: FallbackPolicy) -> Self {
    self.fallback = Some(fallback);
    self.policy = policy;
    self
  }

  pub fn with_selector(mut self, selector: Box<dyn AccountSelector>) -> Self {
    self.selector = Some(selector);
    self
  }

  /// Confirm new credentials with `check` before rendering. Failures only warn.
  pub fn with_identity_check(mut self, check: Box<dyn IdentityCheck>) -> Self {
    self.identity = Some(check);
    self
  }

  pub fn with_session_cache(mut self, cache: SessionCache) -> Self {
    self.cache = cache;
    self
  }

  pub fn session_cache(&self) -> &SessionCache {
    &self.cache
  }

  pub fn registry(&self) -> &AccountRegistry {
    &self.registry
  }

  /// Pick the account for this run.
  ///
  /// A named account is looked up in the registry. Without a name the
  /// selector is asked when `choose` is set, otherwise the default account is
  /// used.
  pub fn resolve_account(&self, request: &RetrievalRequest<'_>) -> Result<Account, SsoError> {
    if request.account.is_none()
      && request.choose
      && let Some(selector) = &self.selector
    {
      let index = selector
        .select(&self.registry)
        .map_err(|e| SsoError::Configuration(format!("account prompt failed: {e:#}")))?
        .ok_or(SsoError::Cancelled)?;

      return self
        .registry
        .accounts()
        .get(index)
        .cloned()
        .ok_or_else(|| SsoError::Configuration(format!("account selection {index} is out of range")));
    }

    self.registry.resolve(request.account).cloned()
  }

  /// Return the cached session, authenticating first if there is none.
  pub async fn session(&mut self, cancel: &CancellationToken) -> Result<Session, SsoError> {
    if let Some(session) = self.cache.get() {
      debug!(expires_at = %session.expires_at, "Using cached SSO session");
      return Ok(session.clone());
    }

    let session = self.authenticate(cancel).await?;
    self.cache.put(session.clone());
    Ok(session)
  }

  async fn authenticate(&self, cancel: &CancellationToken) -> Result<Session, SsoError> {
    info!(authenticator = self.primary.name(), "Authenticating");

    let error = match self.primary.authenticate(&self.config, cancel).await {
      Ok(session) => return Ok(session),
      Err(error) => error,
    };

    let fallback = match &self.fallback {
      Some(fallback) if self.policy.should_fall_back(&error) => fallback,
      _ => return Err(auth_error(error)),
    };

    warn!(
      primary = self.primary.name(),
      fallback = fallback.name(),
      %error,
      "Primary authentication failed, trying fallback"
    );

    match fallback.authenticate(&self.config, cancel).await {
      Ok(session) => Ok(session),
      Err(AuthError::Cancelled) => Err(SsoError::Cancelled),
      Err(fallback_error) => {
        warn!(error = %fallback_error, "Fallback authentication failed");
        Err(SsoError::ManualActionRequired {
          verification_url: self.config.start_url.clone(),
          steps: fallback.manual_steps(&self.config),
        })
      }
    }
  }

  async fn exchange(
    &self,
    session: &Session,
    account: &Account,
    cancel: &CancellationToken,
  ) -> Result<Credentials, ExchangeError> {
    tokio::select! {
      biased;
      () = cancel.cancelled() => Err(ExchangeError::Network { attempts: 0, message: "cancelled".to_string() }),
      result = self.exchanger.exchange(session, account, &self.config.default_region) => result,
    }
  }

  /// Obtain credentials for `account`, re-authenticating once if the portal
  /// rejects the session.
  pub async fn credentials_for(&mut self, account: &Account, cancel: &CancellationToken) -> Result<Credentials, SsoError> {
    let session = self.session(cancel).await?;

    let first = self.exchange(&session, account, cancel).await;
    let result = match first {
      Err(ExchangeError::SessionExpired) => {
        info!("SSO session was rejected, re-authenticating");
        self.cache.invalidate();
        let session = self.session(cancel).await?;

        match self.exchange(&session, account, cancel).await {
          Err(ExchangeError::SessionExpired) => {
            self.cache.invalidate();
            return Err(SsoError::SessionExpired);
          }
          other => other,
        }
      }
      other => other,
    };

    if cancel.is_cancelled() {
      return Err(SsoError::Cancelled);
    }

    result.map_err(|error| match error {
      ExchangeError::SessionExpired => SsoError::SessionExpired,
      ExchangeError::NotAuthorized(_) => SsoError::AccountNotAuthorized {
        account: account.name.clone(),
        account_id: account.account_id.clone(),
        role: account.role.clone(),
        available: self.registry.names(),
      },
      ExchangeError::Network { attempts, message } => SsoError::Network { attempts, message },
      ExchangeError::Malformed(malformed) => SsoError::InvalidCredentials(malformed.to_string()),
    })
  }

  /// Run every step up to and including rendering.
  pub async fn retrieve(
    &mut self,
    request: &RetrievalRequest<'_>,
    cancel: &CancellationToken,
  ) -> Result<Retrieval, SsoError> {
    let account = self.resolve_account(request)?;
    info!(account = %account.name, format = ?request.format, "Retrieving credentials");

    let credentials = self.credentials_for(&account, cancel).await?;

    let identity = match &self.identity {
      Some(check) => {
        let outcome = verify_identity(check.as_ref(), &credentials, &account, cancel).await;
        if cancel.is_cancelled() {
          return Err(SsoError::Cancelled);
        }
        Some(outcome)
      }
      None => None,
    };

    let profile = request.profile.unwrap_or(&account.name).to_string();
    let rendered = render(&credentials, request.format, &profile);

    Ok(Retrieval {
      account,
      credentials,
      profile,
      rendered,
      identity,
    })
  }

  /// Retrieve credentials and write them to `target`, or stdout.
  pub async fn run(
    &mut self,
    request: &RetrievalRequest<'_>,
    target: Option<&Path>,
    cancel: &CancellationToken,
  ) -> Result<(Retrieval, Emitted), SsoError> {
    let retrieval = self.retrieve(request, cancel).await?;
    let emitted = emit(&retrieval.rendered, request.format, &retrieval.profile, target)?;
    Ok((retrieval, emitted))
  }
}

fn auth_error(error: AuthError) -> SsoError {
  match error {
    AuthError::Cancelled => SsoError::Cancelled,
    AuthError::Network { attempts, message } => SsoError::Network { attempts, message },
    other => SsoError::Authentication(other.to_string()),
  }
}
