//! Authenticated SSO session and its per-process cache.

use chrono::{DateTime, Duration, Utc};

use crate::secret::Secret;

/// Buffer subtracted from a session's expiry before it is considered usable.
pub const SESSION_SAFETY_MARGIN: Duration = Duration::seconds(60);

/// Short-lived SSO access token. Lives only in process memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
  pub access_token: Secret,
  pub expires_at: DateTime<Utc>,
  pub region: String,
}

impl Session {
  pub fn new(access_token: impl Into<Secret>, expires_at: DateTime<Utc>, region: impl Into<String>) -> Self {
    Self {
      access_token: access_token.into(),
      expires_at,
      region: region.into(),
    }
  }

  /// A session is valid while `now < expires_at - margin`.
  pub fn is_valid_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
    now < self.expires_at - margin
  }

  pub fn is_valid(&self) -> bool {
    self.is_valid_at(Utc::now(), SESSION_SAFETY_MARGIN)
  }
}

/// Holds at most one session for the lifetime of an invocation.
///
/// Owned by the orchestrator and never persisted or shared across processes.
#[derive(Debug)]
pub struct SessionCache {
  session: Option<Session>,
  margin: Duration,
}

impl Default for SessionCache {
  fn default() -> Self {
    Self::new()
  }
}

impl SessionCache {
  pub fn new() -> Self {
    Self::with_margin(SESSION_SAFETY_MARGIN)
  }

  pub fn with_margin(margin: Duration) -> Self {
    Self { session: None, margin }
  }

  /// The cached session, if one is stored and still valid now.
  pub fn get(&self) -> Option<&Session> {
    self.get_at(Utc::now())
  }

  /// The cached session, if one is stored and valid at `now`.
  pub fn get_at(&self, now: DateTime<Utc>) -> Option<&Session> {
    self.session.as_ref().filter(|session| session.is_valid_at(now, self.margin))
  }

  pub fn put(&mut self, session: Session) {
    self.session = Some(session);
  }

  /// Drop the cached session, forcing the next lookup to re-authenticate.
  pub fn invalidate(&mut self) {
    self.session = None;
  }
}
