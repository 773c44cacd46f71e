//! State machine for the device-authorization poll loop.
//!
//! The loop in [`super::device`] does the waiting and the I/O; everything it
//! decides is decided here by [`transition`], a pure function over the current
//! state and the next event.

use std::time::Duration;

use crate::sso::{TokenGrant, TokenPoll};

/// Amount added to the poll interval each time the server asks us to slow
/// down.
pub const SLOW_DOWN_INCREMENT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
  Pending,
  SlowDown,
  Authenticated(TokenGrant),
  Denied,
  Expired,
  Cancelled,
}

/// Something that happened while waiting for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
  /// The token endpoint answered.
  Server(TokenPoll),
  /// The device code's validity window elapsed.
  DeadlineReached,
  /// The caller asked to stop.
  Cancelled,
}

impl PollState {
  /// Terminal states end the loop and absorb every later event.
  pub fn is_terminal(&self) -> bool {
    matches!(
      self,
      Self::Authenticated(_) | Self::Denied | Self::Expired | Self::Cancelled
    )
  }
}

/// Advance the poll state machine by one event.
pub fn transition(state: PollState, event: PollEvent) -> PollState {
  if state.is_terminal() {
    return state;
  }

  match event {
    PollEvent::Server(TokenPoll::Granted(grant)) => PollState::Authenticated(grant),
    PollEvent::Server(TokenPoll::Pending) => PollState::Pending,
    PollEvent::Server(TokenPoll::SlowDown) => PollState::SlowDown,
    PollEvent::Server(TokenPoll::Denied) => PollState::Denied,
    PollEvent::Server(TokenPoll::Expired) | PollEvent::DeadlineReached => PollState::Expired,
    PollEvent::Cancelled => PollState::Cancelled,
  }
}

/// Interval to wait before the next poll once `state` has been entered.
pub fn next_interval(state: &PollState, current: Duration) -> Duration {
  match state {
    PollState::SlowDown => current.saturating_add(SLOW_DOWN_INCREMENT),
    _ => current,
  }
}
