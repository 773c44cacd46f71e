//! Fixed-backoff retry for transient SSO API failures.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::sso::ApiError;

/// Attempts made for a transient failure before it is surfaced.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Pause between attempts.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  pub max_attempts: u32,
  pub backoff: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: DEFAULT_MAX_ATTEMPTS,
      backoff: DEFAULT_BACKOFF,
    }
  }
}

/// Failure left over after a retried operation gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted {
  pub attempts: u32,
  pub error: ApiError,
}

impl RetryPolicy {
  /// Run `operation`, retrying while it fails with a transient [`ApiError`].
  ///
  /// Non-transient errors are returned after the first attempt.
  ///
  /// # Arguments
  /// * `label` - Operation name used in log lines.
  /// * `operation` - Produces a fresh future for each attempt.
  pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, RetryExhausted>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
  {
    let max_attempts = self.max_attempts.max(1);
    let mut attempt = 1;

    loop {
      match operation().await {
        Ok(value) => return Ok(value),
        Err(error) if error.is_transient() && attempt < max_attempts => {
          warn!(operation = label, attempt, max_attempts, %error, "Transient failure, retrying");
          tokio::time::sleep(self.backoff).await;
          attempt += 1;
        }
        Err(error) => return Err(RetryExhausted { attempts: attempt, error }),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicU32, Ordering};

  use super::*;

  #[tokio::test(start_paused = true)]
  async fn test_retries_transient_failures_then_succeeds() {
    let calls = AtomicU32::new(0);
    let policy = RetryPolicy::default();

    let result = policy
      .run("test", || async {
        if calls.fetch_add(1, Ordering::SeqCst) < 2 {
          Err(ApiError::Transport("connection reset".into()))
        } else {
          Ok(42)
        }
      })
      .await;

    assert_eq!(result, Ok(42));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn test_gives_up_after_max_attempts() {
    let calls = AtomicU32::new(0);
    let policy = RetryPolicy {
      max_attempts: 3,
      backoff: Duration::from_secs(2),
    };
    let start = tokio::time::Instant::now();

    let result: Result<(), _> = policy
      .run("test", || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(ApiError::Transport("timed out".into()))
      })
      .await;

    let exhausted = result.unwrap_err();
    assert_eq!(exhausted.attempts, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(4));
  }

  #[tokio::test(start_paused = true)]
  async fn test_does_not_retry_permanent_failures() {
    let calls = AtomicU32::new(0);

    let result: Result<(), _> = RetryPolicy::default()
      .run("test", || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(ApiError::Status {
          status: 403,
          code: None,
          message: "forbidden".into(),
        })
      })
      .await;

    assert_eq!(result.unwrap_err().attempts, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }
}
