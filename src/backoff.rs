//! Retry backoff policy for registration and sync.
//!
//! Delays double per attempt from a randomized starting point and cap at
//! [`RetryPolicy::MAX_DELAY`]. The base delay is derived purely from the
//! attempt number, so jitter output never feeds back into later steps.
//! Retries are unbounded by design: losing the instance registration
//! permanently is worse than retrying forever at low frequency, so the loop
//! only stops on success or agent shutdown.

use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::error::AgentError;

/// Exponential backoff with a randomized first delay and per-step jitter.
///
/// - the first delay is drawn uniformly from [1 s, 5 s);
/// - attempt `n` uses `first × 2ⁿ × j` with a fresh `j` in [1.0, 1.5),
///   clamped to [`RetryPolicy::MAX_DELAY`];
/// - jitter is upward-only, so consecutive delays never shrink even though
///   every step is randomized independently.
///
/// A fresh policy (and thus a fresh random starting delay) is created for
/// every top-level operation; backoff state is never carried across
/// independent create/update cycles.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    first: Duration,
    max: Duration,
}

impl RetryPolicy {
    /// Delay cap for all retries.
    pub const MAX_DELAY: Duration = Duration::from_secs(120);

    /// Policy with a first delay drawn uniformly from [1 s, 5 s).
    pub fn new() -> Self {
        let first = rand::rng().random_range(1.0..5.0);
        Self {
            first: Duration::from_secs_f64(first),
            max: Self::MAX_DELAY,
        }
    }

    /// Fixed-parameter policy, used by tests that need determinism.
    pub fn fixed(first: Duration, max: Duration) -> Self {
        Self { first, max }
    }

    /// Computes the delay for the given attempt number (0-indexed).
    ///
    /// Attempt 0 returns the randomized first delay unchanged; that draw is
    /// already this sequence's jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return self.first.min(self.max);
        }
        let exp = attempt.min(i32::MAX as u32) as i32;
        let jitter = rand::rng().random_range(1.0..1.5);
        let secs = self.first.as_secs_f64() * 2f64.powi(exp) * jitter;
        if !secs.is_finite() || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `action` until it succeeds, sleeping the policy delay between
/// failures. Returns `None` if `cancel` fires first (agent shutdown).
///
/// Failures are all treated alike: the network error taxonomy does not
/// distinguish unreachable hosts from malformed responses for retry
/// purposes.
pub(crate) async fn retry_until<T, F, Fut>(
    what: &str,
    cancel: &CancellationToken,
    mut action: F,
) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, AgentError>>,
{
    let policy = RetryPolicy::new();
    let mut attempt: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return None;
        }
        match action().await {
            Ok(value) => return Some(value),
            Err(err) => {
                let delay = policy.delay(attempt);
                attempt = attempt.saturating_add(1);
                log::warn!(
                    "[PushAgent] {} failed (attempt {}), retrying in {:.1}s: {}",
                    what,
                    attempt,
                    delay.as_secs_f64(),
                    err
                );
                tokio::select! {
                    _ = cancel.cancelled() => return None,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}
