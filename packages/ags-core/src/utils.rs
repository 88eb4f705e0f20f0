//! General utilities shared across the application.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::Instant;

// ─────────────────────────────────────────────────────────────────────────────
// Time Utilities
// ─────────────────────────────────────────────────────────────────────────────

/// Returns the current Unix timestamp in milliseconds.
///
/// Returns 0 if the system clock is before the Unix epoch (shouldn't happen in practice).
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Polling
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of [`poll_until`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The predicate held after this many checks.
    Satisfied { attempts: u32 },
    /// The timeout elapsed first. Not an error: callers proceed best-effort.
    TimedOut { attempts: u32 },
}

impl PollOutcome {
    pub fn is_satisfied(self) -> bool {
        matches!(self, Self::Satisfied { .. })
    }
}

/// Checks `predicate` every `interval` until it holds or `timeout` elapses.
///
/// The predicate is checked immediately, then after each interval. It is
/// always checked at least once, even with a zero timeout.
pub async fn poll_until<F>(interval: Duration, timeout: Duration, mut predicate: F) -> PollOutcome
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    let mut attempts = 0;
    loop {
        attempts += 1;
        if predicate() {
            return PollOutcome::Satisfied { attempts };
        }
        let now = Instant::now();
        if now >= deadline {
            return PollOutcome::TimedOut { attempts };
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn poll_until_returns_when_predicate_holds() {
        let mut calls = 0;
        let outcome = poll_until(Duration::from_millis(100), Duration::from_secs(5), || {
            calls += 1;
            calls == 3
        })
        .await;
        assert_eq!(outcome, PollOutcome::Satisfied { attempts: 3 });
    }

    #[tokio::test(start_paused = true)]
    async fn poll_until_gives_up_at_timeout() {
        let start = Instant::now();
        let outcome = poll_until(Duration::from_millis(100), Duration::from_secs(1), || false).await;
        assert!(!outcome.is_satisfied());
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_until_checks_once_with_zero_timeout() {
        let outcome = poll_until(Duration::from_millis(100), Duration::ZERO, || false).await;
        assert_eq!(outcome, PollOutcome::TimedOut { attempts: 1 });
    }
}
