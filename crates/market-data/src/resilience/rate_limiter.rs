//! Sliding-window rate limiting for outbound provider calls.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::warn;

/// Span of the sliding window.
const WINDOW: Duration = Duration::from_secs(60);

/// Default number of calls allowed per window.
const DEFAULT_REQUESTS_PER_MINUTE: u32 = 60;

/// Default cap on how long a caller may be held back.
const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(5);

/// Rate limiter configuration.
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    /// Calls allowed per provider within any 60 second window.
    pub requests_per_minute: u32,
    /// Longest a single acquisition will wait before proceeding anyway.
    pub max_wait: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }
}

/// Per-provider sliding-window rate limiter.
///
/// Each provider key gets its own window of call timestamps. When the
/// window is full, [`acquire`](Self::acquire) waits for the oldest entry
/// to age out, but never longer than the configured maximum. A full
/// window after the wait cap is logged and the call proceeds; the limit
/// is a courtesy to the provider, not a hard guarantee.
pub struct SlidingWindowRateLimiter {
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
    config: RateLimitConfig,
}

impl SlidingWindowRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            config,
        }
    }

    fn lock_windows(&self) -> MutexGuard<'_, HashMap<String, VecDeque<Instant>>> {
        self.windows.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Record a call for `provider`, waiting if the window is full.
    ///
    /// Returns once the call has been admitted. Waits are bounded by the
    /// configured maximum; after that the call is admitted regardless.
    pub async fn acquire(&self, provider: &str) {
        let deadline = Instant::now() + self.config.max_wait;
        loop {
            let wait = {
                let mut windows = self.lock_windows();
                let window = windows.entry(provider.to_string()).or_default();
                let now = Instant::now();
                Self::expire(window, now);

                if window.len() < self.config.requests_per_minute as usize {
                    window.push_back(now);
                    return;
                }
                if now >= deadline {
                    warn!(
                        "Rate limit window for {} still full after {:?}, proceeding",
                        provider, self.config.max_wait
                    );
                    window.push_back(now);
                    return;
                }
                // Until the oldest call ages out, capped by the deadline.
                let oldest_expires = window
                    .front()
                    .map(|oldest| (*oldest + WINDOW).saturating_duration_since(now))
                    .unwrap_or(Duration::ZERO);
                oldest_expires.min(deadline - now).max(Duration::from_millis(10))
            };
            tokio::time::sleep(wait).await;
        }
    }

    /// Record a call for `provider` only if the window has room.
    pub fn try_acquire(&self, provider: &str) -> bool {
        let mut windows = self.lock_windows();
        let window = windows.entry(provider.to_string()).or_default();
        let now = Instant::now();
        Self::expire(window, now);

        if window.len() < self.config.requests_per_minute as usize {
            window.push_back(now);
            true
        } else {
            false
        }
    }

    /// Calls currently counted against `provider`'s window.
    pub fn window_len(&self, provider: &str) -> usize {
        let mut windows = self.lock_windows();
        match windows.get_mut(provider) {
            Some(window) => {
                Self::expire(window, Instant::now());
                window.len()
            }
            None => 0,
        }
    }

    fn expire(window: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = window.front() {
            if now.duration_since(*oldest) >= WINDOW {
                window.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for SlidingWindowRateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_acquire_up_to_limit() {
        let limiter = SlidingWindowRateLimiter::new(RateLimitConfig {
            requests_per_minute: 3,
            max_wait: Duration::from_secs(5),
        });

        assert!(limiter.try_acquire("finnhub"));
        assert!(limiter.try_acquire("finnhub"));
        assert!(limiter.try_acquire("finnhub"));
        assert!(!limiter.try_acquire("finnhub"));
        assert_eq!(limiter.window_len("finnhub"), 3);
    }

    #[test]
    fn test_providers_have_independent_windows() {
        let limiter = SlidingWindowRateLimiter::new(RateLimitConfig {
            requests_per_minute: 1,
            max_wait: Duration::from_secs(5),
        });

        assert!(limiter.try_acquire("finnhub"));
        assert!(!limiter.try_acquire("finnhub"));
        assert!(limiter.try_acquire("yahoo"));
    }

    #[tokio::test]
    async fn test_acquire_under_limit_is_immediate() {
        let limiter = SlidingWindowRateLimiter::default();
        let start = Instant::now();
        limiter.acquire("finnhub").await;
        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(limiter.window_len("finnhub"), 1);
    }

    #[tokio::test]
    async fn test_acquire_proceeds_after_max_wait() {
        let limiter = SlidingWindowRateLimiter::new(RateLimitConfig {
            requests_per_minute: 1,
            max_wait: Duration::from_millis(50),
        });

        limiter.acquire("finnhub").await;

        // Window is full and won't drain for ~60s, so this call is
        // admitted once the wait cap elapses.
        let start = Instant::now();
        limiter.acquire("finnhub").await;
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(40));
        assert!(waited < Duration::from_secs(2));
        assert_eq!(limiter.window_len("finnhub"), 2);
    }

    #[test]
    fn test_unknown_provider_window_is_empty() {
        let limiter = SlidingWindowRateLimiter::default();
        assert_eq!(limiter.window_len("nobody"), 0);
    }
}
