//! Circuit breaker guarding the quote provider.
//!
//! Two states only: Closed (calls allowed) and Open (calls suspended).
//! Recovery is purely timeout-based: once the cooldown has elapsed since
//! the last failure, the next [`is_open`](CircuitBreaker::is_open) check
//! closes the circuit and zeroes the failure counter. There is no
//! half-open probe phase. The state is in-memory and resets on restart.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{info, warn};

/// Default number of consecutive failures before opening the circuit.
const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default cooldown before an open circuit closes again.
const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

/// Circuit breaker configuration.
#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long calls stay suspended after the circuit opens.
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

#[derive(Debug, Default)]
struct BreakerState {
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    open: bool,
}

/// Snapshot of the breaker for diagnostics.
#[derive(Clone, Debug)]
pub struct BreakerStatistics {
    pub consecutive_failures: u32,
    pub open: bool,
    pub last_failure_age: Option<Duration>,
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

/// Consecutive-failure circuit breaker with timeout-based recovery.
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    /// Create a breaker with default settings.
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    /// Create a breaker with custom configuration.
    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            state: Mutex::new(BreakerState::default()),
            config,
        }
    }

    /// Lock the state mutex, recovering from poison if necessary.
    ///
    /// For circuit breakers it's safe to recover from a poisoned mutex
    /// since the worst case is slightly incorrect circuit state, which is
    /// better than panicking.
    fn lock_state(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Circuit breaker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Whether calls are currently suspended.
    ///
    /// Evaluating this is what closes the circuit: when the cooldown has
    /// elapsed since the last failure, the circuit closes and the failure
    /// counter resets to zero.
    pub fn is_open(&self) -> bool {
        let mut state = self.lock_state();
        if !state.open {
            return false;
        }
        let cooled_down = state
            .last_failure_at
            .map(|at| at.elapsed() > self.config.cooldown)
            .unwrap_or(true);
        if cooled_down {
            state.open = false;
            state.consecutive_failures = 0;
            info!("Circuit breaker closed, resuming provider calls");
            return false;
        }
        true
    }

    /// Record a successful call, resetting the failure counter.
    pub fn record_success(&self) {
        let mut state = self.lock_state();
        if state.consecutive_failures > 0 {
            state.consecutive_failures = 0;
        }
    }

    /// Record a failed call. Opens the circuit once the threshold is hit.
    pub fn record_failure(&self) {
        let mut state = self.lock_state();
        state.consecutive_failures += 1;
        state.last_failure_at = Some(Instant::now());
        warn!(
            "Provider failure recorded, consecutive failures: {}",
            state.consecutive_failures
        );
        if state.consecutive_failures >= self.config.failure_threshold && !state.open {
            state.open = true;
            info!(
                "Circuit breaker opened after {} consecutive failures, suspending calls for {:?}",
                state.consecutive_failures, self.config.cooldown
            );
        }
    }

    /// Manually close the circuit and reset the counter.
    pub fn reset(&self) {
        let mut state = self.lock_state();
        state.open = false;
        state.consecutive_failures = 0;
        state.last_failure_at = None;
        info!("Circuit breaker manually reset");
    }

    /// Diagnostic snapshot. Does not trigger the timeout-based close.
    pub fn statistics(&self) -> BreakerStatistics {
        let state = self.lock_state();
        BreakerStatistics {
            consecutive_failures: state.consecutive_failures,
            open: state.open,
            last_failure_age: state.last_failure_at.map(|at| at.elapsed()),
            failure_threshold: self.config.failure_threshold,
            cooldown: self.config.cooldown,
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_closed() {
        let breaker = CircuitBreaker::new();
        assert!(!breaker.is_open());
    }

    #[test]
    fn test_opens_at_exact_threshold() {
        let breaker = CircuitBreaker::with_config(CircuitBreakerConfig {
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
        });

        for _ in 0..4 {
            breaker.record_failure();
            assert!(!breaker.is_open());
        }
        breaker.record_failure();
        assert!(breaker.is_open());
    }

    #[test]
    fn test_success_resets_failure_count() {
        let breaker = CircuitBreaker::with_config(CircuitBreakerConfig {
            failure_threshold: 3,
            cooldown: Duration::from_secs(60),
        });

        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        assert_eq!(breaker.statistics().consecutive_failures, 0);

        // Two more failures should not open the circuit after the reset.
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_open());
    }

    #[test]
    fn test_closes_after_cooldown_and_resets_counter() {
        let breaker = CircuitBreaker::with_config(CircuitBreakerConfig {
            failure_threshold: 1,
            cooldown: Duration::from_millis(50),
        });

        breaker.record_failure();
        assert!(breaker.is_open());

        std::thread::sleep(Duration::from_millis(70));

        // The is_open evaluation itself closes the circuit.
        assert!(!breaker.is_open());
        assert_eq!(breaker.statistics().consecutive_failures, 0);
    }

    #[test]
    fn test_stays_open_within_cooldown() {
        let breaker = CircuitBreaker::with_config(CircuitBreakerConfig {
            failure_threshold: 1,
            cooldown: Duration::from_secs(60),
        });

        breaker.record_failure();
        assert!(breaker.is_open());
        assert!(breaker.is_open());
    }

    #[test]
    fn test_manual_reset() {
        let breaker = CircuitBreaker::with_config(CircuitBreakerConfig {
            failure_threshold: 1,
            cooldown: Duration::from_secs(60),
        });

        breaker.record_failure();
        assert!(breaker.is_open());

        breaker.reset();
        assert!(!breaker.is_open());
        assert_eq!(breaker.statistics().consecutive_failures, 0);
        assert!(breaker.statistics().last_failure_age.is_none());
    }

    #[test]
    fn test_statistics_snapshot() {
        let breaker = CircuitBreaker::new();
        breaker.record_failure();
        breaker.record_failure();

        let stats = breaker.statistics();
        assert_eq!(stats.consecutive_failures, 2);
        assert!(!stats.open);
        assert!(stats.last_failure_age.is_some());
        assert_eq!(stats.failure_threshold, 5);
    }
}
