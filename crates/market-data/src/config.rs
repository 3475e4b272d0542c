//! Recognized configuration surface for the market data subsystem.
//!
//! A single flat [`MarketDataConfig`] mirrors the deployment configuration
//! keys; each subsystem pulls its own typed sub-config from it via the
//! accessor methods. Every field has a production default, so a fully
//! defaulted config is usable as-is.

use std::time::Duration;

use serde::Deserialize;

use crate::cache::CacheConfig;
use crate::resilience::{CircuitBreakerConfig, RateLimitConfig, RetryConfig};
use crate::scheduler::SchedulerConfig;

/// Configuration for the market data cache, resilience, and scheduler.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MarketDataConfig {
    /// Fallback cache TTL in minutes when the session-specific TTLs are unset.
    pub cache_ttl_minutes: i64,
    /// Cache TTL in minutes while the market is open.
    pub market_hours_ttl_minutes: i64,
    /// Cache TTL in minutes outside regular trading hours.
    pub after_hours_ttl_minutes: i64,
    /// Maximum number of cached quotes before the oldest entry is evicted.
    pub max_cache_entries: usize,
    /// Whether cache warmup (pre-open refresh of hot symbols) is enabled.
    pub warmup_enabled: bool,

    /// Delay in seconds before the scheduler's first cycle.
    pub refresh_interval_seconds: u64,
    /// Number of symbols fetched per provider batch.
    pub batch_size: usize,
    /// Maximum scheduler-driven batch operations in flight at once.
    pub max_concurrent_updates: usize,
    /// Whether the background refresh scheduler runs at all.
    pub scheduler_enabled: bool,

    /// Maximum provider attempts per call (first try included).
    pub retry_max_attempts: u32,
    /// Initial retry backoff delay in milliseconds.
    pub retry_initial_delay_ms: u64,
    /// Upper bound on the retry backoff delay in milliseconds.
    pub retry_max_delay_ms: u64,

    /// Consecutive failures before the circuit breaker opens.
    pub circuit_breaker_failure_threshold: u32,
    /// Cooldown in milliseconds before an open circuit closes again.
    pub circuit_breaker_cooldown_ms: u64,

    /// Provider requests allowed per sliding 60-second window.
    pub rate_limit_per_minute: u32,

    /// IANA timezone of the tracked exchange.
    pub market_timezone: String,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            cache_ttl_minutes: 5,
            market_hours_ttl_minutes: 1,
            after_hours_ttl_minutes: 15,
            max_cache_entries: 1000,
            warmup_enabled: true,
            refresh_interval_seconds: 300,
            batch_size: 20,
            max_concurrent_updates: 5,
            scheduler_enabled: true,
            retry_max_attempts: 3,
            retry_initial_delay_ms: 1000,
            retry_max_delay_ms: 10_000,
            circuit_breaker_failure_threshold: 5,
            circuit_breaker_cooldown_ms: 60_000,
            rate_limit_per_minute: 60,
            market_timezone: "America/New_York".to_string(),
        }
    }
}

impl MarketDataConfig {
    /// Cache sub-config.
    pub fn cache(&self) -> CacheConfig {
        CacheConfig {
            default_ttl_minutes: self.cache_ttl_minutes,
            market_hours_ttl_minutes: self.market_hours_ttl_minutes,
            after_hours_ttl_minutes: self.after_hours_ttl_minutes,
            max_entries: self.max_cache_entries,
            warmup_enabled: self.warmup_enabled,
        }
    }

    /// Retry sub-config.
    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.retry_max_attempts,
            initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }

    /// Circuit breaker sub-config.
    pub fn circuit_breaker(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.circuit_breaker_failure_threshold,
            cooldown: Duration::from_millis(self.circuit_breaker_cooldown_ms),
        }
    }

    /// Rate limiter sub-config.
    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            requests_per_minute: self.rate_limit_per_minute,
            max_wait: RateLimitConfig::default().max_wait,
        }
    }

    /// Scheduler sub-config.
    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            enabled: self.scheduler_enabled,
            initial_delay: Duration::from_secs(self.refresh_interval_seconds),
            batch_size: self.batch_size,
            max_concurrent_updates: self.max_concurrent_updates,
            warmup_enabled: self.warmup_enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_deployment_defaults() {
        let config = MarketDataConfig::default();
        assert_eq!(config.cache_ttl_minutes, 5);
        assert_eq!(config.market_hours_ttl_minutes, 1);
        assert_eq!(config.after_hours_ttl_minutes, 15);
        assert_eq!(config.max_cache_entries, 1000);
        assert_eq!(config.max_concurrent_updates, 5);
        assert_eq!(config.retry_max_attempts, 3);
        assert_eq!(config.circuit_breaker_failure_threshold, 5);
        assert_eq!(config.circuit_breaker_cooldown_ms, 60_000);
        assert_eq!(config.rate_limit_per_minute, 60);
        assert_eq!(config.market_timezone, "America/New_York");
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: MarketDataConfig =
            serde_json::from_str(r#"{"market_hours_ttl_minutes": 2, "scheduler_enabled": false}"#)
                .unwrap();
        assert_eq!(config.market_hours_ttl_minutes, 2);
        assert!(!config.scheduler_enabled);
        assert_eq!(config.after_hours_ttl_minutes, 15);
    }

    #[test]
    fn test_sub_configs() {
        let config = MarketDataConfig::default();
        assert_eq!(config.retry().initial_delay, Duration::from_secs(1));
        assert_eq!(config.retry().max_delay, Duration::from_secs(10));
        assert_eq!(config.circuit_breaker().cooldown, Duration::from_secs(60));
        assert_eq!(config.cache().max_entries, 1000);
        assert!(config.scheduler().enabled);
    }
}
