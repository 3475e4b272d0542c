//! Market data caching and refresh subsystem for the dashboard backend.
//!
//! The crate is organized around a small set of cooperating components:
//!
//! - [`cache::PriceCache`]: in-memory quote cache whose TTLs depend on the
//!   market session at write time.
//! - [`resilience::ResilienceGuard`]: the only path to the quote provider,
//!   combining a circuit breaker, retry with backoff, and rate limiting.
//! - [`hours::MarketHoursOracle`]: classifies wall-clock time into trading
//!   sessions and picks refresh cadences.
//! - [`scheduler::RefreshScheduler`]: self-rescheduling background loop
//!   that keeps held symbols fresh.
//! - [`service::PriceService`]: the cache-first lookup surface the rest of
//!   the application uses.
//!
//! Wiring is left to the host application: construct the oracle, cache,
//! and guard, share them via [`std::sync::Arc`], and hand them to the
//! service and scheduler. [`config::MarketDataConfig`] carries every
//! tuning knob with production defaults.

pub mod cache;
pub mod config;
pub mod errors;
pub mod hours;
pub mod models;
pub mod provider;
pub mod resilience;
pub mod scheduler;
pub mod service;

pub use cache::{AccessTracker, CacheConfig, CacheStatistics, PriceCache};
pub use config::MarketDataConfig;
pub use errors::{MarketDataError, RetryClass};
pub use hours::{MarketHoursOracle, MarketSession};
pub use models::{normalize_symbol, DataSource, Quote};
pub use provider::{FinnhubProvider, HoldingsDirectory, QuoteProvider, YahooProvider};
pub use resilience::{
    CircuitBreaker, CircuitBreakerConfig, RateLimitConfig, ResilienceGuard, RetryConfig,
    RetryPolicy, SlidingWindowRateLimiter,
};
pub use scheduler::{RefreshScheduler, SchedulerConfig, SchedulerStatistics};
pub use service::PriceService;
