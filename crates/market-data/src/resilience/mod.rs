//! Provider-call resilience: circuit breaking, retry, and rate limiting.
//!
//! [`ResilienceGuard`] wraps a [`QuoteProvider`] and is the only path the
//! rest of the subsystem uses to reach it. Every call goes through the
//! same pipeline: circuit check, rate limit admission, then the retried
//! provider call, with the outcome fed back into the breaker.

mod circuit_breaker;
mod rate_limiter;
mod retry_policy;

pub use circuit_breaker::{BreakerStatistics, CircuitBreaker, CircuitBreakerConfig};
pub use rate_limiter::{RateLimitConfig, SlidingWindowRateLimiter};
pub use retry_policy::{RetryConfig, RetryPolicy};

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use log::debug;

use crate::errors::MarketDataError;
use crate::models::Quote;
use crate::provider::QuoteProvider;

/// Batch fetches run at most this many provider calls concurrently.
const FETCH_CONCURRENCY: usize = 3;

/// Resilient front door to a quote provider.
pub struct ResilienceGuard {
    provider: Arc<dyn QuoteProvider>,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
    limiter: SlidingWindowRateLimiter,
}

impl ResilienceGuard {
    pub fn new(
        provider: Arc<dyn QuoteProvider>,
        breaker_config: CircuitBreakerConfig,
        retry_config: RetryConfig,
        rate_limit_config: RateLimitConfig,
    ) -> Self {
        Self {
            provider,
            breaker: CircuitBreaker::with_config(breaker_config),
            retry: RetryPolicy::new(retry_config),
            limiter: SlidingWindowRateLimiter::new(rate_limit_config),
        }
    }

    /// Wrap a provider with default breaker, retry, and limiter settings.
    pub fn with_defaults(provider: Arc<dyn QuoteProvider>) -> Self {
        Self::new(
            provider,
            CircuitBreakerConfig::default(),
            RetryConfig::default(),
            RateLimitConfig::default(),
        )
    }

    /// Fetch one quote through the full resilience pipeline.
    ///
    /// Fails fast with [`MarketDataError::CircuitOpen`] while the breaker
    /// is open, without consuming rate limit budget.
    pub async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let provider_id = self.provider.id();

        if self.breaker.is_open() {
            debug!("Circuit open, skipping {} fetch for {}", provider_id, symbol);
            return Err(MarketDataError::CircuitOpen {
                provider: provider_id.to_string(),
            });
        }

        self.limiter.acquire(provider_id).await;

        let result = self
            .retry
            .run(provider_id, || self.provider.fetch_quote(symbol))
            .await;

        match &result {
            Ok(_) => self.breaker.record_success(),
            Err(err) => {
                // Symbol-level errors say nothing about provider health.
                if err.is_provider_failure() {
                    self.breaker.record_failure();
                } else {
                    self.breaker.record_success();
                }
            }
        }
        result
    }

    /// Fetch many quotes with bounded concurrency.
    ///
    /// Every requested symbol appears in the output exactly once, paired
    /// with its individual outcome. Order follows completion, not input.
    pub async fn fetch_quotes_batch(
        &self,
        symbols: &[String],
    ) -> Vec<(String, Result<Quote, MarketDataError>)> {
        let fetch = |symbol: &String| {
            let symbol = symbol.clone();
            async move {
                let outcome = self.fetch_quote(&symbol).await;
                (symbol, outcome)
            }
        };

        let mut pending = FuturesUnordered::new();
        let mut results = Vec::with_capacity(symbols.len());
        let mut iter = symbols.iter();

        for symbol in iter.by_ref().take(FETCH_CONCURRENCY) {
            pending.push(fetch(symbol));
        }
        while let Some(outcome) = pending.next().await {
            results.push(outcome);
            if let Some(symbol) = iter.next() {
                pending.push(fetch(symbol));
            }
        }
        results
    }

    /// Breaker diagnostics for status reporting.
    pub fn breaker_statistics(&self) -> BreakerStatistics {
        self.breaker.statistics()
    }

    /// Manually close the circuit.
    pub fn reset_breaker(&self) {
        self.breaker.reset();
    }
}
