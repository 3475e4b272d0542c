//! Scripted provider doubles shared across the crate's tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::errors::MarketDataError;
use crate::models::{DataSource, Quote};
use crate::provider::{HoldingsDirectory, QuoteProvider};

/// Failure the mock should produce.
#[derive(Clone, Copy, Debug)]
pub(crate) enum MockFailure {
    NotFound,
    Server,
    Timeout,
}

impl MockFailure {
    fn into_error(self, symbol: &str) -> MarketDataError {
        match self {
            Self::NotFound => MarketDataError::SymbolNotFound(symbol.to_string()),
            Self::Server => MarketDataError::ServerError {
                provider: "MOCK".to_string(),
                status: 503,
            },
            Self::Timeout => MarketDataError::Timeout {
                provider: "MOCK".to_string(),
            },
        }
    }
}

/// Quote provider with a scripted failure pattern.
pub(crate) struct MockQuoteProvider {
    failure: Option<MockFailure>,
    /// Calls that fail before the provider turns healthy; `u32::MAX`
    /// means it never recovers.
    fail_first: u32,
    delay: Option<Duration>,
    calls: Arc<AtomicU32>,
    in_flight: Arc<AtomicU32>,
    peak_concurrency: Arc<AtomicU32>,
}

impl MockQuoteProvider {
    pub(crate) fn healthy() -> Self {
        Self {
            failure: None,
            fail_first: 0,
            delay: None,
            calls: Arc::new(AtomicU32::new(0)),
            in_flight: Arc::new(AtomicU32::new(0)),
            peak_concurrency: Arc::new(AtomicU32::new(0)),
        }
    }

    pub(crate) fn always_failing(failure: MockFailure) -> Self {
        Self {
            failure: Some(failure),
            fail_first: u32::MAX,
            ..Self::healthy()
        }
    }

    pub(crate) fn failing_then_healthy(failure: MockFailure, fail_first: u32) -> Self {
        Self {
            failure: Some(failure),
            fail_first,
            ..Self::healthy()
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn call_counter(&self) -> Arc<AtomicU32> {
        self.calls.clone()
    }

    pub(crate) fn peak_concurrency_counter(&self) -> Arc<AtomicU32> {
        self.peak_concurrency.clone()
    }

    fn quote_for(symbol: &str) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            current_price: Decimal::from(100),
            daily_change: Decimal::ONE,
            daily_change_percent: Decimal::ONE,
            open_price: Decimal::from(99),
            high_price: Decimal::from(101),
            low_price: Decimal::from(98),
            previous_close: Decimal::from(99),
            is_market_open: true,
            data_source: DataSource::Finnhub,
            fetched_at: Utc::now(),
            has_error: false,
            error_message: None,
        }
    }
}

#[async_trait]
impl QuoteProvider for MockQuoteProvider {
    fn id(&self) -> &'static str {
        "MOCK"
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let concurrent = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_concurrency.fetch_max(concurrent, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.failure {
            Some(failure) if call < self.fail_first => Err(failure.into_error(symbol)),
            _ => Ok(Self::quote_for(symbol)),
        }
    }
}

/// Fixed holdings directory for scheduler tests.
pub(crate) struct StaticHoldings {
    symbols: Vec<String>,
}

impl StaticHoldings {
    pub(crate) fn new(symbols: &[&str]) -> Self {
        Self {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl HoldingsDirectory for StaticHoldings {
    async fn active_symbols(&self, _since: DateTime<Utc>) -> Vec<String> {
        self.symbols.clone()
    }

    async fn all_symbols(&self) -> Vec<String> {
        self.symbols.clone()
    }
}
