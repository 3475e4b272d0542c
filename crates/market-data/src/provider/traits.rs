use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::MarketDataError;
use crate::models::Quote;

/// A remote source of market quotes.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Stable identifier used for rate limiting and error attribution.
    fn id(&self) -> &'static str;

    /// Fetch the latest quote for a single symbol.
    ///
    /// One network call, no retries; callers go through the resilience
    /// pipeline for that.
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError>;
}

/// Source of the symbols the portfolio currently cares about.
///
/// Implemented by the holdings store of the surrounding application; this
/// crate only consumes it to decide what to refresh.
#[async_trait]
pub trait HoldingsDirectory: Send + Sync {
    /// Symbols accessed since the given instant.
    async fn active_symbols(&self, since: DateTime<Utc>) -> Vec<String>;

    /// Every symbol held, regardless of recency.
    async fn all_symbols(&self) -> Vec<String>;
}
