//! Public price lookup surface.
//!
//! [`PriceService`] is what the rest of the application calls for prices.
//! It is cache-first: a fresh cached quote is returned without touching
//! the provider, and fetched quotes are written back so concurrent
//! callers converge on the cache.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};

use crate::cache::PriceCache;
use crate::errors::MarketDataError;
use crate::models::{normalize_symbol, Quote};
use crate::resilience::ResilienceGuard;

/// Cache-first quote lookup over the guarded provider.
pub struct PriceService {
    cache: Arc<PriceCache>,
    guard: Arc<ResilienceGuard>,
}

impl PriceService {
    pub fn new(cache: Arc<PriceCache>, guard: Arc<ResilienceGuard>) -> Self {
        Self { cache, guard }
    }

    /// Current price for one symbol.
    ///
    /// `Ok(None)` means the symbol does not exist upstream (or was blank);
    /// an `Err` means the price is genuinely unavailable right now and the
    /// caller should surface that rather than show nothing.
    pub async fn get_current_price(&self, symbol: &str) -> Result<Option<Quote>, MarketDataError> {
        let key = normalize_symbol(symbol);
        if key.is_empty() {
            return Ok(None);
        }

        if let Some(quote) = self.cache.get(&key) {
            return Ok(Some(quote));
        }

        match self.guard.fetch_quote(&key).await {
            Ok(quote) => {
                self.cache.put(quote.clone());
                Ok(Some(quote))
            }
            Err(MarketDataError::SymbolNotFound(_)) => {
                debug!("Symbol {} not found upstream", key);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Current prices for a set of symbols.
    ///
    /// Cache hits are served directly; misses go upstream as one bounded
    /// batch. Symbols that could not be resolved are absent from the map,
    /// never mapped to error placeholders.
    pub async fn get_current_prices(&self, symbols: &[String]) -> HashMap<String, Quote> {
        if symbols.is_empty() {
            return HashMap::new();
        }

        let mut results = self.cache.get_batch(symbols);
        let misses: Vec<String> = symbols
            .iter()
            .map(|s| normalize_symbol(s))
            .filter(|key| !key.is_empty() && !results.contains_key(key))
            .collect();
        if misses.is_empty() {
            return results;
        }

        debug!("Fetching {} symbols not served from cache", misses.len());
        let outcomes = self.guard.fetch_quotes_batch(&misses).await;

        let mut fetched = Vec::new();
        for (symbol, outcome) in outcomes {
            match outcome {
                Ok(quote) => fetched.push(quote),
                Err(err) => warn!("Could not fetch {}: {}", symbol, err),
            }
        }
        if !fetched.is_empty() {
            self.cache.put_batch(fetched.clone());
            for quote in fetched {
                results.insert(quote.symbol.clone(), quote);
            }
        }
        results
    }

    /// Cache statistics passthrough for status endpoints.
    pub fn cache_statistics(&self) -> crate::cache::CacheStatistics {
        self.cache.statistics()
    }
}
