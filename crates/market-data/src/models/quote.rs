use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Origin of a quote.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSource {
    /// Finnhub /quote endpoint
    Finnhub,
    /// Yahoo Finance chart endpoint
    Yahoo,
    /// Source could not be determined (error quotes)
    Unknown,
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Finnhub => write!(f, "FINNHUB"),
            Self::Yahoo => write!(f, "YAHOO"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Point-in-time price snapshot for a symbol.
///
/// `has_error`/`error_message` are part of the wire format the host
/// application serves; quotes flagged that way never pass
/// [`is_valid`](Self::is_valid) and are never cached.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Quote {
    /// Canonical uppercase symbol
    pub symbol: String,

    /// Latest traded price
    pub current_price: Decimal,

    /// Absolute change since the previous close
    pub daily_change: Decimal,

    /// Percentage change since the previous close
    pub daily_change_percent: Decimal,

    /// Opening price of the session
    pub open_price: Decimal,

    /// High of the session
    pub high_price: Decimal,

    /// Low of the session
    pub low_price: Decimal,

    /// Previous session's closing price
    pub previous_close: Decimal,

    /// Whether the exchange was in regular hours when the quote was taken
    pub is_market_open: bool,

    /// Which upstream produced the quote
    pub data_source: DataSource,

    /// When the quote was fetched
    pub fetched_at: DateTime<Utc>,

    /// Whether this quote represents a fetch failure
    pub has_error: bool,

    /// Human-readable reason when `has_error` is set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Quote {
    /// A quote is usable when it carries a symbol and a positive price.
    /// The cache refuses quotes that fail this check.
    pub fn is_valid(&self) -> bool {
        !self.has_error && !self.symbol.is_empty() && self.current_price > Decimal::ZERO
    }

    /// Recompute the daily change from the current price and previous close.
    ///
    /// Providers usually supply the change directly; this is the fallback
    /// for responses that omit it.
    pub fn change_from_previous_close(&self) -> Option<(Decimal, Decimal)> {
        if self.previous_close == Decimal::ZERO {
            return None;
        }
        let change = self.current_price - self.previous_close;
        let percent = change / self.previous_close * Decimal::from(100);
        Some((change, percent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_quote() -> Quote {
        Quote {
            symbol: "AAPL".to_string(),
            current_price: dec!(150.00),
            daily_change: dec!(3.00),
            daily_change_percent: dec!(2.04),
            open_price: dec!(148.00),
            high_price: dec!(151.00),
            low_price: dec!(147.50),
            previous_close: dec!(147.00),
            is_market_open: true,
            data_source: DataSource::Finnhub,
            fetched_at: Utc::now(),
            has_error: false,
            error_message: None,
        }
    }

    #[test]
    fn test_valid_quote() {
        assert!(sample_quote().is_valid());
    }

    #[test]
    fn test_error_flag_invalidates_quote() {
        let mut quote = sample_quote();
        quote.has_error = true;
        quote.error_message = Some("upstream unavailable".to_string());
        assert!(!quote.is_valid());
    }

    #[test]
    fn test_zero_price_invalidates_quote() {
        let mut quote = sample_quote();
        quote.current_price = Decimal::ZERO;
        assert!(!quote.is_valid());
    }

    #[test]
    fn test_change_from_previous_close() {
        let quote = sample_quote();
        let (change, percent) = quote.change_from_previous_close().unwrap();
        assert_eq!(change, dec!(3.00));
        // 3 / 147 * 100
        assert!((percent - dec!(2.0408)).abs() < dec!(0.001));
    }

    #[test]
    fn test_change_with_zero_previous_close() {
        let mut quote = sample_quote();
        quote.previous_close = Decimal::ZERO;
        assert!(quote.change_from_previous_close().is_none());
    }
}
