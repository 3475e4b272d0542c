//! Finnhub quote provider.
//!
//! Talks to the Finnhub `/quote` endpoint with token authentication. The
//! free tier allows 60 calls per minute; the resilience guard's rate
//! limiter is configured to match.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, error};

use crate::errors::MarketDataError;
use crate::hours::MarketHoursOracle;
use crate::models::{DataSource, Quote};
use crate::provider::QuoteProvider;

const BASE_URL: &str = "https://finnhub.io/api/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Body of a Finnhub `/quote` response.
///
/// Finnhub reports unknown symbols as HTTP 200 with every field zero, so
/// all fields stay optional and the zero case is detected after parsing.
#[derive(Debug, Deserialize)]
struct QuoteResponse {
    /// Current price
    c: Option<f64>,
    /// Change
    d: Option<f64>,
    /// Percent change
    dp: Option<f64>,
    /// Open price of the day
    o: Option<f64>,
    /// High price of the day
    h: Option<f64>,
    /// Low price of the day
    l: Option<f64>,
    /// Previous close price
    pc: Option<f64>,
}

/// Quote provider backed by the Finnhub REST API.
pub struct FinnhubProvider {
    client: reqwest::Client,
    api_key: String,
    oracle: Arc<MarketHoursOracle>,
}

impl FinnhubProvider {
    pub fn new(api_key: String, oracle: Arc<MarketHoursOracle>) -> Result<Self, MarketDataError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_key,
            oracle,
        })
    }

    fn classify_status(&self, status: StatusCode, symbol: &str) -> MarketDataError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => MarketDataError::Unauthorized {
                provider: self.id().to_string(),
            },
            StatusCode::NOT_FOUND => MarketDataError::SymbolNotFound(symbol.to_string()),
            StatusCode::TOO_MANY_REQUESTS => MarketDataError::RateLimited {
                provider: self.id().to_string(),
            },
            status if status.is_server_error() => MarketDataError::ServerError {
                provider: self.id().to_string(),
                status: status.as_u16(),
            },
            status => MarketDataError::MalformedResponse {
                provider: self.id().to_string(),
                message: format!("unexpected HTTP {} for {}", status, symbol),
            },
        }
    }

    fn decimal(&self, value: Option<f64>, field: &str) -> Result<Decimal, MarketDataError> {
        let value = value.unwrap_or(0.0);
        Decimal::try_from(value).map_err(|e| MarketDataError::MalformedResponse {
            provider: self.id().to_string(),
            message: format!("non-numeric {} value {}: {}", field, value, e),
        })
    }

    fn into_quote(&self, symbol: &str, body: QuoteResponse) -> Result<Quote, MarketDataError> {
        // Finnhub signals "no such symbol" with an all-zero 200 response.
        if body.c.unwrap_or(0.0) == 0.0 {
            return Err(MarketDataError::SymbolNotFound(symbol.to_string()));
        }

        Ok(Quote {
            symbol: symbol.to_string(),
            current_price: self.decimal(body.c, "c")?,
            daily_change: self.decimal(body.d, "d")?,
            daily_change_percent: self.decimal(body.dp, "dp")?,
            open_price: self.decimal(body.o, "o")?,
            high_price: self.decimal(body.h, "h")?,
            low_price: self.decimal(body.l, "l")?,
            previous_close: self.decimal(body.pc, "pc")?,
            is_market_open: self.oracle.is_market_open(),
            data_source: DataSource::Finnhub,
            fetched_at: Utc::now(),
            has_error: false,
            error_message: None,
        })
    }
}

#[async_trait]
impl QuoteProvider for FinnhubProvider {
    fn id(&self) -> &'static str {
        "FINNHUB"
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        if symbol.trim().is_empty() {
            return Err(MarketDataError::InvalidSymbol(symbol.to_string()));
        }

        debug!(symbol, "Fetching Finnhub quote");
        let url = format!("{}/quote", BASE_URL);
        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol)])
            .header("X-Finnhub-Token", &self.api_key)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MarketDataError::Timeout {
                        provider: "FINNHUB".to_string(),
                    }
                } else {
                    MarketDataError::Network(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let err = self.classify_status(status, symbol);
            error!(symbol, %status, "Finnhub request failed: {}", err);
            return Err(err);
        }

        let body: QuoteResponse =
            response
                .json()
                .await
                .map_err(|e| MarketDataError::MalformedResponse {
                    provider: self.id().to_string(),
                    message: e.to_string(),
                })?;

        self.into_quote(symbol, body)
    }
}
