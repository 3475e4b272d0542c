//! Yahoo Finance quote provider.
//!
//! Fallback source using the public chart endpoint. No API key, but the
//! endpoint is unofficial and stricter about request volume, so it sits
//! behind the same resilience pipeline as Finnhub.

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

const BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    chart_previous_close: Option<f64>,
    regular_market_day_high: Option<f64>,
    regular_market_day_low: Option<f64>,
}

/// Quote provider backed by the Yahoo Finance chart API.
pub struct YahooProvider {
    client: reqwest::Client,
    oracle: Arc<MarketHoursOracle>,
}

impl YahooProvider {
    pub fn new(oracle: Arc<MarketHoursOracle>) -> Result<Self, MarketDataError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            // The endpoint rejects requests without a browser-like agent.
            .user_agent("Mozilla/5.0 (compatible; dashboard-market-data)")
            .build()?;
        Ok(Self { client, oracle })
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

    fn decimal(&self, value: f64, field: &str) -> Result<Decimal, MarketDataError> {
        Decimal::try_from(value).map_err(|e| MarketDataError::MalformedResponse {
            provider: self.id().to_string(),
            message: format!("non-numeric {} value {}: {}", field, value, e),
        })
    }

    fn into_quote(&self, symbol: &str, body: ChartResponse) -> Result<Quote, MarketDataError> {
        let meta = body
            .chart
            .result
            .and_then(|mut results| {
                if results.is_empty() {
                    None
                } else {
                    Some(results.remove(0).meta)
                }
            })
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

        let price = meta
            .regular_market_price
            .filter(|p| *p > 0.0)
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

        let current_price = self.decimal(price, "regularMarketPrice")?;
        let previous_close =
            self.decimal(meta.chart_previous_close.unwrap_or(0.0), "chartPreviousClose")?;
        let high_price =
            self.decimal(meta.regular_market_day_high.unwrap_or(0.0), "regularMarketDayHigh")?;
        let low_price =
            self.decimal(meta.regular_market_day_low.unwrap_or(0.0), "regularMarketDayLow")?;

        let mut quote = Quote {
            symbol: symbol.to_string(),
            current_price,
            daily_change: Decimal::ZERO,
            daily_change_percent: Decimal::ZERO,
            // The chart meta has no explicit open; previous close is the
            // closest stand-in the endpoint offers.
            open_price: previous_close,
            high_price,
            low_price,
            previous_close,
            is_market_open: self.oracle.is_market_open(),
            data_source: DataSource::Yahoo,
            fetched_at: Utc::now(),
            has_error: false,
            error_message: None,
        };

        if let Some((change, percent)) = quote.change_from_previous_close() {
            quote.daily_change = change;
            quote.daily_change_percent = percent;
        }
        Ok(quote)
    }
}

#[async_trait]
impl QuoteProvider for YahooProvider {
    fn id(&self) -> &'static str {
        "YAHOO"
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        if symbol.trim().is_empty() {
            return Err(MarketDataError::InvalidSymbol(symbol.to_string()));
        }

        debug!(symbol, "Fetching Yahoo quote");
        let url = format!("{}/{}", BASE_URL, symbol);
        let response = self
            .client
            .get(&url)
            .query(&[("interval", "1d"), ("range", "1d")])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MarketDataError::Timeout {
                        provider: "YAHOO".to_string(),
                    }
                } else {
                    MarketDataError::Network(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let err = self.classify_status(status, symbol);
            error!(symbol, %status, "Yahoo request failed: {}", err);
            return Err(err);
        }

        let body: ChartResponse =
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
