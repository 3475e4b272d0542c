//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all market data operations
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Errors that can occur during market data operations.
///
/// Each variant is classified into a [`RetryClass`] via the [`retry_class`](Self::retry_class)
/// method, which determines how the resilience guard should handle the error.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The requested symbol was not found by the provider.
    /// This is a terminal error - retrying won't help.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The symbol was empty or otherwise unusable before any provider call.
    #[error("Invalid symbol: {0:?}")]
    InvalidSymbol(String),

    /// The provider rejected the API key (HTTP 401/403).
    /// Retrying cannot fix a bad credential.
    #[error("Unauthorized: {provider} rejected the request")]
    Unauthorized {
        /// The provider that rejected the credentials
        provider: String,
    },

    /// The provider rate limited the request (HTTP 429).
    /// Should retry with exponential backoff.
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The provider returned a 5xx response.
    /// Should retry with exponential backoff.
    #[error("Server error: {provider} returned HTTP {status}")]
    ServerError {
        /// The provider that returned the error
        provider: String,
        /// The HTTP status code
        status: u16,
    },

    /// The request to the provider timed out.
    /// Should retry with exponential backoff.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// A network error occurred while communicating with a provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The provider returned a response body we could not interpret.
    #[error("Malformed response from {provider}: {message}")]
    MalformedResponse {
        /// The provider that returned the response
        provider: String,
        /// Description of the parse failure
        message: String,
    },

    /// The circuit breaker is open for this provider.
    /// Calls are suspended until the cooldown window elapses.
    #[error("Circuit open: {provider} is temporarily unavailable")]
    CircuitOpen {
        /// The provider with an open circuit
        provider: String,
    },

    /// All retry attempts were consumed without a successful response.
    /// This error feeds the circuit breaker's failure counter.
    #[error("Retries exhausted for {provider} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// The provider that kept failing
        provider: String,
        /// How many attempts were made
        attempts: u32,
        /// Display form of the final error
        last_error: String,
    },
}

impl MarketDataError {
    /// Returns the retry classification for this error.
    ///
    /// - [`RetryClass::Never`]: Don't retry, the error is terminal
    /// - [`RetryClass::WithBackoff`]: Retry with exponential backoff
    /// - [`RetryClass::CircuitOpen`]: Circuit is open, the provider was never called
    pub fn retry_class(&self) -> RetryClass {
        match self {
            // Terminal errors - never retry
            Self::SymbolNotFound(_)
            | Self::InvalidSymbol(_)
            | Self::Unauthorized { .. }
            | Self::MalformedResponse { .. }
            | Self::RetriesExhausted { .. } => RetryClass::Never,

            // Transient errors - retry with backoff
            Self::RateLimited { .. }
            | Self::ServerError { .. }
            | Self::Timeout { .. }
            | Self::Network(_) => RetryClass::WithBackoff,

            // Circuit breaker fast-fail
            Self::CircuitOpen { .. } => RetryClass::CircuitOpen,
        }
    }

    /// Whether this error counts against the provider's health.
    ///
    /// Not-found is a property of the symbol, not the provider, and a
    /// circuit-open fast-fail was produced without calling the provider;
    /// neither should push the breaker toward opening.
    pub fn is_provider_failure(&self) -> bool {
        !matches!(
            self,
            Self::SymbolNotFound(_) | Self::InvalidSymbol(_) | Self::CircuitOpen { .. }
        )
    }
}
