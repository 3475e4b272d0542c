//! Quote provider boundary and concrete provider implementations.

mod finnhub;
mod traits;
mod yahoo;

#[cfg(test)]
pub(crate) mod testing;

pub use finnhub::FinnhubProvider;
pub use traits::{HoldingsDirectory, QuoteProvider};
pub use yahoo::YahooProvider;
