//! Data models shared across the market data subsystem.

mod quote;

pub use quote::{DataSource, Quote};

/// Normalize a raw symbol to its canonical cache key form.
///
/// Trims surrounding whitespace and uppercases. An empty result means the
/// input was unusable.
pub fn normalize_symbol(raw: &str) -> String {
    raw.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol(" aapl "), "AAPL");
        assert_eq!(normalize_symbol("MSFT"), "MSFT");
        assert_eq!(normalize_symbol("  "), "");
    }
}
