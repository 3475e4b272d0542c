//! TTL-based quote caching and access frequency tracking.
//!
//! [`PriceCache`] is the keyed quote store; [`AccessTracker`] counts
//! per-symbol request frequency over a rolling window. Both are
//! process-wide singletons owned by whoever wires the subsystem together
//! and are safe under concurrent access from request threads and the
//! background scheduler.

mod access_tracker;
mod price_cache;

pub use access_tracker::AccessTracker;
pub use price_cache::{CacheConfig, CacheStatistics, PriceCache};
