use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use log::{debug, info};

use crate::cache::AccessTracker;
use crate::hours::{MarketHoursOracle, MarketSession};
use crate::models::{normalize_symbol, Quote};

/// Cache tuning knobs.
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Fallback TTL when a session-specific TTL is not configured.
    pub default_ttl_minutes: i64,
    /// TTL applied while the market is in regular hours.
    pub market_hours_ttl_minutes: i64,
    /// TTL applied outside regular hours.
    pub after_hours_ttl_minutes: i64,
    /// Maximum cached quotes before the oldest entry is evicted.
    pub max_entries: usize,
    /// Whether [`PriceCache::warm`] does anything.
    pub warmup_enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_minutes: 5,
            market_hours_ttl_minutes: 1,
            after_hours_ttl_minutes: 15,
            max_entries: 1000,
            warmup_enabled: true,
        }
    }
}

/// A cached quote plus the freshness metadata fixed at write time.
///
/// Staleness is purely a function of `cached_at` and `ttl_minutes`; the
/// market session is never re-consulted for entries already stored.
#[derive(Clone, Debug)]
struct CacheEntry {
    quote: Quote,
    cached_at: DateTime<Utc>,
    ttl_minutes: i64,
}

impl CacheEntry {
    fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now < self.cached_at + Duration::minutes(self.ttl_minutes.max(0))
    }
}

enum Lookup {
    Fresh(Quote),
    Stale,
    Absent,
}

/// Snapshot of cache counters.
#[derive(Clone, Debug)]
pub struct CacheStatistics {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub current_size: usize,
    pub max_size: usize,
    pub tracked_symbols: usize,
    pub top_symbols: Vec<String>,
}

/// In-memory quote cache with session-aware TTLs.
///
/// The TTL for an entry is decided when the entry is written, based on the
/// market session at that moment: a short TTL during regular hours, a long
/// one otherwise. Reads evict stale entries on contact. All mutation is
/// per-key through the underlying concurrent map; there is no global lock.
///
/// The size counter is advisory (used for statistics only); `DashMap::len`
/// remains the source of truth for capacity decisions.
pub struct PriceCache {
    entries: DashMap<String, CacheEntry>,
    oracle: Arc<MarketHoursOracle>,
    tracker: Arc<AccessTracker>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    size: AtomicUsize,
}

impl PriceCache {
    pub fn new(
        oracle: Arc<MarketHoursOracle>,
        tracker: Arc<AccessTracker>,
        config: CacheConfig,
    ) -> Self {
        Self {
            entries: DashMap::new(),
            oracle,
            tracker,
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            size: AtomicUsize::new(0),
        }
    }

    /// Get a fresh quote for a symbol, evicting the entry if it went stale.
    pub fn get(&self, symbol: &str) -> Option<Quote> {
        let key = normalize_symbol(symbol);
        if key.is_empty() {
            return None;
        }
        let now = Utc::now();
        self.tracker.record_at(&key, now);
        self.get_normalized(&key, now)
    }

    /// Get fresh quotes for several symbols at once.
    ///
    /// A miss or stale entry for one symbol never affects the others; absent
    /// symbols are simply missing from the result map.
    pub fn get_batch(&self, symbols: &[String]) -> std::collections::HashMap<String, Quote> {
        let mut results = std::collections::HashMap::new();
        if symbols.is_empty() {
            return results;
        }
        let now = Utc::now();
        for symbol in symbols {
            let key = normalize_symbol(symbol);
            if key.is_empty() {
                continue;
            }
            self.tracker.record_at(&key, now);
            if let Some(quote) = self.get_normalized(&key, now) {
                results.insert(key, quote);
            }
        }
        debug!(
            "Batch cache lookup: {} hits out of {} symbols",
            results.len(),
            symbols.len()
        );
        results
    }

    /// Store a quote with a TTL derived from the current market session.
    pub fn put(&self, quote: Quote) {
        self.put_at(quote, Utc::now());
    }

    pub(crate) fn put_at(&self, quote: Quote, now: DateTime<Utc>) {
        if !quote.is_valid() {
            debug!("Not caching invalid quote for {:?}", quote.symbol);
            return;
        }
        let key = normalize_symbol(&quote.symbol);
        if key.is_empty() {
            return;
        }
        self.tracker.record_at(&key, now);
        let ttl = self.ttl_for_session(self.oracle.session_at(now));
        self.insert_entry(key, quote, now, ttl);
    }

    /// Store several quotes under a single timestamp.
    ///
    /// Using one timestamp (and one TTL decision) for the whole batch keeps
    /// entries written together expiring together.
    pub fn put_batch(&self, quotes: Vec<Quote>) {
        if quotes.is_empty() {
            return;
        }
        let now = Utc::now();
        let ttl = self.ttl_for_session(self.oracle.session_at(now));
        let mut cached = 0usize;
        for quote in quotes {
            if !quote.is_valid() {
                debug!("Not caching invalid quote for {:?}", quote.symbol);
                continue;
            }
            let key = normalize_symbol(&quote.symbol);
            if key.is_empty() {
                continue;
            }
            self.tracker.record_at(&key, now);
            self.insert_entry(key, quote, now, ttl);
            cached += 1;
        }
        info!("Batch cached {} quotes", cached);
    }

    /// Remove a symbol's entry. Calling this twice is a harmless no-op the
    /// second time; the size counter is only decremented when an entry was
    /// actually removed.
    pub fn invalidate(&self, symbol: &str) {
        let key = normalize_symbol(symbol);
        if key.is_empty() {
            return;
        }
        if self.entries.remove(&key).is_some() {
            self.decrement_size();
            debug!("Invalidated cache entry for {}", key);
        }
    }

    /// Remove entries for several symbols.
    pub fn invalidate_batch(&self, symbols: &[String]) {
        let mut removed = 0usize;
        for symbol in symbols {
            let key = normalize_symbol(symbol);
            if key.is_empty() {
                continue;
            }
            if self.entries.remove(&key).is_some() {
                self.decrement_size();
                removed += 1;
            }
        }
        info!("Invalidated cache entries for {} symbols", removed);
    }

    /// Drop every cached quote.
    pub fn clear(&self) {
        self.entries.clear();
        self.size.store(0, Ordering::Relaxed);
        info!("Cleared market data cache");
    }

    /// Age of a symbol's entry, fresh or not.
    ///
    /// A statistics/scheduling peek: does not count as an access and does
    /// not touch the hit/miss counters.
    pub fn age_of(&self, symbol: &str) -> Option<Duration> {
        let key = normalize_symbol(symbol);
        self.entries
            .get(&key)
            .map(|entry| Utc::now() - entry.cached_at)
    }

    /// The most frequently accessed symbols, for warmup and off-hours
    /// refresh prioritization.
    pub fn frequently_accessed_symbols(&self, limit: usize) -> Vec<String> {
        self.tracker.top_symbols(limit)
    }

    /// Mark symbols as hot so the scheduler prioritizes them.
    ///
    /// The actual background fetch is the scheduler's job; warming only
    /// seeds the access tracker.
    pub fn warm(&self, symbols: &[String]) {
        if !self.config.warmup_enabled || symbols.is_empty() {
            return;
        }
        info!("Starting cache warmup for {} symbols", symbols.len());
        for symbol in symbols {
            let key = normalize_symbol(symbol);
            if !key.is_empty() {
                self.tracker.record(&key);
            }
        }
    }

    /// Drop access-tracking records idle for more than seven days.
    pub fn prune_access_tracking(&self) {
        self.tracker.prune(Utc::now() - Duration::days(7));
        debug!("Pruned idle access tracking records");
    }

    /// Counter snapshot.
    pub fn statistics(&self) -> CacheStatistics {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };
        CacheStatistics {
            hits,
            misses,
            hit_rate,
            current_size: self.size.load(Ordering::Relaxed),
            max_size: self.config.max_entries,
            tracked_symbols: self.tracker.tracked_count(),
            top_symbols: self.tracker.top_symbols(10),
        }
    }

    /// The TTL a quote written during `session` receives, in minutes.
    pub fn ttl_for_session(&self, session: MarketSession) -> i64 {
        let ttl = match session {
            MarketSession::Regular => self.config.market_hours_ttl_minutes,
            _ => self.config.after_hours_ttl_minutes,
        };
        if ttl > 0 {
            ttl
        } else {
            self.config.default_ttl_minutes
        }
    }

    fn get_normalized(&self, key: &str, now: DateTime<Utc>) -> Option<Quote> {
        let lookup = {
            match self.entries.get(key) {
                None => Lookup::Absent,
                Some(entry) if entry.is_fresh_at(now) => Lookup::Fresh(entry.quote.clone()),
                Some(_) => Lookup::Stale,
            }
        };
        match lookup {
            Lookup::Fresh(quote) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit for {}", key);
                Some(quote)
            }
            Lookup::Stale => {
                if self.entries.remove(key).is_some() {
                    self.decrement_size();
                    debug!("Evicted stale cache entry for {}", key);
                }
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Lookup::Absent => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Cache miss for {}", key);
                None
            }
        }
    }

    fn insert_entry(&self, key: String, quote: Quote, cached_at: DateTime<Utc>, ttl_minutes: i64) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.config.max_entries {
            self.evict_oldest();
        }
        let previous = self.entries.insert(
            key.clone(),
            CacheEntry {
                quote,
                cached_at,
                ttl_minutes,
            },
        );
        if previous.is_none() {
            self.size.fetch_add(1, Ordering::Relaxed);
        }
        debug!("Cached quote for {} with TTL {} minutes", key, ttl_minutes);
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().cached_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            if self.entries.remove(&key).is_some() {
                self.decrement_size();
                debug!("Evicted oldest cache entry {} to respect capacity", key);
            }
        }
    }

    fn decrement_size(&self) {
        let _ = self
            .size
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }
}
