//! Background quote refresh scheduling.
//!
//! The scheduler is a self-rescheduling loop rather than a fixed-rate
//! timer: after each cycle it asks the market hours oracle how long to
//! sleep, so the cadence tightens during regular hours and relaxes when
//! the market is closed. Concurrency is capped with a slot counter; a
//! cycle that cannot get a slot is skipped, never queued.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use log::{debug, info, warn};

use crate::cache::PriceCache;
use crate::hours::MarketHoursOracle;
use crate::models::normalize_symbol;
use crate::provider::HoldingsDirectory;
use crate::resilience::ResilienceGuard;

/// Most symbols refreshed in one market-hours cycle.
const MAX_SYMBOLS_PER_CYCLE: usize = 100;

/// Most symbols refreshed in one off-hours cycle.
const MAX_OFF_HOURS_SYMBOLS: usize = 50;

/// Off-hours entries younger than this many minutes are left alone.
const OFF_HOURS_MIN_AGE_MINUTES: i64 = 30;

/// Holdings accessed within this many days count as active.
const ACTIVE_WINDOW_DAYS: i64 = 7;

/// Scheduler tuning knobs.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Whether the background loop runs at all.
    pub enabled: bool,
    /// Delay before the first refresh cycle.
    pub initial_delay: Duration,
    /// Symbols per provider batch.
    pub batch_size: usize,
    /// Maximum batch operations in flight at once.
    pub max_concurrent_updates: usize,
    /// Whether pre-open cache warmup runs.
    pub warmup_enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay: Duration::from_secs(300),
            batch_size: 20,
            max_concurrent_updates: 5,
            warmup_enabled: true,
        }
    }
}

/// Counter snapshot for status reporting.
#[derive(Clone, Debug)]
pub struct SchedulerStatistics {
    pub running: bool,
    pub active_updates: usize,
    pub total_updates: u64,
    pub failed_updates: u64,
    pub last_update: Option<DateTime<Utc>>,
}

struct SchedulerInner {
    guard: Arc<ResilienceGuard>,
    cache: Arc<PriceCache>,
    holdings: Arc<dyn HoldingsDirectory>,
    oracle: Arc<MarketHoursOracle>,
    config: SchedulerConfig,
    running: AtomicBool,
    active_updates: AtomicUsize,
    total_updates: AtomicU64,
    failed_updates: AtomicU64,
    last_update_millis: AtomicI64,
}

/// Session-aware background refresher for cached quotes.
pub struct RefreshScheduler {
    inner: Arc<SchedulerInner>,
}

impl RefreshScheduler {
    pub fn new(
        guard: Arc<ResilienceGuard>,
        cache: Arc<PriceCache>,
        holdings: Arc<dyn HoldingsDirectory>,
        oracle: Arc<MarketHoursOracle>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                guard,
                cache,
                holdings,
                oracle,
                config,
                running: AtomicBool::new(false),
                active_updates: AtomicUsize::new(0),
                total_updates: AtomicU64::new(0),
                failed_updates: AtomicU64::new(0),
                last_update_millis: AtomicI64::new(0),
            }),
        }
    }

    /// Start the background loop. Idempotent; a second call while the
    /// loop is running does nothing.
    pub fn start(&self) {
        if !self.inner.config.enabled {
            info!("Market data refresh scheduler is disabled");
            return;
        }
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            info!(
                "Market data refresh scheduler started, first cycle in {:?}",
                inner.config.initial_delay
            );
            tokio::time::sleep(inner.config.initial_delay).await;
            while inner.running.load(Ordering::SeqCst) {
                inner.run_cycle().await;
                let interval = inner.oracle.optimal_refresh_interval();
                debug!("Next refresh cycle in {:?}", interval);
                tokio::time::sleep(interval).await;
            }
            info!("Market data refresh scheduler stopped");
        });
    }

    /// Signal the loop to exit after its current sleep or cycle.
    pub fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
    }

    /// Refresh every held symbol right now, outside the regular cadence.
    ///
    /// Returns `false` when the concurrency cap rejected the request.
    pub async fn trigger_immediate_update(&self) -> bool {
        let symbols = self.inner.holdings.all_symbols().await;
        info!("Immediate update triggered for {} symbols", symbols.len());
        self.inner.update_symbols_guarded(&symbols).await
    }

    /// Refresh a caller-chosen set of symbols.
    ///
    /// Returns `false` when the concurrency cap rejected the request.
    pub async fn update_symbols(&self, symbols: &[String]) -> bool {
        self.inner.update_symbols_guarded(symbols).await
    }

    /// Seed the cache with the hottest symbols ahead of the open.
    ///
    /// A no-op outside trading days or when warmup is disabled.
    pub async fn warm_cache_for_open(&self) {
        if !self.inner.config.warmup_enabled {
            return;
        }
        if !self.inner.oracle.is_trading_day_now() {
            debug!("Skipping warmup, not a trading day");
            return;
        }
        let symbols = self
            .inner
            .cache
            .frequently_accessed_symbols(MAX_SYMBOLS_PER_CYCLE);
        if symbols.is_empty() {
            return;
        }
        info!("Pre-open warmup for {} symbols", symbols.len());
        self.inner.cache.warm(&symbols);
        self.inner.update_symbols_guarded(&symbols).await;
    }

    /// Counter snapshot.
    pub fn statistics(&self) -> SchedulerStatistics {
        let millis = self.inner.last_update_millis.load(Ordering::Relaxed);
        SchedulerStatistics {
            running: self.inner.running.load(Ordering::SeqCst),
            active_updates: self.inner.active_updates.load(Ordering::SeqCst),
            total_updates: self.inner.total_updates.load(Ordering::Relaxed),
            failed_updates: self.inner.failed_updates.load(Ordering::Relaxed),
            last_update: if millis > 0 {
                Utc.timestamp_millis_opt(millis).single()
            } else {
                None
            },
        }
    }

    /// Zero the update counters.
    pub fn reset_statistics(&self) {
        self.inner.total_updates.store(0, Ordering::Relaxed);
        self.inner.failed_updates.store(0, Ordering::Relaxed);
        self.inner.last_update_millis.store(0, Ordering::Relaxed);
    }
}

impl SchedulerInner {
    async fn run_cycle(&self) {
        let symbols = self.symbols_needing_update().await;
        if symbols.is_empty() {
            debug!("Refresh cycle found nothing to update");
            return;
        }
        self.update_symbols_guarded(&symbols).await;
        // Housekeeping piggybacks on the cycle.
        self.cache.prune_access_tracking();
    }

    /// Run a batch update inside a reserved concurrency slot.
    ///
    /// Returns `false` when every slot was taken; the update is rejected,
    /// never queued.
    async fn update_symbols_guarded(&self, symbols: &[String]) -> bool {
        if symbols.is_empty() {
            return true;
        }
        if !self.try_reserve_slot() {
            warn!(
                "Rejecting update of {} symbols, {} updates already in flight",
                symbols.len(),
                self.config.max_concurrent_updates
            );
            return false;
        }
        self.update_symbols(symbols).await;
        self.release_slot();
        true
    }

    /// Which symbols the current cycle should refresh.
    ///
    /// Candidates always come from the recently accessed holdings. During
    /// market hours all of them are refreshed; off hours only the ones
    /// that are frequently accessed or whose cache entry has aged out,
    /// to keep provider traffic near zero overnight.
    async fn symbols_needing_update(&self) -> Vec<String> {
        let cutoff = Utc::now() - chrono::Duration::days(ACTIVE_WINDOW_DAYS);
        let mut symbols = self.holdings.active_symbols(cutoff).await;
        if !self.oracle.is_market_open() {
            symbols = self.off_hours_candidates(symbols);
        }
        symbols.truncate(MAX_SYMBOLS_PER_CYCLE);
        symbols
    }

    /// Narrow holdings to those worth off-hours provider traffic: the
    /// frequently accessed ones, plus any whose cache entry is missing or
    /// at least thirty minutes old.
    fn off_hours_candidates(&self, holdings: Vec<String>) -> Vec<String> {
        let frequent: std::collections::HashSet<String> = self
            .cache
            .frequently_accessed_symbols(MAX_OFF_HOURS_SYMBOLS)
            .into_iter()
            .collect();
        holdings
            .into_iter()
            .filter(|symbol| {
                let key = normalize_symbol(symbol);
                frequent.contains(&key)
                    || match self.cache.age_of(&key) {
                        Some(age) => {
                            age >= chrono::Duration::minutes(OFF_HOURS_MIN_AGE_MINUTES)
                        }
                        None => true,
                    }
            })
            .collect()
    }

    async fn update_symbols(&self, symbols: &[String]) {
        if symbols.is_empty() {
            return;
        }
        let batch_size = self.config.batch_size.max(1);
        let mut succeeded = 0u64;
        let mut failed = 0u64;

        for chunk in symbols.chunks(batch_size) {
            let outcomes = self.guard.fetch_quotes_batch(chunk).await;
            let mut fetched = Vec::new();
            for (symbol, outcome) in outcomes {
                match outcome {
                    Ok(quote) => fetched.push(quote),
                    Err(err) => {
                        failed += 1;
                        debug!("Background refresh failed for {}: {}", symbol, err);
                    }
                }
            }
            succeeded += fetched.len() as u64;
            if !fetched.is_empty() {
                self.cache.put_batch(fetched);
            }
        }

        self.total_updates.fetch_add(succeeded, Ordering::Relaxed);
        self.failed_updates.fetch_add(failed, Ordering::Relaxed);
        self.last_update_millis
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
        info!(
            "Refreshed {} symbols ({} failed) out of {}",
            succeeded,
            failed,
            symbols.len()
        );
    }

    fn try_reserve_slot(&self) -> bool {
        self.active_updates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |active| {
                if active < self.config.max_concurrent_updates {
                    Some(active + 1)
                } else {
                    None
                }
            })
            .is_ok()
    }

    fn release_slot(&self) {
        let _ = self
            .active_updates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1));
    }
}
