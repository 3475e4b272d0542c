use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Per-symbol access bookkeeping.
#[derive(Clone, Debug)]
struct AccessRecord {
    count: u64,
    last_access: DateTime<Utc>,
}

/// Tracks how often each symbol is requested.
///
/// The counts are a heuristic ranking signal for off-hours refresh
/// prioritization and cache warmup, never authoritative. Records idle for
/// more than the pruning cutoff are dropped by [`prune`](Self::prune).
pub struct AccessTracker {
    records: DashMap<String, AccessRecord>,
}

impl AccessTracker {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Record one access for a symbol.
    pub fn record(&self, symbol: &str) {
        self.record_at(symbol, Utc::now());
    }

    pub(crate) fn record_at(&self, symbol: &str, now: DateTime<Utc>) {
        self.records
            .entry(symbol.to_string())
            .and_modify(|record| {
                record.count += 1;
                record.last_access = now;
            })
            .or_insert(AccessRecord {
                count: 1,
                last_access: now,
            });
    }

    /// The most frequently accessed symbols, descending by count.
    ///
    /// Ties break alphabetically so the ordering is stable.
    pub fn top_symbols(&self, limit: usize) -> Vec<String> {
        let mut counts: Vec<(String, u64)> = self
            .records
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().count))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts.truncate(limit);
        counts.into_iter().map(|(symbol, _)| symbol).collect()
    }

    /// Access count for a single symbol.
    pub fn count_for(&self, symbol: &str) -> u64 {
        self.records
            .get(symbol)
            .map(|record| record.count)
            .unwrap_or(0)
    }

    /// Number of symbols currently tracked.
    pub fn tracked_count(&self) -> usize {
        self.records.len()
    }

    /// Drop records whose last access is before the cutoff.
    pub fn prune(&self, cutoff: DateTime<Utc>) {
        self.records.retain(|_, record| record.last_access >= cutoff);
    }
}

impl Default for AccessTracker {
    fn default() -> Self {
        Self::new()
    }
}
