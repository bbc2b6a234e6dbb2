use serde::Serialize;

/// Per-core counters.  The run counters restart when a flush completes.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CoreStats {
    pub pushes: u64,
    pub pops: u64,
    pub evictions: u64,
    /// Drained slots whose side table occupancy was already clear.
    pub cache_misses: u64,
    /// Drained slots whose side table key differed from the pop key.
    pub stale_matches: u64,
    pub pop_requests: u64,
    pub empty_pops: u64,
    pub flushes: u64,
    pub egress_records: u64,
    pub foreign_records: u64,
    pub refused_records: u64,
    /// Latch steps delayed because an eviction erase was still outstanding.
    pub guard_extensions: u64,
}

impl CoreStats {
    /// pushes - pops - evictions, corrected for drains that found nothing to remove.
    pub fn fill_level(&self) -> u64 {
        (self.pushes + self.cache_misses).saturating_sub(self.pops + self.evictions)
    }

    pub fn record_push(&mut self, evicted: bool) {
        self.pushes = self.pushes.saturating_add(1);
        if evicted {
            self.evictions = self.evictions.saturating_add(1);
        }
    }

    pub fn record_pop(&mut self) {
        self.pops = self.pops.saturating_add(1);
        self.egress_records = self.egress_records.saturating_add(1);
    }

    pub fn record_header(&mut self, count: usize) {
        self.pop_requests = self.pop_requests.saturating_add(1);
        self.egress_records = self.egress_records.saturating_add(1);
        if count == 0 {
            self.empty_pops = self.empty_pops.saturating_add(1);
        }
    }

    /// A completed flush starts a new run.
    pub fn record_flush(&mut self) {
        self.flushes = self.flushes.saturating_add(1);
        self.pushes = 0;
        self.pops = 0;
        self.evictions = 0;
        self.cache_misses = 0;
        self.stale_matches = 0;
    }
}
