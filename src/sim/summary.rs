use std::ops::AddAssign;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use crate::cam::arbiter::ArbiterStats;
use crate::cam::core::RingCamCore;
use crate::cam::lifecycle::LifecycleState;
use crate::cam::stats::CoreStats;
use crate::timeq::Cycle;
use crate::traffic::TrafficStats;

#[derive(Debug, Clone, Serialize)]
pub struct CoreSummary {
    pub partition: u32,
    pub phase: LifecycleState,
    pub fill_level: u64,
    pub occupied: usize,
    pub stats: CoreStats,
    pub arbiter: ArbiterStats,
}

impl CoreSummary {
    pub fn of(partition: u32, core: &RingCamCore) -> Self {
        Self {
            partition,
            phase: core.lifecycle_state(),
            fill_level: core.fill_level(),
            occupied: core.occupied(),
            stats: core.stats(),
            arbiter: core.arbiter_stats(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregateSummary {
    pub num_cores: usize,
    pub fill_level: u64,
    pub occupied: usize,
    pub stats: CoreStats,
    pub arbiter: ArbiterStats,
}

impl AddAssign<&CoreSummary> for AggregateSummary {
    fn add_assign(&mut self, core: &CoreSummary) {
        self.num_cores += 1;
        self.fill_level = self.fill_level.saturating_add(core.fill_level);
        self.occupied += core.occupied;

        let (total, c) = (&mut self.stats, &core.stats);
        total.pushes = total.pushes.saturating_add(c.pushes);
        total.pops = total.pops.saturating_add(c.pops);
        total.evictions = total.evictions.saturating_add(c.evictions);
        total.cache_misses = total.cache_misses.saturating_add(c.cache_misses);
        total.stale_matches = total.stale_matches.saturating_add(c.stale_matches);
        total.pop_requests = total.pop_requests.saturating_add(c.pop_requests);
        total.empty_pops = total.empty_pops.saturating_add(c.empty_pops);
        total.flushes = total.flushes.saturating_add(c.flushes);
        total.egress_records = total.egress_records.saturating_add(c.egress_records);
        total.foreign_records = total.foreign_records.saturating_add(c.foreign_records);
        total.refused_records = total.refused_records.saturating_add(c.refused_records);
        total.guard_extensions = total.guard_extensions.saturating_add(c.guard_extensions);

        let (total, a) = (&mut self.arbiter, &core.arbiter);
        total.flush_grants = total.flush_grants.saturating_add(a.flush_grants);
        total.push_erase_grants = total.push_erase_grants.saturating_add(a.push_erase_grants);
        total.pop_erase_grants = total.pop_erase_grants.saturating_add(a.pop_erase_grants);
        total.push_write_grants = total.push_write_grants.saturating_add(a.push_write_grants);
        total.idle_steps = total.idle_steps.saturating_add(a.idle_steps);
        total.push_write_stalls = total.push_write_stalls.saturating_add(a.push_write_stalls);
        total.longest_push_wait = total.longest_push_wait.max(a.longest_push_wait);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub cycles: Cycle,
    pub timed_out: bool,
    pub egress_lines: u64,
    pub traffic: TrafficStats,
    pub per_core: Vec<CoreSummary>,
    pub total: AggregateSummary,
}

pub fn aggregate_summaries(per_core: &[CoreSummary]) -> AggregateSummary {
    let mut total = AggregateSummary::default();
    for core in per_core {
        total += core;
    }
    total
}

pub fn write_summary(path: &Path, summary: &RunSummary) -> anyhow::Result<()> {
    let payload = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, payload).with_context(|| format!("cannot write summary {}", path.display()))
}
