use log::info;
use serde::Serialize;

use crate::cam::types::{IngressRecord, IngressReject, IngressRejectReason, Key, Payload};
use crate::traffic::config::TrafficConfig;
use crate::traffic::patterns::PatternEngine;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TrafficStats {
    pub generated: u64,
    pub accepted: u64,
    /// Records dropped because no instance would take them (halted, wrong phase, no partition).
    pub dropped: u64,
    /// Steps a record waited on a full ingress queue.
    pub backpressure_steps: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Spread {
    RoundRobin,
    Random,
}

/// Synthetic ingress stream shared by every partition.  One record at a time is outstanding; a
/// record refused for a full queue is retried on the next step.
#[derive(Debug)]
pub struct TrafficDriver {
    config: TrafficConfig,
    pattern: PatternEngine,
    spread: Spread,
    num_partitions: u32,
    pending: Option<IngressRecord>,
    next_issue: u64,
    next_payload: Payload,
    stats: TrafficStats,
}

impl TrafficDriver {
    pub fn new(config: &TrafficConfig, num_partitions: usize, key_mask: Key) -> anyhow::Result<Self> {
        let spread = match config.spread.trim().to_ascii_lowercase().as_str() {
            "round_robin" | "rr" => Spread::RoundRobin,
            "random" => Spread::Random,
            other => anyhow::bail!("unsupported selector spread '{}' (expected round_robin|random)", other),
        };
        let pattern = PatternEngine::new(&config.pattern, key_mask, config.seed)?;
        info!("traffic: pattern {} over {} partitions", pattern.name, num_partitions);
        Ok(Self {
            config: config.clone(),
            pattern,
            spread,
            num_partitions: num_partitions.max(1) as u32,
            pending: None,
            next_issue: 0,
            next_payload: 0,
            stats: TrafficStats::default(),
        })
    }

    pub fn is_done(&self) -> bool {
        !self.config.enabled
            || (self.pending.is_none()
                && self.config.num_records != 0
                && self.stats.generated >= self.config.num_records)
    }

    pub fn stats(&self) -> TrafficStats {
        self.stats
    }

    /// Record to offer this step, if any.  The caller reports back through `resolve`.
    pub fn tick(&mut self, now: u64) -> Option<IngressRecord> {
        if self.pending.is_some() || !self.config.enabled || now < self.next_issue {
            return self.pending;
        }
        if self.config.num_records != 0 && self.stats.generated >= self.config.num_records {
            return None;
        }
        let selector = match self.spread {
            Spread::RoundRobin => (self.stats.generated % self.num_partitions as u64) as u32,
            Spread::Random => self.pattern.draw(self.num_partitions as u64) as u32,
        };
        let record = IngressRecord::new(selector, self.pattern.next_key(now), self.next_payload);
        self.next_payload += 1;
        self.stats.generated += 1;
        self.next_issue = now + self.config.interval.max(1);
        self.pending = Some(record);
        self.pending
    }

    /// Outcome of offering the pending record: accepted by a partition, or the refusal of the
    /// partition it was addressed to (`None` if nobody owns the selector).
    pub fn resolve(&mut self, now: u64, outcome: Result<(), Option<IngressReject>>) {
        let Some(record) = self.pending else {
            return;
        };
        match outcome {
            Ok(()) => {
                self.pending = None;
                self.stats.accepted += 1;
                if self.config.logging.print_traffic_lines {
                    println!("[TRAFFIC] @{} {:?}", now, record);
                }
                let every = self.config.logging.checkpoint_every;
                if every != 0 && self.stats.accepted % every == 0 {
                    info!("traffic: {} records accepted at {}", self.stats.accepted, now);
                }
            }
            Err(Some(reject)) if reject.reason == IngressRejectReason::QueueFull => {
                self.stats.backpressure_steps += 1;
            }
            Err(_) => {
                self.pending = None;
                self.stats.dropped += 1;
            }
        }
    }
}
