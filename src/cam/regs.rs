use log::{debug, warn};

use crate::cam::lifecycle::LifecycleState;
use crate::cam::stats::CoreStats;

/// Register offsets of the control/status surface.
#[derive(Debug, Clone)]
pub struct Reg;
#[allow(non_upper_case_globals)]
impl Reg {
    pub const Control       : u32 = 0x00;
    pub const LatencyOffset : u32 = 0x04;
    pub const Partition     : u32 = 0x08;
    pub const FillLevel     : u32 = 0x0c; // ro
    pub const Evictions     : u32 = 0x10; // ro, delta since last latch
    pub const CacheMisses   : u32 = 0x14; // ro
    pub const PushCount     : u32 = 0x18; // ro
    pub const PopCount      : u32 = 0x1c; // ro
    pub const Phase         : u32 = 0x20; // ro
}

pub const CTRL_GO: u64 = 1 << 0;
pub const CTRL_SOFT_RESET: u64 = 1 << 1;
pub const CTRL_EVICTION_LATCH: u64 = 1 << 2;

/// Writable half of the register file.  Read-only registers are views of the core's counters and
/// lifecycle state, passed in at access time.
#[derive(Debug, Clone)]
pub struct ControlRegs {
    go: bool,
    soft_reset: bool,
    latency_offset: u64,
    partition: u32,
    /// Eviction count captured by the last reset-and-latch.
    eviction_base: u64,
}

impl ControlRegs {
    pub fn new(go: bool, latency_offset: u64, partition: u32) -> Self {
        Self {
            go,
            soft_reset: false,
            latency_offset,
            partition,
            eviction_base: 0,
        }
    }

    pub fn go(&self) -> bool {
        self.go
    }

    pub fn latency_offset(&self) -> u64 {
        self.latency_offset
    }

    pub fn partition(&self) -> u32 {
        self.partition
    }

    pub fn soft_reset_pending(&self) -> bool {
        self.soft_reset
    }

    /// Consume a pending soft reset.  The flag clears itself once the core has acted on it.
    pub fn take_soft_reset(&mut self) -> bool {
        std::mem::take(&mut self.soft_reset)
    }

    pub fn evictions_since_latch(&self, stats: &CoreStats) -> u64 {
        stats.evictions.saturating_sub(self.eviction_base)
    }

    /// Counters restarted (flush or soft reset); the latch restarts with them.
    pub fn clear_eviction_latch(&mut self) {
        self.eviction_base = 0;
    }

    pub fn read(&self, addr: u32, stats: &CoreStats, phase: LifecycleState) -> Option<u64> {
        let value = match addr {
            Reg::Control => {
                (if self.go { CTRL_GO } else { 0 }) | (if self.soft_reset { CTRL_SOFT_RESET } else { 0 })
            }
            Reg::LatencyOffset => self.latency_offset,
            Reg::Partition => self.partition as u64,
            Reg::FillLevel => stats.fill_level(),
            Reg::Evictions => self.evictions_since_latch(stats),
            Reg::CacheMisses => stats.cache_misses,
            Reg::PushCount => stats.pushes,
            Reg::PopCount => stats.pops,
            Reg::Phase => phase.code() as u64,
            _ => {
                warn!("regs: read of unmapped offset {:#x}", addr);
                return None;
            }
        };
        Some(value)
    }

    /// Returns false for read-only or unmapped offsets; the write is dropped.
    pub fn write(&mut self, addr: u32, value: u64, stats: &CoreStats) -> bool {
        match addr {
            Reg::Control => {
                self.go = value & CTRL_GO != 0;
                if value & CTRL_SOFT_RESET != 0 {
                    self.soft_reset = true;
                }
                if value & CTRL_EVICTION_LATCH != 0 {
                    self.eviction_base = stats.evictions;
                    debug!("regs: eviction counter latched at {}", self.eviction_base);
                }
                true
            }
            Reg::LatencyOffset => {
                self.latency_offset = value;
                true
            }
            Reg::Partition => {
                self.partition = value as u32;
                true
            }
            Reg::FillLevel
            | Reg::Evictions
            | Reg::CacheMisses
            | Reg::PushCount
            | Reg::PopCount
            | Reg::Phase => {
                warn!("regs: write to read-only offset {:#x}", addr);
                false
            }
            _ => {
                warn!("regs: write to unmapped offset {:#x}", addr);
                false
            }
        }
    }
}
