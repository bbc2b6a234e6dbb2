use serde::Deserialize;

use crate::cam::types::Key;
use crate::sim::config::Config;

/// Upper bound on the steps of one exhaustive flush (every key value at every address).
pub const MAX_FLUSH_STEPS: u64 = 1 << 18;

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct StoreConfig {
    /// Number of slots N.
    pub capacity: usize,
    /// Match resolver partition size B; at most 64.
    pub bank_size: usize,
    pub key_width: u32,
    pub payload_width: u32,
    pub search_latency: u64,
    /// Extra steps to wait after a search result is delivered before latching it.
    pub guard_band: u64,
    pub ingress_depth: usize,
    pub pop_queue_depth: usize,
    /// Ingress selector value this instance accepts.
    pub partition: u32,
    /// Initial value of the go flag.
    pub start_enabled: bool,
}

impl Config for StoreConfig {}

impl Default for StoreConfig {
    fn default() -> Self {
        let s = Self {
            capacity: 1024,
            bank_size: 64,
            key_width: 8,
            payload_width: 64,
            search_latency: 2,
            guard_band: 1,
            ingress_depth: 16,
            pop_queue_depth: 16,
            partition: 0,
            start_enabled: true,
        };
        s.ensure_valid();
        s
    }
}

impl StoreConfig {
    pub fn ensure_valid(&self) {
        assert!(self.capacity > 0, "capacity must be > 0");
        assert!(self.bank_size > 0 && self.bank_size <= 64, "bank_size must be in 1..=64");
        assert!(self.key_width > 0 && self.key_width <= 16, "key_width must be in 1..=16");
        assert!(self.payload_width > 0 && self.payload_width <= 64, "payload_width must be in 1..=64");
        assert!(self.ingress_depth > 0, "ingress_depth must be > 0");
        assert!(self.pop_queue_depth > 0, "pop_queue_depth must be > 0");
        assert!(
            self.flush_steps() <= MAX_FLUSH_STEPS,
            "capacity x 2^key_width = {} flush steps, more than {}",
            self.flush_steps(),
            MAX_FLUSH_STEPS
        );
    }

    pub fn key_mask(&self) -> Key {
        width_mask(self.key_width)
    }

    pub fn payload_mask(&self) -> u64 {
        width_mask(self.payload_width)
    }

    pub fn num_banks(&self) -> usize {
        self.capacity.div_ceil(self.bank_size)
    }

    /// Steps one exhaustive flush takes: every key value at every address.
    pub fn flush_steps(&self) -> u64 {
        self.capacity as u64 * (self.key_mask() + 1)
    }
}

fn width_mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct KeygenConfig {
    pub enabled: bool,
    /// Window length in steps.
    pub period: u64,
    /// Reset value of the expected-latency offset register.
    pub latency_offset: u64,
}

impl Config for KeygenConfig {}

impl Default for KeygenConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            period: 64,
            latency_offset: 32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_flush_fits_the_bound() {
        let config = StoreConfig::default();
        assert_eq!(config.flush_steps(), 1024 * 256);
        assert!(config.flush_steps() <= MAX_FLUSH_STEPS);
    }

    #[test]
    #[should_panic(expected = "key_width")]
    fn wide_keys_are_rejected() {
        StoreConfig { key_width: 32, ..StoreConfig::default() }.ensure_valid();
    }

    #[test]
    #[should_panic(expected = "flush steps")]
    fn untractable_flush_is_rejected() {
        StoreConfig { key_width: 16, ..StoreConfig::default() }.ensure_valid();
    }

    #[test]
    fn narrow_keys_allow_larger_stores() {
        let config = StoreConfig { capacity: 16384, key_width: 4, ..StoreConfig::default() };
        config.ensure_valid();
        assert_eq!(config.flush_steps(), MAX_FLUSH_STEPS);
    }
}
