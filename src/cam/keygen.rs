use crate::cam::config::KeygenConfig;
use crate::cam::types::{Key, PopRequest};
use crate::timeq::Cycle;

/// Periodic pop-request source.
///
/// Time is cut into windows of `period` steps.  Window `w` covers `[w * period, (w + 1) * period)`
/// and is requested once the window has closed and the expected-latency offset has passed, i.e.
/// at `now >= (w + 1) * period + offset`.  The key is the window index truncated to the key width.
#[derive(Debug, Clone)]
pub struct KeyGenerator {
    config: KeygenConfig,
    key_mask: Key,
    next_window: u64,
}

impl KeyGenerator {
    pub fn new(config: KeygenConfig, key_mask: Key) -> Self {
        assert!(config.period > 0, "keygen period must be > 0");
        Self {
            config,
            key_mask,
            next_window: 0,
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn period(&self) -> u64 {
        self.config.period
    }

    /// Key a record stamped at `time` carries under this windowing.
    pub fn key_for_time(&self, time: Cycle) -> Key {
        (time / self.config.period) & self.key_mask
    }

    pub fn next_window(&self) -> u64 {
        self.next_window
    }

    pub fn next_window_start(&self) -> Cycle {
        self.next_window.saturating_mul(self.config.period)
    }

    /// Restart at the window containing `now`.
    pub fn align(&mut self, now: Cycle) {
        self.next_window = now / self.config.period;
    }

    /// Request due at `now`, if any.  The caller commits it with `advance` once it has been
    /// queued, so a full pop queue simply holds the generator.
    pub fn due(&self, now: Cycle, offset: u64) -> Option<PopRequest> {
        if !self.config.enabled {
            return None;
        }
        let release = (self.next_window + 1)
            .saturating_mul(self.config.period)
            .saturating_add(offset);
        (now >= release).then(|| PopRequest {
            key: self.next_window & self.key_mask,
            window: Some(self.next_window),
        })
    }

    pub fn advance(&mut self) {
        self.next_window += 1;
    }

    pub fn reset(&mut self) {
        self.next_window = 0;
    }
}
