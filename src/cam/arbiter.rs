use serde::Serialize;

use crate::cam::side_table::SideTable;
use crate::cam::store::AssociativeStore;
use crate::cam::types::{Key, Payload, SideEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EraseRequest {
    pub addr: usize,
    pub key: Key,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRequest {
    pub addr: usize,
    pub key: Key,
    pub payload: Payload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessSource {
    FlushErase,
    PushErase,
    PopErase,
    PushWrite,
}

/// Everything requesting the stores during one step.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessRequests {
    pub flush_erase: Option<EraseRequest>,
    pub push_erase: Option<EraseRequest>,
    pub pop_erase: Option<EraseRequest>,
    pub push_write: Option<WriteRequest>,
    /// The pop engine is inside a drain; pop-erase is eligible and push-write is not.
    pub draining: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Idle,
    FlushErase(EraseRequest),
    PushErase(EraseRequest),
    PopErase(EraseRequest),
    PushWrite(WriteRequest),
}

impl Grant {
    pub fn source(&self) -> Option<AccessSource> {
        match self {
            Grant::Idle => None,
            Grant::FlushErase(_) => Some(AccessSource::FlushErase),
            Grant::PushErase(_) => Some(AccessSource::PushErase),
            Grant::PopErase(_) => Some(AccessSource::PopErase),
            Grant::PushWrite(_) => Some(AccessSource::PushWrite),
        }
    }

    /// Whether this grant reads the side table, i.e. whether `sample_read` is meaningful after
    /// the stores tick.
    pub fn reads_side_table(&self) -> bool {
        matches!(self, Grant::PopErase(_) | Grant::PushWrite(_))
    }

    /// Issue the granted operation to both stores.  Flush and pop erases clear the side table
    /// slot; a push erase only removes the stale key, since the slot already holds its new
    /// occupant.
    pub fn drive(&self, cam: &mut AssociativeStore, side: &mut SideTable) {
        match *self {
            Grant::Idle => {}
            Grant::FlushErase(req) => {
                cam.drive_erase(req.addr, req.key);
                side.drive_write(req.addr, SideEntry::empty());
            }
            Grant::PushErase(req) => {
                cam.drive_erase(req.addr, req.key);
            }
            Grant::PopErase(req) => {
                cam.drive_erase(req.addr, req.key);
                side.drive_read(req.addr);
                side.drive_write(req.addr, SideEntry::empty());
            }
            Grant::PushWrite(req) => {
                cam.drive_write(req.addr, req.key);
                side.drive_read(req.addr);
                side.drive_write(req.addr, SideEntry::new(req.key, req.payload));
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ArbiterStats {
    pub flush_grants: u64,
    pub push_erase_grants: u64,
    pub pop_erase_grants: u64,
    pub push_write_grants: u64,
    pub idle_steps: u64,
    /// Steps in which a push-write was requested but not granted.
    pub push_write_stalls: u64,
    pub longest_push_wait: u64,
}

/// Fixed-priority arbiter owning every mutation of the associative store and side table:
/// flush-erase > push-erase > pop-erase (only while draining) > push-write (never while draining).
#[derive(Debug, Default)]
pub struct AccessArbiter {
    stats: ArbiterStats,
    push_wait: u64,
}

impl AccessArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(requests: &AccessRequests) -> Grant {
        if let Some(req) = requests.flush_erase {
            Grant::FlushErase(req)
        } else if let Some(req) = requests.push_erase {
            Grant::PushErase(req)
        } else if let Some(req) = requests.pop_erase.filter(|_| requests.draining) {
            Grant::PopErase(req)
        } else if let Some(req) = requests.push_write.filter(|_| !requests.draining) {
            Grant::PushWrite(req)
        } else {
            Grant::Idle
        }
    }

    pub fn arbitrate(&mut self, requests: &AccessRequests) -> Grant {
        let grant = Self::select(requests);
        let stats = &mut self.stats;
        match grant.source() {
            None => stats.idle_steps += 1,
            Some(AccessSource::FlushErase) => stats.flush_grants += 1,
            Some(AccessSource::PushErase) => stats.push_erase_grants += 1,
            Some(AccessSource::PopErase) => stats.pop_erase_grants += 1,
            Some(AccessSource::PushWrite) => stats.push_write_grants += 1,
        }

        if requests.push_write.is_some() {
            if matches!(grant, Grant::PushWrite(_)) {
                self.push_wait = 0;
            } else {
                self.push_wait += 1;
                stats.push_write_stalls += 1;
                stats.longest_push_wait = stats.longest_push_wait.max(self.push_wait);
            }
        } else {
            self.push_wait = 0;
        }
        grant
    }

    pub fn stats(&self) -> ArbiterStats {
        self.stats
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
