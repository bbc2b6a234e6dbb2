use std::sync::Arc;

use log::debug;

use crate::base::behavior::*;
use crate::base::module::{module, IsModule, ModuleBase};
use crate::cam::arbiter::{EraseRequest, Grant, WriteRequest};
use crate::cam::config::StoreConfig;
use crate::cam::types::{IngressRecord, SideEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PushState {
    #[default]
    WriteAndCheck,
    /// Remove the previous occupant's key from the associative store.
    Erase(EraseRequest),
}

#[derive(Debug, Default)]
pub struct PushEngineState {
    pub state: PushState,
    /// Monotonic write cursor; the target slot is `write_cursor % capacity`.
    pub write_cursor: u64,
}

/// What a step did from the push engine's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PushOutcome {
    /// A record was written and must leave the ingress queue.
    pub consumed: bool,
    /// The slot written held an occupant that was never popped.
    pub evicted: Option<SideEntry>,
}

/// Sequential writer: one record per step into the slot under the write cursor, followed by an
/// erase step when the slot's previous occupant has to be removed from the associative store.
pub struct PushEngine {
    base: ModuleBase<PushEngineState, StoreConfig>,
}

module!(PushEngine, PushEngineState, StoreConfig,);

impl ModuleBehaviors for PushEngine {
    fn tick_one(&mut self) {
        self.base.cycle += 1;
    }

    fn reset(&mut self) {
        self.base.state = PushEngineState::default();
    }
}

impl PushEngine {
    pub fn new(config: Arc<StoreConfig>) -> Self {
        let mut me = PushEngine {
            base: ModuleBase::default(),
        };
        me.init_conf(config);
        me
    }

    pub fn write_cursor(&self) -> u64 {
        self.base.state.write_cursor
    }

    pub fn next_addr(&self) -> usize {
        (self.base.state.write_cursor % self.conf().capacity as u64) as usize
    }

    pub fn push_state(&self) -> PushState {
        self.base.state.state
    }

    pub fn erase_pending(&self) -> bool {
        matches!(self.base.state.state, PushState::Erase(_))
    }

    /// Requests for this step: either the head record's write or the pending eviction erase.
    pub fn requests(&self, head: Option<&IngressRecord>) -> (Option<WriteRequest>, Option<EraseRequest>) {
        match self.base.state.state {
            PushState::Erase(req) => (None, Some(req)),
            PushState::WriteAndCheck => {
                let write = head.map(|rec| WriteRequest {
                    addr: self.next_addr(),
                    key: rec.key & self.conf().key_mask(),
                    payload: rec.payload & self.conf().payload_mask(),
                });
                (write, None)
            }
        }
    }

    /// Consume this step's grant.  `old` is the side table's pre-write contents of the granted
    /// slot.
    pub fn update(&mut self, grant: &Grant, old: Option<SideEntry>) -> PushOutcome {
        match (self.base.state.state, grant) {
            (PushState::WriteAndCheck, Grant::PushWrite(req)) => {
                let old = old.expect("push write without side table read");
                self.base.state.write_cursor += 1;
                let mut outcome = PushOutcome { consumed: true, evicted: None };
                if old.occupied {
                    outcome.evicted = Some(old);
                    if old.key != req.key {
                        debug!("push: slot {} evicts key {:#x} for {:#x}", req.addr, old.key, req.key);
                        self.base.state.state = PushState::Erase(EraseRequest { addr: req.addr, key: old.key });
                    } else {
                        // same key: the bit just written is the one the old occupant used
                        debug!("push: slot {} overwritten in place for key {:#x}", req.addr, req.key);
                    }
                }
                outcome
            }
            (PushState::Erase(pending), Grant::PushErase(req)) => {
                assert_eq!(pending, *req, "push erase granted for a different slot");
                self.base.state.state = PushState::WriteAndCheck;
                PushOutcome::default()
            }
            _ => PushOutcome::default(),
        }
    }
}
