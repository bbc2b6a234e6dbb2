use std::collections::VecDeque;
use std::sync::Arc;

use log::{debug, warn};

use crate::base::behavior::*;
use crate::base::module::{module, IsModule, ModuleBase};
use crate::builtin::queue::Queue;
use crate::cam::arbiter::{EraseRequest, Grant};
use crate::cam::config::StoreConfig;
use crate::cam::resolver::MatchResolver;
use crate::cam::stats::CoreStats;
use crate::cam::store::AssociativeStore;
use crate::cam::types::{EgressRecord, Key, PopRequest, SideEntry};
use crate::timeq::Cycle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PopState {
    #[default]
    Idle,
    /// Waiting on the search pipeline.  `guard` is `None` until the result is delivered, then
    /// counts the remaining guard-band steps.
    Search { guard: Option<u64> },
    Eval,
    Draining,
    Reset,
    Flushing { addr: usize, key: Key },
    FlushingDone,
}

#[derive(Debug, Default)]
pub struct PopEngineState {
    pub state: PopState,
    latched: Option<PopRequest>,
    /// Match count at latch time, as reported in the header.
    latched_count: usize,
    header_sent: bool,
    flush_pending: bool,
}

/// Per-step outputs of the pop engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PopOutcome {
    /// A request finished this step, with its total match count.
    pub completed: Option<(PopRequest, usize)>,
    pub flush_done: bool,
}

/// Everything the pop engine touches besides its own state during one step.
pub struct PopIo<'a> {
    pub now: Cycle,
    pub grant: &'a Grant,
    /// Side table pre-erase contents when the grant was ours.
    pub old: Option<SideEntry>,
    pub cam: &'a mut AssociativeStore,
    pub requests: &'a mut Queue<PopRequest>,
    pub egress: &'a mut VecDeque<EgressRecord>,
    pub stats: &'a mut CoreStats,
    /// New requests may be latched (running and not halted).
    pub accept: bool,
    /// The push engine still has to erase an evicted key.
    pub push_erase_pending: bool,
}

/// Associative drain: search a key, latch every match, then erase and emit them one per step in
/// ascending address order.  Also owns the exhaustive flush sweep.
pub struct PopEngine {
    base: ModuleBase<PopEngineState, StoreConfig>,
    resolver: MatchResolver,
}

module!(PopEngine, PopEngineState, StoreConfig,);

impl ModuleBehaviors for PopEngine {
    fn tick_one(&mut self) {
        self.base.cycle += 1;
    }

    fn reset(&mut self) {
        self.base.state = PopEngineState::default();
        self.resolver.clear();
    }
}

impl PopEngine {
    pub fn new(config: Arc<StoreConfig>) -> Self {
        let resolver = MatchResolver::new(config.capacity, config.bank_size);
        let mut me = PopEngine {
            base: ModuleBase::default(),
            resolver,
        };
        me.init_conf(config);
        me
    }

    pub fn pop_state(&self) -> PopState {
        self.base.state.state
    }

    pub fn is_idle(&self) -> bool {
        self.base.state.state == PopState::Idle && !self.base.state.flush_pending
    }

    pub fn is_flushing(&self) -> bool {
        self.base.state.flush_pending
            || matches!(self.base.state.state, PopState::Flushing { .. } | PopState::FlushingDone)
    }

    /// A request is latched and has not reached `Reset` yet.
    pub fn has_request(&self) -> bool {
        self.base.state.latched.is_some()
    }

    pub fn latched(&self) -> Option<PopRequest> {
        self.base.state.latched
    }

    pub fn resolver(&self) -> &MatchResolver {
        &self.resolver
    }

    /// Ask for a flush; it starts the next time the engine is idle.
    pub fn request_flush(&mut self) {
        self.base.state.flush_pending = true;
    }

    /// Inside a drain: from a non-empty latch until the last match is emitted.
    pub fn draining(&self) -> bool {
        matches!(self.base.state.state, PopState::Eval | PopState::Draining) && self.resolver.any()
    }

    pub fn erase_request(&self) -> Option<EraseRequest> {
        match self.base.state.state {
            PopState::Draining => {
                let key = self.base.state.latched?.key;
                self.resolver.current().map(|addr| EraseRequest { addr, key })
            }
            _ => None,
        }
    }

    pub fn flush_request(&self) -> Option<EraseRequest> {
        match self.base.state.state {
            PopState::Flushing { addr, key } => Some(EraseRequest { addr, key }),
            _ => None,
        }
    }

    pub fn update(&mut self, io: PopIo<'_>) -> PopOutcome {
        let mut outcome = PopOutcome::default();
        let next = match self.base.state.state {
            PopState::Idle => self.idle(io),
            PopState::Search { guard } => self.search(guard, io),
            PopState::Eval => self.eval(io, &mut outcome),
            PopState::Draining => self.drain(io, &mut outcome),
            PopState::Reset => {
                self.resolver.clear();
                self.base.state.latched = None;
                self.base.state.latched_count = 0;
                self.base.state.header_sent = false;
                PopState::Idle
            }
            PopState::Flushing { addr, key } => self.flush(addr, key, io.grant),
            PopState::FlushingDone => {
                outcome.flush_done = true;
                PopState::Idle
            }
        };
        if next != self.base.state.state {
            debug!("pop: {:?} -> {:?}", self.base.state.state, next);
        }
        self.base.state.state = next;
        outcome
    }

    fn idle(&mut self, io: PopIo<'_>) -> PopState {
        if self.base.state.flush_pending {
            self.base.state.flush_pending = false;
            return PopState::Flushing { addr: 0, key: 0 };
        }
        if !io.accept {
            return PopState::Idle;
        }
        let Some(request) = io.requests.peek().copied() else {
            return PopState::Idle;
        };
        match io.cam.issue_search(io.now, request.key) {
            Ok(_) => {
                io.requests.try_deq();
                self.base.state.latched = Some(request);
                PopState::Search { guard: None }
            }
            // pipeline still busy with an earlier search; retry next step
            Err(_) => PopState::Idle,
        }
    }

    fn search(&mut self, guard: Option<u64>, io: PopIo<'_>) -> PopState {
        let key = self.base.state.latched.expect("search without a latched request").key;
        let guard = match guard {
            Some(remaining) => remaining,
            None => match io.cam.take_search_result() {
                Some(delivered) => {
                    assert_eq!(delivered, key, "search pipeline returned another key");
                    self.conf().guard_band
                }
                None => return PopState::Search { guard: None },
            },
        };
        if guard > 0 {
            return PopState::Search { guard: Some(guard - 1) };
        }
        if io.push_erase_pending {
            // an evicted key is still present and would match
            io.stats.guard_extensions += 1;
            return PopState::Search { guard: Some(0) };
        }
        let matches = io.cam.lookup(key);
        self.resolver.load(&matches);
        self.base.state.latched_count = self.resolver.total();
        debug!("pop: key {:#x} latched {} matches", key, self.resolver.total());
        PopState::Eval
    }

    fn eval(&mut self, io: PopIo<'_>, outcome: &mut PopOutcome) -> PopState {
        let request = self.base.state.latched.expect("eval without a latched request");
        if !self.base.state.header_sent {
            let count = self.base.state.latched_count;
            io.egress.push_back(EgressRecord::Header { key: request.key, count, last: count == 0 });
            io.stats.record_header(count);
            self.base.state.header_sent = true;
        }
        if self.resolver.any() {
            PopState::Draining
        } else {
            outcome.completed = Some((request, 0));
            PopState::Reset
        }
    }

    fn drain(&mut self, io: PopIo<'_>, outcome: &mut PopOutcome) -> PopState {
        let Grant::PopErase(req) = *io.grant else {
            return PopState::Draining;
        };
        let request = self.base.state.latched.expect("drain without a latched request");
        let old = io.old.expect("pop erase without side table read");
        let remaining = self.resolver.total();
        let addr = self.resolver.advance().expect("drain with an empty resolver");
        assert_eq!(addr, req.addr, "pop erase granted for a different slot");

        if !old.occupied {
            io.stats.cache_misses += 1;
            warn!("pop: cache miss draining slot {} for key {:#x}", addr, request.key);
        } else if old.key != request.key {
            io.stats.stale_matches += 1;
            warn!(
                "pop: slot {} holds key {:#x} but matched {:#x}",
                addr, old.key, request.key
            );
        }

        let last = remaining <= 1;
        io.egress.push_back(EgressRecord::Match { key: request.key, addr, payload: old.payload, last });
        io.stats.record_pop();
        if last {
            outcome.completed = Some((request, self.base.state.latched_count));
            PopState::Reset
        } else {
            PopState::Eval
        }
    }

    fn flush(&mut self, addr: usize, key: Key, grant: &Grant) -> PopState {
        if !matches!(grant, Grant::FlushErase(_)) {
            return PopState::Flushing { addr, key };
        }
        if key < self.conf().key_mask() {
            PopState::Flushing { addr, key: key + 1 }
        } else if addr + 1 < self.conf().capacity {
            PopState::Flushing { addr: addr + 1, key: 0 }
        } else {
            PopState::FlushingDone
        }
    }
}
