use std::collections::VecDeque;
use std::sync::Arc;

use log::{debug, info};

use crate::base::behavior::*;
use crate::base::module::{module, IsModule, ModuleBase};
use crate::builtin::queue::Queue;
use crate::cam::arbiter::{AccessArbiter, AccessRequests, ArbiterStats, Grant};
use crate::cam::config::{KeygenConfig, StoreConfig};
use crate::cam::keygen::KeyGenerator;
use crate::cam::lifecycle::{LifecycleController, LifecycleState, LifecycleStatus};
use crate::cam::pop::{PopEngine, PopIo};
use crate::cam::push::PushEngine;
use crate::cam::regs::ControlRegs;
use crate::cam::side_table::SideTable;
use crate::cam::stats::CoreStats;
use crate::cam::store::AssociativeStore;
use crate::cam::types::{EgressRecord, IngressRecord, IngressReject, IngressRejectReason, Key, PopRequest};
use crate::sim::log::Logger;
use crate::timeq::Cycle;

#[derive(Debug)]
pub struct CoreState {
    ingress: Queue<IngressRecord>,
    pop_queue: Queue<PopRequest>,
    egress: VecDeque<EgressRecord>,
    stats: CoreStats,
    /// Level-sensitive lifecycle input; `None` until first driven.
    phase_input: Option<u32>,
    /// A flush was asked for and is waiting for both queues and the push engine to go quiet.
    flush_armed: bool,
    /// Flush completed on the previous step.
    flush_done: bool,
    ack: bool,
    last_grant: Grant,
}

/// One ring-ordered, associatively drained store with its engines, queues and control surface.
///
/// All mutation of the associative store and the side table goes through the access arbiter.  A
/// step runs, in order: soft reset, lifecycle, pop-request generation, arbitration, the stores,
/// the push engine and finally the pop engine.
pub struct RingCamCore {
    base: ModuleBase<CoreState, StoreConfig>,
    cam: AssociativeStore,
    side: SideTable,
    arbiter: AccessArbiter,
    push: PushEngine,
    pop: PopEngine,
    lifecycle: LifecycleController,
    keygen: KeyGenerator,
    regs: ControlRegs,
    logger: Arc<Logger>,
}

module!(RingCamCore, CoreState, StoreConfig,);

impl ModuleBehaviors for RingCamCore {
    fn tick_one(&mut self) {
        let now = self.base.cycle;
        let partition = self.conf().partition;
        // a latched request finishes its group before the reset takes effect
        if self.regs.soft_reset_pending() && !self.pop.has_request() {
            self.regs.take_soft_reset();
            self.soft_reset(now);
        }

        self.step_lifecycle(now);
        self.generate_pops(now);

        let grant = self.arbitrate();
        grant.drive(&mut self.cam, &mut self.side);
        self.cam.tick_one();
        self.side.tick_one();
        let old = if grant.reads_side_table() { self.side.sample_read() } else { None };

        let state = &mut self.base.state;
        let pushed = self.push.update(&grant, old);
        if pushed.consumed {
            state.ingress.try_deq();
            state.stats.record_push(pushed.evicted.is_some());
            if let Some(evicted) = pushed.evicted {
                crate::debug!(self.logger, "@{} evicted key {:#x} payload {:#x}", now, evicted.key, evicted.payload);
            }
        }

        let accept = self.regs.go() && !self.lifecycle.is_error() && !self.regs.soft_reset_pending();
        let popped = self.pop.update(PopIo {
            now,
            grant: &grant,
            old,
            cam: &mut self.cam,
            requests: &mut state.pop_queue,
            egress: &mut state.egress,
            stats: &mut state.stats,
            accept,
            push_erase_pending: self.push.erase_pending(),
        });
        if let Some((request, count)) = popped.completed {
            crate::info!(self.logger, "@{} pop key {:#x} drained {} matches", now, request.key, count);
        }
        state.flush_done = popped.flush_done;
        if popped.flush_done {
            state.stats.record_flush();
            self.regs.clear_eviction_latch();
            info!("core {}: flush complete at {}", partition, now);
        }
        state.last_grant = grant;

        self.push.tick_one();
        self.pop.tick_one();
        self.lifecycle.tick_one();
        state.ingress.tick_one();
        state.pop_queue.tick_one();
        self.base.cycle += 1;
    }

    fn reset(&mut self) {
        self.cam.reset();
        self.side.reset();
        self.arbiter.reset();
        self.push.reset();
        self.pop.reset();
        self.lifecycle.reset();
        self.keygen.reset();
        let state = &mut self.base.state;
        state.ingress.reset();
        state.pop_queue.reset();
        state.egress.clear();
        state.stats = CoreStats::default();
        state.phase_input = None;
        state.flush_armed = false;
        state.flush_done = false;
        state.ack = false;
        state.last_grant = Grant::Idle;
        self.regs.clear_eviction_latch();
    }
}

impl RingCamCore {
    pub fn new(config: Arc<StoreConfig>, keygen: KeygenConfig, logger: Arc<Logger>) -> Self {
        config.ensure_valid();
        let state = CoreState {
            ingress: Queue::new(config.ingress_depth),
            pop_queue: Queue::new(config.pop_queue_depth),
            egress: VecDeque::new(),
            stats: CoreStats::default(),
            phase_input: None,
            flush_armed: false,
            flush_done: false,
            ack: false,
            last_grant: Grant::Idle,
        };
        let mut me = RingCamCore {
            base: ModuleBase::with_state(state),
            cam: AssociativeStore::new(Arc::clone(&config)),
            side: SideTable::new(Arc::clone(&config)),
            arbiter: AccessArbiter::new(),
            push: PushEngine::new(Arc::clone(&config)),
            pop: PopEngine::new(Arc::clone(&config)),
            lifecycle: LifecycleController::new(Arc::clone(&config)),
            keygen: KeyGenerator::new(keygen, config.key_mask()),
            regs: ControlRegs::new(config.start_enabled, keygen.latency_offset, config.partition),
            logger,
        };
        info!(
            "core {}: {} slots, {} banks, key width {}",
            config.partition,
            config.capacity,
            config.num_banks(),
            config.key_width
        );
        me.init_conf(config);
        me
    }

    fn soft_reset(&mut self, now: Cycle) {
        info!("core {}: soft reset at {}", self.conf().partition, now);
        self.cam.cancel_searches();
        self.arbiter.reset();
        self.push.reset();
        self.pop.reset();
        self.keygen.align(now);
        let state = &mut self.base.state;
        state.ingress.reset();
        state.pop_queue.reset();
        state.stats = CoreStats::default();
        // contents go through the regular flush sweep
        state.flush_armed = true;
        self.regs.clear_eviction_latch();
    }

    fn step_lifecycle(&mut self, now: Cycle) {
        let partition = self.conf().partition;
        let state = &mut self.base.state;
        let status = LifecycleStatus {
            ingress_empty: state.ingress.is_empty(),
            pop_queue_empty: state.pop_queue.is_empty(),
            pop_idle: self.pop.is_idle() && !state.flush_armed,
            push_idle: !self.push.erase_pending(),
            flush_done: state.flush_done,
            next_window_start: self.keygen.enabled().then(|| self.keygen.next_window_start()),
        };
        let out = self.lifecycle.step(now, state.phase_input, &status);
        state.ack = out.ack;
        if out.request_flush {
            state.flush_armed = true;
        }
        if out.align_keygen {
            self.keygen.align(now);
        }

        // flush only once the previous run's records and requests are through
        if state.flush_armed
            && state.ingress.is_empty()
            && state.pop_queue.is_empty()
            && !self.push.erase_pending()
        {
            state.flush_armed = false;
            self.pop.request_flush();
            debug!("core {}: flush started at {}", partition, now);
        }
    }

    fn generate_pops(&mut self, now: Cycle) {
        if !self.regs.go() || !self.lifecycle.generation_open(self.keygen.next_window_start()) {
            return;
        }
        if let Some(request) = self.keygen.due(now, self.regs.latency_offset()) {
            // a full queue holds the generator on this window
            if self.base.state.pop_queue.try_enq(&request) {
                self.keygen.advance();
                crate::debug!(self.logger, "@{} window {} requests key {:#x}", now, self.keygen.next_window() - 1, request.key);
            }
        }
    }

    fn arbitrate(&mut self) -> Grant {
        let push_open = self.regs.go() && !self.lifecycle.is_error();
        let head = if push_open { self.base.state.ingress.peek() } else { None };
        let (push_write, push_erase) = self.push.requests(head);
        let requests = AccessRequests {
            flush_erase: self.pop.flush_request(),
            push_erase,
            pop_erase: self.pop.erase_request(),
            push_write,
            draining: self.pop.draining(),
        };
        self.arbiter.arbitrate(&requests)
    }

    /// Offer one record from the ingress stream.
    pub fn offer_ingress(&mut self, record: IngressRecord) -> Result<(), IngressReject> {
        let stats = &mut self.base.state.stats;
        if record.selector != self.regs.partition() {
            stats.foreign_records += 1;
            return Err(IngressReject::new(record, IngressRejectReason::ForeignPartition));
        }
        if !self.regs.go() || self.lifecycle.is_error() || !self.lifecycle.intake_open() {
            stats.refused_records += 1;
            return Err(IngressReject::new(record, IngressRejectReason::Closed));
        }
        if !self.base.state.ingress.try_enq(&record) {
            self.base.state.stats.refused_records += 1;
            return Err(IngressReject::new(record, IngressRejectReason::QueueFull));
        }
        Ok(())
    }

    /// Queue a pop request for `key`.  Returns false when the pop-request queue is full.
    pub fn submit_pop(&mut self, key: Key) -> bool {
        let request = PopRequest::for_key(key & self.conf().key_mask());
        self.base.state.pop_queue.try_enq(&request)
    }

    /// Drive the lifecycle input.  The value is held until driven again.
    pub fn drive_phase(&mut self, code: u32) {
        self.base.state.phase_input = Some(code);
    }

    /// Arm a store flush outside the lifecycle protocol.
    pub fn request_flush(&mut self) {
        self.base.state.flush_armed = true;
    }

    pub fn reg_read(&self, addr: u32) -> Option<u64> {
        self.regs.read(addr, &self.base.state.stats, self.lifecycle.state())
    }

    pub fn reg_write(&mut self, addr: u32, value: u64) -> bool {
        self.regs.write(addr, value, &self.base.state.stats)
    }

    /// Take every egress record produced so far, oldest first.
    pub fn drain_egress(&mut self) -> Vec<EgressRecord> {
        self.base.state.egress.drain(..).collect()
    }

    pub fn egress_pending(&self) -> usize {
        self.base.state.egress.len()
    }

    pub fn ack(&self) -> bool {
        self.base.state.ack
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn stats(&self) -> CoreStats {
        self.base.state.stats
    }

    pub fn arbiter_stats(&self) -> ArbiterStats {
        self.arbiter.stats()
    }

    pub fn last_grant(&self) -> Grant {
        self.base.state.last_grant
    }

    pub fn fill_level(&self) -> u64 {
        self.base.state.stats.fill_level()
    }

    /// Slots whose side table entry is occupied.
    pub fn occupied(&self) -> usize {
        self.side.occupied()
    }

    pub fn cam(&self) -> &AssociativeStore {
        &self.cam
    }

    pub fn side_table(&self) -> &SideTable {
        &self.side
    }

    pub fn pop_engine(&self) -> &PopEngine {
        &self.pop
    }

    pub fn push_engine(&self) -> &PushEngine {
        &self.push
    }

    pub fn ingress_len(&self) -> usize {
        self.base.state.ingress.len()
    }

    pub fn pop_queue_len(&self) -> usize {
        self.base.state.pop_queue.len()
    }

    /// Nothing queued, in flight or pending on any engine.
    pub fn is_quiescent(&self) -> bool {
        let state = &self.base.state;
        state.ingress.is_empty()
            && state.pop_queue.is_empty()
            && !state.flush_armed
            && !self.regs.soft_reset_pending()
            && self.pop.is_idle()
            && !self.push.erase_pending()
            && self.cam.searches_inflight() == 0
    }
}
