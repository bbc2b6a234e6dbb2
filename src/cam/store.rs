use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use log::debug;

use crate::base::behavior::*;
use crate::base::module::{module, IsModule, ModuleBase};
use crate::cam::bitset::MatchSet;
use crate::cam::config::StoreConfig;
use crate::cam::types::Key;
use crate::timeq::{Backpressure, Cycle, ServerConfig, ServiceRequest, Ticket, TimedServer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CamOp {
    Idle,
    Write { addr: usize, key: Key },
    Erase { addr: usize, key: Key },
}

#[derive(Debug)]
pub struct CamState {
    /// One row per key value, holding the addresses that currently carry the key.  Absent rows
    /// are all-zero.
    rows: BTreeMap<Key, MatchSet>,
    write_port: Option<(usize, Key)>,
    erase_port: Option<(usize, Key)>,
    search: TimedServer<Key>,
    delivered: VecDeque<Key>,
    last_op: CamOp,
}

/// Associative store: address -> key, searchable by key.
///
/// Each (key, address) pair is an independent bit.  Writing a key sets its bit without touching
/// bits left behind by earlier keys at the same address, so callers replacing an occupant must
/// erase the old key explicitly.  Mutations are driven onto the ports during a step and applied by
/// `tick_one`; an erase wins over a write driven in the same step and the write stays on its port.
pub struct AssociativeStore {
    base: ModuleBase<CamState, StoreConfig>,
}

module!(AssociativeStore, CamState, StoreConfig,);

impl ModuleBehaviors for AssociativeStore {
    fn tick_one(&mut self) {
        let now = self.base.cycle;
        let capacity = self.conf().capacity;
        let state = &mut self.base.state;

        state.last_op = if let Some((addr, key)) = state.erase_port.take() {
            Self::clear_bit(&mut state.rows, addr, key);
            CamOp::Erase { addr, key }
        } else if let Some((addr, key)) = state.write_port.take() {
            state.rows.entry(key).or_insert_with(|| MatchSet::new(capacity)).set(addr);
            CamOp::Write { addr, key }
        } else {
            CamOp::Idle
        };

        let delivered = &mut state.delivered;
        state.search.service_ready(now, |result| delivered.push_back(result.payload));

        self.base.cycle += 1;
    }

    fn reset(&mut self) {
        let state = &mut self.base.state;
        state.rows.clear();
        state.write_port = None;
        state.erase_port = None;
        state.search.clear();
        state.delivered.clear();
        state.last_op = CamOp::Idle;
    }
}

impl AssociativeStore {
    pub fn new(config: Arc<StoreConfig>) -> Self {
        let search = TimedServer::new(ServerConfig {
            base_latency: config.search_latency,
            units_per_cycle: 1,
            queue_capacity: (config.search_latency as usize).max(1),
        });
        let mut me = AssociativeStore {
            base: ModuleBase::with_state(CamState {
                rows: BTreeMap::new(),
                write_port: None,
                erase_port: None,
                search,
                delivered: VecDeque::new(),
                last_op: CamOp::Idle,
            }),
        };
        me.init_conf(config);
        me
    }

    fn clear_bit(rows: &mut BTreeMap<Key, MatchSet>, addr: usize, key: Key) {
        if let Some(row) = rows.get_mut(&key) {
            row.clear(addr);
            if row.is_empty() {
                rows.remove(&key);
            }
        }
    }

    pub fn drive_write(&mut self, addr: usize, key: Key) {
        assert!(addr < self.conf().capacity, "write address {} out of range", addr);
        assert!(key <= self.conf().key_mask(), "key {:#x} wider than key_width", key);
        self.base.state.write_port = Some((addr, key));
    }

    pub fn drive_erase(&mut self, addr: usize, key: Key) {
        assert!(addr < self.conf().capacity, "erase address {} out of range", addr);
        self.base.state.erase_port = Some((addr, key));
    }

    /// Whether a write is still parked on the write port.
    pub fn write_pending(&self) -> bool {
        self.base.state.write_port.is_some()
    }

    pub fn last_op(&self) -> CamOp {
        self.base.state.last_op
    }

    /// Start a search; the key comes back through `take_search_result` once the pipeline latency
    /// has elapsed.  The pipeline carries only the key: callers read the match vector with
    /// `lookup` when they latch.
    pub fn issue_search(&mut self, now: Cycle, key: Key) -> Result<Ticket, Backpressure<Key>> {
        let ticket = self.base.state.search.try_enqueue(now, ServiceRequest::new(key, 0))?;
        debug!("cam: search {:#x} issued at {}, ready at {}", key, now, ticket.ready_at());
        Ok(ticket)
    }

    pub fn take_search_result(&mut self) -> Option<Key> {
        self.base.state.delivered.pop_front()
    }

    /// Drop in-flight and undelivered searches.  Contents are untouched.
    pub fn cancel_searches(&mut self) {
        self.base.state.search.clear();
        self.base.state.delivered.clear();
    }

    pub fn searches_inflight(&self) -> usize {
        self.base.state.search.inflight() + self.base.state.delivered.len()
    }

    /// Match vector for `key` against the current contents.
    pub fn lookup(&self, key: Key) -> MatchSet {
        self.base
            .state
            .rows
            .get(&key)
            .cloned()
            .unwrap_or_else(|| MatchSet::new(self.conf().capacity))
    }

    /// Every key whose bit is set at `addr`.
    pub fn keys_at(&self, addr: usize) -> Vec<Key> {
        self.base
            .state
            .rows
            .iter()
            .filter(|(_, row)| row.contains(addr))
            .map(|(key, _)| *key)
            .collect()
    }

    /// Total number of set (key, address) bits.
    pub fn num_entries(&self) -> usize {
        self.base.state.rows.values().map(MatchSet::count_ones).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.base.state.rows.is_empty()
    }
}
