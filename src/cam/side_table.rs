use std::sync::Arc;

use crate::base::behavior::*;
use crate::base::module::{module, IsModule, ModuleBase};
use crate::cam::config::StoreConfig;
use crate::cam::types::SideEntry;

#[derive(Debug, Default)]
pub struct SideTableState {
    entries: Vec<SideEntry>,
    read_port: Option<usize>,
    write_port: Option<(usize, SideEntry)>,
    read_data: Option<SideEntry>,
}

/// Per-slot occupancy and payload, kept in lock-step with the associative store.
///
/// Synchronous single-read, single-write memory with old-data read-during-write: a read and a
/// write driven in the same step observe the contents from before the write.
pub struct SideTable {
    base: ModuleBase<SideTableState, StoreConfig>,
}

module!(SideTable, SideTableState, StoreConfig,);

impl ModuleBehaviors for SideTable {
    fn tick_one(&mut self) {
        let state = &mut self.base.state;
        state.read_data = state.read_port.take().map(|addr| state.entries[addr]);
        if let Some((addr, entry)) = state.write_port.take() {
            state.entries[addr] = entry;
        }
        self.base.cycle += 1;
    }

    fn reset(&mut self) {
        let capacity = self.conf().capacity;
        self.base.state = SideTableState {
            entries: vec![SideEntry::empty(); capacity],
            ..SideTableState::default()
        };
    }
}

impl SideTable {
    pub fn new(config: Arc<StoreConfig>) -> Self {
        let mut me = SideTable {
            base: ModuleBase::with_state(SideTableState {
                entries: vec![SideEntry::empty(); config.capacity],
                ..SideTableState::default()
            }),
        };
        me.init_conf(config);
        me
    }

    pub fn drive_read(&mut self, addr: usize) {
        assert!(addr < self.conf().capacity, "read address {} out of range", addr);
        self.base.state.read_port = Some(addr);
    }

    pub fn drive_write(&mut self, addr: usize, entry: SideEntry) {
        assert!(addr < self.conf().capacity, "write address {} out of range", addr);
        self.base.state.write_port = Some((addr, entry));
    }

    /// Data returned by the read issued on the previous `tick_one`, if any.
    pub fn sample_read(&self) -> Option<SideEntry> {
        self.base.state.read_data
    }

    /// Combinational peek, for status and tests; the engines only use the read port.
    pub fn peek(&self, addr: usize) -> SideEntry {
        self.base.state.entries[addr]
    }

    pub fn occupied(&self) -> usize {
        self.base.state.entries.iter().filter(|e| e.occupied).count()
    }
}
