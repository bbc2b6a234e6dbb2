use std::sync::Arc;

use crate::base::behavior::*;
use crate::cam::config::{KeygenConfig, StoreConfig};
use crate::cam::core::RingCamCore;
use crate::cam::lifecycle::PhaseCode;
use crate::cam::types::{collect_groups, IngressRecord, Key, Payload, ResultGroup};
use crate::sim::log::Logger;

#[cfg(test)]
mod arbiter_tests;
#[cfg(test)]
mod core_tests;
#[cfg(test)]
mod push_tests;
#[cfg(test)]
mod store_tests;

pub(crate) fn small_config(capacity: usize, key_width: u32) -> Arc<StoreConfig> {
    Arc::new(StoreConfig {
        capacity,
        bank_size: 4,
        key_width,
        payload_width: 32,
        search_latency: 2,
        guard_band: 1,
        ingress_depth: 8,
        pop_queue_depth: 8,
        partition: 0,
        start_enabled: true,
    })
}

/// Core in RUNNING with the key generator off.
pub(crate) fn running_core(config: Arc<StoreConfig>) -> RingCamCore {
    let mut core = RingCamCore::new(config, KeygenConfig::default(), Arc::new(Logger::silent()));
    core.drive_phase(PhaseCode::Running as u32);
    core.tick_one();
    assert!(core.ack(), "RUNNING should acknowledge immediately");
    core
}

pub(crate) fn run_until_quiescent(core: &mut RingCamCore, limit: u64) -> u64 {
    for steps in 0..limit {
        if core.is_quiescent() {
            return steps;
        }
        core.tick_one();
    }
    panic!("core not quiescent after {} steps", limit);
}

/// Offer records in order, stepping whenever the ingress queue refuses, then settle.
pub(crate) fn push_all(core: &mut RingCamCore, records: &[(Key, Payload)]) {
    for &(key, payload) in records {
        let record = IngressRecord::new(0, key, payload);
        let mut tries = 0;
        while core.offer_ingress(record).is_err() {
            core.tick_one();
            tries += 1;
            assert!(tries < 1000, "ingress never drained");
        }
    }
    run_until_quiescent(core, 10_000);
}

/// Pop one key and return its result group.
pub(crate) fn pop_key(core: &mut RingCamCore, key: Key) -> ResultGroup {
    assert!(core.submit_pop(key));
    run_until_quiescent(core, 10_000);
    let records = core.drain_egress();
    let mut groups = collect_groups(&records);
    assert_eq!(groups.len(), 1, "expected exactly one group for key {:#x}", key);
    groups.remove(0)
}
