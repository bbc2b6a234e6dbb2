use std::sync::Arc;

use crate::base::behavior::*;
use crate::cam::config::KeygenConfig;
use crate::cam::core::RingCamCore;
use crate::cam::lifecycle::{LifecycleState, PhaseCode};
use crate::cam::types::{collect_groups, EgressRecord, IngressRecord, IngressRejectReason};
use crate::cam::unit_tests::{pop_key, push_all, run_until_quiescent, running_core, small_config};
use crate::sim::log::Logger;

const A: u64 = 0xa;
const B: u64 = 0xb;
const C: u64 = 0xc;
const D: u64 = 0xd;
const E: u64 = 0xe;

#[test]
fn pop_before_wrap_finds_oldest_key() {
    let mut core = running_core(small_config(4, 4));
    push_all(&mut core, &[(A, 1), (B, 2), (C, 3), (D, 4)]);
    let group = pop_key(&mut core, A);
    assert_eq!(group.count, 1);
    assert_eq!(group.matches, vec![(0, 1)]);
}

#[test]
fn wrap_evicts_oldest_slot() {
    let mut core = running_core(small_config(4, 4));
    push_all(&mut core, &[(A, 1), (B, 2), (C, 3), (D, 4), (E, 5)]);
    assert_eq!(core.stats().evictions, 1);
    assert_eq!(core.fill_level(), 4);

    let group = pop_key(&mut core, A);
    assert_eq!(group.count, 0);
    assert!(group.matches.is_empty());

    let group = pop_key(&mut core, E);
    assert_eq!(group.count, 1);
    assert_eq!(group.matches, vec![(0, 5)]);
    assert_eq!(core.stats().cache_misses, 0);
}

#[test]
fn latch_waits_for_eviction_erase() {
    let mut core = running_core(small_config(4, 4));
    push_all(&mut core, &[(A, 1), (B, 2), (C, 3), (D, 4)]);

    // search for A issued now: delivered two steps later, latched after one guard step
    assert!(core.submit_pop(A));
    for _ in 0..3 {
        core.tick_one();
    }
    // E's write lands on the latch step and leaves A's erase outstanding
    core.offer_ingress(IngressRecord::new(0, E, 5)).unwrap();
    run_until_quiescent(&mut core, 100);

    let stats = core.stats();
    assert_eq!(stats.guard_extensions, 1);
    assert_eq!(stats.evictions, 1);
    assert_eq!(stats.stale_matches, 0);
    assert_eq!(stats.cache_misses, 0);
    let groups = collect_groups(&core.drain_egress());
    assert_eq!(groups.len(), 1);
    assert_eq!((groups[0].key, groups[0].count), (A, 0));

    assert_eq!(pop_key(&mut core, E).matches, vec![(0, 5)]);
}

#[test]
fn repeated_key_drains_in_address_order() {
    let mut core = running_core(small_config(8, 4));
    push_all(&mut core, &[(7, 100), (7, 101), (7, 102)]);
    let group = pop_key(&mut core, 7);
    assert_eq!(group.count, 3);
    assert_eq!(group.addrs(), vec![0, 1, 2]);
    assert_eq!(group.matches[2], (2, 102));
    assert_eq!(core.fill_level(), 0);
}

#[test]
fn drain_crosses_banks_and_skips_other_keys() {
    let mut core = running_core(small_config(16, 4));
    let records: Vec<(u64, u64)> = (0..16).map(|i| (if i % 3 == 0 { 5 } else { 6 }, i)).collect();
    push_all(&mut core, &records);

    let group = pop_key(&mut core, 5);
    assert_eq!(group.count, 6);
    assert_eq!(group.addrs(), vec![0, 3, 6, 9, 12, 15]);

    let group = pop_key(&mut core, 6);
    assert_eq!(group.count, 10);
    assert_eq!(core.occupied(), 0);
    assert_eq!(core.stats().pops, 16);
}

#[test]
fn empty_group_is_a_single_last_header() {
    let mut core = running_core(small_config(4, 4));
    assert!(core.submit_pop(3));
    run_until_quiescent(&mut core, 100);
    let records = core.drain_egress();
    assert_eq!(records, vec![EgressRecord::Header { key: 3, count: 0, last: true }]);
    assert_eq!(core.stats().empty_pops, 1);
}

#[test]
fn only_the_final_match_is_last() {
    let mut core = running_core(small_config(4, 4));
    push_all(&mut core, &[(2, 1), (2, 2)]);
    core.submit_pop(2);
    run_until_quiescent(&mut core, 100);
    let last: Vec<bool> = core.drain_egress().iter().map(EgressRecord::is_last).collect();
    assert_eq!(last, vec![false, false, true]);
}

#[test]
fn push_storm_saturates_at_capacity() {
    let mut core = running_core(small_config(4, 4));
    let records: Vec<(u64, u64)> = (0..11).map(|i| (i % 16, i)).collect();
    push_all(&mut core, &records);
    assert_eq!(core.occupied(), 4);
    assert_eq!(core.fill_level(), 4);
    assert_eq!(core.stats().evictions, 11 - 4);
    // every stale key was erased
    assert_eq!(core.cam().num_entries(), 4);
}

#[test]
fn same_key_overwrite_counts_eviction_without_erase() {
    let mut core = running_core(small_config(2, 4));
    push_all(&mut core, &[(1, 10), (1, 11), (1, 12)]);
    assert_eq!(core.stats().evictions, 1);
    assert_eq!(core.arbiter_stats().push_erase_grants, 0);
    let group = pop_key(&mut core, 1);
    assert_eq!(group.matches, vec![(0, 12), (1, 11)]);
}

#[test]
fn conservation_at_idle_points() {
    let mut core = running_core(small_config(8, 4));
    push_all(&mut core, &[(1, 0), (2, 0), (1, 0), (3, 0), (1, 0)]);
    pop_key(&mut core, 1);
    push_all(&mut core, &[(4, 0), (5, 0), (6, 0), (7, 0), (8, 0), (9, 0)]);
    let stats = core.stats();
    assert_eq!(stats.fill_level(), stats.pushes - stats.pops - stats.evictions);
    assert_eq!(core.fill_level() as usize, core.occupied());
}

#[test]
fn flush_empties_every_key() {
    let mut core = running_core(small_config(4, 3));
    push_all(&mut core, &[(1, 1), (2, 2), (3, 3), (1, 4), (5, 5)]);
    core.request_flush();
    run_until_quiescent(&mut core, 1_000);
    assert_eq!(core.stats().flushes, 1);
    assert_eq!(core.fill_level(), 0);
    assert_eq!(core.occupied(), 0);
    assert!(core.cam().is_empty());

    for key in 0..8 {
        assert_eq!(pop_key(&mut core, key).count, 0);
    }

    // a second flush of an empty store is a no-op
    core.request_flush();
    run_until_quiescent(&mut core, 1_000);
    assert_eq!(core.stats().flushes, 2);
    assert!(core.cam().is_empty());
}

#[test]
fn ingress_admission() {
    let config = small_config(4, 4);
    let mut core = RingCamCore::new(config, KeygenConfig::default(), Arc::new(Logger::silent()));
    // IDLE takes no records
    let err = core.offer_ingress(IngressRecord::new(0, 1, 1)).unwrap_err();
    assert_eq!(err.reason, IngressRejectReason::Closed);

    core.drive_phase(PhaseCode::Running as u32);
    core.tick_one();
    let err = core.offer_ingress(IngressRecord::new(1, 1, 1)).unwrap_err();
    assert_eq!(err.reason, IngressRejectReason::ForeignPartition);

    for i in 0..8 {
        assert!(core.offer_ingress(IngressRecord::new(0, 1, i)).is_ok());
    }
    let err = core.offer_ingress(IngressRecord::new(0, 1, 8)).unwrap_err();
    assert_eq!(err.reason, IngressRejectReason::QueueFull);
    assert_eq!(err.record.payload, 8);
    assert_eq!(core.stats().refused_records, 2);
}

#[test]
fn prepare_flushes_and_acknowledges() {
    let mut core = running_core(small_config(4, 2));
    push_all(&mut core, &[(1, 1), (2, 2), (3, 3)]);

    core.drive_phase(PhaseCode::Prepare as u32);
    let mut acked_at = None;
    for step in 0..200 {
        core.tick_one();
        if core.ack() {
            acked_at = Some(step);
            break;
        }
    }
    // 4 slots x 4 keys of sweep, plus handshake
    assert!(acked_at.expect("PREPARE never acknowledged") >= 16);
    assert_eq!(core.lifecycle_state(), LifecycleState::Prepare);
    assert_eq!(core.occupied(), 0);
    assert!(core.cam().is_empty());
    assert_eq!(core.stats().pushes, 0);

    let err = core.offer_ingress(IngressRecord::new(0, 1, 1)).unwrap_err();
    assert_eq!(err.reason, IngressRejectReason::Closed);
}

#[test]
fn error_phase_halts_pops_until_idle() {
    let mut core = running_core(small_config(4, 4));
    push_all(&mut core, &[(1, 1)]);
    core.drive_phase(0xc);
    core.tick_one();
    assert_eq!(core.lifecycle_state(), LifecycleState::Error);

    core.submit_pop(1);
    for _ in 0..20 {
        core.tick_one();
    }
    assert_eq!(core.egress_pending(), 0);
    assert_eq!(core.pop_queue_len(), 1);

    core.drive_phase(PhaseCode::Idle as u32);
    run_until_quiescent(&mut core, 100);
    let groups = collect_groups(&core.drain_egress());
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].count, 1);
}

fn keygen_core(period: u64, offset: u64) -> RingCamCore {
    let config = small_config(8, 4);
    let keygen = KeygenConfig { enabled: true, period, latency_offset: offset };
    let mut core = RingCamCore::new(config, keygen, Arc::new(Logger::silent()));
    core.drive_phase(PhaseCode::Running as u32);
    core.tick_one();
    core
}

#[test]
fn key_generator_pops_closed_windows() {
    let mut core = keygen_core(16, 2);
    core.offer_ingress(IngressRecord::new(0, 0, 1)).unwrap();
    core.offer_ingress(IngressRecord::new(0, 0, 2)).unwrap();
    core.offer_ingress(IngressRecord::new(0, 1, 3)).unwrap();
    core.offer_ingress(IngressRecord::new(0, 0, 4)).unwrap();
    for _ in 0..40 {
        core.tick_one();
    }
    run_until_quiescent(&mut core, 100);

    let groups = collect_groups(&core.drain_egress());
    assert_eq!(groups.len(), 2);
    assert_eq!((groups[0].key, groups[0].count), (0, 3));
    assert_eq!(groups[0].addrs(), vec![0, 1, 3]);
    assert_eq!((groups[1].key, groups[1].count), (1, 1));
}

#[test]
fn terminating_drains_windows_before_cutoff() {
    let mut core = keygen_core(8, 0);
    for _ in 0..20 {
        core.tick_one();
    }
    core.drive_phase(PhaseCode::Terminating as u32);
    let mut acked = false;
    for _ in 0..100 {
        core.tick_one();
        if core.ack() {
            acked = true;
            break;
        }
    }
    assert!(acked, "TERMINATING never acknowledged");
    // cutoff at step 21: windows 0, 1 and 2 start at or before it
    let groups = collect_groups(&core.drain_egress());
    let keys: Vec<u64> = groups.iter().map(|g| g.key).collect();
    assert_eq!(keys, vec![0, 1, 2]);
}
