use crate::base::behavior::*;
use crate::cam::arbiter::{AccessArbiter, AccessRequests, EraseRequest, Grant, WriteRequest};
use crate::cam::side_table::SideTable;
use crate::cam::store::AssociativeStore;
use crate::cam::types::SideEntry;
use crate::cam::unit_tests::small_config;

fn erase(addr: usize) -> Option<EraseRequest> {
    Some(EraseRequest { addr, key: 1 })
}

fn write(addr: usize) -> Option<WriteRequest> {
    Some(WriteRequest { addr, key: 2, payload: 0x20 })
}

#[test]
fn fixed_priority_order() {
    let all = AccessRequests {
        flush_erase: erase(0),
        push_erase: erase(1),
        pop_erase: erase(2),
        push_write: write(3),
        draining: true,
    };
    assert!(matches!(AccessArbiter::select(&all), Grant::FlushErase(_)));

    let no_flush = AccessRequests { flush_erase: None, ..all };
    assert!(matches!(AccessArbiter::select(&no_flush), Grant::PushErase(_)));

    let pop_only = AccessRequests { push_erase: None, ..no_flush };
    assert!(matches!(AccessArbiter::select(&pop_only), Grant::PopErase(_)));

    assert_eq!(AccessArbiter::select(&AccessRequests::default()), Grant::Idle);
}

#[test]
fn draining_gates_pop_erase_and_push_write() {
    let req = AccessRequests {
        pop_erase: erase(2),
        push_write: write(3),
        draining: false,
        ..AccessRequests::default()
    };
    assert!(matches!(AccessArbiter::select(&req), Grant::PushWrite(_)));

    let draining = AccessRequests { draining: true, ..req };
    assert!(matches!(AccessArbiter::select(&draining), Grant::PopErase(_)));

    let drain_lock = AccessRequests { pop_erase: None, ..draining };
    assert_eq!(AccessArbiter::select(&drain_lock), Grant::Idle);
}

#[test]
fn tracks_push_write_stalls() {
    let mut arbiter = AccessArbiter::new();
    let blocked = AccessRequests {
        push_erase: erase(0),
        push_write: write(1),
        ..AccessRequests::default()
    };
    arbiter.arbitrate(&blocked);
    arbiter.arbitrate(&blocked);
    let free = AccessRequests { push_erase: None, ..blocked };
    assert!(matches!(arbiter.arbitrate(&free), Grant::PushWrite(_)));
    arbiter.arbitrate(&AccessRequests::default());

    let stats = arbiter.stats();
    assert_eq!(stats.push_erase_grants, 2);
    assert_eq!(stats.push_write_grants, 1);
    assert_eq!(stats.idle_steps, 1);
    assert_eq!(stats.push_write_stalls, 2);
    assert_eq!(stats.longest_push_wait, 2);
}

#[test]
fn grant_drives_both_stores() {
    let config = small_config(4, 4);
    let mut cam = AssociativeStore::new(config.clone());
    let mut side = SideTable::new(config);

    let write = Grant::PushWrite(WriteRequest { addr: 1, key: 2, payload: 0x20 });
    write.drive(&mut cam, &mut side);
    cam.tick_one();
    side.tick_one();
    assert!(write.reads_side_table());
    assert_eq!(side.sample_read(), Some(SideEntry::empty()));
    assert_eq!(side.peek(1), SideEntry::new(2, 0x20));
    assert!(cam.lookup(2).contains(1));

    let pop = Grant::PopErase(EraseRequest { addr: 1, key: 2 });
    pop.drive(&mut cam, &mut side);
    cam.tick_one();
    side.tick_one();
    assert_eq!(side.sample_read(), Some(SideEntry::new(2, 0x20)));
    assert!(!side.peek(1).occupied);
    assert!(cam.is_empty());
}
