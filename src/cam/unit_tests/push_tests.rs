use crate::cam::arbiter::{EraseRequest, Grant};
use crate::cam::push::{PushEngine, PushState};
use crate::cam::types::{IngressRecord, SideEntry};
use crate::cam::unit_tests::small_config;

#[test]
fn write_requests_follow_the_cursor() {
    let mut push = PushEngine::new(small_config(2, 4));
    let record = IngressRecord::new(0, 0x13, 0x1_0000_0001);

    let (write, erase) = push.requests(Some(&record));
    let write = write.unwrap();
    assert!(erase.is_none());
    assert_eq!(write.addr, 0);
    // key and payload are masked to their widths
    assert_eq!(write.key, 0x3);
    assert_eq!(write.payload, 0x1);

    let outcome = push.update(&Grant::PushWrite(write), Some(SideEntry::empty()));
    assert!(outcome.consumed);
    assert_eq!(outcome.evicted, None);
    assert_eq!(push.next_addr(), 1);
    assert_eq!(push.requests(None), (None, None));
}

#[test]
fn occupied_slot_schedules_erase_of_old_key() {
    let mut push = PushEngine::new(small_config(1, 4));
    let record = IngressRecord::new(0, 0x2, 0xbeef);
    let (write, _) = push.requests(Some(&record));
    let write = write.unwrap();

    let old = SideEntry::new(0x7, 0xdead);
    let outcome = push.update(&Grant::PushWrite(write), Some(old));
    assert_eq!(outcome.evicted, Some(old));
    let pending = EraseRequest { addr: 0, key: 0x7 };
    assert_eq!(push.push_state(), PushState::Erase(pending));
    assert!(push.erase_pending());

    // the erase is requested instead of the next write
    let (write, erase) = push.requests(Some(&record));
    assert!(write.is_none());
    assert_eq!(erase, Some(pending));

    // nothing happens until the erase is granted
    assert_eq!(push.update(&Grant::Idle, None).consumed, false);
    assert!(push.erase_pending());
    push.update(&Grant::PushErase(pending), None);
    assert_eq!(push.push_state(), PushState::WriteAndCheck);
}

#[test]
fn same_key_overwrite_skips_erase() {
    let mut push = PushEngine::new(small_config(1, 4));
    let record = IngressRecord::new(0, 0x4, 2);
    let (write, _) = push.requests(Some(&record));
    let outcome = push.update(&Grant::PushWrite(write.unwrap()), Some(SideEntry::new(0x4, 1)));
    assert!(outcome.evicted.is_some());
    assert!(!push.erase_pending());
    assert_eq!(push.write_cursor(), 1);
}
