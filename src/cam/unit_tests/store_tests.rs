use crate::base::behavior::*;
use crate::cam::store::{AssociativeStore, CamOp};
use crate::cam::side_table::SideTable;
use crate::cam::types::SideEntry;
use crate::cam::unit_tests::small_config;

#[test]
fn write_then_lookup_and_erase() {
    let mut cam = AssociativeStore::new(small_config(8, 4));
    cam.drive_write(3, 0x5);
    cam.tick_one();
    cam.drive_write(6, 0x5);
    cam.tick_one();
    assert_eq!(cam.lookup(0x5).iter_ones().collect::<Vec<_>>(), vec![3, 6]);
    assert!(cam.lookup(0x4).is_empty());

    cam.drive_erase(3, 0x5);
    cam.tick_one();
    assert_eq!(cam.lookup(0x5).iter_ones().collect::<Vec<_>>(), vec![6]);
    assert_eq!(cam.num_entries(), 1);
}

#[test]
fn new_key_leaves_old_bit_behind() {
    let mut cam = AssociativeStore::new(small_config(4, 4));
    cam.drive_write(0, 1);
    cam.tick_one();
    cam.drive_write(0, 2);
    cam.tick_one();
    assert_eq!(cam.keys_at(0), vec![1, 2]);
}

#[test]
fn erase_wins_and_write_is_retained() {
    let mut cam = AssociativeStore::new(small_config(4, 4));
    cam.drive_write(1, 7);
    cam.tick_one();
    cam.drive_write(2, 7);
    cam.drive_erase(1, 7);
    cam.tick_one();
    assert_eq!(cam.last_op(), CamOp::Erase { addr: 1, key: 7 });
    assert!(cam.write_pending());
    assert!(cam.lookup(7).is_empty());

    cam.tick_one();
    assert_eq!(cam.last_op(), CamOp::Write { addr: 2, key: 7 });
    assert_eq!(cam.lookup(7).iter_ones().collect::<Vec<_>>(), vec![2]);
}

#[test]
fn search_result_arrives_after_latency() {
    let mut cam = AssociativeStore::new(small_config(4, 4));
    let ticket = cam.issue_search(0, 3).unwrap();
    assert_eq!(ticket.ready_at(), 2);
    cam.tick_one();
    assert_eq!(cam.take_search_result(), None);
    cam.tick_one();
    assert_eq!(cam.take_search_result(), None);
    cam.tick_one();
    assert_eq!(cam.take_search_result(), Some(3));
    assert_eq!(cam.searches_inflight(), 0);
}

#[test]
fn pipelined_searches_return_their_keys_in_order() {
    let mut cam = AssociativeStore::new(small_config(4, 4));
    cam.issue_search(0, 3).unwrap();
    cam.tick_one();
    cam.issue_search(1, 5).unwrap();
    cam.tick_one();
    cam.tick_one();
    assert_eq!(cam.take_search_result(), Some(3));
    assert_eq!(cam.take_search_result(), None);
    cam.tick_one();
    assert_eq!(cam.take_search_result(), Some(5));
}

#[test]
fn side_table_reads_old_data_during_write() {
    let mut side = SideTable::new(small_config(4, 4));
    side.drive_write(2, SideEntry::new(1, 0xaa));
    side.tick_one();

    side.drive_read(2);
    side.drive_write(2, SideEntry::new(3, 0xbb));
    side.tick_one();
    assert_eq!(side.sample_read(), Some(SideEntry::new(1, 0xaa)));
    assert_eq!(side.peek(2), SideEntry::new(3, 0xbb));

    side.tick_one();
    assert_eq!(side.sample_read(), None);
    assert_eq!(side.occupied(), 1);
}
