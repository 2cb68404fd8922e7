//! Diff-and-invalidate protocol tests
//!
//! A register write re-decodes all slots; each changed slot has its whole
//! previous range revoked, one 4 KiB unmap event per page.

mod common;

use std::sync::Arc;

use common::{base_reg, length_reg, program_v3, size_reg, unit, Recorder};
use dmaremap::{DmaTranslator, Permission, Region, UnmapEvent, UnmapListener, PAGE_SIZE};

#[test]
fn test_same_value_write_is_silent() {
    let u = unit(3);
    program_v3(&u, 0, 100, 10, 1);
    let rec = Recorder::new();
    u.subscribe(rec.clone());

    // Rewrite every register with what it already holds
    for offset in [base_reg(0), length_reg(0), size_reg(0)] {
        let current = u.read_register(offset);
        assert_eq!(u.write_register(offset, current), 0);
    }
    // Zero over zero on an idle slot
    assert_eq!(u.write_register(size_reg(9), 0), 0);

    assert!(rec.events().is_empty());
}

#[test]
fn test_flags_change_revokes_whole_old_range() {
    let u = unit(3);
    program_v3(&u, 0, 100, 10, 1);
    let rec = Recorder::new();
    u.subscribe(rec.clone());

    assert_eq!(u.write_register(size_reg(0), 3), 1);

    let events = rec.events();
    assert_eq!(events.len(), 10);
    for (i, ev) in events.iter().enumerate() {
        assert_eq!(ev.iova, (100 + i as u64) * 4096);
        assert_eq!(ev.length, 4096);
        assert_eq!(ev.permission, Permission::None);
    }
    assert_eq!(u.region(0), Region::new(100, 10, 3));
}

#[test]
fn test_shrink_revokes_previous_range_not_difference() {
    let u = unit(3);
    program_v3(&u, 2, 0x40, 8, 1);
    let rec = Recorder::new();
    u.subscribe(rec.clone());

    // 8 pages -> 2 pages: all 8 old pages go, including the 2 that stay
    u.write_register(length_reg(2), 2);
    let expected: Vec<u64> = (0x40..0x48).map(|p| p * PAGE_SIZE).collect();
    assert_eq!(rec.iovas(), expected);
}

#[test]
fn test_base_move_revokes_old_pages() {
    let u = unit(3);
    program_v3(&u, 1, 0x200, 3, 1);
    let rec = Recorder::new();
    u.subscribe(rec.clone());

    u.write_register(base_reg(1), 0x300);
    assert_eq!(rec.iovas(), vec![0x200 * 4096, 0x201 * 4096, 0x202 * 4096]);
    assert_eq!(u.region(1), Region::new(0x300, 3, 1));
}

#[test]
fn test_flags_zero_range_is_still_revoked() {
    // Old range carries no authority but is revoked all the same
    let u = unit(3);
    u.write_register(base_reg(0), 50);
    u.write_register(length_reg(0), 4);
    let rec = Recorder::new();
    u.subscribe(rec.clone());

    u.write_register(size_reg(0), 1);
    assert_eq!(rec.events().len(), 4);
}

#[test]
fn test_empty_old_range_emits_nothing() {
    let u = unit(3);
    let rec = Recorder::new();
    u.subscribe(rec.clone());

    // Slot changes (0,0,0) -> (7,0,0) -> (7,5,0): old length always 0
    assert_eq!(u.write_register(base_reg(4), 7), 1);
    assert_eq!(u.write_register(length_reg(4), 5), 1);
    assert!(rec.events().is_empty());
    assert_eq!(u.region(4), Region::new(7, 5, 0));
}

#[test]
fn test_slot_independence() {
    let u = unit(3);
    program_v3(&u, 3, 0x1000, 2, 1);
    program_v3(&u, 7, 0x2000, 4, 1);
    program_v3(&u, 8, 0x1000, 2, 1);
    let before = u.regions();

    let rec = Recorder::new();
    u.subscribe(rec.clone());

    assert_eq!(u.write_register(size_reg(3), 0x7), 1);
    assert_eq!(rec.iovas(), vec![0x1000 * 4096, 0x1001 * 4096]);

    let after = u.regions();
    for slot in 0..16 {
        if slot != 3 {
            assert_eq!(after[slot], before[slot], "slot {} disturbed", slot);
        }
    }
}

#[test]
fn test_v2_documented_scenario() {
    let u = unit(2);
    let rec = Recorder::new();
    u.subscribe(rec.clone());

    // Base page 5, then length 3 (flags share the low bits in V2)
    u.write_register(0x40, 0x0000_0005);
    u.write_register(0x00, 0x0000_0003);
    assert!(rec.events().is_empty());
    assert_eq!(u.region(0), Region::new(5, 3, 3));

    let t = u.translate(5 * 4096);
    assert_eq!(t.permission, Permission::ReadWrite);
    assert_eq!(u.lookup(5 * 4096).map(|(slot, _)| slot), Some(0));

    // Reprogram the size word: previous pages 5, 6, 7 are revoked
    u.write_register(0x00, 0x0000_1003);
    assert_eq!(rec.iovas(), vec![5 * 4096, 6 * 4096, 7 * 4096]);
    assert_eq!(u.region(0), Region::new(5, 0x1003, 3));
}

#[test]
fn test_v1_high_flag_bit_change() {
    let u = unit(1);
    u.write_register(base_reg(0), 100);
    u.write_register(size_reg(0), 10);
    assert_eq!(u.region(0), Region::new(100, 10, 10));

    let rec = Recorder::new();
    u.subscribe(rec.clone());

    // Bit 31 sits above the 19-bit length field: flags-only change
    u.write_register(size_reg(0), 0x8000_000A);
    assert_eq!(u.region(0), Region::new(100, 10, 0x8000_000A));
    let expected: Vec<u64> = (100..110).map(|p| p * 4096).collect();
    assert_eq!(rec.iovas(), expected);
}

#[test]
fn test_writes_outside_region_registers() {
    let u = unit(1);
    program_v3(&u, 0, 1, 1, 1);
    let before = u.regions();
    let rec = Recorder::new();
    u.subscribe(rec.clone());

    // 0x80.. decodes nothing before V3
    assert_eq!(u.write_register(0x80, 0xFFFF_FFFF), 0);
    assert_eq!(u.write_register(0x1000, 0xABCD), 0);
    assert_eq!(u.read_register(0x1000), 0xABCD);
    assert_eq!(u.regions(), before);
    assert!(rec.events().is_empty());
}

#[test]
fn test_no_subscribers_drops_events() {
    let u = unit(3);
    program_v3(&u, 0, 10, 5, 1);
    let emitted = u.notifier().events_emitted();
    assert_eq!(u.write_register(size_reg(0), 2), 1);
    assert_eq!(u.notifier().events_emitted(), emitted + 5);
}

#[test]
fn test_unsubscribe_stops_delivery() {
    let u = unit(3);
    let a = Recorder::new();
    let b = Recorder::new();
    let ida = u.subscribe(a.clone());
    u.subscribe(b.clone());
    assert_eq!(u.notifier().subscriber_count(), 2);

    // Setting flags revokes the 2-page (10, 2, 0) triple
    program_v3(&u, 0, 10, 2, 1);
    assert_eq!(a.events().len(), 2);
    u.write_register(size_reg(0), 2);
    assert_eq!(a.events().len(), 4);
    assert_eq!(b.events().len(), 4);

    assert!(u.unsubscribe(ida));
    assert!(!u.unsubscribe(ida));
    u.write_register(size_reg(0), 3);
    assert_eq!(a.events().len(), 4);
    assert_eq!(b.events().len(), 6);
}

/// Listener that translates every revoked page from inside the callback.
struct Retranslate {
    unit: std::sync::Mutex<Option<Arc<dmaremap::RemapUnit>>>,
    seen: std::sync::Mutex<Vec<Option<usize>>>,
}

impl UnmapListener for Retranslate {
    fn unmap(&self, event: &UnmapEvent) {
        if let Some(unit) = self.unit.lock().unwrap().as_ref() {
            let _ = unit.translate(event.iova);
            self.seen
                .lock()
                .unwrap()
                .push(unit.lookup(event.iova).map(|(slot, _)| slot));
        }
    }
}

#[test]
fn test_listener_sees_new_table() {
    let u = Arc::new(unit(3));
    program_v3(&u, 6, 0x10, 2, 1);

    let l = Arc::new(Retranslate {
        unit: std::sync::Mutex::new(Some(u.clone())),
        seen: std::sync::Mutex::new(Vec::new()),
    });
    u.subscribe(l.clone());

    // Move the region away: re-lookups during delivery find nothing
    u.write_register(base_reg(6), 0x80);
    assert_eq!(*l.seen.lock().unwrap(), vec![None, None]);

    l.unit.lock().unwrap().take();
}
