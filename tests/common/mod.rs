//! Shared test fixtures

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use dmaremap::{RemapConfig, RemapUnit, UnmapEvent, UnmapListener};

/// Listener that records every unmap event it sees.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<UnmapEvent>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<UnmapEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn iovas(&self) -> Vec<u64> {
        self.events().iter().map(|e| e.iova).collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl UnmapListener for Recorder {
    fn unmap(&self, event: &UnmapEvent) {
        self.events.lock().unwrap().push(*event);
    }
}

pub const UNIT_BASE: u64 = 0x0902_0000;

pub fn unit(revision: u32) -> RemapUnit {
    let cfg = RemapConfig::new("dart-test", UNIT_BASE).with_revision(revision);
    RemapUnit::new(&cfg).unwrap()
}

/// Register offsets for slot `i`.
pub fn size_reg(i: usize) -> usize {
    4 * i
}

pub fn base_reg(i: usize) -> usize {
    0x40 + 4 * i
}

pub fn length_reg(i: usize) -> usize {
    0x80 + 4 * i
}

/// Program a V3 slot: base, length, then flags.
pub fn program_v3(unit: &RemapUnit, slot: usize, base: u32, length: u32, flags: u32) {
    unit.write_register(base_reg(slot), base);
    unit.write_register(length_reg(slot), length);
    unit.write_register(size_reg(slot), flags);
}
