//! DMA address-remapping unit
//!
//! Sits between a peripheral's DMA master and the system address space and
//! decides which 4 KiB pages the peripheral may touch. Software programs up
//! to 16 regions through the register window; after every write the unit
//! re-decodes all regions, and any slot whose triple changed has its whole
//! previous range revoked page by page before the new triple takes effect.
//!
//! Locking: `regs` then `table`, never the other way round. Translation
//! only takes `table` for reading, so it sees each slot either fully old or
//! fully new. Listeners run after both locks are dropped.

pub mod decode;
pub mod notify;
pub mod regs;
pub mod snapshot;
pub mod table;
pub mod translate;

use alloc::string::String;
use alloc::sync::Arc;

use spin::{Mutex, RwLock};

use crate::config::RemapConfig;
use crate::devices::MmioDevice;
use crate::error::RemapError;
use decode::{decode_all, Region, Revision, NUM_SLOTS};
use notify::{InvalidationNotifier, SubscriberId, UnmapListener};
use regs::RegisterFile;
use table::RegionTable;
use translate::{translate_in, DmaTranslator, TranslationResult};

pub struct RemapUnit {
    identifier: String,
    base: u64,
    revision: Revision,
    window_size: usize,
    regs: Mutex<RegisterFile>,
    table: RwLock<RegionTable>,
    notifier: InvalidationNotifier,
}

impl RemapUnit {
    /// Build a zeroed unit. Fails on an unsupported revision or a window
    /// too small for the revision's region registers.
    pub fn new(config: &RemapConfig) -> Result<Self, RemapError> {
        let revision = match config.validate() {
            Ok(rev) => rev,
            Err(e) => {
                log::error!("{}: {}", config.identifier, e);
                return Err(e);
            }
        };

        log::info!(
            "{}: remap unit rev {} at {:#x}, window {:#x}",
            config.identifier,
            revision.as_u32(),
            config.base_address,
            config.register_window_size
        );

        Ok(Self {
            identifier: config.identifier.clone(),
            base: config.base_address,
            revision,
            window_size: config.register_window_size,
            regs: Mutex::new(RegisterFile::new(config.register_window_size)),
            table: RwLock::new(RegionTable::new()),
            notifier: InvalidationNotifier::new(),
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Raw word at `offset`. No side effects.
    ///
    /// Panics if `offset + 4 > window_size()`. The bus only forwards
    /// aligned offsets inside the window; use [`MmioDevice::read`] for a
    /// checked access.
    pub fn read_register(&self, offset: usize) -> u32 {
        self.regs.lock().read_word(offset)
    }

    /// Store `value` at `offset` and resynchronize the region table.
    ///
    /// Each slot whose decoded triple changed has every page of its
    /// previous range revoked, even pages the new triple still covers.
    /// Returns the number of slots that changed.
    ///
    /// Panics if `offset + 4 > window_size()`. The bus only forwards
    /// aligned offsets inside the window; use [`MmioDevice::write`] for a
    /// checked access.
    pub fn write_register(&self, offset: usize, value: u32) -> usize {
        let stale = {
            let mut regs = self.regs.lock();
            regs.write_word(offset, value);
            if offset >= self.revision.region_span() {
                return 0;
            }
            let candidates = decode_all(self.revision, regs.as_bytes());
            let mut table = self.table.write();
            table.sync(&candidates)
        };

        if stale.is_empty() {
            return 0;
        }

        log::debug!(
            "{}: write {:#x} <- {:#010x} changed {} slot(s), revoking {} page(s)",
            self.identifier,
            offset,
            value,
            stale.len(),
            stale.page_count()
        );

        for (slot, old) in stale.iter() {
            log::trace!(
                "{}: slot {} revoke base={:#x} len={:#x} flags={:#x}",
                self.identifier,
                slot,
                old.base,
                old.length,
                old.flags
            );
            self.notifier.revoke_region(old);
        }

        stale.len()
    }

    /// Cached region for `slot`. Panics if `slot >= NUM_SLOTS`.
    pub fn region(&self, slot: usize) -> Region {
        self.table.read().get(slot)
    }

    /// Consistent copy of all cached regions.
    pub fn regions(&self) -> [Region; NUM_SLOTS] {
        *self.table.read().slots()
    }

    /// Slot that authorizes `iova`, if any.
    pub fn lookup(&self, iova: u64) -> Option<(usize, Region)> {
        self.table.read().find(iova >> decode::PAGE_SHIFT)
    }

    pub fn subscribe(&self, listener: Arc<dyn UnmapListener>) -> SubscriberId {
        self.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.notifier.unsubscribe(id)
    }

    pub fn notifier(&self) -> &InvalidationNotifier {
        &self.notifier
    }

    /// System reset: every register and every slot back to zero.
    ///
    /// No unmap events are emitted; the machine resets the address space
    /// alongside the unit.
    pub fn reset(&self) {
        let mut regs = self.regs.lock();
        let mut table = self.table.write();
        regs.clear();
        table.clear();
        log::info!("{}: reset", self.identifier);
    }
}

impl DmaTranslator for RemapUnit {
    fn realize(config: &RemapConfig) -> Result<Self, RemapError> {
        Self::new(config)
    }

    fn translate(&self, iova: u64) -> TranslationResult {
        translate_in(&self.table.read(), iova)
    }

    fn reset(&self) {
        RemapUnit::reset(self);
    }
}

impl MmioDevice for RemapUnit {
    fn read(&self, offset: u64, _size: u8) -> Option<u64> {
        if offset.checked_add(4).map_or(true, |end| end > self.size()) {
            return None;
        }
        Some(self.read_register(offset as usize) as u64)
    }

    fn write(&self, offset: u64, value: u64, _size: u8) -> bool {
        if offset.checked_add(4).map_or(true, |end| end > self.size()) {
            return false;
        }
        self.write_register(offset as usize, value as u32);
        true
    }

    fn base_address(&self) -> u64 {
        self.base
    }

    fn size(&self) -> u64 {
        self.window_size() as u64
    }

    fn reset(&self) {
        RemapUnit::reset(self);
    }
}
