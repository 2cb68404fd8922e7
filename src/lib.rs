#![cfg_attr(not(test), no_std)]

//! Secure DMA address-remapping unit.
//!
//! A register-programmed table of up to 16 page regions gates which pages a
//! DMA-capable peripheral may reach. Every register write re-derives the
//! table; any slot that changed has its previous pages revoked through
//! unmap events before the new region takes effect.

extern crate alloc;

pub mod config;
pub mod devices;
pub mod error;

pub use config::RemapConfig;
pub use devices::remap::decode::{Region, Revision, NUM_SLOTS, PAGE_SIZE};
pub use devices::remap::notify::{SubscriberId, UnmapEvent, UnmapListener};
pub use devices::remap::snapshot::RemapSnapshot;
pub use devices::remap::translate::{DmaTranslator, Permission, TranslationResult};
pub use devices::remap::RemapUnit;
pub use devices::{BusError, Device, MmioBus, MmioDevice};
pub use error::RemapError;
