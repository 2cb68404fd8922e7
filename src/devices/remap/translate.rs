/// Translation query path
///
/// The unit authorizes rather than remaps: the translated page always
/// equals the input page.
use super::decode::{PAGE_MASK, PAGE_SHIFT};
use super::table::RegionTable;
use crate::config::RemapConfig;
use crate::error::RemapError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    None,
    Read,
    Write,
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationResult {
    pub iova_page: u64,
    pub translated_page: u64,
    /// Offset mask within a page, fixed at 4 KiB granularity
    pub page_mask: u64,
    pub permission: Permission,
}

/// What DMA-capable peripherals and the machine see of a translation unit.
pub trait DmaTranslator {
    /// Build the unit from its construction-time configuration.
    fn realize(config: &RemapConfig) -> Result<Self, RemapError>
    where
        Self: Sized;

    /// Authorization for `iova`. Never fails and never blocks on I/O.
    fn translate(&self, iova: u64) -> TranslationResult;

    /// System reset: every register and every slot back to zero.
    fn reset(&self);
}

/// Resolve `iova` against a table snapshot.
///
/// NOTE: fail-open. The result is ReadWrite whether or not a slot covers
/// the page; dependent peripherals were validated against this.
pub fn translate_in(table: &RegionTable, iova: u64) -> TranslationResult {
    let page = iova >> PAGE_SHIFT;
    let mut result = TranslationResult {
        iova_page: page,
        translated_page: page,
        page_mask: PAGE_MASK,
        permission: Permission::ReadWrite,
    };

    if table.find(page).is_some() {
        result.permission = Permission::ReadWrite;
    }

    result
}
