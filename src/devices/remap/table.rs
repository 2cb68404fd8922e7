/// Region table
///
/// Caches the last decoded triple for each of the 16 hardware slots so a
/// register write can tell which slots actually changed. Slot index is
/// hardware identity, not insertion order.
use super::decode::{Region, NUM_SLOTS};

pub struct RegionTable {
    slots: [Region; NUM_SLOTS],
}

impl RegionTable {
    pub const fn new() -> Self {
        Self {
            slots: [Region::EMPTY; NUM_SLOTS],
        }
    }

    /// Cached region for `slot`. Panics if `slot >= NUM_SLOTS`.
    pub fn get(&self, slot: usize) -> Region {
        self.slots[slot]
    }

    pub fn slots(&self) -> &[Region; NUM_SLOTS] {
        &self.slots
    }

    /// Empty every slot.
    pub fn clear(&mut self) {
        self.slots = [Region::EMPTY; NUM_SLOTS];
    }

    /// Overwrite the whole table (checkpoint restore).
    pub(crate) fn load(&mut self, slots: &[Region; NUM_SLOTS]) {
        self.slots = *slots;
    }

    /// First active slot covering `page`, in slot order.
    pub fn find(&self, page: u64) -> Option<(usize, Region)> {
        self.slots
            .iter()
            .enumerate()
            .find(|(_, r)| r.flags != 0 && r.contains_page(page))
            .map(|(slot, r)| (slot, *r))
    }

    /// Diff `candidates` against the cached slots.
    ///
    /// Every slot whose base, length or flags differ is overwritten and
    /// its previous region is recorded as stale. Untouched slots are left
    /// alone and never reported.
    pub fn sync(&mut self, candidates: &[Region; NUM_SLOTS]) -> StaleRanges {
        let mut stale = StaleRanges::new();
        for (slot, (cached, candidate)) in
            self.slots.iter_mut().zip(candidates.iter()).enumerate()
        {
            if cached != candidate {
                stale.push(slot, *cached);
                *cached = *candidate;
            }
        }
        stale
    }
}

impl Default for RegionTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Previous regions of slots changed by one sync pass.
///
/// Bounded by the slot count, so no allocation is needed.
pub struct StaleRanges {
    entries: [(usize, Region); NUM_SLOTS],
    count: usize,
}

impl StaleRanges {
    fn new() -> Self {
        Self {
            entries: [(0, Region::EMPTY); NUM_SLOTS],
            count: 0,
        }
    }

    fn push(&mut self, slot: usize, old: Region) {
        self.entries[self.count] = (slot, old);
        self.count += 1;
    }

    /// Number of slots that changed.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// `(slot, previous region)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &(usize, Region)> {
        self.entries[..self.count].iter()
    }

    /// Total pages to revoke across all changed slots.
    pub fn page_count(&self) -> u64 {
        self.iter().map(|(_, r)| r.length).sum()
    }
}
