/// Region register decoding
///
/// Each hardware revision packs a slot's base, length and flags into the
/// register window differently. Decoders here are pure functions over the
/// raw window bytes so they can be checked against literal bit patterns
/// without a live unit.
///
/// Register map (slot `i` in 0..16, 32-bit little-endian words):
///   0x000 + 4i  SIZE   — V1/V2: length in low bits, flags elsewhere
///                        V3: flags (whole word)
///   0x040 + 4i  BASE   — base page number
///   0x080 + 4i  LENGTH — V3 only: length in pages
///
/// Base and length are 4 KiB page numbers; the hardware stores addresses
/// already shifted right by `PAGE_SHIFT`.
use crate::error::RemapError;

/// Number of region slots in every revision.
pub const NUM_SLOTS: usize = 16;

pub const PAGE_SHIFT: u32 = 12;
pub const PAGE_SIZE: u64 = 1 << PAGE_SHIFT;
pub const PAGE_MASK: u64 = PAGE_SIZE - 1;

// ── Register offsets ────────────────────────────────────────────────

const SIZE_REG_BASE: usize = 0x000;
const BASE_REG_BASE: usize = 0x040;
const LENGTH_REG_BASE: usize = 0x080;

// ── Field masks ─────────────────────────────────────────────────────

const V1_BASE_MASK: u32 = 0x00FF_FFFF;
const V1_LENGTH_MASK: u32 = 0x0007_FFFF;
// 19-bit length field at bits [30:12] is not part of the flags
const V1_FLAGS_MASK: u32 = !(V1_LENGTH_MASK << 12);

const V2_BASE_MASK: u32 = 0x00FF_FFFF;
const V2_LENGTH_MASK: u32 = 0x00FF_FFFF;
// 24-bit length field at bits [35:12]; only [31:12] exist in the word
const V2_FLAGS_MASK: u32 = !((V2_LENGTH_MASK as u64) << 12) as u32;

const V3_BASE_MASK: u32 = 0x3FFF_FFFF;
const V3_LENGTH_MASK: u32 = 0x3FFF_FFFF;

/// Hardware generation, fixed for the lifetime of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revision {
    V1,
    V2,
    V3,
}

impl Revision {
    /// Map the configuration value onto a revision.
    ///
    /// Absent means revision 1. Anything outside 1..=3 is fatal.
    pub fn from_config(raw: Option<u32>) -> Result<Self, RemapError> {
        match raw.unwrap_or(1) {
            1 => Ok(Revision::V1),
            2 => Ok(Revision::V2),
            3 => Ok(Revision::V3),
            other => Err(RemapError::UnsupportedRevision(other)),
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            Revision::V1 => 1,
            Revision::V2 => 2,
            Revision::V3 => 3,
        }
    }

    /// Byte span `[0, end)` holding every word the decoder reads.
    ///
    /// Writes past this span cannot change any decoded region.
    pub fn region_span(self) -> usize {
        match self {
            Revision::V1 | Revision::V2 => BASE_REG_BASE + 4 * NUM_SLOTS,
            Revision::V3 => LENGTH_REG_BASE + 4 * NUM_SLOTS,
        }
    }
}

/// One decoded region slot.
///
/// `length == 0` or `flags == 0` grants nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Region {
    /// First page number
    pub base: u64,
    /// Page count
    pub length: u64,
    /// Raw permission/config bits, revision-specific
    pub flags: u32,
}

impl Region {
    pub const EMPTY: Region = Region { base: 0, length: 0, flags: 0 };

    pub const fn new(base: u64, length: u64, flags: u32) -> Self {
        Self { base, length, flags }
    }

    /// True if `page` lies in `[base, base + length)`.
    pub fn contains_page(&self, page: u64) -> bool {
        page >= self.base && page - self.base < self.length
    }

    /// True if this slot grants any access at all.
    pub fn is_active(&self) -> bool {
        self.length != 0 && self.flags != 0
    }

    /// Page numbers covered by the region, in ascending order.
    pub fn pages(&self) -> impl Iterator<Item = u64> {
        let base = self.base;
        (0..self.length).map(move |i| base.wrapping_add(i))
    }
}

#[inline]
fn word(regs: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&regs[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

/// Decode slot `slot` from raw register bytes.
///
/// `regs` must cover at least `rev.region_span()` bytes and `slot` must be
/// below [`NUM_SLOTS`]; both are guaranteed by unit construction.
pub fn decode_region(rev: Revision, regs: &[u8], slot: usize) -> Region {
    assert!(slot < NUM_SLOTS, "region slot {} out of range", slot);

    let size = word(regs, SIZE_REG_BASE + 4 * slot);
    let base = word(regs, BASE_REG_BASE + 4 * slot);

    match rev {
        Revision::V1 => Region {
            base: (base & V1_BASE_MASK) as u64,
            length: (size & V1_LENGTH_MASK) as u64,
            flags: size & V1_FLAGS_MASK,
        },
        Revision::V2 => Region {
            base: (base & V2_BASE_MASK) as u64,
            length: (size & V2_LENGTH_MASK) as u64,
            flags: size & V2_FLAGS_MASK,
        },
        Revision::V3 => Region {
            base: (base & V3_BASE_MASK) as u64,
            length: (word(regs, LENGTH_REG_BASE + 4 * slot) & V3_LENGTH_MASK) as u64,
            flags: size,
        },
    }
}

/// Decode all slots at once.
pub fn decode_all(rev: Revision, regs: &[u8]) -> [Region; NUM_SLOTS] {
    let mut out = [Region::EMPTY; NUM_SLOTS];
    for (slot, region) in out.iter_mut().enumerate() {
        *region = decode_region(rev, regs, slot);
    }
    out
}
