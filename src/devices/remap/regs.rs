/// Register file backing the unit's MMIO window.
///
/// Plain little-endian byte storage: a store never has side effects of its
/// own, and a load returns exactly what was last stored. Width and
/// alignment are enforced by the bus before an access gets here.
use alloc::vec;
use alloc::vec::Vec;

pub struct RegisterFile {
    bytes: Vec<u8>,
}

impl RegisterFile {
    /// Create a zeroed window of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self { bytes: vec![0; size] }
    }

    /// Window size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Load the 32-bit word at `offset`.
    pub fn read_word(&self, offset: usize) -> u32 {
        debug_assert!(offset & 0x3 == 0, "unaligned register read at {:#x}", offset);
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.bytes[offset..offset + 4]);
        u32::from_le_bytes(word)
    }

    /// Store `value` at `offset`. Returns the previous word.
    pub fn write_word(&mut self, offset: usize, value: u32) -> u32 {
        debug_assert!(offset & 0x3 == 0, "unaligned register write at {:#x}", offset);
        let old = self.read_word(offset);
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        old
    }

    /// Zero the whole window.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    /// Raw view used by the region decoders and checkpointing.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Replace the contents wholesale. `bytes.len()` must equal `len()`.
    pub(crate) fn load(&mut self, bytes: &[u8]) {
        self.bytes.copy_from_slice(bytes);
    }
}
