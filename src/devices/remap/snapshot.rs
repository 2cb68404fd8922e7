/// Checkpoint / restore
///
/// The register window and the cached region table are saved and restored
/// together. The table is *not* re-derived on restore: a restored unit must
/// translate exactly like the one that was saved.
///
/// Blob layout (little-endian):
///   0x00  magic "DMRP"
///   0x04  format version (u32)
///   0x08  revision (u32)
///   0x0C  window size in bytes (u32)
///   0x10  register bytes
///   ...   16 slot records: base (u64), length (u64), flags (u32)
///
/// Nothing may follow the last slot record.
use alloc::vec::Vec;

use super::decode::{Region, NUM_SLOTS};
use super::RemapUnit;
use crate::error::RemapError;

const SNAPSHOT_MAGIC: [u8; 4] = *b"DMRP";
const SNAPSHOT_VERSION: u32 = 1;
const HEADER_SIZE: usize = 16;
const SLOT_RECORD_SIZE: usize = 8 + 8 + 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemapSnapshot {
    pub revision: u32,
    pub registers: Vec<u8>,
    pub regions: [Region; NUM_SLOTS],
}

impl RemapSnapshot {
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.registers.len() + NUM_SLOTS * SLOT_RECORD_SIZE
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(&SNAPSHOT_MAGIC);
        out.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
        out.extend_from_slice(&self.revision.to_le_bytes());
        out.extend_from_slice(&(self.registers.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.registers);
        for r in &self.regions {
            out.extend_from_slice(&r.base.to_le_bytes());
            out.extend_from_slice(&r.length.to_le_bytes());
            out.extend_from_slice(&r.flags.to_le_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RemapError> {
        let mut rd = Reader { bytes, pos: 0 };

        if rd.take(4)? != &SNAPSHOT_MAGIC[..] {
            return Err(RemapError::SnapshotBadMagic);
        }
        let version = rd.u32()?;
        if version != SNAPSHOT_VERSION {
            return Err(RemapError::SnapshotVersion(version));
        }
        let revision = rd.u32()?;
        let window = rd.u32()? as usize;
        let registers = rd.take(window)?.to_vec();

        let mut regions = [Region::EMPTY; NUM_SLOTS];
        for r in regions.iter_mut() {
            r.base = rd.u64()?;
            r.length = rd.u64()?;
            r.flags = rd.u32()?;
        }
        if rd.pos != bytes.len() {
            return Err(RemapError::SnapshotTrailingData);
        }

        Ok(Self {
            revision,
            registers,
            regions,
        })
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], RemapError> {
        let end = self.pos.checked_add(n).ok_or(RemapError::SnapshotTruncated)?;
        let out = self
            .bytes
            .get(self.pos..end)
            .ok_or(RemapError::SnapshotTruncated)?;
        self.pos = end;
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32, RemapError> {
        let mut b = [0u8; 4];
        b.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(b))
    }

    fn u64(&mut self) -> Result<u64, RemapError> {
        let mut b = [0u8; 8];
        b.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(b))
    }
}

impl RemapUnit {
    /// Capture registers and region table under one lock hold.
    pub fn snapshot(&self) -> RemapSnapshot {
        let regs = self.regs.lock();
        let table = self.table.read();
        RemapSnapshot {
            revision: self.revision.as_u32(),
            registers: regs.as_bytes().to_vec(),
            regions: *table.slots(),
        }
    }

    /// Load a checkpoint taken from a unit of the same revision and window
    /// size. No unmap events are emitted.
    pub fn restore(&self, snap: &RemapSnapshot) -> Result<(), RemapError> {
        if snap.revision != self.revision.as_u32() || snap.registers.len() != self.window_size {
            log::warn!(
                "{}: rejecting checkpoint (rev {} window {:#x})",
                self.identifier,
                snap.revision,
                snap.registers.len()
            );
            return Err(RemapError::SnapshotMismatch);
        }

        let mut regs = self.regs.lock();
        let mut table = self.table.write();
        regs.load(&snap.registers);
        table.load(&snap.regions);
        log::info!("{}: restored checkpoint", self.identifier);
        Ok(())
    }

    /// Encode the current state into a checkpoint blob.
    pub fn save(&self) -> Vec<u8> {
        self.snapshot().to_bytes()
    }

    /// Decode and restore a checkpoint blob.
    pub fn load(&self, bytes: &[u8]) -> Result<(), RemapError> {
        let snap = RemapSnapshot::from_bytes(bytes)?;
        self.restore(&snap)
    }
}
