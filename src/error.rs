//! Error types for unit construction, device-tree discovery and
//! checkpoint restore.
//!
//! Runtime MMIO and translation paths never produce these: translation
//! cannot fail and malformed accesses are stopped at the bus
//! (see [`crate::devices::BusError`]).

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemapError {
    /// `revision` property names a hardware generation we do not model.
    UnsupportedRevision(u32),
    /// `revision` property is present but is not a 32-bit cell value.
    MalformedRevision,
    /// Register window cannot hold the region registers of the revision.
    WindowTooSmall { size: usize, required: usize },
    /// No device-tree node carries the requested compatible string.
    DeviceNotFound,
    /// Device-tree node has no usable `reg` entry.
    MissingReg,
    /// Blob is not a flattened device tree.
    InvalidDeviceTree,
    /// Checkpoint blob ends before all fields were read.
    SnapshotTruncated,
    /// Checkpoint blob does not start with the expected magic.
    SnapshotBadMagic,
    /// Checkpoint format version is not understood.
    SnapshotVersion(u32),
    /// Checkpoint blob carries bytes after the last slot record.
    SnapshotTrailingData,
    /// Checkpoint was taken from a unit with a different revision or
    /// register window size.
    SnapshotMismatch,
}

impl fmt::Display for RemapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemapError::UnsupportedRevision(rev) => {
                write!(f, "unsupported hardware revision {}", rev)
            }
            RemapError::MalformedRevision => f.write_str("malformed revision property"),
            RemapError::WindowTooSmall { size, required } => write!(
                f,
                "register window of {:#x} bytes is smaller than required {:#x}",
                size, required
            ),
            RemapError::DeviceNotFound => f.write_str("no compatible device-tree node"),
            RemapError::MissingReg => f.write_str("device-tree node has no reg entry"),
            RemapError::InvalidDeviceTree => f.write_str("invalid flattened device tree"),
            RemapError::SnapshotTruncated => f.write_str("checkpoint truncated"),
            RemapError::SnapshotBadMagic => f.write_str("checkpoint magic mismatch"),
            RemapError::SnapshotVersion(v) => write!(f, "unknown checkpoint version {}", v),
            RemapError::SnapshotTrailingData => f.write_str("checkpoint has trailing data"),
            RemapError::SnapshotMismatch => {
                f.write_str("checkpoint taken from an incompatible unit")
            }
        }
    }
}
