//! Construction-time configuration
//!
//! A unit is described by a revision, the size of its register window, a
//! bus address for that window and a name used only in diagnostics. The
//! values come either from code or from a device-tree node; the `fdt`
//! crate parses the blob zero-copy, so discovery needs no heap beyond the
//! identifier string.
//!
//! Expected node shape:
//!
//! ```text
//! dart@9020000 {
//!     compatible = "dmaremap,unit";
//!     reg = <0x0 0x09020000 0x0 0x8000>;
//!     revision = <2>;            // optional, defaults to 1
//! };
//! ```

use alloc::string::String;

use crate::devices::remap::decode::Revision;
use crate::error::RemapError;

/// Compatible string matched by [`RemapConfig::from_fdt`] by default.
pub const DEFAULT_COMPATIBLE: &str = "dmaremap,unit";

/// Register window size of the shipping hardware (32 KiB).
pub const DEFAULT_WINDOW_SIZE: usize = 0x8000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemapConfig {
    /// Diagnostic name
    pub identifier: String,
    /// Raw revision number; `None` means revision 1
    pub revision: Option<u32>,
    /// MMIO window size in bytes
    pub register_window_size: usize,
    /// Bus address the window is mapped at
    pub base_address: u64,
}

impl RemapConfig {
    pub fn new(identifier: &str, base_address: u64) -> Self {
        Self {
            identifier: String::from(identifier),
            revision: None,
            register_window_size: DEFAULT_WINDOW_SIZE,
            base_address,
        }
    }

    pub fn with_revision(mut self, revision: u32) -> Self {
        self.revision = Some(revision);
        self
    }

    pub fn with_window_size(mut self, size: usize) -> Self {
        self.register_window_size = size;
        self
    }

    /// Resolve the revision and check the window can hold its registers.
    pub fn validate(&self) -> Result<Revision, RemapError> {
        let rev = Revision::from_config(self.revision)?;
        let required = rev.region_span();
        if self.register_window_size < required {
            return Err(RemapError::WindowTooSmall {
                size: self.register_window_size,
                required,
            });
        }
        Ok(rev)
    }

    /// Discover the unit from a flattened device tree.
    ///
    /// Takes the first node whose `compatible` contains `compatible`; its
    /// first `reg` entry gives the window base and size, the optional
    /// `revision` cell gives the hardware revision, and the node name
    /// becomes the identifier. A `revision` property that is present but
    /// not a 32-bit value fails with [`RemapError::MalformedRevision`]; the
    /// revision number itself is checked later by [`RemapConfig::validate`].
    pub fn from_fdt(blob: &[u8], compatible: &str) -> Result<Self, RemapError> {
        let fdt = fdt::Fdt::new(blob).map_err(|_| RemapError::InvalidDeviceTree)?;
        let node = fdt
            .find_compatible(&[compatible])
            .ok_or(RemapError::DeviceNotFound)?;

        let name = node.name;
        let revision = match node.property("revision") {
            Some(prop) => Some(parse_revision(prop.value)?),
            None => None,
        };

        let reg = node
            .reg()
            .and_then(|mut regs| regs.next())
            .ok_or(RemapError::MissingReg)?;
        let size = reg.size.ok_or(RemapError::MissingReg)?;

        log::debug!(
            "fdt: {} at {:#x} size {:#x} revision {:?}",
            name,
            reg.starting_address as u64,
            size,
            revision
        );

        Ok(Self {
            identifier: String::from(name),
            revision,
            register_window_size: size,
            base_address: reg.starting_address as u64,
        })
    }
}

/// Decode a `revision` property value: one big-endian cell, or two cells
/// whose value still fits in 32 bits. Anything else is refused rather than
/// read as "absent".
fn parse_revision(value: &[u8]) -> Result<u32, RemapError> {
    match value.len() {
        4 => {
            let mut cell = [0u8; 4];
            cell.copy_from_slice(value);
            Ok(u32::from_be_bytes(cell))
        }
        8 => {
            let mut cells = [0u8; 8];
            cells.copy_from_slice(value);
            u32::try_from(u64::from_be_bytes(cells)).map_err(|_| RemapError::MalformedRevision)
        }
        _ => Err(RemapError::MalformedRevision),
    }
}
