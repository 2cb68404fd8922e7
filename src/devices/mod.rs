//! Device Emulation Framework
//!
//! Routes MMIO accesses to emulated devices via enum dispatch.
//! Devices are registered into an array of up to `MAX_DEVICES` slots.
//!
//! The bus owns access-shape checking: devices only ever see 4-byte,
//! 4-byte-aligned accesses that fall inside their window.

pub mod remap;

use alloc::sync::Arc;
use core::fmt;

/// Trait for MMIO-accessible devices
///
/// - `read()`/`write()` receive offsets relative to `base_address()`
/// - Devices use interior locking, so accesses take `&self`
/// - Return `None`/`false` for invalid offsets
pub trait MmioDevice {
    fn read(&self, offset: u64, size: u8) -> Option<u64>;
    fn write(&self, offset: u64, value: u64, size: u8) -> bool;
    fn base_address(&self) -> u64;
    fn size(&self) -> u64;

    fn contains(&self, addr: u64) -> bool {
        let base = self.base_address();
        addr >= base && addr - base < self.size()
    }

    /// System reset.
    fn reset(&self) {}
}

// ── Enum dispatch ──────────────────────────────────────────────────

/// Device variant enum — one variant per supported device type.
///
/// Devices are held by `Arc` so DMA-capable peripherals can keep their own
/// handle to the unit that translates for them.
#[derive(Clone)]
pub enum Device {
    Remap(Arc<remap::RemapUnit>),
}

impl MmioDevice for Device {
    fn read(&self, offset: u64, size: u8) -> Option<u64> {
        match self {
            Device::Remap(d) => d.read(offset, size),
        }
    }

    fn write(&self, offset: u64, value: u64, size: u8) -> bool {
        match self {
            Device::Remap(d) => d.write(offset, value, size),
        }
    }

    fn base_address(&self) -> u64 {
        match self {
            Device::Remap(d) => d.base_address(),
        }
    }

    fn size(&self) -> u64 {
        match self {
            Device::Remap(d) => d.size(),
        }
    }

    fn reset(&self) {
        match self {
            Device::Remap(d) => MmioDevice::reset(d.as_ref()),
        }
    }
}

// ── Bus ────────────────────────────────────────────────────────────

const MAX_DEVICES: usize = 8;

/// Only 32-bit register accesses are accepted.
const ACCESS_SIZE: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// No registered device decodes the address.
    Unmapped(u64),
    /// Access width other than 4 bytes.
    BadWidth(u8),
    /// Address not 4-byte aligned.
    Misaligned(u64),
    /// Device refused the offset.
    Rejected(u64),
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusError::Unmapped(addr) => write!(f, "no device at {:#x}", addr),
            BusError::BadWidth(size) => write!(f, "unsupported access width {}", size),
            BusError::Misaligned(addr) => write!(f, "misaligned access at {:#x}", addr),
            BusError::Rejected(addr) => write!(f, "device rejected access at {:#x}", addr),
        }
    }
}

/// MMIO bus — routes accesses to registered devices by address.
pub struct MmioBus {
    devices: [Option<Device>; MAX_DEVICES],
    count: usize,
}

impl MmioBus {
    pub const fn new() -> Self {
        Self {
            devices: [const { None }; MAX_DEVICES],
            count: 0,
        }
    }

    /// Register a device. Returns slot index on success, `None` when the
    /// bus is full, the window wraps past the top of the address space or
    /// it overlaps an existing device.
    pub fn register_device(&mut self, dev: Device) -> Option<usize> {
        if self.count >= MAX_DEVICES {
            log::warn!("mmio bus full, dropping device at {:#x}", dev.base_address());
            return None;
        }
        let base = dev.base_address();
        let Some(end) = base.checked_add(dev.size()) else {
            log::warn!("mmio window at {:#x} wraps the address space", base);
            return None;
        };
        for existing in self.devices.iter().flatten() {
            let ebase = existing.base_address();
            // Registered windows never wrap
            let eend = ebase.saturating_add(existing.size());
            if base < eend && ebase < end {
                log::warn!("mmio window {:#x}..{:#x} overlaps {:#x}", base, end, ebase);
                return None;
            }
        }
        let idx = self.count;
        self.devices[idx] = Some(dev);
        self.count += 1;
        Some(idx)
    }

    /// Attach a remap unit and return the shared handle.
    pub fn attach_remap(&mut self, unit: remap::RemapUnit) -> Option<Arc<remap::RemapUnit>> {
        let unit = Arc::new(unit);
        self.register_device(Device::Remap(Arc::clone(&unit)))?;
        Some(unit)
    }

    pub fn device_count(&self) -> usize {
        self.count
    }

    /// Handle an MMIO access at absolute address `addr`.
    ///
    /// Reads return the register value; writes return 0.
    pub fn handle_mmio(
        &self,
        addr: u64,
        value: u64,
        size: u8,
        is_write: bool,
    ) -> Result<u64, BusError> {
        if size != ACCESS_SIZE {
            log::warn!("mmio {:#x}: rejecting {}-byte access", addr, size);
            return Err(BusError::BadWidth(size));
        }
        if addr & (ACCESS_SIZE as u64 - 1) != 0 {
            log::warn!("mmio {:#x}: rejecting misaligned access", addr);
            return Err(BusError::Misaligned(addr));
        }

        let dev = self
            .devices
            .iter()
            .flatten()
            .find(|dev| dev.contains(addr))
            .ok_or_else(|| {
                log::warn!("mmio {:#x}: no device", addr);
                BusError::Unmapped(addr)
            })?;

        let offset = addr - dev.base_address();
        if is_write {
            if dev.write(offset, value, size) {
                Ok(0)
            } else {
                Err(BusError::Rejected(addr))
            }
        } else {
            dev.read(offset, size).ok_or(BusError::Rejected(addr))
        }
    }

    /// System reset of every registered device.
    pub fn reset(&self) {
        for dev in self.devices.iter().flatten() {
            dev.reset();
        }
    }
}

impl Default for MmioBus {
    fn default() -> Self {
        Self::new()
    }
}
