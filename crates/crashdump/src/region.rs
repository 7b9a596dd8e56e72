//! Persistent region descriptor.

use thiserror_no_std::Error;

use crate::layout::{FAULT_STATUS_SIZE, RECORD_HEADER_SIZE};

/// Region configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegionError {
    /// Capacity cannot hold the 56-byte record header.
    #[error("region of {0} bytes cannot hold the record header")]
    TooSmall(u32),
    /// `base + capacity` does not fit in the 32-bit address space.
    #[error("region end overflows the address space")]
    AddressOverflow,
    /// Region does not meet the storage medium's alignment.
    #[error("region is not aligned to {0} bytes")]
    Misaligned(u32),
}

/// Address range holding the fault record.
///
/// Base and capacity are configuration, not protocol: capture and retrieval
/// builds must agree on them. Every storage operation takes the region
/// explicitly; there is no global.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PersistentRegion {
    base: u32,
    capacity: u32,
}

impl PersistentRegion {
    /// Describe a region of `capacity` bytes starting at `base`.
    ///
    /// # Errors
    ///
    /// - [`RegionError::TooSmall`] if `capacity` is below the record header
    /// - [`RegionError::AddressOverflow`] if the region wraps the address space
    pub const fn new(base: u32, capacity: u32) -> Result<Self, RegionError> {
        if capacity < RECORD_HEADER_SIZE {
            return Err(RegionError::TooSmall(capacity));
        }
        if base.checked_add(capacity).is_none() {
            return Err(RegionError::AddressOverflow);
        }
        Ok(Self { base, capacity })
    }

    /// Describe the region `[start, end)`.
    pub const fn from_bounds(start: u32, end: u32) -> Result<Self, RegionError> {
        match end.checked_sub(start) {
            Some(capacity) => Self::new(start, capacity),
            None => Err(RegionError::TooSmall(0)),
        }
    }

    /// First address of the region.
    pub const fn base(&self) -> u32 {
        self.base
    }

    /// Size in bytes.
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// One past the last address.
    pub const fn end(&self) -> u32 {
        // Checked in `new`.
        self.base.wrapping_add(self.capacity)
    }

    /// Bytes available after the fault-status snapshot for the contiguous
    /// exception frame + stack copy.
    pub const fn frame_budget(&self) -> u32 {
        self.capacity.saturating_sub(FAULT_STATUS_SIZE)
    }

    /// Absolute address of `offset` within the region.
    pub const fn address_of(&self, offset: u32) -> u32 {
        self.base.wrapping_add(offset)
    }

    /// True when `[address, address + len)` lies inside the region.
    pub const fn contains(&self, address: u32, len: u32) -> bool {
        match address.checked_add(len) {
            Some(end) => address >= self.base && end <= self.end(),
            None => false,
        }
    }

    /// Check that base and capacity are multiples of `align`.
    pub const fn check_alignment(&self, align: u32) -> Result<(), RegionError> {
        match (self.base.checked_rem(align), self.capacity.checked_rem(align)) {
            (Some(0), Some(0)) => Ok(()),
            _ => Err(RegionError::Misaligned(align)),
        }
    }
}
