//! Storage adapter contract for the persistent region.
//!
//! The capture pipeline and the retrieval API only ever talk to a
//! [`DumpStorage`]. Two adapters ship with the crate:
//!
//! - [`RamStorage`]: battery-backed or otherwise always-on RAM that survives
//!   a system reset. Erase is a fill, write/read are plain copies.
//! - [`FlashStorage`]: any `embedded-storage` NOR flash. Erase works on whole
//!   pages, writes are staged into aligned program words.
//!
//! Every adapter presents the same erased state (`0xFF`), so a freshly erased
//! region reads back with the "no fault" program-counter sentinel.

mod flash;
mod ram;

pub use flash::FlashStorage;
pub use ram::RamStorage;

use embedded_storage::nor_flash::NorFlashErrorKind;
use thiserror_no_std::Error;

/// Failure reported by a storage adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// Access falls outside the persistent region.
    #[error("access outside the persistent region")]
    OutOfBounds,
    /// Access violates the medium's alignment rules.
    #[error("access is not aligned for this medium")]
    NotAligned,
    /// The flash program word is larger than the adapter's staging buffer.
    #[error("flash write size {0} exceeds the staging buffer")]
    UnsupportedWriteSize(u32),
    /// The underlying flash driver failed.
    #[error("flash driver error: {0}")]
    Flash(FlashFault),
}

/// Driver-level flash failure, detached from the driver's own error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashFault {
    /// Driver rejected the alignment.
    #[error("not aligned")]
    NotAligned,
    /// Driver rejected the address range.
    #[error("out of bounds")]
    OutOfBounds,
    /// Any other driver failure (program/erase error, write protection, ...).
    #[error("other")]
    Other,
}

impl From<NorFlashErrorKind> for FlashFault {
    fn from(kind: NorFlashErrorKind) -> Self {
        match kind {
            NorFlashErrorKind::NotAligned => Self::NotAligned,
            NorFlashErrorKind::OutOfBounds => Self::OutOfBounds,
            _ => Self::Other,
        }
    }
}

/// Byte-addressable persistent storage.
///
/// Addresses are absolute (the same address space the persistent region is
/// described in). Implementations are synchronous and non-reentrant; the
/// crate never wraps them in a lock because the single writer (the fault
/// handler) and the readers (startup code) are separated by a reset.
pub trait DumpStorage {
    /// Error type
    type Error: core::fmt::Debug;

    /// Return `[address, address + len)` to the erased state (`0xFF`).
    fn erase(&mut self, address: u32, len: u32) -> Result<(), Self::Error>;

    /// Store `data` at `address`. The target range must be erased.
    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), Self::Error>;

    /// Fill `buf` from `address`.
    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Commit anything a previous [`write`](Self::write) left buffered.
    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl<S: DumpStorage + ?Sized> DumpStorage for &mut S {
    type Error = S::Error;

    fn erase(&mut self, address: u32, len: u32) -> Result<(), Self::Error> {
        (**self).erase(address, len)
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), Self::Error> {
        (**self).write(address, data)
    }

    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        (**self).read(address, buf)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        (**self).flush()
    }
}

/// Length of a slice as a 32-bit storage length.
pub(crate) fn len_u32(bytes: &[u8]) -> Result<u32, StorageError> {
    u32::try_from(bytes.len()).map_err(|_| StorageError::OutOfBounds)
}
