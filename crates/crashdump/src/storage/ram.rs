//! Always-on RAM adapter.

use core::sync::atomic::{compiler_fence, Ordering};

use super::{len_u32, DumpStorage, StorageError};
use crate::layout::ERASED_BYTE;
use crate::region::PersistentRegion;

/// Persistent region in RAM that is not cleared by reset or by the runtime's
/// `.bss`/`.data` initialisation (a dedicated `CRASHDUMP` range in `memory.x`,
/// backup SRAM, ...).
///
/// Accesses outside the region are rejected with
/// [`StorageError::OutOfBounds`]; inside it, the adapter cannot fail.
pub struct RamStorage {
    ptr: *mut u8,
    region: PersistentRegion,
}

impl RamStorage {
    /// Adapter over the RAM at `region`'s own addresses.
    ///
    /// # Safety
    ///
    /// - `region` must be RAM that is readable and writable for as long as the
    ///   adapter exists.
    /// - No Rust reference may alias the region while the adapter is in use.
    pub unsafe fn new(region: PersistentRegion) -> Self {
        Self {
            ptr: region.base() as usize as *mut u8,
            region,
        }
    }

    /// Adapter that maps `region.base()` onto `ptr`.
    ///
    /// Used when the region's addresses are not the host's addresses, e.g. a
    /// buffer standing in for target RAM.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `region.capacity()` bytes
    /// for as long as the adapter exists, with no aliasing Rust references.
    pub const unsafe fn from_raw_parts(ptr: *mut u8, region: PersistentRegion) -> Self {
        Self { ptr, region }
    }

    fn span(&self, address: u32, len: u32) -> Result<*mut u8, StorageError> {
        if !self.region.contains(address, len) {
            return Err(StorageError::OutOfBounds);
        }
        let offset = address.wrapping_sub(self.region.base());
        Ok(self.ptr.wrapping_add(offset as usize))
    }
}

impl DumpStorage for RamStorage {
    type Error = StorageError;

    fn erase(&mut self, address: u32, len: u32) -> Result<(), Self::Error> {
        let dst = self.span(address, len)?;
        // SAFETY: `span` checked the range against the region, which the
        // constructor contract guarantees is valid, unaliased RAM.
        unsafe { core::ptr::write_bytes(dst, ERASED_BYTE, len as usize) };
        Ok(())
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), Self::Error> {
        let dst = self.span(address, len_u32(data)?)?;
        // SAFETY: destination range checked as in `erase`; `data` is a live
        // slice and cannot overlap the region (no references into it exist).
        unsafe { core::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len()) };
        Ok(())
    }

    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        let src = self.span(address, len_u32(buf)?)?;
        // SAFETY: source range checked as in `erase`; `buf` is exclusively
        // borrowed and cannot overlap the region.
        unsafe { core::ptr::copy_nonoverlapping(src, buf.as_mut_ptr(), buf.len()) };
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        // Keep the stores ahead of whatever follows (a reset, usually).
        compiler_fence(Ordering::SeqCst);
        Ok(())
    }
}
