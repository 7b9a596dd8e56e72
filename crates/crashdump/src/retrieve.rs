//! Read-back, validity check and erase of the saved record.
//!
//! Used by ordinary startup code after the reset that ends a capture. The
//! typical boot sequence is:
//!
//! ```rust,ignore
//! let mut buf = [0u8; 1024];
//! if crashdump::read_saved_data(&mut storage, &region, &mut buf).is_ok()
//!     && crashdump::record_present(&buf)
//! {
//!     report(&buf);
//!     crashdump::erase_saved_data(&mut storage, &region)?;
//! }
//! ```

use crate::layout::{
    CoreRegisters, FaultStatus, CONTEXT_STACK_OFFSET, CORE_REGISTERS_OFFSET,
    CORE_REGISTERS_SIZE, ERASED_BYTE, FAULT_STATUS_SIZE, NO_FAULT_PC, PC_OFFSET,
};
use crate::region::PersistentRegion;
use crate::storage::DumpStorage;

/// Copy the saved record into `buf`.
///
/// Reads `buf.len()` bytes from the start of the region. Bytes of `buf`
/// beyond the region's capacity carry no data and are set to the erased
/// value. Size `buf` for the largest record you care about; whether a record
/// is present is decided afterwards with [`record_present`].
///
/// # Errors
///
/// Returns the adapter's error when the underlying read fails (e.g. flash
/// driver failure). Treat that as "no data".
pub fn read_saved_data<S: DumpStorage>(
    storage: &mut S,
    region: &PersistentRegion,
    buf: &mut [u8],
) -> Result<(), S::Error> {
    let stored = buf.len().min(region.capacity() as usize);
    let (head, tail) = buf.split_at_mut(stored);
    tail.fill(ERASED_BYTE);
    storage.read(region.base(), head)?;
    #[cfg(feature = "defmt")]
    defmt::debug!("crashdump: read {=usize} bytes from 0x{=u32:08X}", stored, region.base());
    Ok(())
}

/// True when `buf` (filled by [`read_saved_data`]) holds a fault record.
///
/// A record is present iff the stacked PC is not [`NO_FAULT_PC`]. A buffer
/// too short to contain the PC is never a record.
///
/// A fault whose stacked PC really was `0xFFFF_FFFF` is indistinguishable
/// from an empty region; on ARMv7-M that address cannot hold code.
pub fn record_present(buf: &[u8]) -> bool {
    read_u32(buf, PC_OFFSET).is_some_and(|pc| pc != NO_FAULT_PC)
}

/// Return the whole region to the erased state.
///
/// Unconditional and idempotent.
///
/// # Errors
///
/// Returns the adapter's error if the erase fails.
pub fn erase_saved_data<S: DumpStorage>(
    storage: &mut S,
    region: &PersistentRegion,
) -> Result<(), S::Error> {
    storage.erase(region.base(), region.capacity())?;
    #[cfg(feature = "defmt")]
    defmt::debug!("crashdump: erased {=u32} bytes at 0x{=u32:08X}", region.capacity(), region.base());
    Ok(())
}

fn read_u32(buf: &[u8], offset: u32) -> Option<u32> {
    let start = offset as usize;
    let bytes = buf.get(start..start.checked_add(4)?)?;
    Some(u32::from_ne_bytes(bytes.try_into().ok()?))
}

/// Typed view of a record copied out by [`read_saved_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedRecord<'a> {
    status: FaultStatus,
    registers: CoreRegisters,
    stack: &'a [u8],
}

impl<'a> SavedRecord<'a> {
    /// Parse `buf`; `None` if it holds no record or is shorter than the
    /// fixed header.
    ///
    /// `buf` should be exactly the region size (or the part of it that was
    /// read): everything after the header is returned as stack bytes,
    /// including erased filler after a short capture.
    pub fn parse(buf: &'a [u8]) -> Option<Self> {
        if !record_present(buf) {
            return None;
        }
        let status = buf.get(..FAULT_STATUS_SIZE as usize)?;
        let registers = buf.get(
            CORE_REGISTERS_OFFSET as usize
                ..CORE_REGISTERS_OFFSET.checked_add(CORE_REGISTERS_SIZE)? as usize,
        )?;
        let stack = buf.get(CONTEXT_STACK_OFFSET as usize..)?;
        Some(Self {
            status: bytemuck::pod_read_unaligned(status),
            registers: bytemuck::pod_read_unaligned(registers),
            stack,
        })
    }

    /// Fault-status snapshot.
    pub fn status(&self) -> &FaultStatus {
        &self.status
    }

    /// Stacked exception frame.
    pub fn registers(&self) -> &CoreRegisters {
        &self.registers
    }

    /// Raw stack bytes above the exception frame, lowest address first.
    pub fn stack(&self) -> &'a [u8] {
        self.stack
    }

    /// Stack contents as native-endian words, lowest address first. A
    /// trailing partial word is skipped.
    pub fn stack_words(&self) -> impl Iterator<Item = u32> + 'a {
        self.stack.chunks_exact(4).filter_map(|w| w.try_into().ok().map(u32::from_ne_bytes))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use crate::capture::write_record;
    use crate::storage::RamStorage;

    const BASE: u32 = 0x2001_F000;

    fn ram(capacity: u32) -> (Vec<u8>, PersistentRegion, RamStorage) {
        let mut backing = vec![0u8; capacity as usize];
        let region = PersistentRegion::new(BASE, capacity).unwrap();
        // SAFETY: the Vec's heap buffer outlives the adapter in every test.
        let ram = unsafe { RamStorage::from_raw_parts(backing.as_mut_ptr(), region) };
        (backing, region, ram)
    }

    #[test]
    fn erased_region_reads_as_absent() {
        let (_backing, region, mut ram) = ram(128);
        erase_saved_data(&mut ram, &region).unwrap();

        let mut buf = [0u8; 128];
        assert!(read_saved_data(&mut ram, &region, &mut buf).is_ok());
        assert!(!record_present(&buf));
        assert!(SavedRecord::parse(&buf).is_none());
    }

    #[test]
    fn erase_twice_equals_erase_once() {
        let (backing, region, mut ram) = ram(96);
        erase_saved_data(&mut ram, &region).unwrap();
        let once = backing.clone();
        erase_saved_data(&mut ram, &region).unwrap();
        assert_eq!(backing, once);
    }

    #[test]
    fn captured_record_is_present_and_parses() {
        let (_backing, region, mut ram) = ram(128);
        let regs = CoreRegisters { lr: 0x0800_0201, pc: 0x0800_0400, xpsr: 0x0100_0000, ..Default::default() };
        let mut stack = regs.as_bytes().to_vec();
        stack.extend_from_slice(&0xDEAD_BEEFu32.to_ne_bytes());
        let status = FaultStatus { hfsr: FaultStatus::HFSR_FORCED, cfsr: 0x0000_0400, ..Default::default() };
        write_record(&mut ram, &region, &status, &stack, stack.len() as u32).unwrap();

        let mut buf = [0u8; 128];
        read_saved_data(&mut ram, &region, &mut buf).unwrap();
        assert!(record_present(&buf));

        let record = SavedRecord::parse(&buf).unwrap();
        assert_eq!(record.status(), &status);
        assert_eq!(record.registers(), &regs);
        assert_eq!(record.stack_words().next(), Some(0xDEAD_BEEF));
        assert_eq!(record.stack().len(), 128 - 56);
    }

    #[test]
    fn oversized_buffer_tail_is_erased_filler() {
        let (_backing, region, mut ram) = ram(64);
        erase_saved_data(&mut ram, &region).unwrap();
        let mut buf = [0u8; 100];
        read_saved_data(&mut ram, &region, &mut buf).unwrap();
        assert!(buf[64..].iter().all(|&b| b == ERASED_BYTE));
    }

    #[test]
    fn short_buffer_is_never_present() {
        assert!(!record_present(&[0u8; 51]));
        assert!(record_present(&[0u8; 52]));
    }
}
