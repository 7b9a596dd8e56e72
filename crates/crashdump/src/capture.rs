//! Fault capture pipeline.
//!
//! Runs once per fault, from the HardFault handler, with the machine already
//! in an unknown state. Nothing here allocates, blocks, logs, or touches
//! memory other than the register snapshot, the faulting stack and the
//! storage adapter.
//!
//! # Record construction
//!
//! 1. Erase the whole region, so an interrupted capture can never be mistaken
//!    for a complete record (the PC slot reads back as the sentinel).
//! 2. Write the fault-status snapshot at offset 0.
//! 3. Write the faulting stack, starting at the stacked exception frame, at
//!    offset 24. The frame and the stack above it are one contiguous copy, so
//!    the core-register snapshot lands at offset 24..56 by construction.
//!
//! The stack copy is truncated to the space left in the region. A partial
//! stack is always preferred over skipping it.

use crate::layout::{FaultStatus, FAULT_STATUS_SIZE};
use crate::region::PersistentRegion;
use crate::storage::DumpStorage;

/// What a capture stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CaptureSummary {
    /// Bytes between the fault frame and the stack base (untruncated).
    pub stack_size: u32,
    /// Frame + stack bytes stored at offset 24.
    pub captured: u32,
    /// Stack bytes that did not fit.
    pub dropped: u32,
}

impl CaptureSummary {
    /// True when part of the stack was dropped.
    pub fn truncated(&self) -> bool {
        self.dropped != 0
    }
}

/// Number of frame + stack bytes that fit for a stack of `stack_size` bytes.
pub fn captured_len(region: &PersistentRegion, stack_size: u32) -> u32 {
    stack_size.min(region.frame_budget())
}

/// Size of the faulting stack given its base.
///
/// Computed modulo 2^32: a base below the frame (a corrupted SP, or a task
/// lookup that under-estimates) yields a huge value that the capacity clamp
/// in [`captured_len`] turns into "fill the region".
pub fn stack_size(stack_base: u32, frame: u32) -> u32 {
    stack_base.wrapping_sub(frame)
}

/// Persist one fault record.
///
/// `stack` starts at the stacked exception frame and extends towards the
/// stack base; it may be longer than the region can hold. `stack_size` is
/// the untruncated size reported in the summary (normally `stack.len()`, but
/// the fault path only materialises the part that fits).
///
/// # Errors
///
/// Returns the first storage failure. Steps after a failure are not
/// attempted; from the fault path there is nobody to report to, so the error
/// is only observable in tests and from non-fault callers.
pub fn write_record<S: DumpStorage>(
    storage: &mut S,
    region: &PersistentRegion,
    status: &FaultStatus,
    stack: &[u8],
    stack_size: u32,
) -> Result<CaptureSummary, S::Error> {
    storage.erase(region.base(), region.capacity())?;

    storage.write(region.base(), status.as_bytes())?;

    let available = u32::try_from(stack.len()).unwrap_or(u32::MAX);
    let captured = captured_len(region, stack_size.min(available));
    let bytes = stack.get(..captured as usize).unwrap_or(stack);
    storage.write(region.address_of(FAULT_STATUS_SIZE), bytes)?;
    storage.flush()?;

    Ok(CaptureSummary {
        stack_size,
        captured,
        dropped: stack_size.saturating_sub(captured),
    })
}

#[cfg(feature = "hardware")]
pub use self::hardware::{capture_exception_frame, capture_fault};

#[cfg(feature = "hardware")]
mod hardware {
    use super::{captured_len, stack_size, write_record};
    use crate::cortex;
    use crate::layout::FaultStatus;
    use crate::region::PersistentRegion;
    use crate::stack::StackResolver;
    use crate::storage::DumpStorage;

    /// Capture the fault whose exception frame is at `frame`, then reset.
    ///
    /// In debug builds (`debug_assertions`) the core halts on a breakpoint
    /// instead of resetting, so an attached debugger stops with the record
    /// already written.
    ///
    /// # Safety
    ///
    /// - Must only be called from the HardFault handler, with `frame` being
    ///   the stack pointer selected by the trampoline (EXC_RETURN bit 2).
    /// - `storage` must not be in use by any other code; the caller has
    ///   abandoned normal execution.
    pub unsafe fn capture_fault<S: DumpStorage>(
        storage: &mut S,
        region: &PersistentRegion,
        resolver: &StackResolver,
        frame: u32,
    ) -> ! {
        let status = FaultStatus::read_live();

        let base = resolver.stack_base(frame, cortex::process_stack_pointer());
        let size = stack_size(base, frame);
        let len = captured_len(region, size);

        // SAFETY: this is the one raw read of foreign memory in the crate.
        // `frame` points at the exception frame the processor just pushed,
        // and `len` is bounded by the stack base (or the fallback heuristic)
        // and by the region budget. If the heuristic overshoots mapped RAM the
        // copy faults again and the core locks up, which the watchdog or a
        // debugger recovers from; nothing better is available here.
        let stack = unsafe { core::slice::from_raw_parts(frame as usize as *const u8, len as usize) };

        // Best effort: no one survives to receive the error.
        let _outcome = write_record(storage, region, &status, stack, size);

        cortex::halt_or_reset()
    }

    /// Capture from a cortex-m-rt `#[exception] HardFault` handler.
    ///
    /// For applications that keep cortex-m-rt's own trampoline instead of
    /// the `trap` feature, typically to persist into flash through
    /// [`FlashStorage`](crate::FlashStorage):
    ///
    /// ```rust,ignore
    /// #[cortex_m_rt::exception]
    /// unsafe fn HardFault(ef: &cortex_m_rt::ExceptionFrame) -> ! {
    ///     let mut storage = /* FlashStorage over a stolen flash peripheral */;
    ///     unsafe { crashdump::capture_exception_frame(&mut storage, &REGION, &RESOLVER, ef) }
    /// }
    /// ```
    ///
    /// # Safety
    ///
    /// Same contract as [`capture_fault`]; `ef` must be the frame cortex-m-rt
    /// passed to the handler.
    pub unsafe fn capture_exception_frame<S: DumpStorage>(
        storage: &mut S,
        region: &PersistentRegion,
        resolver: &StackResolver,
        ef: &cortex_m_rt::ExceptionFrame,
    ) -> ! {
        let frame = core::ptr::from_ref(ef) as usize as u32;
        // SAFETY: forwarded caller contract.
        unsafe { capture_fault(storage, region, resolver, frame) }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use crate::layout::{CoreRegisters, CONTEXT_STACK_OFFSET};
    use crate::storage::{RamStorage, StorageError};

    const BASE: u32 = 0x3800_0000;

    fn ram(capacity: u32) -> (Vec<u8>, PersistentRegion, RamStorage) {
        let mut backing = vec![0u8; capacity as usize];
        let region = PersistentRegion::new(BASE, capacity).unwrap();
        // SAFETY: the Vec's heap buffer outlives the adapter in every test.
        let ram = unsafe { RamStorage::from_raw_parts(backing.as_mut_ptr(), region) };
        (backing, region, ram)
    }

    fn fake_stack(len: usize) -> Vec<u8> {
        let regs = CoreRegisters {
            r0: 1,
            r1: 2,
            r2: 3,
            r3: 4,
            r12: 12,
            lr: 0x0800_0421,
            pc: 0x0800_1000,
            xpsr: 0x2100_0000,
        };
        let mut stack = regs.as_bytes().to_vec();
        stack.extend((0..len.saturating_sub(stack.len())).map(|i| i as u8));
        stack.truncate(len);
        stack
    }

    #[test]
    fn small_region_truncates_stack_tail() {
        let (backing, region, mut ram) = ram(64);
        // 32-byte frame followed by 200 bytes of context stack.
        let stack = fake_stack(232);
        let summary = write_record(&mut ram, &region, &FaultStatus::default(), &stack, 232).unwrap();

        assert_eq!(summary.captured, 40);
        assert_eq!(summary.dropped, 192);
        assert!(summary.truncated());
        assert_eq!(summary.captured - 32, 8, "context-stack section is 64 - 56 bytes");
        assert_eq!(&backing[CONTEXT_STACK_OFFSET as usize..], &stack[32..40]);
    }

    #[test]
    fn whole_stack_fits() {
        let (backing, region, mut ram) = ram(256);
        let stack = fake_stack(100);
        let summary = write_record(&mut ram, &region, &FaultStatus::default(), &stack, 100).unwrap();

        assert_eq!(summary, CaptureSummary { stack_size: 100, captured: 100, dropped: 0 });
        assert_eq!(&backing[24..124], stack.as_slice());
        assert!(backing[124..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn stale_record_is_fully_erased() {
        let (backing, region, mut ram) = ram(128);
        write_record(&mut ram, &region, &FaultStatus::default(), &fake_stack(128), 128).unwrap();
        write_record(&mut ram, &region, &FaultStatus::default(), &fake_stack(40), 40).unwrap();
        assert!(backing[64..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn implausible_stack_base_is_clamped_to_region() {
        let (_backing, region, mut ram) = ram(96);
        let size = stack_size(0x2000_0000, 0x2000_0100);
        assert_eq!(size, 0xFFFF_FF00);

        let stack = fake_stack(96);
        let summary = write_record(&mut ram, &region, &FaultStatus::default(), &stack, size).unwrap();
        assert_eq!(summary.captured, 72);
    }

    #[test]
    fn storage_failure_is_reported() {
        struct Broken;
        impl DumpStorage for Broken {
            type Error = StorageError;
            fn erase(&mut self, _: u32, _: u32) -> Result<(), StorageError> {
                Ok(())
            }
            fn write(&mut self, _: u32, _: &[u8]) -> Result<(), StorageError> {
                Err(StorageError::OutOfBounds)
            }
            fn read(&mut self, _: u32, _: &mut [u8]) -> Result<(), StorageError> {
                Ok(())
            }
        }
        let region = PersistentRegion::new(BASE, 64).unwrap();
        let result = write_record(&mut Broken, &region, &FaultStatus::default(), &[0; 32], 32);
        assert_eq!(result, Err(StorageError::OutOfBounds));
    }
}
