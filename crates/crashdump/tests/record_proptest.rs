//! Property-based tests for the record layout.
//! Verifies the header/stack split and the truncation rule for arbitrary
//! register values, stack depths and region sizes.

#![allow(clippy::unwrap_used)]
#![allow(clippy::indexing_slicing)]
#![allow(clippy::arithmetic_side_effects)]

mod common;

use common::{fault_stack, RamDump};
use crashdump::layout::ERASED_BYTE;
use crashdump::{
    erase_saved_data, read_saved_data, record_present, write_record, CoreRegisters, FaultStatus,
    SavedRecord, NO_FAULT_PC, RECORD_HEADER_SIZE,
};
use proptest::prelude::*;

const BASE: u32 = 0x2001_0000;

fn any_status() -> impl Strategy<Value = FaultStatus> {
    any::<[u32; 6]>().prop_map(|[cfsr, hfsr, dfsr, mmfar, bfar, afsr]| FaultStatus {
        cfsr,
        hfsr,
        dfsr,
        mmfar,
        bfar,
        afsr,
    })
}

fn any_registers() -> impl Strategy<Value = CoreRegisters> {
    (any::<[u32; 6]>(), any::<u32>(), any::<u32>()).prop_map(|([r0, r1, r2, r3, r12, lr], pc, xpsr)| {
        CoreRegisters {
            r0,
            r1,
            r2,
            r3,
            r12,
            lr,
            pc,
            xpsr,
        }
    })
}

proptest::proptest! {
    /// The first 56 bytes are the status block followed by the exception frame.
    #[test]
    fn header_is_status_then_frame(
        status in any_status(),
        regs in any_registers(),
        extra in proptest::collection::vec(any::<u8>(), 0..128),
        capacity in RECORD_HEADER_SIZE..512u32,
    ) {
        let mut dump = RamDump::new(BASE, capacity, 0x00);
        let stack = fault_stack(&regs, &extra);
        write_record(&mut dump.storage, &dump.region, &status, &stack, stack.len() as u32).unwrap();

        let stored = dump.snapshot();
        prop_assert_eq!(&stored[..24], status.as_bytes());
        prop_assert_eq!(&stored[24..56], regs.as_bytes());
    }

    /// Stack bytes stored = min(stack above the frame, capacity - 56); the
    /// rest of the region stays erased.
    #[test]
    fn stack_section_is_truncated_to_capacity(
        extra in proptest::collection::vec(any::<u8>(), 0..600),
        capacity in RECORD_HEADER_SIZE..512u32,
    ) {
        let mut dump = RamDump::new(BASE, capacity, 0x00);
        let stack = fault_stack(&CoreRegisters::default(), &extra);
        let summary = write_record(
            &mut dump.storage, &dump.region, &FaultStatus::default(), &stack, stack.len() as u32,
        ).unwrap();

        let room = (capacity - RECORD_HEADER_SIZE) as usize;
        let kept = extra.len().min(room);
        prop_assert_eq!(summary.captured as usize, 32 + kept);
        prop_assert_eq!(summary.truncated(), extra.len() > room);

        let stored = dump.snapshot();
        prop_assert_eq!(&stored[56..56 + kept], &extra[..kept]);
        prop_assert!(stored[56 + kept..].iter().all(|&b| b == ERASED_BYTE));
    }

    /// Whatever was captured reads back and decodes to the same values,
    /// provided the faulting PC is not the erased sentinel.
    #[test]
    fn capture_then_retrieve_round_trips(
        status in any_status(),
        regs in any_registers().prop_filter("sentinel PC", |r| r.pc != NO_FAULT_PC),
        extra in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let mut dump = RamDump::new(BASE, 256, 0x00);
        let stack = fault_stack(&regs, &extra);
        write_record(&mut dump.storage, &dump.region, &status, &stack, stack.len() as u32).unwrap();

        let mut buf = [0u8; 256];
        read_saved_data(&mut dump.storage, &dump.region, &mut buf).unwrap();
        prop_assert!(record_present(&buf));
        let record = SavedRecord::parse(&buf).unwrap();
        prop_assert_eq!(record.status(), &status);
        prop_assert_eq!(record.registers(), &regs);
        prop_assert_eq!(&record.stack()[..extra.len()], extra.as_slice());
    }

    /// Erasing any region, whatever it held, yields "no fault".
    #[test]
    fn erased_region_never_holds_a_record(
        garbage in any::<u8>(),
        capacity in RECORD_HEADER_SIZE..1024u32,
    ) {
        let mut dump = RamDump::new(BASE, capacity, garbage);
        erase_saved_data(&mut dump.storage, &dump.region).unwrap();

        let mut buf = vec![0u8; capacity as usize];
        read_saved_data(&mut dump.storage, &dump.region, &mut buf).unwrap();
        prop_assert!(!record_present(&buf));
        prop_assert!(SavedRecord::parse(&buf).is_none());
    }
}
