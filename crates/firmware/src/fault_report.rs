//! Decoding of a recovered fault record for the boot log.
//!
//! The record stores raw CFSR/HFSR values. This module turns them into the
//! single most specific cause so the boot log reads "bus fault at
//! 0x6000_0000" instead of a register dump the reader has to decode against
//! the ARMv7-M reference manual.

use crashdump::{FaultStatus, SavedRecord};

/// CFSR bits 0..8 (MMFSR).
const MMFSR_MASK: u32 = 0x0000_00FF;
/// CFSR bits 8..16 (BFSR).
const BFSR_MASK: u32 = 0x0000_FF00;
/// CFSR bits 16..32 (UFSR).
const UFSR_MASK: u32 = 0xFFFF_0000;
/// HFSR.DEBUGEVT
const HFSR_DEBUGEVT: u32 = 1 << 31;

/// UFSR flags as they appear in CFSR.
const UFSR_UNDEFINSTR: u32 = 1 << 16;
const UFSR_INVSTATE: u32 = 1 << 17;
const UFSR_INVPC: u32 = 1 << 18;
const UFSR_NOCP: u32 = 1 << 19;
const UFSR_UNALIGNED: u32 = 1 << 24;
const UFSR_DIVBYZERO: u32 = 1 << 25;

/// Most specific cause recorded in the fault-status registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultCause {
    /// Exception entry could not push the frame (usually stack overflow).
    /// The stacked registers are unreliable.
    StackOverflow,
    /// Bus fault while fetching the exception vector.
    VectorTableRead,
    /// MPU or default-map violation, with the faulting data address if valid.
    MemManage {
        /// MMFAR, when MMARVALID is set.
        address: Option<u32>,
    },
    /// Bus error, with the faulting data address if valid.
    BusFault {
        /// BFAR, when BFARVALID is set.
        address: Option<u32>,
    },
    /// Instruction-level error.
    UsageFault(UsageFault),
    /// Breakpoint or debug event with no debugger attached.
    DebugEvent,
    /// No status bit recognised.
    Unknown,
}

/// UsageFault sub-cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsageFault {
    /// Undefined instruction.
    UndefinedInstruction,
    /// Branch to an address with the Thumb bit clear.
    InvalidState,
    /// Bad EXC_RETURN on exception return.
    InvalidPc,
    /// Coprocessor access while the coprocessor is disabled.
    NoCoprocessor,
    /// Unaligned access with CCR.UNALIGN_TRP set.
    Unaligned,
    /// Integer division by zero with CCR.DIV_0_TRP set.
    DivideByZero,
    /// UFSR bits outside the ones above.
    Other,
}

/// Classify a fault-status snapshot.
///
/// Stacking errors win over everything else: the frame never made it to the
/// stack, so any address the other bits name is secondary.
pub fn classify(status: &FaultStatus) -> FaultCause {
    if status.stack_overflow() {
        return FaultCause::StackOverflow;
    }
    if status.hfsr & FaultStatus::HFSR_VECTTBL != 0 {
        return FaultCause::VectorTableRead;
    }
    if status.cfsr & MMFSR_MASK != 0 {
        return FaultCause::MemManage {
            address: status.mmfar_valid().then_some(status.mmfar),
        };
    }
    if status.cfsr & BFSR_MASK != 0 {
        return FaultCause::BusFault {
            address: status.bfar_valid().then_some(status.bfar),
        };
    }
    if status.cfsr & UFSR_MASK != 0 {
        return FaultCause::UsageFault(usage_fault(status.cfsr));
    }
    if status.hfsr & HFSR_DEBUGEVT != 0 {
        return FaultCause::DebugEvent;
    }
    FaultCause::Unknown
}

fn usage_fault(cfsr: u32) -> UsageFault {
    match cfsr & UFSR_MASK {
        f if f & UFSR_UNDEFINSTR != 0 => UsageFault::UndefinedInstruction,
        f if f & UFSR_INVSTATE != 0 => UsageFault::InvalidState,
        f if f & UFSR_INVPC != 0 => UsageFault::InvalidPc,
        f if f & UFSR_NOCP != 0 => UsageFault::NoCoprocessor,
        f if f & UFSR_UNALIGNED != 0 => UsageFault::Unaligned,
        f if f & UFSR_DIVBYZERO != 0 => UsageFault::DivideByZero,
        _ => UsageFault::Other,
    }
}

/// xPSR.T: Thumb state, always set in a frame stacked by ARMv7-M.
const XPSR_THUMB: u32 = 1 << 24;

/// True when the stacked frame could have been pushed by the processor:
/// Thumb bit set in xPSR and a halfword-aligned PC.
///
/// SRAM comes up with random contents after a cold power-on, so the first
/// boot can find a "record" that no fault wrote. Random words pass this
/// check about one time in four; it filters most power-on noise, not all.
pub fn frame_is_plausible(record: &SavedRecord<'_>) -> bool {
    let regs = record.registers();
    regs.xpsr & XPSR_THUMB != 0 && regs.pc & 1 == 0
}

/// Innermost `count` stack words above the exception frame that carry data.
///
/// Stops at the first fully erased word at or beyond the end of the
/// captured stack; a real `0xFFFF_FFFF` inside the stack ends the listing
/// early, which only shortens the log.
pub fn leading_stack_words<'a>(
    record: &SavedRecord<'a>,
    count: usize,
) -> impl Iterator<Item = u32> + 'a {
    record
        .stack_words()
        .take(count)
        .take_while(|&word| word != crashdump::NO_FAULT_PC)
}
