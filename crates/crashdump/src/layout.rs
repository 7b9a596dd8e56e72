//! Persisted record layout.
//!
//! The record is a packed, native-endian concatenation written from the base
//! of the persistent region:
//!
//! ```text
//! offset  0 ┌──────────────────────────────┐
//!           │ FaultStatus   (24 bytes)     │  CFSR HFSR DFSR MMFAR BFAR AFSR
//! offset 24 ├──────────────────────────────┤
//!           │ CoreRegisters (32 bytes)     │  R0 R1 R2 R3 R12 LR PC xPSR
//! offset 56 ├──────────────────────────────┤
//!           │ context stack bytes          │  up to capacity − 56
//!           └──────────────────────────────┘
//! ```
//!
//! `CoreRegisters` is not assembled by software: it is the exception frame the
//! processor pushed on the faulting stack, copied verbatim together with the
//! stack bytes that follow it.

use bytemuck::{Pod, Zeroable};

/// Program-counter value marking an empty record.
///
/// `0xFFFF_FFFF` is the erased state of NOR flash and is not a valid Thumb
/// instruction address in the ARMv7-M memory map (it lies in the vendor
/// system region, which is execute-never).
pub const NO_FAULT_PC: u32 = 0xFFFF_FFFF;

/// Byte value of an erased region.
pub const ERASED_BYTE: u8 = 0xFF;

/// Size of [`FaultStatus`] on storage.
pub const FAULT_STATUS_SIZE: u32 = 24;

/// Size of [`CoreRegisters`] on storage.
pub const CORE_REGISTERS_SIZE: u32 = 32;

/// Offset of the core-register snapshot within the record.
pub const CORE_REGISTERS_OFFSET: u32 = FAULT_STATUS_SIZE;

/// Offset of the stacked program counter within the record.
pub const PC_OFFSET: u32 = 48;

/// Offset of the raw context-stack bytes within the record.
pub const CONTEXT_STACK_OFFSET: u32 = 56;

/// Smallest region able to hold the fixed part of a record.
pub const RECORD_HEADER_SIZE: u32 = CONTEXT_STACK_OFFSET;

/// Snapshot of the SCB fault-status register block.
///
/// Field order matches the SCB register map starting at `CFSR`
/// (`0xE000_ED28`), so on hardware the live block can be copied word by word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(C)]
pub struct FaultStatus {
    /// Configurable Fault Status Register (MMFSR | BFSR << 8 | UFSR << 16).
    pub cfsr: u32,
    /// HardFault Status Register.
    pub hfsr: u32,
    /// Debug Fault Status Register.
    pub dfsr: u32,
    /// MemManage Fault Address Register.
    pub mmfar: u32,
    /// BusFault Address Register.
    pub bfar: u32,
    /// Auxiliary Fault Status Register.
    pub afsr: u32,
}

impl FaultStatus {
    /// HFSR.FORCED: a configurable fault escalated to HardFault.
    pub const HFSR_FORCED: u32 = 1 << 30;
    /// HFSR.VECTTBL: bus fault on vector table read.
    pub const HFSR_VECTTBL: u32 = 1 << 1;
    /// CFSR.MMARVALID: `mmfar` holds the faulting address.
    pub const CFSR_MMARVALID: u32 = 1 << 7;
    /// CFSR.BFARVALID: `bfar` holds the faulting address.
    pub const CFSR_BFARVALID: u32 = 1 << 15;
    /// CFSR.MSTKERR | CFSR.STKERR: fault while stacking the exception frame.
    pub const CFSR_STACKING_ERRORS: u32 = (1 << 4) | (1 << 12);

    /// True when the HardFault was escalated from a configurable fault.
    pub fn is_forced(&self) -> bool {
        self.hfsr & Self::HFSR_FORCED != 0
    }

    /// True when `mmfar` is meaningful.
    pub fn mmfar_valid(&self) -> bool {
        self.cfsr & Self::CFSR_MMARVALID != 0
    }

    /// True when `bfar` is meaningful.
    pub fn bfar_valid(&self) -> bool {
        self.cfsr & Self::CFSR_BFARVALID != 0
    }

    /// True when exception entry itself faulted, which usually means the
    /// stack overflowed. The stacked frame is then unreliable.
    pub fn stack_overflow(&self) -> bool {
        self.cfsr & Self::CFSR_STACKING_ERRORS != 0
    }

    /// Raw bytes in record order.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// Exception frame stacked by the processor on fault entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(C)]
pub struct CoreRegisters {
    /// R0
    pub r0: u32,
    /// R1
    pub r1: u32,
    /// R2
    pub r2: u32,
    /// R3
    pub r3: u32,
    /// R12
    pub r12: u32,
    /// Link register of the faulting context.
    pub lr: u32,
    /// Address of the faulting instruction (or the next one, for imprecise faults).
    pub pc: u32,
    /// Program status register.
    pub xpsr: u32,
}

impl CoreRegisters {
    /// Raw bytes in record order.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

const _: () = assert!(core::mem::size_of::<FaultStatus>() == FAULT_STATUS_SIZE as usize);
const _: () = assert!(core::mem::size_of::<CoreRegisters>() == CORE_REGISTERS_SIZE as usize);
const _: () = assert!(CORE_REGISTERS_OFFSET + CORE_REGISTERS_SIZE == CONTEXT_STACK_OFFSET);
const _: () = assert!(core::mem::offset_of!(CoreRegisters, pc) as u32 + CORE_REGISTERS_OFFSET == PC_OFFSET);
