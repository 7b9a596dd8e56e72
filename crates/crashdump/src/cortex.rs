//! Cortex-M (ARMv7-M) register access for the fault path.
//!
//! Only compiled with `--features hardware`. Everything else in the crate is
//! plain data and runs on the host.

use cortex_m::peripheral::SCB;

use crate::layout::FaultStatus;
use crate::region::{PersistentRegion, RegionError};

impl FaultStatus {
    /// Snapshot the live SCB fault-status registers.
    pub fn read_live() -> Self {
        // SAFETY: SCB::PTR is the architecturally fixed System Control Block
        // address; these are plain reads of status registers.
        let scb = unsafe { &*SCB::PTR };
        Self {
            cfsr: scb.cfsr.read(),
            hfsr: scb.hfsr.read(),
            dfsr: scb.dfsr.read(),
            mmfar: scb.mmfar.read(),
            bfar: scb.bfar.read(),
            afsr: scb.afsr.read(),
        }
    }
}

/// Current PSP. Inside the fault handler (which runs on MSP) this is the
/// task stack pointer at the moment of the fault.
pub fn process_stack_pointer() -> u32 {
    cortex_m::register::psp::read()
}

/// Top of the main stack as placed by cortex-m-rt's `link.x`.
pub fn main_stack_top() -> u32 {
    extern "C" {
        static _stack_start: u32;
    }
    // SAFETY: only the address of the linker symbol is taken.
    unsafe { core::ptr::addr_of!(_stack_start) as u32 }
}

/// Persistent RAM region delimited by `_crashdump_start` / `_crashdump_end`
/// in the application's `memory.x`.
pub fn linker_region() -> Result<PersistentRegion, RegionError> {
    extern "C" {
        static _crashdump_start: u8;
        static _crashdump_end: u8;
    }
    // SAFETY: only the addresses of the linker symbols are taken.
    let (start, end) = unsafe {
        (
            core::ptr::addr_of!(_crashdump_start) as u32,
            core::ptr::addr_of!(_crashdump_end) as u32,
        )
    };
    PersistentRegion::from_bounds(start, end)
}

/// Leave the fault handler: halt on a breakpoint in debug builds, reset
/// otherwise.
#[cfg(debug_assertions)]
pub fn halt_or_reset() -> ! {
    #[cfg(feature = "defmt")]
    defmt::error!("HardFault captured; halting (debug build)");
    cortex_m::asm::bkpt();
    loop {
        cortex_m::asm::nop();
    }
}

/// Leave the fault handler: halt on a breakpoint in debug builds, reset
/// otherwise.
#[cfg(not(debug_assertions))]
pub fn halt_or_reset() -> ! {
    SCB::sys_reset()
}
