//! Persistent HardFault capture for Cortex-M
//!
//! When the processor takes a HardFault, this crate writes the fault-status
//! registers, the stacked exception frame and as much of the faulting stack
//! as fits into a persistent region, then resets. After the reboot, startup
//! code reads the record back, decides whether it holds a fault, and erases
//! it once it has been reported.
//!
//! # Record
//!
//! ```text
//!   0  FaultStatus   CFSR HFSR DFSR MMFAR BFAR AFSR       24 bytes
//!  24  CoreRegisters R0 R1 R2 R3 R12 LR PC xPSR           32 bytes
//!  56  stack bytes   up to capacity - 56
//! ```
//!
//! PC = `0xFFFF_FFFF` (the erased value) means "no fault recorded".
//!
//! # Layers
//!
//! - [`storage`] - erase/write/read contract plus RAM and NOR flash adapters
//! - [`capture`] - builds and persists one record
//! - [`retrieve`] - read-back, validity check, erase
//! - [`stack`] - which stack faulted and where it ends
//!
//! # Features
//!
//! - `hardware`: Cortex-M register access ([`FaultStatus::read_live`],
//!   [`capture_fault`], [`capture_exception_frame`])
//! - `trap`: installs the `HardFault` trampoline writing to the
//!   `_crashdump_start`..`_crashdump_end` RAM region
//! - `defmt`: `defmt::Format` derives and debug logging outside the fault path
//!
//! # Example
//!
//! ```no_run
//! use crashdump::{read_saved_data, record_present, erase_saved_data, SavedRecord};
//! use crashdump::{PersistentRegion, RamStorage};
//!
//! let region = PersistentRegion::new(0x2001_F000, 4096).unwrap();
//! // SAFETY: the range is reserved for the record in memory.x.
//! let mut storage = unsafe { RamStorage::new(region) };
//!
//! let mut buf = [0u8; 4096];
//! if read_saved_data(&mut storage, &region, &mut buf).is_ok() && record_present(&buf) {
//!     if let Some(record) = SavedRecord::parse(&buf) {
//!         let _pc = record.registers().pc;
//!     }
//!     erase_saved_data(&mut storage, &region).unwrap();
//! }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // a panic inside the fault handler is a lockup
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
#![allow(clippy::doc_markdown)] // register names (CFSR, EXC_RETURN) in doc comments
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)] // u32 addresses on a 32-bit target

pub mod capture;
pub mod layout;
pub mod region;
pub mod retrieve;
pub mod stack;
pub mod storage;

#[cfg(feature = "hardware")]
pub mod cortex;

#[cfg(feature = "trap")]
pub mod trap;

pub use capture::{write_record, CaptureSummary};
pub use layout::{CoreRegisters, FaultStatus, NO_FAULT_PC, RECORD_HEADER_SIZE};
pub use region::{PersistentRegion, RegionError};
pub use retrieve::{erase_saved_data, read_saved_data, record_present, SavedRecord};
pub use stack::{fixed_task_stack_base, StackResolver, TaskStackBaseFn, DEFAULT_TASK_STACK_BYTES};
pub use storage::{DumpStorage, FlashFault, FlashStorage, RamStorage, StorageError};

#[cfg(feature = "hardware")]
pub use capture::{capture_exception_frame, capture_fault};
