//! Crash-dump demo firmware
//!
//! STM32H743ZI application that installs the crashdump HardFault handler,
//! reports the record left by the previous fault at boot and then runs a
//! heartbeat.
//!
//! # Boot sequence
//!
//! ```text
//! reset → read CRASHDUMP region → log record (if any) → erase → heartbeat
//!                                                               ↓ fault-demo
//!                HardFault → capture into CRASHDUMP → reset ←───┘
//! ```
//!
//! # Features
//!
//! - `hardware` - Build for the STM32H7 target (embassy, defmt, crashdump trap)
//! - `fault-demo` - Trigger a bus fault 5 s after boot
//!
//! ```bash
//! cargo run --release --target thumbv7em-none-eabihf --features fault-demo
//! ```

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::dbg_macro)] // dbg! should not be left in committed code
// Intentional allows for this codebase:
#![allow(clippy::module_name_repetitions)] // common in Rust crates; not a real issue
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)] // register names (CFSR, BFAR) as plain text

pub mod fault_report;

/// Bytes of the saved record read back at boot: the 56-byte header plus
/// the innermost 50 stack words.
pub const REPORT_BYTES: usize = 256;

/// Stack words printed after the register dump.
pub const REPORT_STACK_WORDS: usize = 16;

/// Delay before the `fault-demo` fault, in seconds.
pub const FAULT_DEMO_DELAY_SECS: u64 = 5;

/// Address read by the `fault-demo` task. The top of the vendor system
/// region is unmapped on STM32H7, so the load raises a precise bus fault
/// that escalates to HardFault.
pub const FAULT_DEMO_ADDRESS: u32 = 0xFFFF_FFF0;
