//! Crash-dump demo firmware - Main Entry Point
//!
//! Hardware-only entry point for STM32H743ZI.

#![no_std]
#![no_main]

use crashdump::{cortex, erase_saved_data, read_saved_data, RamStorage, SavedRecord};
use embassy_executor::Spawner;
use embassy_time::Timer;
use firmware::fault_report::{classify, frame_is_plausible, leading_stack_words};
use firmware::{REPORT_BYTES, REPORT_STACK_WORDS};

// Global logger + panic handler
use defmt_rtt as _;
use panic_probe as _;

/// Embassy runs every task on the main stack, so PSP faults only come from
/// code outside the executor. Those get the fixed-offset heuristic.
fn task_stack_top(sp: u32) -> u32 {
    crashdump::fixed_task_stack_base::<{ crashdump::DEFAULT_TASK_STACK_BYTES }>(sp)
}

crashdump::task_stack_base!(task_stack_top);

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    defmt::info!("crashdump demo v{=str}", env!("CARGO_PKG_VERSION"));

    // Report before anything else can fault and overwrite the record.
    report_previous_fault();

    let _p = embassy_stm32::init(embassy_stm32::Config::default());

    #[cfg(feature = "fault-demo")]
    {
        if spawner.spawn(fault_demo()).is_err() {
            defmt::error!("Failed to spawn fault_demo");
        }
    }
    #[cfg(not(feature = "fault-demo"))]
    let _ = spawner;

    let mut beat: u32 = 0;
    loop {
        defmt::info!("heartbeat {=u32}", beat);
        beat = beat.wrapping_add(1);
        Timer::after_secs(1).await;
    }
}

/// Log and erase the record left by the previous HardFault.
fn report_previous_fault() {
    let region = match cortex::linker_region() {
        Ok(region) => region,
        Err(e) => {
            defmt::error!("CRASHDUMP region misconfigured in memory.x: {}", e);
            return;
        }
    };
    // SAFETY: memory.x reserves the CRASHDUMP range for the record and the
    // capture path only runs after normal execution has been abandoned.
    let mut storage = unsafe { RamStorage::new(region) };

    let mut buf = [0u8; REPORT_BYTES];
    if let Err(e) = read_saved_data(&mut storage, &region, &mut buf) {
        defmt::warn!("crash dump unreadable: {}", e);
        return;
    }

    // SRAM4 holds random data after a cold power-on; the erase below makes
    // every later boot start from a clean region.
    match SavedRecord::parse(&buf) {
        Some(record) if frame_is_plausible(&record) => log_record(&record),
        Some(_) => defmt::info!("Discarding implausible crash dump (power-on SRAM contents?)"),
        None => defmt::info!("No crash dump from previous run"),
    }

    if let Err(e) = erase_saved_data(&mut storage, &region) {
        defmt::error!("Failed to erase crash dump: {}", e);
    }
}

fn log_record(record: &SavedRecord<'_>) {
    let status = record.status();
    let regs = record.registers();

    defmt::warn!("Previous run ended in a HardFault: {}", classify(status));
    defmt::warn!(
        "  PC=0x{=u32:08X} LR=0x{=u32:08X} xPSR=0x{=u32:08X}",
        regs.pc,
        regs.lr,
        regs.xpsr
    );
    defmt::warn!(
        "  R0=0x{=u32:08X} R1=0x{=u32:08X} R2=0x{=u32:08X} R3=0x{=u32:08X} R12=0x{=u32:08X}",
        regs.r0,
        regs.r1,
        regs.r2,
        regs.r3,
        regs.r12
    );
    defmt::warn!(
        "  CFSR=0x{=u32:08X} HFSR=0x{=u32:08X} MMFAR=0x{=u32:08X} BFAR=0x{=u32:08X}",
        status.cfsr,
        status.hfsr,
        status.mmfar,
        status.bfar
    );
    for (i, word) in leading_stack_words(record, REPORT_STACK_WORDS).enumerate() {
        defmt::warn!("  [sp+{=usize}] 0x{=u32:08X}", i.saturating_mul(4), word);
    }
}

#[cfg(feature = "fault-demo")]
#[embassy_executor::task]
async fn fault_demo() {
    Timer::after_secs(firmware::FAULT_DEMO_DELAY_SECS).await;
    defmt::warn!(
        "fault-demo: reading 0x{=u32:08X}",
        firmware::FAULT_DEMO_ADDRESS
    );
    // SAFETY: none. The read is meant to fault; the HardFault handler
    // captures it and resets.
    let value = unsafe { core::ptr::read_volatile(firmware::FAULT_DEMO_ADDRESS as *const u32) };
    defmt::error!("fault-demo: read returned 0x{=u32:08X}", value);
}
