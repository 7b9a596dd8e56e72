//! HardFault trampoline and RAM-backed capture entry (`--features trap`).
//!
//! Exception entry pushes the frame on whichever stack was live, and the
//! handler then runs on MSP with `EXC_RETURN` in LR. Bit 2 of `EXC_RETURN`
//! tells which stack the frame went to. The trampoline tests it, loads the
//! matching stack pointer into `r0` and tail-branches into the capture entry:
//! no prologue, no stack use, nothing pushed on top of the frame.
//!
//! # Link-time requirements
//!
//! - `_crashdump_start` / `_crashdump_end` in `memory.x`, delimiting RAM that
//!   the runtime does not initialise.
//! - `_crashdump_task_stack_base`, provided by [`task_stack_base!`](crate::task_stack_base),
//!   which also keeps the trampoline in the link.

use crate::capture::capture_fault;
use crate::cortex;
use crate::stack::StackResolver;
use crate::storage::RamStorage;

core::arch::global_asm!(
    ".section .text.HardFault,\"ax\",%progbits",
    ".global HardFault",
    ".type HardFault,%function",
    ".syntax unified",
    ".thumb_func",
    "HardFault:",
    "    tst lr, #4",
    "    ite eq",
    "    mrseq r0, msp",
    "    mrsne r0, psp",
    "    b _crashdump_capture",
    ".size HardFault, . - HardFault",
);

extern "C" {
    /// The trampoline above. Only its address is meaningful.
    #[allow(non_snake_case)]
    pub fn HardFault() -> !;
}

extern "Rust" {
    fn _crashdump_task_stack_base(sp: u32) -> u32;
}

fn linked_task_stack_base(sp: u32) -> u32 {
    // SAFETY: the symbol is a plain `fn(u32) -> u32` emitted by
    // `task_stack_base!`; linking fails if it is missing.
    unsafe { _crashdump_task_stack_base(sp) }
}

/// Resolver wired to the linker-provided main stack top and the registered
/// task-stack lookup.
pub fn linked_resolver() -> StackResolver {
    StackResolver::new(cortex::main_stack_top(), linked_task_stack_base)
}

#[no_mangle]
unsafe extern "C" fn _crashdump_capture(frame: u32) -> ! {
    let Ok(region) = cortex::linker_region() else {
        // Misconfigured linker script: nowhere to write.
        cortex::halt_or_reset()
    };
    // SAFETY: the linker script reserves this range for the record and the
    // only other user (the retrieval API) runs after the reset.
    let mut storage = unsafe { RamStorage::new(region) };
    let resolver = linked_resolver();
    // SAFETY: called only from the trampoline above with the selected SP.
    unsafe { capture_fault(&mut storage, &region, &resolver, frame) }
}

/// Register the task-stack lookup used by the installed fault handler.
///
/// Invoke exactly once, in the firmware binary. Besides defining
/// `_crashdump_task_stack_base`, the expansion references the `HardFault`
/// trampoline so the linker keeps it instead of cortex-m-rt's default
/// handler. An image that enables `trap` without this macro fails to link.
///
/// ```rust,ignore
/// // No scheduler: assume every PSP stack is at most 2 KB.
/// fn task_stack_top(sp: u32) -> u32 {
///     crashdump::fixed_task_stack_base::<2048>(sp)
/// }
/// crashdump::task_stack_base!(task_stack_top);
///
/// // With a scheduler:
/// fn current_task_stack_top(_sp: u32) -> u32 { scheduler::current().stack_top() }
/// crashdump::task_stack_base!(current_task_stack_top);
/// ```
#[macro_export]
macro_rules! task_stack_base {
    ($lookup:path) => {
        #[no_mangle]
        fn _crashdump_task_stack_base(sp: u32) -> u32 {
            let lookup: $crate::TaskStackBaseFn = $lookup;
            lookup(sp)
        }

        #[used]
        static _CRASHDUMP_HARDFAULT: unsafe extern "C" fn() -> ! = $crate::trap::HardFault;
    };
}
