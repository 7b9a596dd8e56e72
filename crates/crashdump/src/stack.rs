//! Stack-base resolution for the faulting context.
//!
//! The capture pipeline needs to know how far the faulting stack extends
//! above the stacked exception frame. On Cortex-M that depends on which of
//! the two banked stack pointers was live:
//!
//! - **MSP** (handler/privileged code, or a bare-metal main loop): the stack
//!   starts at the linker-provided top of RAM stack (`_stack_start`).
//! - **PSP** (a task under a scheduler): the stack's allocation is owned by
//!   the scheduler, so a pluggable lookup is asked.
//!
//! The fault handler itself always runs on MSP, so PSP still holds the value
//! it had at the moment of the fault. If the forwarded frame pointer equals
//! the live PSP, the fault happened in task context.

/// Maps a task's stack pointer to the address just past the top of that
/// task's stack allocation.
///
/// Registered for the installed handler with `task_stack_base!` (`trap`
/// feature).
pub type TaskStackBaseFn = fn(u32) -> u32;

/// Stack extent assumed by the fixed-offset heuristic.
pub const DEFAULT_TASK_STACK_BYTES: u32 = 1024;

/// Fixed-offset task-stack lookup: assume the task stack extends `BYTES`
/// above `sp`.
///
/// This is an approximation for systems without a scheduler query. It
/// over-estimates when the real stack is shallower (capturing bytes beyond
/// the task's allocation) and under-estimates when it is deeper (dropping the
/// outermost frames). Do not treat the result as authoritative.
pub fn fixed_task_stack_base<const BYTES: u32>(sp: u32) -> u32 {
    sp.saturating_add(BYTES)
}

/// Which stack held the faulting context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActiveStack {
    /// Main stack (MSP).
    Main,
    /// Task/process stack (PSP).
    Task,
}

/// Resolves the base (highest address) of the stack a fault frame lives on.
#[derive(Clone, Copy)]
pub struct StackResolver {
    main_stack_top: u32,
    task_stack_base: TaskStackBaseFn,
}

impl StackResolver {
    /// Resolver using `main_stack_top` for MSP faults and `task_stack_base`
    /// for PSP faults.
    pub const fn new(main_stack_top: u32, task_stack_base: TaskStackBaseFn) -> Self {
        Self {
            main_stack_top,
            task_stack_base,
        }
    }

    /// Which stack `frame` belongs to, given the live PSP value.
    pub fn classify(frame: u32, psp: u32) -> ActiveStack {
        if frame == psp {
            ActiveStack::Task
        } else {
            ActiveStack::Main
        }
    }

    /// Address just past the top of the stack holding `frame`.
    pub fn stack_base(&self, frame: u32, psp: u32) -> u32 {
        match Self::classify(frame, psp) {
            ActiveStack::Task => (self.task_stack_base)(frame),
            ActiveStack::Main => self.main_stack_top,
        }
    }
}
