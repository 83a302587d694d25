//! # Cortex-M4 Port
//!
//! Hardware-specific code for the ARM Cortex-M4 (Thumb-2) processor:
//! the context-switch trampolines, new-task stack synthesis, SysTick
//! configuration and the tick handler.
//!
//! ## Full-served switch mechanism
//!
//! The kernel and every task run in Thread mode on the main stack pointer;
//! what changes on a switch is where SP points. Two trampolines cooperate
//! through the [`crate::kernel::CURRENT_SP`] and [`crate::kernel::KERNEL_SP`]
//! scratch cells:
//!
//! - `enter_kernel` — called by a task (interrupts already disabled by the
//!   syscall facade). Pushes the save frame onto the task's workspace,
//!   publishes SP through `CURRENT_SP`, adopts `KERNEL_SP`, and pops the
//!   kernel's own save frame — resuming the trap loop right after its last
//!   `exit_kernel`.
//! - `exit_kernel` — called by the trap loop. Pushes the kernel's save
//!   frame, publishes SP through `KERNEL_SP`, adopts `CURRENT_SP`
//!   (pre-loaded from the chosen descriptor), enables interrupts, and pops
//!   the task's save frame — resuming the task right after its
//!   `enter_kernel`.
//!
//! ## Save frame
//!
//! Ten words, low address first:
//!
//! ```text
//! +0   r3    (padding; keeps the frame a multiple of 8 bytes)
//! +4   r4    (a fresh frame carries the entry function here)
//! +8   r5
//! ...
//! +32  r11
//! +36  pc    (resume address; a fresh frame points at the launcher)
//! ```
//!
//! Only r4-r11 need saving across the trampolines: both are reached by an
//! ordinary `bl`, so the caller-saved half of the register file is already
//! dead by the AAPCS contract. The tick ISR preempts tasks between
//! instructions, and there the Cortex-M exception entry stacks the
//! caller-saved half automatically onto the live stack.
//!
//! A freshly synthesized frame "resumes" into `task_launcher`, which calls
//! the entry function out of r4 and falls into the terminate trap if the
//! entry function ever returns — the stack-underrun sentinel of this port.

use cortex_m::peripheral::syst::SystClkSource;

use crate::config::{SYSTEM_CLOCK_HZ, TICK_HZ};
use crate::task::{Stack, TaskFn};

// ---------------------------------------------------------------------------
// Trampolines
// ---------------------------------------------------------------------------

#[cfg(target_arch = "arm")]
core::arch::global_asm!(
    r#"
    .syntax unified

    .section .text.enter_kernel, "ax"
    .global enter_kernel
    .type enter_kernel, %function
    .thumb_func
enter_kernel:
    push    {{r3-r11, lr}}
    movw    r0, #:lower16:{csp}
    movt    r0, #:upper16:{csp}
    mov     r1, sp
    str     r1, [r0]
    movw    r0, #:lower16:{ksp}
    movt    r0, #:upper16:{ksp}
    ldr     r1, [r0]
    mov     sp, r1
    pop     {{r3-r11, pc}}

    .section .text.exit_kernel, "ax"
    .global exit_kernel
    .type exit_kernel, %function
    .thumb_func
exit_kernel:
    push    {{r3-r11, lr}}
    movw    r0, #:lower16:{ksp}
    movt    r0, #:upper16:{ksp}
    mov     r1, sp
    str     r1, [r0]
    movw    r0, #:lower16:{csp}
    movt    r0, #:upper16:{csp}
    ldr     r1, [r0]
    mov     sp, r1
    cpsie   i
    pop     {{r3-r11, pc}}

    .section .text.task_launcher, "ax"
    .global task_launcher
    .type task_launcher, %function
    .thumb_func
task_launcher:
    blx     r4
    bl      {texit}
"#,
    csp = sym crate::kernel::CURRENT_SP,
    ksp = sym crate::kernel::KERNEL_SP,
    texit = sym crate::scheduler::task_exit,
);

#[cfg(target_arch = "arm")]
extern "C" {
    /// Trap from a running task into the kernel. Interrupts must already
    /// be disabled and the task's request fields published.
    pub fn enter_kernel();

    /// Leave the kernel for the task whose saved SP is in
    /// [`crate::kernel::CURRENT_SP`]. Re-enables interrupts on the way out.
    pub fn exit_kernel();

    fn task_launcher();
}

/// Address placed in the `pc` slot of a synthesized frame.
#[cfg(target_arch = "arm")]
pub fn launcher_entry() -> usize {
    task_launcher as usize
}

// ---------------------------------------------------------------------------
// Stack synthesis
// ---------------------------------------------------------------------------

/// Words in the save frame consumed by `exit_kernel`.
pub const FRAME_WORDS: usize = 10;

/// Build the initial save frame for a new task inside its workspace and
/// return the stack pointer to record in the descriptor.
///
/// The first `exit_kernel` against this frame pops zeroed registers (the
/// entry function in r4) and "returns" into the launcher, which starts the
/// task proper.
pub fn init_stack(workspace: &mut Stack, entry: TaskFn) -> *mut u32 {
    // AAPCS: SP is 8-byte aligned at every call boundary.
    let top = workspace.top() & !0x07;
    let frame = (top - FRAME_WORDS * 4) as *mut u32;

    unsafe {
        for i in 0..FRAME_WORDS {
            frame.add(i).write(0);
        }
        // r4 slot: the launcher finds the entry function here.
        frame.add(1).write(entry as usize as u32);
        // pc slot: popping the frame resumes into the launcher.
        frame.add(FRAME_WORDS - 1).write(super::launcher_entry() as u32);
    }

    frame
}

// ---------------------------------------------------------------------------
// Tick source
// ---------------------------------------------------------------------------

/// Configure SysTick to fire at [`TICK_HZ`] from the core clock. Each tick
/// runs the handler below, which drives sleep expiry.
pub fn configure_systick(syst: &mut cortex_m::peripheral::SYST) {
    let reload = SYSTEM_CLOCK_HZ / TICK_HZ - 1;
    syst.set_reload(reload);
    syst.clear_current();
    syst.set_clock_source(SystClkSource::Core);
    syst.enable_counter();
    syst.enable_interrupt();
}

/// SysTick exception handler — the periodic tick.
///
/// Fires only while a task is running (the kernel keeps interrupts masked
/// except inside `idle_wait`). The handler walks the sleep countdowns and
/// returns; it never switches contexts.
#[cfg(target_arch = "arm")]
#[no_mangle]
pub unsafe extern "C" fn SysTick() {
    let kernel = &mut *crate::kernel::SCHEDULER_PTR;
    kernel.tick();
}

// ---------------------------------------------------------------------------
// Idle wait
// ---------------------------------------------------------------------------

/// Dispatcher found no READY task: open the interrupt window and sleep the
/// core until something fires (in practice the next tick, which may wake a
/// SLEEPING task). Interrupts are masked again before returning to the
/// scan.
#[cfg(target_arch = "arm")]
pub fn idle_wait() {
    // Safety: the kernel owns no lock here; the tick handler is the only
    // code that can run in the window and it leaves `current` alone.
    unsafe { cortex_m::interrupt::enable() };
    cortex_m::asm::wfi();
    cortex_m::interrupt::disable();
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Stack;

    extern "C" fn noop_entry() {}

    #[test]
    fn synthesized_frame_sits_at_workspace_top() {
        let mut ws = Stack::new();
        let sp = init_stack(&mut ws, noop_entry) as usize;

        let aligned_top = ws.top() & !0x07;
        assert_eq!(sp, aligned_top - FRAME_WORDS * 4);
        assert_eq!(sp % 8, 0);
        assert!(sp >= ws.base());
    }

    #[test]
    fn synthesized_frame_carries_entry_and_launcher() {
        let mut ws = Stack::new();
        let frame = init_stack(&mut ws, noop_entry);

        unsafe {
            // r3 padding and r5-r11 are zeroed.
            assert_eq!(frame.read(), 0);
            for i in 2..FRAME_WORDS - 1 {
                assert_eq!(frame.add(i).read(), 0);
            }
            // r4 slot holds the entry, pc slot the launcher.
            assert_eq!(frame.add(1).read(), noop_entry as usize as u32);
            assert_eq!(
                frame.add(FRAME_WORDS - 1).read(),
                crate::arch::launcher_entry() as u32
            );
        }
    }
}
