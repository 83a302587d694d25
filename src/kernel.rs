//! # Kernel Facade
//!
//! Global kernel instance, the user-facing syscall API and system startup.
//!
//! ## Startup sequence
//!
//! ```text
//! reset_handler (cortex-m-rt)
//!   └─► main()
//!         ├─► kernel::init()          ← reset the process table
//!         ├─► kernel::create_task()   ← register initial tasks (×N)
//!         └─► kernel::start()         ← arm the tick, enter the trap loop
//!               └─► NEVER RETURNS
//! ```
//!
//! ## Syscall path
//!
//! Every syscall wrapper follows the same trap discipline: verify the
//! kernel is active (recording [`KernelError::KernelInactive`] and backing
//! out otherwise), disable interrupts, publish the request into the running
//! task's descriptor, and call `arch::enter_kernel`. The wrapper resumes on
//! this side of the trap once the kernel redispatches the caller, and reads
//! the outcome back from the error cell.
//!
//! `create_task` is special twice over: called before `start` it builds the
//! task directly, bypassing the trap; called after, the new task's
//! parameters travel through the *caller's* descriptor fields, which the
//! kernel reads on the far side.

use core::ptr::addr_of_mut;

use crate::arch;
use crate::scheduler::Scheduler;
use crate::sync;
use crate::task::{KernelError, KernelRequest, Pid, Priority, TaskFn};

// ---------------------------------------------------------------------------
// Global kernel state
// ---------------------------------------------------------------------------

/// The kernel singleton. All access goes through [`SCHEDULER_PTR`].
static mut SCHEDULER: Scheduler = Scheduler::new();

/// Raw pointer to the kernel state, set once by [`init`]. The tick handler
/// reaches the kernel through this; so do the syscall wrappers.
///
/// # Safety
/// Null until [`init`] runs; every kernel entry point requires `init` to
/// have been called first.
#[no_mangle]
pub static mut SCHEDULER_PTR: *mut Scheduler = core::ptr::null_mut();

/// Scratch cell carrying the kernel's stack pointer across the trap
/// boundary. Written by `exit_kernel`, read by `enter_kernel`.
#[no_mangle]
pub static mut KERNEL_SP: *mut u32 = core::ptr::null_mut();

/// Scratch cell carrying the running task's stack pointer across the trap
/// boundary. The trap loop loads it from the dispatched descriptor before
/// `exit_kernel` and stores it back after `enter_kernel`.
#[no_mangle]
pub static mut CURRENT_SP: *mut u32 = core::ptr::null_mut();

// ---------------------------------------------------------------------------
// Boot
// ---------------------------------------------------------------------------

/// Initialize the kernel: reset the process table and publish the global
/// pointer. Must be called exactly once, before any other kernel function.
pub fn init() {
    unsafe {
        SCHEDULER = Scheduler::new();
        SCHEDULER_PTR = addr_of_mut!(SCHEDULER);
    }
}

/// Arm the tick source and enter the trap loop. **Never returns.**
///
/// Requires [`init`] and at least one created task; a misbooted system
/// parks in a low-power loop rather than handing the CPU back to a `main`
/// that expects to lose it.
pub fn start(mut core_peripherals: cortex_m::Peripherals) -> ! {
    unsafe {
        let kernel = &mut *SCHEDULER_PTR;

        if kernel.kernel_active || kernel.task_count == 0 {
            loop {
                cortex_m::asm::wfi();
            }
        }

        cortex_m::interrupt::disable();
        arch::configure_systick(&mut core_peripherals.SYST);
        kernel.kernel_active = true;
        kernel.run()
    }
}

// ---------------------------------------------------------------------------
// Syscalls
// ---------------------------------------------------------------------------

/// Create a new task from `entry` with the given priority (0 highest to
/// 10 lowest, recorded only) and entry argument.
///
/// Usable both before `start` (direct table build) and from a running task
/// (serviced through the trap). Returns the new task's PID; the smallest
/// valid PID is 1.
pub fn create_task(entry: TaskFn, priority: Priority, arg: i32) -> Result<Pid, KernelError> {
    sync::critical_section(|_cs| unsafe {
        let kernel = &mut *SCHEDULER_PTR;

        if kernel.kernel_active {
            // Stage the new task's parameters in the caller's descriptor;
            // the kernel reads them back out on the far side of the trap.
            let pd = &mut kernel.tasks[kernel.current];
            pd.code = Some(entry);
            pd.priority = priority;
            pd.arg = arg;
            pd.request = KernelRequest::Create;
            arch::enter_kernel();
        } else {
            kernel.create_task(entry, priority, arg);
        }

        match kernel.err {
            KernelError::NoErr => Ok(kernel.last_pid),
            e => Err(e),
        }
    })
}

/// Give up the CPU to the next READY task in the rotation.
pub fn yield_now() {
    sync::critical_section(|_cs| unsafe {
        let kernel = &mut *SCHEDULER_PTR;
        if !kernel.kernel_active {
            kernel.err = KernelError::KernelInactive;
            return;
        }
        kernel.tasks[kernel.current].request = KernelRequest::Yield;
        arch::enter_kernel();
    });
}

/// End the calling task. Does not return once the kernel is active; before
/// `start` it records [`KernelError::KernelInactive`] and backs out.
pub fn terminate() {
    sync::critical_section(|_cs| unsafe {
        let kernel = &mut *SCHEDULER_PTR;
        if !kernel.kernel_active {
            kernel.err = KernelError::KernelInactive;
            return;
        }
        kernel.tasks[kernel.current].request = KernelRequest::Terminate;
        arch::enter_kernel();
    });
}

/// Sleep for at least `ticks` ticks. Wake-up happens on tick expiry, so
/// the actual delay is `ticks` to `ticks + 1` tick periods.
pub fn sleep(ticks: u16) {
    sync::critical_section(|_cs| unsafe {
        let kernel = &mut *SCHEDULER_PTR;
        if !kernel.kernel_active {
            kernel.err = KernelError::KernelInactive;
            return;
        }
        let pd = &mut kernel.tasks[kernel.current];
        pd.request_arg = i32::from(ticks);
        pd.request = KernelRequest::Sleep;
        arch::enter_kernel();
    });
}

/// Suspend the READY task carrying `pid`. The caller keeps the CPU.
pub fn suspend(pid: Pid) -> Result<(), KernelError> {
    sync::critical_section(|_cs| unsafe {
        let kernel = &mut *SCHEDULER_PTR;
        if !kernel.kernel_active {
            kernel.err = KernelError::KernelInactive;
            return Err(KernelError::KernelInactive);
        }
        let pd = &mut kernel.tasks[kernel.current];
        pd.request = KernelRequest::Suspend;
        pd.request_arg = pid as i32;
        arch::enter_kernel();

        match kernel.err {
            KernelError::NoErr => Ok(()),
            e => Err(e),
        }
    })
}

/// Resume the SUSPENDED task carrying `pid`. The caller keeps the CPU.
pub fn resume(pid: Pid) -> Result<(), KernelError> {
    sync::critical_section(|_cs| unsafe {
        let kernel = &mut *SCHEDULER_PTR;
        if !kernel.kernel_active {
            kernel.err = KernelError::KernelInactive;
            return Err(KernelError::KernelInactive);
        }
        let pd = &mut kernel.tasks[kernel.current];
        pd.request = KernelRequest::Resume;
        pd.request_arg = pid as i32;
        arch::enter_kernel();

        match kernel.err {
            KernelError::NoErr => Ok(()),
            e => Err(e),
        }
    })
}

/// PID of the first task built from `entry`, or `None`. Runs as a plain
/// table scan, without trapping.
pub fn pid_of(entry: TaskFn) -> Option<Pid> {
    sync::critical_section(|_cs| unsafe { (*SCHEDULER_PTR).pid_of(entry) })
}

/// Entry argument of the calling task.
///
/// TODO: plumb the recorded `arg` back out of the descriptor; for now this
/// is a stub and always reports 0.
pub fn get_arg() -> i32 {
    0
}

/// Outcome of the most recent kernel operation.
pub fn last_error() -> KernelError {
    sync::critical_section(|_cs| unsafe { (*SCHEDULER_PTR).err })
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn idle_entry() {}

    // One combined test: the facade shares the global kernel instance, so
    // the pre-start behaviour is exercised in a single sequence.
    #[test]
    fn facade_before_start() {
        init();

        // Syscalls decline without trapping while the kernel is inactive.
        yield_now();
        assert_eq!(last_error(), KernelError::KernelInactive);

        sleep(5);
        assert_eq!(last_error(), KernelError::KernelInactive);

        assert_eq!(suspend(1), Err(KernelError::KernelInactive));
        assert_eq!(resume(1), Err(KernelError::KernelInactive));

        terminate();
        assert_eq!(last_error(), KernelError::KernelInactive);

        // Creation is the exception: it builds the task directly.
        assert_eq!(create_task(idle_entry, 10, 77), Ok(1));
        assert_eq!(last_error(), KernelError::NoErr);
        assert_eq!(pid_of(idle_entry), Some(1));

        // Argument retrieval is a stub.
        assert_eq!(get_arg(), 0);
    }
}
