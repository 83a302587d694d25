//! # servos — a full-served cooperative RTOS kernel
//!
//! A cooperative, full-served real-time kernel for single-core
//! microcontrollers. A fixed, statically provisioned set of tasks shares
//! one CPU; every task-visible state transition runs through a trap-like
//! syscall boundary into a privileged kernel context with its own stack.
//!
//! ## Overview
//!
//! - **Full-served:** syscall work never executes inline on the caller's
//!   stack. A task publishes a request into its descriptor, traps into the
//!   kernel through a context-switch trampoline, and is resumed (or
//!   another task is dispatched) once the request is serviced.
//! - **Cooperative:** tasks run until they trap. The periodic tick only
//!   drives sleep expiry; it never moves the running task off the CPU.
//! - **Static:** the process table, every task workspace and the whole
//!   kernel state are compile-time allocations. No heap, no `alloc`.
//! - **Round-robin:** the dispatcher rotates over READY tasks. Priorities
//!   are recorded but deliberately not consulted.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Application Tasks                     │
//! ├─────────────────────────────────────────────────────────┤
//! │                Syscall Facade (kernel.rs)                │
//! │  init · create_task · start · yield_now · sleep ·        │
//! │  suspend · resume · terminate · pid_of · last_error      │
//! ├───────────────────────────┬─────────────────────────────┤
//! │   Kernel Core             │   Sync (sync.rs)            │
//! │   scheduler.rs            │   ─ critical_section        │
//! │   ─ trap loop (run)       ├─────────────────────────────┤
//! │   ─ dispatch (round robin)│   Diagnostics (log.rs)      │
//! │   ─ tick (sleep expiry)   │   ─ optional defmt          │
//! │   ─ request services      │                             │
//! ├───────────────────────────┴─────────────────────────────┤
//! │        Task Model (task.rs) · Config (config.rs)         │
//! │   ProcessDescriptor · TaskState · KernelRequest · Stack  │
//! ├─────────────────────────────────────────────────────────┤
//! │              Arch Port (arch/cortex_m4.rs)               │
//! │   enter/exit trampolines · stack synthesis · SysTick     │
//! ├─────────────────────────────────────────────────────────┤
//! │                 ARM Cortex-M4 (Thumb-2)                  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Trap protocol
//!
//! A task issues a syscall by disabling interrupts, writing the request
//! (and argument, if any) into the running descriptor, and calling the
//! enter-kernel trampoline, which parks the task's registers on its own
//! stack and swaps to the kernel stack. The kernel services the request
//! and exits back onto some task's stack with interrupts re-enabled.
//! Suspension points are exactly the syscalls: a task cannot lose the CPU
//! anywhere else.
//!
//! ## Memory model
//!
//! - Kernel state is one `static` [`scheduler::Scheduler`] value.
//! - Each task's stack is a fixed buffer inside its own descriptor.
//! - Mutual exclusion is the interrupt mask alone — the kernel and the
//!   tick ISR are the only writers, and neither runs with interrupts open.

#![no_std]

pub mod arch;
pub mod config;
pub mod kernel;
mod log;
pub mod scheduler;
pub mod sync;
pub mod task;
