//! # Kernel Configuration
//!
//! Compile-time constants governing the kernel. All limits are fixed at
//! compile time — no dynamic allocation anywhere in the crate.

/// Maximum number of task slots in the process table. Bounds the static
/// descriptor array. Increase with care — each slot carries `STACK_SIZE`
/// bytes of workspace RAM whether or not the slot is in use.
pub const MAX_TASKS: usize = 8;

/// Per-task workspace size in bytes. The workspace doubles as the task's
/// stack, so it must cover the deepest call chain plus one saved context
/// frame (40 bytes) plus one hardware exception frame (32 bytes) for the
/// tick interrupt, which stacks onto whichever task is running.
pub const STACK_SIZE: usize = 1024;

/// Tick frequency in Hz. 100 Hz gives the nominal 10 ms tick that drives
/// sleep expiry.
pub const TICK_HZ: u32 = 100;

/// System clock frequency in Hz (16 MHz HSI default on STM32F4 parts).
pub const SYSTEM_CLOCK_HZ: u32 = 16_000_000;

/// Lowest (numerically largest) task priority. Priorities run from 0
/// (highest) down to this value. The priority is recorded per task but the
/// dispatcher is strictly round-robin and does not consult it.
pub const MIN_PRIORITY: u8 = 10;
