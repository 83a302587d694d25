//! # Architecture Port Layer
//!
//! Boundary between the portable kernel and the machine. A port supplies:
//!
//! - the two context-switch trampolines, `enter_kernel` and `exit_kernel`;
//! - new-task stack synthesis producing the frame those trampolines consume;
//! - the periodic tick source and its handler wiring;
//! - a low-power idle wait for the dispatcher.
//!
//! The Cortex-M4 port is the concrete realization shipped here. Host builds
//! (unit tests) swap the trampolines for stand-ins so the kernel state
//! machine is testable without target hardware.

pub mod cortex_m4;

#[cfg(not(target_arch = "arm"))]
mod host;

#[cfg(target_arch = "arm")]
pub use cortex_m4::{enter_kernel, exit_kernel, idle_wait, launcher_entry};

#[cfg(not(target_arch = "arm"))]
pub use host::{enter_kernel, exit_kernel, idle_wait, launcher_entry};

pub use cortex_m4::{configure_systick, init_stack, FRAME_WORDS};
