//! Host stand-ins for the port layer.
//!
//! Unit tests drive the kernel state machine directly and never perform a
//! real context switch, so the trampolines only need to exist, not work.

/// See [`super::cortex_m4`] for the real trampoline.
pub unsafe fn enter_kernel() {
    unimplemented!("context switch requires the target architecture");
}

/// See [`super::cortex_m4`] for the real trampoline.
pub unsafe fn exit_kernel() {
    unimplemented!("context switch requires the target architecture");
}

/// The target port waits for an interrupt here; on the host there is none
/// coming, so reaching this is a scheduling dead end.
pub fn idle_wait() {
    panic!("dispatcher idle: no task is ready and no tick source exists");
}

extern "C" fn launcher_stub() {
    unreachable!("task launcher is never executed on the host");
}

/// Address placed in the `pc` slot of a synthesized frame.
pub fn launcher_entry() -> usize {
    launcher_stub as usize
}
