//! # Synchronization
//!
//! Interrupt-masking critical section. On a single core the interrupt mask
//! is the only mutual-exclusion primitive the kernel needs: shared state is
//! touched exclusively from kernel context or from the tick ISR, and both
//! run with interrupts disabled.

use cortex_m::interrupt::CriticalSection;

/// Execute a closure with interrupts disabled, restoring the previous mask
/// on exit.
///
/// Keep critical sections short — the tick ISR is blocked for the duration
/// and sleep expiry slips by however long the section runs.
#[cfg(target_arch = "arm")]
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(&CriticalSection) -> R,
{
    cortex_m::interrupt::free(f)
}

/// Host build: single-threaded unit tests, no interrupts to mask.
#[cfg(not(target_arch = "arm"))]
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(&CriticalSection) -> R,
{
    // Safety: host tests are single-threaded and have no interrupts.
    f(unsafe { &CriticalSection::new() })
}
