//! # servos demo firmware
//!
//! Three tasks exercising the whole syscall surface:
//!
//! | Task | Behaviour |
//! |------|-----------|
//! | `ping` | sleeps one tick batch, bumps its counter, yields |
//! | `pong` | same rhythm as `ping`, but gets suspended periodically |
//! | `supervisor` | alternately suspends and resumes `pong` |
//!
//! Over one supervisor cycle `pong` advances exactly once (during its
//! resumed window) while `ping` advances at least twice. The counters are
//! plain statics — watch them from a debugger to see the schedule.

#![no_std]
#![no_main]

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m_rt::entry;
use panic_halt as _;

use servos::kernel;

static PING_BEATS: AtomicU32 = AtomicU32::new(0);
static PONG_BEATS: AtomicU32 = AtomicU32::new(0);

// ---------------------------------------------------------------------------
// Task entry points
// ---------------------------------------------------------------------------

extern "C" fn ping() {
    loop {
        kernel::sleep(10);
        PING_BEATS.fetch_add(1, Ordering::Relaxed);
        kernel::yield_now();
    }
}

extern "C" fn pong() {
    loop {
        kernel::sleep(10);
        PONG_BEATS.fetch_add(1, Ordering::Relaxed);
        kernel::yield_now();
    }
}

/// Alternately parks and releases `pong`, one sleep batch apart. Suspend
/// and resume can land on errors when `pong` happens to be sleeping rather
/// than READY; the supervisor just tries again next cycle.
extern "C" fn supervisor() {
    loop {
        kernel::sleep(10);
        if let Some(pid) = kernel::pid_of(pong) {
            let _ = kernel::suspend(pid);
        }
        kernel::yield_now();

        kernel::sleep(10);
        if let Some(pid) = kernel::pid_of(pong) {
            let _ = kernel::resume(pid);
        }
        kernel::yield_now();
    }
}

// ---------------------------------------------------------------------------
// Boot
// ---------------------------------------------------------------------------

#[entry]
fn main() -> ! {
    let cp = cortex_m::Peripherals::take().unwrap();

    kernel::init();

    kernel::create_task(ping, 10, 210).expect("create ping");
    kernel::create_task(pong, 10, 205).expect("create pong");
    kernel::create_task(supervisor, 10, 0).expect("create supervisor");

    kernel::start(cp)
}
