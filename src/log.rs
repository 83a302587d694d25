//! Kernel diagnostics.
//!
//! Thin macros over `defmt`, compiled to nothing unless the `defmt` cargo
//! feature is enabled. Kernel code logs through these so that release
//! builds carry no logging cost and host tests need no global logger.

macro_rules! ktrace {
    ($($arg:tt)*) => {
        #[cfg(feature = "defmt")]
        ::defmt::trace!($($arg)*);
    };
}

macro_rules! kwarn {
    ($($arg:tt)*) => {
        #[cfg(feature = "defmt")]
        ::defmt::warn!($($arg)*);
    };
}

pub(crate) use ktrace;
pub(crate) use kwarn;
