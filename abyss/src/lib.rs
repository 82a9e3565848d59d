//! The abyss of the monitor that touches hardware.
//!
//! This crate contains the pieces of the kernel monitor that talk to the
//! machine directly: address types, the serial console and the print macros
//! built on it, the spinlock guarding that console, frame-pointer stack
//! walking, and the handful of x86_64 registers and instructions the monitor
//! needs.
//!
//! Nothing here knows about commands or symbols. See the `kmon` crate for
//! the monitor itself.
#![no_std]
#![allow(clippy::missing_safety_doc)]

use core::sync::atomic::AtomicBool;

#[doc(hidden)]
#[macro_use]
pub mod kprint;
pub mod addressing;
#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub mod dev {
    //! Devices.
    pub mod serial;
}
pub mod spinlock;
pub mod unwind;
pub mod x86_64;

/// Silences `info!`, `warning!` and `debug!` while set.
#[doc(hidden)]
pub static QUITE: AtomicBool = AtomicBool::new(false);
