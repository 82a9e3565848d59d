//! Kernel print utilities.
//!
//! Output goes to the installed hook if there is one, otherwise to COM1 on
//! bare metal. Hosted builds without a hook discard the output.

use crate::spinlock::SpinLock;
use core::fmt::Write;

/// Receives every printed fragment when installed with [`set_hook`].
pub type PrintHook = fn(&str);

struct Sink {
    hook: Option<PrintHook>,
}

impl Write for Sink {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        if let Some(hook) = self.hook {
            hook(s);
            return Ok(());
        }
        #[cfg(all(target_arch = "x86_64", target_os = "none"))]
        crate::dev::serial::write_str(s);
        Ok(())
    }
}

static CONSOLE: SpinLock<Sink> = SpinLock::new(Sink { hook: None });

#[doc(hidden)]
pub fn _print(fmt: core::fmt::Arguments<'_>) {
    let mut guard = CONSOLE.lock();
    let _ = write!(&mut *guard, "{fmt}");
    guard.unlock();
}

/// Redirects kernel prints to `hook`, or back to the serial port with `None`.
///
/// Returns the previously installed hook.
pub fn set_hook(hook: Option<PrintHook>) -> Option<PrintHook> {
    let mut guard = CONSOLE.lock();
    let prev = core::mem::replace(&mut guard.hook, hook);
    guard.unlock();
    prev
}

/// Formats to the kernel console under its lock.
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ($crate::kprint::_print(format_args!($($arg)*)));
}

/// [`print!`] followed by a newline.
#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)));
}

/// `[INFO]` line, dropped while [`QUITE`](crate::QUITE) is set.
#[macro_export]
macro_rules! info {
    () => (if !$crate::QUITE.load(core::sync::atomic::Ordering::SeqCst) { $crate::print!("[INFO]\n") });
    ($($arg:tt)*) => (if !$crate::QUITE.load(core::sync::atomic::Ordering::SeqCst) { $crate::print!("[INFO] {}\n", format_args!($($arg)*)) });
}

/// `[WARN]` line, dropped while [`QUITE`](crate::QUITE) is set.
#[macro_export]
macro_rules! warning {
    () => (if !$crate::QUITE.load(core::sync::atomic::Ordering::SeqCst) { $crate::print!("[WARN]\n") });
    ($($arg:tt)*) => (if !$crate::QUITE.load(core::sync::atomic::Ordering::SeqCst) { $crate::print!("[WARN] {}\n", format_args!($($arg)*)) });
}

/// `[DEBUG]` line, dropped while [`QUITE`](crate::QUITE) is set.
#[macro_export]
macro_rules! debug {
    () => (if !$crate::QUITE.load(core::sync::atomic::Ordering::SeqCst) { $crate::print!("[DEBUG]\n") });
    ($($arg:tt)*) => (if !$crate::QUITE.load(core::sync::atomic::Ordering::SeqCst) { $crate::print!("[DEBUG] {}\n", format_args!($($arg)*))} );
}
