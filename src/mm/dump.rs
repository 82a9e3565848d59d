//! Raw memory dumps.
use crate::KernelError;
use abyss::unwind::{Peeker, WORD};
use core::fmt::Write;

/// Prints `count` consecutive machine words starting at `addr`, one per
/// line, each with its own address.
///
/// Words the peeker cannot read print as `<unreadable>`. The dump ends early
/// if the address would wrap around the top of the address space.
pub fn dump<P>(memory: &P, addr: usize, count: usize, out: &mut dyn Write) -> Result<(), KernelError>
where
    P: Peeker + ?Sized,
{
    for i in 0..count {
        let Some(at) = i.checked_mul(WORD).and_then(|ofs| addr.checked_add(ofs)) else {
            break;
        };
        match memory.read::<usize>(at) {
            Some(word) => writeln!(out, "VM at {at:#x}: {word:#x}")?,
            None => writeln!(out, "VM at {at:#x}: <unreadable>")?,
        }
    }
    Ok(())
}
