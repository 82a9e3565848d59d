//! x86_64 registers and instructions used by the monitor.
//!
//! Everything here executes privileged or architecture-specific instructions.
//! Reading `rbp` is safe anywhere; touching `cr3`, `invlpg` or I/O ports
//! faults outside ring 0.

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub mod pio;

/// Current value of the frame-base register.
///
/// Only meaningful when the kernel is compiled with frame pointers
/// (`-C force-frame-pointers=yes`).
#[inline(always)]
pub fn read_rbp() -> usize {
    #[cfg(target_arch = "x86_64")]
    {
        let rbp: usize;
        unsafe {
            core::arch::asm!("mov {}, rbp", out(reg) rbp, options(nomem, nostack, preserves_flags));
        }
        rbp
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        0
    }
}

/// The CR3 register: physical address of the active page-table root.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cr3(pub u64);

impl Cr3 {
    /// Reads the CR3 of the running CPU.
    ///
    /// # Safety
    /// Must be executed in ring 0.
    #[cfg(target_arch = "x86_64")]
    #[inline]
    pub unsafe fn current() -> Self {
        let cr3: u64;
        unsafe {
            core::arch::asm!("mov {}, cr3", out(reg) cr3, options(nomem, nostack, preserves_flags));
        }
        Self(cr3)
    }

    /// Physical address of the root table, without the PCID and flag bits.
    #[inline]
    pub const fn into_usize(self) -> usize {
        (self.0 & !0xfff) as usize
    }
}

/// Invalidates the TLB entry for the page containing `va`.
///
/// # Safety
/// Must be executed in ring 0.
#[cfg(target_arch = "x86_64")]
#[inline]
pub unsafe fn invlpg(va: usize) {
    unsafe {
        core::arch::asm!("invlpg [{0}]", in(reg) va, options(nostack, preserves_flags));
    }
}
