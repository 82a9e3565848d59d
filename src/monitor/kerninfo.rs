//! Layout of the kernel image, as printed by `kerninfo`.
use crate::KernelError;
use abyss::addressing::KERNBASE;
use core::fmt::Write;

/// Addresses of the linker symbols delimiting the kernel image.
///
/// `start` is physical; the others are virtual addresses in the direct map
/// at [`KERNBASE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelLayout {
    /// `_start`, the physical entry point.
    pub start: usize,
    /// `entry`, the virtual entry point.
    pub entry: usize,
    /// `etext`, end of the text segment.
    pub etext: usize,
    /// `edata`, end of the initialized data.
    pub edata: usize,
    /// `end`, end of the image.
    pub end: usize,
}

impl KernelLayout {
    /// Reads the layout from the symbols the linker script defines.
    #[cfg(target_os = "none")]
    pub fn from_linker() -> Self {
        unsafe extern "C" {
            static _start: u8;
            static entry: u8;
            static etext: u8;
            static edata: u8;
            static end: u8;
        }
        unsafe {
            Self {
                start: &_start as *const u8 as usize,
                entry: &entry as *const u8 as usize,
                etext: &etext as *const u8 as usize,
                edata: &edata as *const u8 as usize,
                end: &end as *const u8 as usize,
            }
        }
    }

    /// Bytes of memory the image occupies, rounded up to a KiB.
    pub fn footprint(&self) -> usize {
        self.end.saturating_sub(self.entry).div_ceil(1024) * 1024
    }
}

/// Prints `layout`, or a note that it is unknown.
pub fn print(layout: Option<&KernelLayout>, out: &mut dyn Write) -> Result<(), KernelError> {
    let Some(layout) = layout else {
        writeln!(out, "Kernel layout is not available.")?;
        return Ok(());
    };
    let phys = |va: usize| va.wrapping_sub(KERNBASE);

    writeln!(out, "Special kernel symbols:")?;
    writeln!(out, "  _start                  {:016x} (phys)", layout.start)?;
    for (name, va) in [
        ("entry", layout.entry),
        ("etext", layout.etext),
        ("edata", layout.edata),
        ("end", layout.end),
    ] {
        writeln!(out, "  {name:<6} {va:016x} (virt)  {:016x} (phys)", phys(va))?;
    }
    writeln!(
        out,
        "Kernel executable memory footprint: {}KB",
        layout.footprint() / 1024
    )?;
    Ok(())
}
