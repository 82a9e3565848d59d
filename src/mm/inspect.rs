//! Reporting and flipping per-page protection bits.
//!
//! Both operations walk the page table once per page and print one line per
//! page. A walk that needs a new intermediate table while the allocator is
//! exhausted aborts the whole operation with [`KernelError::NoMemory`].
use super::page_table::{PageTableMappingError, PageTableWalker, PteFlags};
use crate::KernelError;
use abyss::addressing::{PAGE_SIZE, Va};
use core::fmt::{self, Write};
use num_enum::TryFromPrimitive;

/// A protection bit `setperm` can flip, named by its letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum PermissionBit {
    /// Present.
    P = b'P',
    /// Writable.
    W = b'W',
    /// User-accessible.
    U = b'U',
}

impl PermissionBit {
    /// Parses a one-letter bit name. Case-sensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.as_bytes() {
            [letter] => Self::try_from(*letter).ok(),
            _ => None,
        }
    }

    /// The entry flag this bit names.
    pub fn flag(self) -> PteFlags {
        match self {
            Self::P => PteFlags::P,
            Self::W => PteFlags::RW,
            Self::U => PteFlags::US,
        }
    }
}

/// Formats the present, writable and user bits of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions(pub PteFlags);

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bit = |flag: PteFlags| self.0.contains(flag) as u8;
        write!(
            f,
            "PTE_P: {}, PTE_W: {}, PTE_U: {}",
            bit(PteFlags::P),
            bit(PteFlags::RW),
            bit(PteFlags::US)
        )
    }
}

fn exhausted(command: &str, addr: usize) -> KernelError {
    warning!("{command}: out of memory for page tables while walking {addr:#x}");
    KernelError::NoMemory
}

/// Prints the protection bits of every page from `begin` to `end`, both
/// inclusive, stepping by [`PAGE_SIZE`].
///
/// With `create`, missing intermediate tables are allocated on the way, so
/// probing an address may populate the page table. Without it, a missing
/// table reports the page as not present. Nothing is printed when
/// `begin > end`, and the walk stops at the top of the address space.
pub fn inspect_range<W>(
    walker: &mut W,
    begin: usize,
    end: usize,
    create: bool,
    out: &mut dyn Write,
) -> Result<(), KernelError>
where
    W: PageTableWalker + ?Sized,
{
    let mut addr = begin;
    while addr <= end {
        match Va::new(addr) {
            None => writeln!(out, "page {addr:#x}: non-canonical address")?,
            Some(va) => match walker.walk(va, create) {
                Ok(pte) if pte.is_present() => {
                    writeln!(out, "page {addr:#x}: {}", Permissions(pte.flags()))?
                }
                Ok(_) | Err(PageTableMappingError::NotExist) => {
                    writeln!(out, "page {addr:#x}: not present")?
                }
                Err(PageTableMappingError::NoMemory) => {
                    return Err(exhausted("showmp", addr));
                }
            },
        }
        addr = match addr.checked_add(PAGE_SIZE) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(())
}

/// Sets (`value == true`) or clears `bit` in the entry translating `addr`,
/// printing the three bits before and after.
///
/// Missing intermediate tables are allocated. The TLB entry of the page is
/// invalidated before returning.
pub fn set_bit<W>(
    walker: &mut W,
    addr: usize,
    value: bool,
    bit: PermissionBit,
    out: &mut dyn Write,
) -> Result<(), KernelError>
where
    W: PageTableWalker + ?Sized,
{
    let Some(va) = Va::new(addr) else {
        writeln!(out, "{addr:#x}: non-canonical address")?;
        return Ok(());
    };
    let mut pte = walker.walk(va, true).map_err(|e| match e {
        PageTableMappingError::NoMemory => exhausted("setperm", addr),
        PageTableMappingError::NotExist => KernelError::BadAddress,
    })?;
    let before = pte.flags();
    let stale = if value {
        pte.insert(bit.flag())
    } else {
        pte.remove(bit.flag())
    };
    let after = pte.flags();
    stale.invalidate(walker);

    writeln!(out, "{addr:#x} before setperm: {}", Permissions(before))?;
    writeln!(out, "{addr:#x} after setperm: {}", Permissions(after))?;
    Ok(())
}
