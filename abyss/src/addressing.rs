//! Physical and virtual addresses.
//!
//! Physical memory is mapped one-to-one into the kernel half of every address
//! space, starting at [`KERNBASE`]. A table address read out of a page-table
//! entry is therefore turned into a pointer by adding [`KERNBASE`] to it.
//!
//! - [`Pa`]: a physical address.
//! - [`Kva`]: a kernel virtual address inside that direct map.
//! - [`Va`]: any canonical virtual address.

/// Base of the direct map of physical memory.
pub const KERNBASE: usize = 0xffff_0000_0000_0000 | (510 << 39);

/// Size of a page (4 KiB).
pub const PAGE_SIZE: usize = 0x1000;

/// log2 of [`PAGE_SIZE`].
pub const PAGE_SHIFT: usize = 12;

/// Number of entries in a single page-table page.
pub const ENTRIES_PER_TABLE: usize = 512;

const INDEX_MASK: usize = ENTRIES_PER_TABLE - 1;

/// Physical address.
#[repr(transparent)]
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct Pa(usize);

impl Pa {
    /// Physical address zero.
    pub const ZERO: Self = Self(0);

    /// Wraps `addr`, or `None` if it lies in the range the direct map cannot
    /// cover.
    #[inline]
    pub const fn new(addr: usize) -> Option<Self> {
        if addr < 0xffff_0000_0000_0000 {
            Some(Self(addr))
        } else {
            None
        }
    }

    /// Cast into usize.
    #[inline]
    pub const fn into_usize(self) -> usize {
        self.0
    }

    /// Where this frame appears in the direct map.
    #[inline]
    pub const fn into_kva(self) -> Kva {
        Kva(self.0.wrapping_add(KERNBASE))
    }
}

/// Kernel virtual address in the direct map.
#[repr(transparent)]
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct Kva(usize);

impl Kva {
    /// Cast into usize.
    #[inline]
    pub const fn into_usize(self) -> usize {
        self.0
    }
}

/// Virtual address.
///
/// Only canonical addresses are representable: bits 48..64 must be copies of
/// bit 47.
#[repr(transparent)]
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct Va(usize);

impl Va {
    /// Wraps `addr`, or `None` if it is not canonical.
    #[inline]
    pub const fn new(addr: usize) -> Option<Self> {
        match addr & 0xffff_8000_0000_0000 {
            0 | 0xffff_8000_0000_0000 => Some(Self(addr)),
            _ => None,
        }
    }

    /// Cast into usize.
    #[inline]
    pub const fn into_usize(self) -> usize {
        self.0
    }

    /// Index into the page-map level 4 table.
    #[inline]
    pub const fn pml4_index(self) -> usize {
        (self.0 >> (PAGE_SHIFT + 27)) & INDEX_MASK
    }

    /// Index into the page-directory-pointer table.
    #[inline]
    pub const fn pdpt_index(self) -> usize {
        (self.0 >> (PAGE_SHIFT + 18)) & INDEX_MASK
    }

    /// Index into the page directory.
    #[inline]
    pub const fn pd_index(self) -> usize {
        (self.0 >> (PAGE_SHIFT + 9)) & INDEX_MASK
    }

    /// Index into the page table.
    #[inline]
    pub const fn pt_index(self) -> usize {
        (self.0 >> PAGE_SHIFT) & INDEX_MASK
    }
}

macro_rules! impl_fmt {
    ($t: ident) => {
        impl core::fmt::Debug for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, concat!(stringify!($t), "({:#x})"), self.0)
            }
        }
    };
}

impl_fmt!(Kva);
impl_fmt!(Va);
impl_fmt!(Pa);
