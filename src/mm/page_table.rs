//! Entries of Page Table and their permissions.
//!
//! The monitor never maps or unmaps anything. It only needs to find the leaf
//! entry translating one virtual address, possibly creating the intermediate
//! tables on the way, and flip the protection bits of that entry. This module
//! provides:
//! - [`Pte`] and [`PteFlags`]: the leaf entry and its bits.
//! - [`DirEntry`] and [`DirFlags`]: entries of the upper three levels.
//! - [`Walked`]: a borrowed handle to one leaf entry.
//! - [`PageTableWalker`]: what the monitor needs from a page table.
//! - [`PageTable`]: the x86_64 four-level implementation, drawing new tables
//!   from a [`TableAllocator`].
use abyss::addressing::{ENTRIES_PER_TABLE, PAGE_SIZE, Pa, Va};

/// Bits 12..52 of an entry: the physical address it points to.
pub const ADDR_MASK: usize = 0x000f_ffff_ffff_f000;

bitflags::bitflags! {
    /// Flags for pte.
    pub struct PteFlags: usize {
        /// Present; must be 1 to map a 4-KByte page
        const P = 1 << 0;
        /// Read/write; if 0, writes may not be allowed to the 4-KByte page referenced by this entry
        const RW = 1 << 1;
        /// User/supervisor; if 0, user-mode accesses are not allowed to the 4-KByte page referenced by this entry
        const US = 1 << 2;
        /// Page-level write-through
        const PWT = 1 << 3;
        /// Page-level cache disable
        const PCD = 1 << 4;
        /// Accessed; indicates whether software has accessed the page
        const A = 1 << 5;
        /// Dirty; indicates whether software has written to the page
        const D = 1 << 6;
        /// Memory type of the page (PAT index bit)
        const PAT = 1 << 7;
        /// Global; translation survives CR3 reloads if CR4.PGE = 1
        const G = 1 << 8;
        /// If IA32_EFER.NXE = 1, execute-disable
        const XD = 1 << 63;
    }
}

bitflags::bitflags! {
    /// Flags for the entries of the upper three levels (pml4e, pdpe, pde).
    pub struct DirFlags: usize {
        /// Present; must be 1 to reference a lower-level table or a large page
        const P = 1 << 0;
        /// Read/write; if 0, writes may not be allowed to the region controlled by this entry
        const RW = 1 << 1;
        /// User/supervisor; if 0, user-mode accesses are not allowed to the region controlled by this entry
        const US = 1 << 2;
        /// Page-level write-through
        const PWT = 1 << 3;
        /// Page-level cache disable
        const PCD = 1 << 4;
        /// Accessed
        const A = 1 << 5;
        /// Page size; the entry maps a 1-GByte (pdpe) or 2-MByte (pde) page.
        /// Reserved in pml4e.
        const PS = 1 << 7;
        /// If IA32_EFER.NXE = 1, execute-disable
        const XD = 1 << 63;
    }
}

/// Page Table Entry (PTE).
///
/// The entry of the last-level table: the physical address of a page plus
/// its control bits.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Pte(pub usize);

impl Pte {
    /// Get the physical address pointed to by this entry.
    ///
    /// Returns `None` if the page is not present.
    #[inline]
    pub const fn pa(&self) -> Option<Pa> {
        if self.flags().contains(PteFlags::P) {
            Pa::new(self.0 & ADDR_MASK)
        } else {
            None
        }
    }

    /// Get the flags associated with this page table entry.
    #[inline]
    pub const fn flags(&self) -> PteFlags {
        PteFlags::from_bits_truncate(self.0)
    }

    /// Whether the present bit is set.
    #[inline]
    pub const fn is_present(&self) -> bool {
        self.flags().contains(PteFlags::P)
    }
}

impl core::fmt::Debug for Pte {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Pte({:016x}, {:?})", self.0 & ADDR_MASK, self.flags())
    }
}

/// Entry of a pml4, page-directory-pointer table or page directory.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct DirEntry(pub usize);

impl DirEntry {
    /// Get the flags associated with this entry.
    #[inline]
    pub const fn flags(&self) -> DirFlags {
        DirFlags::from_bits_truncate(self.0)
    }

    /// Physical address of the next-level table or large page, if present.
    #[inline]
    pub const fn pa(&self) -> Option<Pa> {
        if self.flags().contains(DirFlags::P) {
            Pa::new(self.0 & ADDR_MASK)
        } else {
            None
        }
    }
}

impl core::fmt::Debug for DirEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "DirEntry({:016x}, {:?})", self.0 & ADDR_MASK, self.flags())
    }
}

/// Size of the page a leaf entry maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapSize {
    /// 4 KiB page mapped by a pte.
    Size4K,
    /// 2 MiB page mapped by a pde with `PS` set.
    Size2M,
    /// 1 GiB page mapped by a pdpe with `PS` set.
    Size1G,
}

/// Page Table Mapping Error.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PageTableMappingError {
    /// An intermediate table is missing and creation was not requested.
    NotExist,
    /// An intermediate table is missing and the allocator is exhausted.
    NoMemory,
}

/// A leaf entry found by [`PageTableWalker::walk`].
///
/// The handle borrows the walker, so it cannot outlive the walk that
/// produced it or coexist with a later walk that might reallocate tables.
pub struct Walked<'a> {
    va: Va,
    pte: &'a mut Pte,
    size: MapSize,
}

impl<'a> Walked<'a> {
    /// Wraps the entry `pte` translating `va`.
    pub fn new(va: Va, pte: &'a mut Pte, size: MapSize) -> Self {
        Self { va, pte, size }
    }

    /// The address that was walked.
    pub fn va(&self) -> Va {
        self.va
    }

    /// The size of the page the entry maps.
    pub fn size(&self) -> MapSize {
        self.size
    }

    /// Sets `flags` in the entry, leaving the address and other bits alone.
    ///
    /// The returned [`StaleTlbEntry`] must be invalidated once the handle is
    /// released.
    pub fn insert(&mut self, flags: PteFlags) -> StaleTlbEntry {
        self.pte.0 |= flags.bits();
        StaleTlbEntry(self.va)
    }

    /// Clears `flags` in the entry, leaving the address and other bits alone.
    ///
    /// The returned [`StaleTlbEntry`] must be invalidated once the handle is
    /// released.
    pub fn remove(&mut self, flags: PteFlags) -> StaleTlbEntry {
        self.pte.0 &= !flags.bits();
        StaleTlbEntry(self.va)
    }
}

impl core::ops::Deref for Walked<'_> {
    type Target = Pte;

    fn deref(&self) -> &Self::Target {
        self.pte
    }
}

/// A TLB entry that may still cache the old contents of a modified pte.
///
/// Dropping it without calling [`invalidate`](Self::invalidate) panics.
#[must_use = "the TLB entry must be invalidated"]
pub struct StaleTlbEntry(Va);

impl StaleTlbEntry {
    /// Flushes the stale translation through `walker`.
    pub fn invalidate(self, walker: &mut (impl PageTableWalker + ?Sized)) {
        let va = core::mem::ManuallyDrop::new(self).0;
        walker.invalidate(va);
    }
}

impl Drop for StaleTlbEntry {
    fn drop(&mut self) {
        panic!(
            "TLB entry for {:?} is not invalidated. You must call `.invalidate()`.",
            self.0,
        );
    }
}

/// What the monitor needs from a page table.
pub trait PageTableWalker {
    /// Finds the leaf entry translating `va`.
    ///
    /// With `create`, missing intermediate tables are allocated; allocation
    /// failure yields [`PageTableMappingError::NoMemory`]. Without it a
    /// missing table yields [`PageTableMappingError::NotExist`]. The leaf
    /// entry itself is returned whether or not it is present.
    fn walk(&mut self, va: Va, create: bool) -> Result<Walked<'_>, PageTableMappingError>;

    /// Drops any cached translation of `va`.
    fn invalidate(&mut self, va: Va);
}

/// Source of zeroed page-table pages.
pub trait TableAllocator {
    /// Allocates a zero-filled, page-aligned table page.
    fn allocate(&mut self) -> Option<Pa>;

    /// Pointer through which the table at `pa` can be accessed.
    fn translate(&self, pa: Pa) -> *mut [usize; ENTRIES_PER_TABLE];
}

/// Tables reached through the kernel's direct map, fresh pages supplied by
/// a frame allocator.
pub struct DirectMap<F>
where
    F: FnMut() -> Option<Pa>,
{
    frames: F,
}

impl<F> DirectMap<F>
where
    F: FnMut() -> Option<Pa>,
{
    /// Draws new table pages from `frames`.
    pub fn new(frames: F) -> Self {
        Self { frames }
    }
}

impl<F> TableAllocator for DirectMap<F>
where
    F: FnMut() -> Option<Pa>,
{
    fn allocate(&mut self) -> Option<Pa> {
        let pa = (self.frames)()?;
        unsafe {
            core::ptr::write_bytes(pa.into_kva().into_usize() as *mut u8, 0, PAGE_SIZE);
        }
        Some(pa)
    }

    fn translate(&self, pa: Pa) -> *mut [usize; ENTRIES_PER_TABLE] {
        pa.into_kva().into_usize() as *mut _
    }
}

/// An x86_64 four-level page table.
pub struct PageTable<A: TableAllocator> {
    root: Pa,
    allocator: A,
    active: bool,
}

impl<A: TableAllocator> PageTable<A> {
    /// Walks the page table rooted at `root`.
    ///
    /// # Safety
    /// `root` and every table reachable from it must be valid tables that
    /// `allocator` can translate, and nothing else may modify them while the
    /// returned value is alive.
    pub unsafe fn new(root: Pa, allocator: A) -> Self {
        Self {
            root,
            allocator,
            active: false,
        }
    }

    /// Walks the page table the running CPU is using.
    ///
    /// # Safety
    /// Same as [`PageTable::new`]; must run in ring 0.
    #[cfg(target_arch = "x86_64")]
    pub unsafe fn current(allocator: A) -> Self {
        unsafe {
            let cr3 = abyss::x86_64::Cr3::current().into_usize();
            Self {
                root: Pa::new(cr3).unwrap_or(Pa::ZERO),
                allocator,
                active: true,
            }
        }
    }

    /// Physical address of the root table.
    pub fn root(&self) -> Pa {
        self.root
    }

    /// The allocator new tables are drawn from.
    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Slot `index` of the table at `table`.
    fn slot(&self, table: Pa, index: usize) -> *mut usize {
        let table = self.allocator.translate(table);
        unsafe { (*table).as_mut_ptr().add(index) }
    }
}

impl<A: TableAllocator> PageTableWalker for PageTable<A> {
    fn walk(&mut self, va: Va, create: bool) -> Result<Walked<'_>, PageTableMappingError> {
        let mut table = self.root;
        let levels = [
            (va.pml4_index(), None),
            (va.pdpt_index(), Some(MapSize::Size1G)),
            (va.pd_index(), Some(MapSize::Size2M)),
        ];
        for (index, large) in levels {
            let slot = self.slot(table, index);
            let entry = DirEntry(unsafe { *slot });
            table = match (entry.pa(), large) {
                (Some(_), Some(size)) if entry.flags().contains(DirFlags::PS) => {
                    let pte = unsafe { &mut *(slot as *mut Pte) };
                    return Ok(Walked::new(va, pte, size));
                }
                (Some(pa), _) => pa,
                (None, _) if create => {
                    let pa = self
                        .allocator
                        .allocate()
                        .ok_or(PageTableMappingError::NoMemory)?;
                    let flags = DirFlags::P | DirFlags::RW | DirFlags::US;
                    unsafe {
                        *slot = pa.into_usize() | flags.bits();
                    }
                    pa
                }
                (None, _) => return Err(PageTableMappingError::NotExist),
            };
        }
        let slot = self.slot(table, va.pt_index());
        let pte = unsafe { &mut *(slot as *mut Pte) };
        Ok(Walked::new(va, pte, MapSize::Size4K))
    }

    fn invalidate(&mut self, va: Va) {
        #[cfg(target_arch = "x86_64")]
        if self.active {
            unsafe { abyss::x86_64::invlpg(va.into_usize()) }
        }
        #[cfg(not(target_arch = "x86_64"))]
        let _ = va;
    }
}
