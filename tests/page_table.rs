mod common;

use abyss::addressing::{Pa, Va};
use common::{allocated, flags_of, map, page_table};
use kmon::mm::page_table::{
    ADDR_MASK, DirFlags, MapSize, PageTableMappingError, PageTableWalker, Pte, PteFlags,
    TableAllocator,
};

/// Walking without creation never allocates and reports the missing table.
#[test]
fn walk_without_create() {
    let mut pt = page_table(16);
    let va = Va::new(0x1000).unwrap();
    assert!(matches!(
        pt.walk(va, false),
        Err(PageTableMappingError::NotExist)
    ));
    assert_eq!(allocated(&pt), 0);
}

/// Walking with creation allocates exactly the missing intermediate tables.
#[test]
fn walk_with_create() {
    let mut pt = page_table(16);
    let va = Va::new(0x1000).unwrap();
    {
        let pte = pt.walk(va, true).unwrap();
        assert_eq!(pte.va(), va);
        assert_eq!(pte.size(), MapSize::Size4K);
        assert!(!pte.is_present());
        assert_eq!(pte.pa(), None);
    }
    assert_eq!(allocated(&pt), 3);

    // Same leaf table: nothing new.
    assert!(pt.walk(Va::new(0x2000).unwrap(), true).is_ok());
    assert_eq!(allocated(&pt), 3);

    // Another page table below the same page directory.
    assert!(pt.walk(Va::new(0x4000_0000 - 0x1000).unwrap(), true).is_ok());
    assert_eq!(allocated(&pt), 4);

    // Now reachable without creation.
    assert!(pt.walk(va, false).is_ok());
}

#[test]
fn intermediate_tables_are_permissive() {
    let mut pt = page_table(16);
    map(&mut pt, 0x1000, PteFlags::P);
    let root = pt.allocator().translate(pt.root());
    let pml4e = unsafe { (*root)[0] };
    let flags = DirFlags::from_bits_truncate(pml4e);
    assert_eq!(flags, DirFlags::P | DirFlags::RW | DirFlags::US);
}

#[test]
fn exhaustion_is_reported() {
    let mut pt = page_table(2);
    assert!(matches!(
        pt.walk(Va::new(0x1000).unwrap(), true),
        Err(PageTableMappingError::NoMemory)
    ));
    // The two tables that could be allocated stay linked.
    assert_eq!(allocated(&pt), 2);

    let mut pt = page_table(0);
    assert!(matches!(
        pt.walk(Va::new(0x1000).unwrap(), true),
        Err(PageTableMappingError::NoMemory)
    ));
}

#[test]
fn insert_and_remove_flags() {
    let mut pt = page_table(16);
    let va = Va::new(0x7000).unwrap();
    let mut pte = pt.walk(va, true).unwrap();
    let stale = pte.insert(PteFlags::P | PteFlags::RW);
    assert_eq!(pte.flags(), PteFlags::P | PteFlags::RW);
    stale.invalidate(&mut pt);

    let stale = pt.walk(va, false).unwrap().remove(PteFlags::RW);
    stale.invalidate(&mut pt);
    assert_eq!(flags_of(&mut pt, 0x7000), Some(PteFlags::P));
}

#[test]
fn pte_accessors() {
    let pte = Pte(0x1234_5000 | (PteFlags::P | PteFlags::US | PteFlags::XD).bits());
    assert_eq!(pte.pa(), Pa::new(0x1234_5000));
    assert!(pte.is_present());
    assert_eq!(pte.flags(), PteFlags::P | PteFlags::US | PteFlags::XD);
    assert_eq!(pte.0 & ADDR_MASK, 0x1234_5000);

    let absent = Pte(0x1234_5000 | PteFlags::RW.bits());
    assert_eq!(absent.pa(), None);
    assert!(!absent.is_present());
}

/// A page directory entry with `PS` maps a 2 MiB page; the walk stops there.
#[test]
fn large_pages_are_leaves() {
    let mut pt = page_table(16);
    let va = 0x4020_0000;
    assert!(pt.walk(Va::new(va).unwrap(), true).is_ok());
    assert_eq!(allocated(&pt), 3);

    // Turn the pde into a large page.
    let va = Va::new(va).unwrap();
    let allocator = pt.allocator();
    let pml4e = unsafe { (*allocator.translate(pt.root()))[va.pml4_index()] };
    let pdpt = Pa::new(pml4e & ADDR_MASK).unwrap();
    let pdpe = unsafe { (*allocator.translate(pdpt))[va.pdpt_index()] };
    let pd = allocator.translate(Pa::new(pdpe & ADDR_MASK).unwrap());
    unsafe {
        (*pd)[va.pd_index()] = 0x20_0000 | (DirFlags::P | DirFlags::RW | DirFlags::PS).bits();
    }

    let pte = pt.walk(Va::new(0x4020_1000).unwrap(), false).unwrap();
    assert_eq!(pte.size(), MapSize::Size2M);
    assert!(pte.flags().contains(PteFlags::P | PteFlags::RW));
    assert!(!pte.flags().contains(PteFlags::US));
    assert_eq!(pte.pa(), Pa::new(0x20_0000));
}

#[test]
fn dropping_a_stale_entry_panics() {
    let result = std::panic::catch_unwind(|| {
        let mut pt = page_table(16);
        let _stale = pt
            .walk(Va::new(0x1000).unwrap(), true)
            .unwrap()
            .insert(PteFlags::P);
    });
    assert!(result.is_err());
}
