//! Fakes of the machine the monitor inspects.
#![allow(dead_code)]

use abyss::{
    addressing::{ENTRIES_PER_TABLE, Pa, Va},
    unwind::{Peeker, WORD},
};
use kmon::{
    KernelError,
    mm::page_table::{
        PageTable, PageTableMappingError, PageTableWalker, PteFlags, TableAllocator, Walked,
    },
    teletype::Teletype,
};
use std::{collections::BTreeMap, collections::VecDeque, sync::Mutex};

/// Word-addressed memory. Only aligned word reads of stored words succeed.
#[derive(Default)]
pub struct FakeMemory {
    words: BTreeMap<usize, usize>,
}

impl FakeMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `words` consecutively from `addr`.
    pub fn store(&mut self, addr: usize, words: &[usize]) -> &mut Self {
        for (i, word) in words.iter().enumerate() {
            self.words.insert(addr + i * WORD, *word);
        }
        self
    }

    /// Lays out a frame at `base`: the caller's frame base, the return
    /// address and five argument words.
    pub fn frame(&mut self, base: usize, link: usize, ret: usize, args: [usize; 5]) -> &mut Self {
        self.store(base, &[link, ret]);
        self.store(base + 2 * WORD, &args)
    }
}

impl Peeker for FakeMemory {
    fn read<T>(&self, ofs: usize) -> Option<T>
    where
        T: Copy,
    {
        if core::mem::size_of::<T>() != WORD {
            return None;
        }
        let word = self.words.get(&ofs)?;
        Some(unsafe { core::mem::transmute_copy::<usize, T>(word) })
    }
}

#[repr(C, align(4096))]
struct Table([usize; ENTRIES_PER_TABLE]);

/// Page-table pages taken from the host heap, at most `budget` of them.
pub struct TestAllocator {
    tables: Vec<Box<Table>>,
    budget: usize,
}

impl TestAllocator {
    pub fn new(budget: usize) -> Self {
        Self {
            tables: Vec::new(),
            budget,
        }
    }

    /// Number of tables handed out so far.
    pub fn allocated(&self) -> usize {
        self.tables.len()
    }
}

impl TableAllocator for TestAllocator {
    fn allocate(&mut self) -> Option<Pa> {
        if self.budget == 0 {
            return None;
        }
        self.budget -= 1;
        let table = Box::new(Table([0; ENTRIES_PER_TABLE]));
        let pa = Pa::new(&*table as *const Table as usize)?;
        self.tables.push(table);
        Some(pa)
    }

    fn translate(&self, pa: Pa) -> *mut [usize; ENTRIES_PER_TABLE] {
        pa.into_usize() as *mut _
    }
}

/// An empty page table that may allocate `budget` tables below its root.
pub fn page_table(budget: usize) -> PageTable<TestAllocator> {
    let mut allocator = TestAllocator::new(budget + 1);
    let root = allocator.allocate().unwrap();
    unsafe { PageTable::new(root, allocator) }
}

/// Tables allocated below the root.
pub fn allocated(pt: &PageTable<TestAllocator>) -> usize {
    pt.allocator().allocated() - 1
}

/// Sets `flags` on the entry of `va`, creating the tables on the way.
pub fn map(pt: &mut PageTable<TestAllocator>, va: usize, flags: PteFlags) {
    let va = Va::new(va).unwrap();
    let stale = pt.walk(va, true).unwrap().insert(flags);
    stale.invalidate(pt);
}

/// Flags of the entry of `va`, if its tables exist.
pub fn flags_of(pt: &mut PageTable<TestAllocator>, va: usize) -> Option<PteFlags> {
    pt.walk(Va::new(va).unwrap(), false)
        .ok()
        .map(|pte| pte.flags())
}

/// A walker that remembers every invalidated address.
pub struct RecordingWalker<W: PageTableWalker> {
    pub inner: W,
    pub invalidated: Vec<Va>,
}

impl<W: PageTableWalker> RecordingWalker<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            invalidated: Vec::new(),
        }
    }
}

impl<W: PageTableWalker> PageTableWalker for RecordingWalker<W> {
    fn walk(&mut self, va: Va, create: bool) -> Result<Walked<'_>, PageTableMappingError> {
        self.inner.walk(va, create)
    }

    fn invalidate(&mut self, va: Va) {
        self.invalidated.push(va);
        self.inner.invalidate(va);
    }
}

/// A teletype fed from a script, one line per read.
pub struct ScriptedTty {
    input: VecDeque<Vec<u8>>,
    output: Vec<u8>,
}

impl ScriptedTty {
    pub fn new(script: &str) -> Self {
        Self {
            input: script
                .split_inclusive('\n')
                .map(|line| line.as_bytes().to_vec())
                .collect(),
            output: Vec::new(),
        }
    }

    /// Everything the monitor wrote.
    pub fn output(&self) -> String {
        String::from_utf8(self.output.clone()).unwrap()
    }
}

impl Teletype for ScriptedTty {
    fn write(&mut self, data: &[u8]) -> Result<usize, KernelError> {
        self.output.extend_from_slice(data);
        Ok(data.len())
    }

    fn read(&mut self, data: &mut [u8]) -> Result<usize, KernelError> {
        let Some(mut line) = self.input.pop_front() else {
            return Ok(0);
        };
        let n = line.len().min(data.len());
        data[..n].copy_from_slice(&line[..n]);
        if n < line.len() {
            self.input.push_front(line.split_off(n));
        }
        Ok(n)
    }
}

/// A teletype whose writes always fail.
pub struct BrokenTty;

impl Teletype for BrokenTty {
    fn write(&mut self, _data: &[u8]) -> Result<usize, KernelError> {
        Err(KernelError::IOError)
    }

    fn read(&mut self, _data: &mut [u8]) -> Result<usize, KernelError> {
        Ok(0)
    }
}

static LOG: Mutex<String> = Mutex::new(String::new());

fn log_hook(s: &str) {
    LOG.lock().unwrap().push_str(s);
}

/// Routes kernel prints into a buffer readable with [`logs`].
pub fn capture_logs() {
    abyss::kprint::set_hook(Some(log_hook));
}

/// Everything printed since [`capture_logs`].
pub fn logs() -> String {
    LOG.lock().unwrap().clone()
}
