//! Resolving instruction addresses to source-level symbols.
//!
//! The backtracer only depends on [`AddressResolver`]. Two resolvers are
//! provided:
//! - [`SymbolTable`]: function ranges only, e.g. from the ELF `.symtab` or
//!   assembled by hand.
//! - [`DebugInfo`]: the symbol table plus file and line numbers from the
//!   kernel image's DWARF sections.

mod dwarf;

pub use dwarf::{DebugInfo, SymbolError};

use alloc::{string::String, vec::Vec};

/// Longest function name, in bytes, carried in a [`SymbolInfo`].
pub const MAX_FUNCTION_NAME: usize = 256;

/// Source-level information about one instruction address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInfo {
    /// Source file, if line information is available.
    pub file: Option<String>,
    /// Line number in [`file`](Self::file).
    pub line: Option<u32>,
    /// Demangled name of the enclosing function, at most
    /// [`MAX_FUNCTION_NAME`] bytes.
    pub function: String,
    /// First address of the enclosing function.
    pub function_start: usize,
    /// Size of the enclosing function in bytes.
    pub function_size: usize,
}

impl SymbolInfo {
    /// Byte offset of `addr` from the start of the function.
    pub fn offset(&self, addr: usize) -> usize {
        addr.wrapping_sub(self.function_start)
    }
}

/// Maps instruction addresses to [`SymbolInfo`].
pub trait AddressResolver {
    /// Resolves `addr`, or `None` if no known function covers it.
    fn resolve(&self, addr: usize) -> Option<SymbolInfo>;
}

impl<R: AddressResolver + ?Sized> AddressResolver for &R {
    fn resolve(&self, addr: usize) -> Option<SymbolInfo> {
        (**self).resolve(addr)
    }
}

/// A resolver that knows nothing. Every address is unknown.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSymbols;

impl AddressResolver for NoSymbols {
    fn resolve(&self, _addr: usize) -> Option<SymbolInfo> {
        None
    }
}

/// A function in a [`SymbolTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// First address of the function.
    pub start: usize,
    /// Size in bytes. Zero means "up to the next symbol".
    pub size: usize,
    /// Function name.
    pub name: String,
}

/// Function address ranges sorted by start address.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    /// Builds a table from `symbols` in any order.
    ///
    /// Duplicated start addresses keep the first symbol. A symbol of size
    /// zero extends to the next symbol; a trailing one is dropped.
    pub fn new(mut symbols: Vec<Symbol>) -> Self {
        symbols.sort_by_key(|sym| sym.start);
        symbols.dedup_by_key(|sym| sym.start);
        let starts = symbols.iter().map(|sym| sym.start).skip(1).collect::<Vec<_>>();
        for (sym, next) in symbols.iter_mut().zip(starts) {
            if sym.size == 0 {
                sym.size = next - sym.start;
            }
        }
        symbols.retain(|sym| sym.size != 0);
        Self { symbols }
    }

    /// Number of functions in the table.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Iterates over the functions in address order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    /// The function covering `addr`.
    pub fn lookup(&self, addr: usize) -> Option<&Symbol> {
        let idx = self.symbols.partition_point(|sym| sym.start <= addr);
        let sym = self.symbols.get(idx.checked_sub(1)?)?;
        (addr - sym.start < sym.size).then_some(sym)
    }
}

impl AddressResolver for SymbolTable {
    fn resolve(&self, addr: usize) -> Option<SymbolInfo> {
        self.lookup(addr).map(|sym| SymbolInfo {
            file: None,
            line: None,
            function: bounded_name(&sym.name),
            function_start: sym.start,
            function_size: sym.size,
        })
    }
}

fn bounded_name(name: &str) -> String {
    let mut end = name.len().min(MAX_FUNCTION_NAME);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    String::from(&name[..end])
}
