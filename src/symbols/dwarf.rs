//! Symbols and line information from the kernel ELF image.
use super::{AddressResolver, Symbol, SymbolInfo, SymbolTable, bounded_name};
use addr2line::Context;
use gimli::Reader as _;
use alloc::{borrow::Cow, string::String, sync::Arc, vec::Vec};
use object::{Object, ObjectSection, ObjectSymbol, SymbolKind};

type Reader = gimli::EndianArcSlice<gimli::LittleEndian>;

/// Failure to load debugging symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolError {
    /// The image is not a parseable object file.
    NotAnElf,
    /// The DWARF sections are malformed.
    Dwarf(gimli::Error),
    /// The image has neither a symbol table nor line information.
    NoSymbols,
}

impl From<gimli::Error> for SymbolError {
    fn from(e: gimli::Error) -> Self {
        Self::Dwarf(e)
    }
}

/// Function ranges from `.symtab` plus file/line lookup from DWARF.
///
/// Addresses that `.symtab` does not cover are looked up in the DWARF
/// subprogram ranges instead, so a kernel whose symbol table was stripped
/// still gets function names. The section contents are copied out of the
/// image, so the image buffer can be released after [`DebugInfo::load`]
/// returns.
pub struct DebugInfo {
    context: Option<Context<Reader>>,
    symbols: SymbolTable,
    subprograms: SymbolTable,
}

impl DebugInfo {
    /// Loads debugging symbols from a kernel `image`.
    pub fn load(image: &[u8]) -> Result<Self, SymbolError> {
        let kernel = object::File::parse(image).map_err(|_| SymbolError::NotAnElf)?;
        let symbols = SymbolTable::new(
            kernel
                .symbols()
                .filter(|symbol| symbol.kind() == SymbolKind::Text && symbol.address() != 0)
                .filter_map(|symbol| {
                    let name = symbol.name().ok()?;
                    Some(Symbol {
                        start: symbol.address() as usize,
                        size: symbol.size() as usize,
                        name: addr2line::demangle_auto(Cow::Borrowed(name), None).into_owned(),
                    })
                })
                .collect::<Vec<_>>(),
        );

        let dwarf = gimli::Dwarf::load(|id| -> Result<Reader, gimli::Error> {
            let data = kernel
                .section_by_name(id.name())
                .and_then(|section| section.uncompressed_data().ok())
                .unwrap_or(Cow::Borrowed(&[]));
            let data: Arc<[u8]> = Arc::from(data.as_ref());
            Ok(gimli::EndianArcSlice::new(data, gimli::LittleEndian))
        })?;
        let has_lines = kernel.section_by_name(".debug_line").is_some();
        let (context, subprograms) = if has_lines {
            let subprograms = subprograms(&dwarf)?;
            (Some(Context::from_dwarf(dwarf)?), subprograms)
        } else {
            (None, SymbolTable::default())
        };

        if symbols.is_empty() && context.is_none() {
            return Err(SymbolError::NoSymbols);
        }
        Ok(Self {
            context,
            symbols,
            subprograms,
        })
    }

    /// The function ranges found in the image.
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Whether file and line numbers are available.
    pub fn has_line_info(&self) -> bool {
        self.context.is_some()
    }

    /// Resolves `addr` from DWARF alone, ignoring `.symtab`.
    ///
    /// The name is the one of the outermost frame at `addr`, that is the
    /// function the instruction was compiled into rather than a function
    /// inlined there.
    pub fn resolve_from_dwarf(&self, addr: usize) -> Option<SymbolInfo> {
        let context = self.context.as_ref()?;
        let range = self.subprograms.lookup(addr)?;
        let mut frames = context.find_frames(addr as u64).ok()?;
        let mut name = None;
        while let Ok(Some(frame)) = frames.next() {
            if let Some(Ok(function)) = frame.function.as_ref().map(|f| f.demangle()) {
                name = Some(bounded_name(&function));
            }
        }
        Some(SymbolInfo {
            file: None,
            line: None,
            function: name.unwrap_or_else(|| bounded_name(&range.name)),
            function_start: range.start,
            function_size: range.size,
        })
    }

    fn location(&self, addr: usize) -> Option<(Option<String>, Option<u32>)> {
        let location = self.context.as_ref()?.find_location(addr as u64).ok()??;
        Some((location.file.map(String::from), location.line))
    }
}

impl AddressResolver for DebugInfo {
    fn resolve(&self, addr: usize) -> Option<SymbolInfo> {
        let mut info = self
            .symbols
            .resolve(addr)
            .or_else(|| self.resolve_from_dwarf(addr))?;
        if let Some((file, line)) = self.location(addr) {
            info.file = file;
            info.line = line;
        }
        Some(info)
    }
}

/// Address ranges of every subprogram with code, named by its linkage name
/// when it carries one. Entries that cannot be decoded are skipped.
fn subprograms(dwarf: &gimli::Dwarf<Reader>) -> Result<SymbolTable, gimli::Error> {
    let mut found = Vec::new();
    let mut headers = dwarf.units();
    while let Some(header) = headers.next()? {
        let Ok(unit) = dwarf.unit(header) else {
            continue;
        };
        let mut entries = unit.entries();
        while let Ok(Some((_, entry))) = entries.next_dfs() {
            if entry.tag() != gimli::DW_TAG_subprogram {
                continue;
            }
            let name = entry
                .attr_value(gimli::DW_AT_linkage_name)
                .ok()
                .flatten()
                .and_then(|attr| dwarf.attr_string(&unit, attr).ok())
                .and_then(|raw| {
                    let raw = raw.to_string_lossy().ok()?;
                    Some(addr2line::demangle_auto(raw, None).into_owned())
                })
                .unwrap_or_default();
            let Ok(mut ranges) = dwarf.die_ranges(&unit, entry) else {
                continue;
            };
            while let Ok(Some(range)) = ranges.next() {
                // Zero marks code the linker discarded.
                if range.begin == 0 || range.end <= range.begin {
                    continue;
                }
                found.push(Symbol {
                    start: range.begin as usize,
                    size: (range.end - range.begin) as usize,
                    name: name.clone(),
                });
            }
        }
    }
    Ok(SymbolTable::new(found))
}
