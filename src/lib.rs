//! # kmon: an in-kernel debugging monitor
//!
//! `kmon` is the interactive shell a kernel drops into when the developer
//! wants to look at the machine while it is running: walk the kernel stack,
//! read the protection bits of pages, flip one of them, and dump raw memory.
//! No separate debugger process is involved; every command runs in the
//! context of the kernel being inspected.
//!
//! ## Commands
//!
//! | command     | arguments                    | effect                                |
//! |-------------|------------------------------|---------------------------------------|
//! | `help`      |                              | list the commands                     |
//! | `kerninfo`  |                              | kernel image layout and footprint     |
//! | `backtrace` |                              | frame-pointer backtrace with symbols  |
//! | `showmp`    | `0xbegin 0xend`              | protection bits of each page in range |
//! | `setperm`   | `0xaddr 0\|1 P\|W\|U`        | set or clear one bit of one page      |
//! | `showvm`    | `0xaddr 0xcount`             | dump `count` machine words            |
//!
//! Numbers are written in hexadecimal with a `0x` prefix. Bad input prints a
//! usage line; it never ends the session.
//!
//! ## Structure
//!
//! - [`monitor`]: the read-eval loop, the tokenizer and the command table.
//! - [`backtrace`]: frames from [`abyss::unwind::FrameChain`] paired with
//!   symbols.
//! - [`symbols`]: address to function, file and line resolution, from a
//!   symbol table or the kernel's DWARF sections.
//! - [`mm`]: the page-table walker, the page inspector and the memory dumper.
//! - [`hex`]: the `0x` literal parser.
//! - [`teletype`]: the console the monitor talks through.
//!
//! ## Embedding
//!
//! ```text
//! let symbols = DebugInfo::load(kernel_image)?;
//! let mut page_table = unsafe { PageTable::current(DirectMap::new(alloc_frame)) };
//! MonitorBuilder::new()
//!     .build(&mut Serial::new(), &mut page_table, &symbols, RawMemory)
//!     .run()?;
//! ```
//!
//! Commands dereference whatever addresses the operator types. With
//! [`abyss::unwind::RawMemory`] a bad address faults the CPU, exactly like a
//! bad pointer in the kernel would. Use [`abyss::unwind::BoundedMemory`] to
//! restrict what `showvm` and `backtrace` may read.

#![no_std]
#![deny(missing_docs, rustdoc::broken_intra_doc_links)]

#[macro_use]
extern crate abyss;
extern crate alloc;

pub mod backtrace;
pub mod hex;
pub mod mm;
pub mod monitor;
pub mod symbols;
pub mod teletype;

pub use abyss::{addressing, debug, info, print, println, warning};

/// Enum representing errors that can occur during a monitor operation.
///
/// Malformed operator input is not an error: commands report it on the
/// console and succeed. A [`KernelError`] ends the monitor session.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum KernelError {
    /// The console failed.
    IOError,
    /// No memory for page tables.
    NoMemory,
    /// The page table has no entry for the address.
    BadAddress,
    /// Bytes the console cannot carry.
    InvalidArgument,
}

impl From<core::fmt::Error> for KernelError {
    fn from(_: core::fmt::Error) -> Self {
        KernelError::IOError
    }
}
