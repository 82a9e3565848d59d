//! Frame-pointer backtraces with symbolized return addresses.
//!
//! Frames are produced innermost first by [`FrameChain`] and paired with
//! whatever the [`AddressResolver`] knows about their return address. Each
//! frame prints as two lines:
//!
//! ```text
//!   rbp ffffff000010fe40  rip ffffff0000100a3c  args 0000000000000001 ...
//!          kern/monitor.rs:42: kmon::monitor::Monitor::run+140
//! ```
use crate::{
    KernelError,
    symbols::{AddressResolver, SymbolInfo},
};
use abyss::unwind::{Frame, FrameChain, Peeker};
use core::fmt::{self, Write};

/// A frame and the symbol covering its return address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFrame {
    /// The activation record.
    pub frame: Frame,
    /// Symbol of [`Frame::return_address`], if known.
    pub symbol: Option<SymbolInfo>,
}

impl fmt::Display for ResolvedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Frame {
            base,
            return_address,
            args,
        } = &self.frame;
        write!(f, "  rbp {base:016x}  rip {return_address:016x}  args")?;
        for arg in args {
            match arg {
                Some(arg) => write!(f, " {arg:016x}")?,
                None => write!(f, " ????????????????")?,
            }
        }
        writeln!(f)?;

        let Some(symbol) = self.symbol.as_ref() else {
            return write!(f, "         <no symbol>");
        };
        match symbol.file.as_deref() {
            Some(file) => write!(f, "         {file}:")?,
            None => write!(f, "         ?:")?,
        }
        match symbol.line {
            Some(line) => write!(f, "{line}: ")?,
            None => write!(f, "?: ")?,
        }
        write!(
            f,
            "{}+{}",
            symbol.function,
            symbol.offset(*return_address)
        )
    }
}

/// Pairs every frame of `chain` with its symbol, innermost first.
///
/// Symbols are looked up afresh for each frame.
pub fn resolve<'a, P, R>(
    chain: FrameChain<P>,
    symbols: &'a R,
) -> impl Iterator<Item = ResolvedFrame> + 'a
where
    P: Peeker + 'a,
    R: AddressResolver + ?Sized,
{
    chain.map(move |frame| ResolvedFrame {
        symbol: symbols.resolve(frame.return_address),
        frame,
    })
}

/// Prints the backtrace of `chain` to `out`.
///
/// Returns the number of frames printed.
pub fn print<P, R>(
    chain: FrameChain<P>,
    symbols: &R,
    out: &mut dyn Write,
) -> Result<usize, KernelError>
where
    P: Peeker,
    R: AddressResolver + ?Sized,
{
    writeln!(out, "Stack backtrace:")?;
    let mut depth = 0;
    for frame in resolve(chain, symbols) {
        writeln!(out, "{frame}")?;
        depth += 1;
    }
    Ok(depth)
}
