//! The interactive kernel monitor.
//!
//! The monitor reads one line at a time from a [`Teletype`], splits it on
//! whitespace and runs the named [`Command`]:
//!
//! ```text
//! Welcome to the kernel monitor!
//! Type 'help' for a list of commands.
//! K> showmp 0x1000 0x3000
//! page 0x1000: PTE_P: 1, PTE_W: 1, PTE_U: 1
//! page 0x2000: not present
//! page 0x3000: PTE_P: 1, PTE_W: 1, PTE_U: 1
//! K>
//! ```
//!
//! A monitor is configured with [`MonitorBuilder`] and borrows what it
//! inspects for as long as it runs: the teletype, the page table, the symbol
//! resolver and a [`Peeker`] over memory.
//!
//! Malformed input never ends the session. A line longer than
//! [`CMDBUF_SIZE`] bytes is rejected whole and nothing runs. The loop stops when the input
//! ends, or when a command fails with a [`KernelError`], which
//! [`Monitor::run`] returns. Running out of memory for page tables is such a
//! failure.
mod commands;
mod kerninfo;

pub use commands::{Command, CommandTable};
pub use kerninfo::KernelLayout;

use crate::{
    KernelError,
    mm::page_table::PageTableWalker,
    symbols::AddressResolver,
    teletype::{CMDBUF_SIZE, Line, Teletype, TtyWriter, read_line},
};
use abyss::unwind::Peeker;
use arrayvec::ArrayVec;
use core::{fmt::Write, ops::Range};

/// Most tokens in one command line, the command name included.
pub const MAXARGS: usize = 16;

/// Characters separating tokens.
pub const WHITESPACE: [char; 4] = ['\t', '\r', '\n', ' '];

/// The line has more than [`MAXARGS`] tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TooManyArguments;

/// Splits `line` on [`WHITESPACE`].
pub fn tokenize(line: &str) -> Result<ArrayVec<&str, MAXARGS>, TooManyArguments> {
    let mut argv = ArrayVec::new();
    for token in line.split(WHITESPACE).filter(|token| !token.is_empty()) {
        argv.try_push(token).map_err(|_| TooManyArguments)?;
    }
    Ok(argv)
}

/// Registers saved when the kernel trapped into the monitor.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct TrapFrame {
    /// Instruction pointer.
    pub rip: usize,
    /// Stack pointer.
    pub rsp: usize,
    /// Frame base.
    pub rbp: usize,
    /// Flags register.
    pub rflags: usize,
    /// Code segment selector.
    pub cs: u16,
    /// Stack segment selector.
    pub ss: u16,
    /// Interrupt vector.
    pub vector: u8,
    /// Error code pushed by the CPU, or zero.
    pub error_code: usize,
}

impl core::fmt::Debug for TrapFrame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "TRAP frame (vector {:#x})\n\
             RIP: {:016x} | Error Code: {:#x} | RFLAGS: {:016x}\n\
             RSP: {:016x} | RBP: {:016x}\n\
             CS:  {:#x}   | SS: {:#x}",
            self.vector,
            self.rip,
            self.error_code,
            self.rflags,
            self.rsp,
            self.rbp,
            self.cs,
            self.ss,
        )
    }
}

fn banner(out: &mut dyn Write, trap_frame: Option<&TrapFrame>) -> core::fmt::Result {
    writeln!(out, "Welcome to the kernel monitor!")?;
    writeln!(out, "Type 'help' for a list of commands.")?;
    if let Some(frame) = trap_frame {
        writeln!(out, "{frame:?}")?;
    }
    Ok(())
}

/// What the commands work on.
pub(crate) struct MonitorContext<'a, P: Peeker> {
    pub(crate) walker: &'a mut dyn PageTableWalker,
    pub(crate) symbols: &'a dyn AddressResolver,
    pub(crate) memory: P,
    pub(crate) commands: CommandTable,
    pub(crate) layout: Option<KernelLayout>,
    pub(crate) stack: Option<Range<usize>>,
    pub(crate) start_frame: Option<usize>,
    pub(crate) read_only_probe: bool,
}

/// A builder for [`Monitor`].
///
/// ```text
/// let mut monitor = MonitorBuilder::new()
///     .stack(stack_bottom..stack_top)
///     .trap_frame(frame)
///     .build(&mut Serial::new(), &mut page_table, &debug_info, RawMemory);
/// monitor.run()?;
/// ```
pub struct MonitorBuilder {
    prompt: &'static str,
    layout: Option<KernelLayout>,
    stack: Option<Range<usize>>,
    start_frame: Option<usize>,
    read_only_probe: bool,
    trap_frame: Option<TrapFrame>,
}

impl Default for MonitorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorBuilder {
    /// Creates a builder with the default configuration.
    ///
    /// `showmp` allocates missing page tables unless the `read_only_probe`
    /// feature is enabled. On bare metal the kernel layout comes from the
    /// linker symbols.
    pub fn new() -> Self {
        Self {
            prompt: "K> ",
            #[cfg(target_os = "none")]
            layout: Some(KernelLayout::from_linker()),
            #[cfg(not(target_os = "none"))]
            layout: None,
            stack: None,
            start_frame: None,
            read_only_probe: cfg!(feature = "read_only_probe"),
            trap_frame: None,
        }
    }

    /// Sets the prompt printed before each line.
    pub fn prompt(mut self, prompt: &'static str) -> Self {
        self.prompt = prompt;
        self
    }

    /// Sets the kernel layout `kerninfo` prints.
    pub fn layout(mut self, layout: KernelLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Stops backtraces at frame bases outside `stack`.
    pub fn stack(mut self, stack: Range<usize>) -> Self {
        self.stack = Some(stack);
        self
    }

    /// Starts backtraces at frame base `rbp` instead of the live `rbp`.
    pub fn start_frame(mut self, rbp: usize) -> Self {
        self.start_frame = Some(rbp);
        self
    }

    /// Whether `showmp` leaves missing page tables alone.
    pub fn read_only_probe(mut self, read_only: bool) -> Self {
        self.read_only_probe = read_only;
        self
    }

    /// Prints `frame` on entry. Backtraces start from its `rbp` unless
    /// [`start_frame`](Self::start_frame) says otherwise.
    pub fn trap_frame(mut self, frame: TrapFrame) -> Self {
        self.trap_frame = Some(frame);
        self
    }

    /// Builds the monitor.
    pub fn build<'a, P: Peeker>(
        self,
        tty: &'a mut dyn Teletype,
        walker: &'a mut dyn PageTableWalker,
        symbols: &'a dyn AddressResolver,
        memory: P,
    ) -> Monitor<'a, P> {
        let start_frame = self
            .start_frame
            .or(self.trap_frame.as_ref().map(|frame| frame.rbp));
        Monitor {
            tty,
            prompt: self.prompt,
            trap_frame: self.trap_frame,
            cx: MonitorContext {
                walker,
                symbols,
                memory,
                commands: CommandTable::new(),
                layout: self.layout,
                stack: self.stack,
                start_frame,
                read_only_probe: self.read_only_probe,
            },
        }
    }
}

/// The kernel monitor.
pub struct Monitor<'a, P: Peeker> {
    tty: &'a mut dyn Teletype,
    prompt: &'static str,
    trap_frame: Option<TrapFrame>,
    cx: MonitorContext<'a, P>,
}

impl<P: Peeker> Monitor<'_, P> {
    /// Runs the read-eval loop until the input ends.
    ///
    /// Returns the first error a command or the teletype reported.
    pub fn run(&mut self) -> Result<(), KernelError> {
        info!("Entering the kernel monitor.");
        {
            let mut out = TtyWriter::new(&mut *self.tty);
            if banner(&mut out, self.trap_frame.as_ref()).is_err() {
                return Err(out.error().unwrap_or(KernelError::IOError));
            }
        }

        let mut line = ArrayVec::<u8, CMDBUF_SIZE>::new();
        loop {
            TtyWriter::new(&mut *self.tty).write_all(self.prompt.as_bytes())?;
            match read_line(&mut *self.tty, &mut line)? {
                Line::End => break,
                Line::TooLong => {
                    let mut out = TtyWriter::new(&mut *self.tty);
                    if writeln!(out, "Line too long (max {CMDBUF_SIZE})").is_err() {
                        return Err(out.error().unwrap_or(KernelError::IOError));
                    }
                    continue;
                }
                Line::Complete => {}
            }
            match core::str::from_utf8(&line) {
                Ok(line) => {
                    if let Err(e) = self.run_line(line) {
                        warning!("Leaving the kernel monitor: {e:?}");
                        return Err(e);
                    }
                }
                Err(_) => {
                    TtyWriter::new(&mut *self.tty).write_all(b"Input is not UTF-8\n")?;
                }
            }
        }
        info!("Leaving the kernel monitor.");
        Ok(())
    }

    /// Runs one command line.
    ///
    /// Empty lines, unknown commands and malformed arguments only print a
    /// message.
    pub fn run_line(&mut self, line: &str) -> Result<(), KernelError> {
        let Self { tty, cx, .. } = self;
        let mut out = TtyWriter::new(&mut **tty);
        let result = match tokenize(line) {
            Err(TooManyArguments) => writeln!(out, "Too many arguments (max {MAXARGS})")
                .map_err(KernelError::from),
            Ok(argv) => match argv.split_first() {
                None => Ok(()),
                Some((name, args)) => match cx.commands.lookup(name) {
                    Some(command) => command.run(args, cx, &mut out),
                    None => writeln!(out, "Unknown command '{name}'").map_err(KernelError::from),
                },
            },
        };
        result.map_err(|e| out.error().unwrap_or(e))
    }
}
