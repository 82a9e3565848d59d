//! A teletype (TTY) interface for character-based I/O.
//!
//! This module provides a trait [`Teletype`] that defines an interface for
//! reading from and writing to a teletype device, such as a serial port.
//! The [`Serial`] struct implements this interface over COM1. On top of it:
//! - [`TtyWriter`] adapts a teletype into a [`core::fmt::Write`] sink.
//! - [`read_line`] collects one command line with backspace handling and
//!   reports lines that do not fit.

use crate::KernelError;
use arrayvec::ArrayVec;

/// Longest command line, in bytes. Longer lines are rejected whole.
pub const CMDBUF_SIZE: usize = 80;

/// The `Teletype` trait represents a generic character-based input/output
/// device.
///
/// Implementations of this trait define methods for:
/// - Writing data to the teletype (`write`)
/// - Reading data from the teletype (`read`)
///
/// A read returns at most one line: it stops after the first newline, so
/// nothing typed after it is consumed. A read of zero bytes means the input
/// has ended.
pub trait Teletype {
    /// Writes data to the teletype.
    ///
    /// # Returns
    /// - `Ok(usize)`: The number of bytes successfully written.
    /// - `Err(KernelError)`: If the write operation failed.
    fn write(&mut self, data: &[u8]) -> Result<usize, KernelError>;

    /// Reads data from the teletype.
    ///
    /// # Returns
    /// - `Ok(usize)`: The number of bytes successfully read.
    /// - `Err(KernelError)`: If the read operation failed.
    fn read(&mut self, data: &mut [u8]) -> Result<usize, KernelError>;
}

impl<T: Teletype + ?Sized> Teletype for &mut T {
    fn write(&mut self, data: &[u8]) -> Result<usize, KernelError> {
        (**self).write(data)
    }

    fn read(&mut self, data: &mut [u8]) -> Result<usize, KernelError> {
        (**self).read(data)
    }
}

/// A serial teletype interface over the **COM1** serial port.
///
/// Output goes through the kernel console, so it shares the console lock
/// with `println!`. Input is only available on bare metal; elsewhere every
/// read fails with [`KernelError::IOError`].
pub struct Serial {
    _p: (),
}

impl Serial {
    /// Creates a new **COM1** serial interface instance.
    pub const fn new() -> Self {
        Self { _p: () }
    }
}

impl Default for Serial {
    fn default() -> Self {
        Self::new()
    }
}

impl Teletype for Serial {
    /// Writes data to the serial teletype (COM1).
    ///
    /// Fails with [`KernelError::InvalidArgument`] if `data` is not UTF-8.
    fn write(&mut self, data: &[u8]) -> Result<usize, KernelError> {
        let s = core::str::from_utf8(data).map_err(|_| KernelError::InvalidArgument)?;
        print!("{s}");
        Ok(data.len())
    }

    /// Reads data from the serial teletype (COM1).
    ///
    /// The port echoes what is typed and applies DEL itself.
    fn read(&mut self, data: &mut [u8]) -> Result<usize, KernelError> {
        #[cfg(all(target_arch = "x86_64", target_os = "none"))]
        {
            abyss::dev::serial::read_bytes_busywait(data).ok_or(KernelError::IOError)
        }
        #[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
        {
            let _ = data;
            Err(KernelError::IOError)
        }
    }
}

/// [`core::fmt::Write`] over a [`Teletype`].
///
/// `write!` only reports that a write failed; the failure itself is kept in
/// [`TtyWriter::error`].
pub struct TtyWriter<'a, T: Teletype + ?Sized> {
    tty: &'a mut T,
    error: Option<KernelError>,
}

impl<'a, T: Teletype + ?Sized> TtyWriter<'a, T> {
    /// Writes formatted text to `tty`.
    pub fn new(tty: &'a mut T) -> Self {
        Self { tty, error: None }
    }

    /// The first error the teletype reported, if any.
    pub fn error(&self) -> Option<KernelError> {
        self.error
    }

    /// Writes all of `data`, retrying short writes.
    pub fn write_all(&mut self, mut data: &[u8]) -> Result<(), KernelError> {
        while !data.is_empty() {
            match self.tty.write(data)? {
                0 => return Err(KernelError::IOError),
                n => data = &data[n.min(data.len())..],
            }
        }
        Ok(())
    }
}

impl<T: Teletype + ?Sized> core::fmt::Write for TtyWriter<'_, T> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.write_all(s.as_bytes()).map_err(|e| {
            self.error.get_or_insert(e);
            core::fmt::Error
        })
    }
}

/// Outcome of [`read_line`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    /// A whole line is in the buffer.
    Complete,
    /// The line did not fit in [`CMDBUF_SIZE`] bytes. The buffer holds its
    /// beginning and must not be used as a command.
    TooLong,
    /// The input ended before anything was read.
    End,
}

/// Reads one line from `tty` into `line`, without the line terminator.
///
/// Backspace (`0x08`) and DEL (`0x7f`) erase the previous byte. A line
/// longer than [`CMDBUF_SIZE`] is consumed up to its end and reported as
/// [`Line::TooLong`]; erasing bytes afterwards does not make it fit again.
pub fn read_line<T>(tty: &mut T, line: &mut ArrayVec<u8, CMDBUF_SIZE>) -> Result<Line, KernelError>
where
    T: Teletype + ?Sized,
{
    line.clear();
    let mut chunk = [0u8; CMDBUF_SIZE];
    let mut seen = false;
    let mut overflowed = false;
    let outcome = |too_long: bool| if too_long { Line::TooLong } else { Line::Complete };
    loop {
        let n = tty.read(&mut chunk)?;
        if n == 0 {
            return Ok(if seen { outcome(overflowed) } else { Line::End });
        }
        seen = true;
        for &byte in &chunk[..n.min(CMDBUF_SIZE)] {
            match byte {
                b'\n' | b'\r' => return Ok(outcome(overflowed)),
                0x08 | 0x7f => {
                    line.pop();
                }
                _ => overflowed |= line.try_push(byte).is_err(),
            }
        }
    }
}
