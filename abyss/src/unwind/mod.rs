// Copyright 2025 Computer Architecture and Systems Lab
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Frame-pointer stack walking.
//!
//! With frame pointers enabled every x86_64 activation record starts with the
//! caller's saved `rbp`, immediately followed by the return address pushed by
//! `call`:
//!
//! ```text
//!            +-----------------+
//!  rbp + 16  |  argument words |  (whatever the caller left there)
//!  rbp +  8  |  return address |
//!  rbp       |  caller's rbp   |  ---> next frame, 0 terminates
//!            +-----------------+
//! ```
//!
//! [`FrameChain`] follows those links lazily. Memory is read through a
//! [`Peeker`], so the same walker runs against the live stack
//! ([`RawMemory`]), a bounded view of it ([`BoundedMemory`]) or a synthetic
//! image in tests.

use core::ops::Range;

/// Size of a machine word in bytes.
pub const WORD: usize = core::mem::size_of::<usize>();

/// Number of argument words reported per frame.
pub const FRAME_ARGS: usize = 5;

/// Reads values out of some address space.
pub trait Peeker {
    /// Reads a `T` at `ofs`, or `None` if the address is known to be
    /// unreadable.
    fn read<T>(&self, ofs: usize) -> Option<T>
    where
        T: Copy;
}

impl<P: Peeker + ?Sized> Peeker for &P {
    fn read<T>(&self, ofs: usize) -> Option<T>
    where
        T: Copy,
    {
        (**self).read(ofs)
    }
}

/// The live address space of the running kernel.
///
/// Reads are never validated. An unmapped address faults the CPU, exactly as
/// a plain pointer dereference would.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawMemory;

impl Peeker for RawMemory {
    #[inline]
    fn read<T>(&self, ofs: usize) -> Option<T>
    where
        T: Copy,
    {
        Some(unsafe { core::ptr::read_volatile(ofs as *const T) })
    }
}

/// The live address space restricted to a single range.
#[derive(Clone, Debug)]
pub struct BoundedMemory {
    range: Range<usize>,
}

impl BoundedMemory {
    /// Allows reads that lie entirely inside `range`.
    pub fn new(range: Range<usize>) -> Self {
        Self { range }
    }
}

impl Peeker for BoundedMemory {
    fn read<T>(&self, ofs: usize) -> Option<T>
    where
        T: Copy,
    {
        let end = ofs.checked_add(core::mem::size_of::<T>())?;
        if ofs >= self.range.start && end <= self.range.end {
            RawMemory.read(ofs)
        } else {
            None
        }
    }
}

/// One activation record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Address of the frame base.
    pub base: usize,
    /// Instruction address the callee returns to.
    pub return_address: usize,
    /// The words following the return address. `None` if unreadable.
    pub args: [Option<usize>; FRAME_ARGS],
}

/// Lazy iterator over the frame-pointer chain.
///
/// The walk ends when the saved link reads as zero, when the next frame base
/// does not lie above the current one, when the base leaves the configured
/// stack bounds, or when the peeker cannot read the base or return-address
/// words. Restart by constructing a new chain.
pub struct FrameChain<P: Peeker> {
    memory: P,
    next: usize,
    bounds: Option<Range<usize>>,
}

impl<P: Peeker> FrameChain<P> {
    /// Walks the chain starting at frame base `rbp`.
    pub fn new(rbp: usize, memory: P) -> Self {
        Self {
            memory,
            next: rbp,
            bounds: None,
        }
    }

    /// Refuses to follow frame bases outside `bounds`.
    pub fn with_bounds(mut self, bounds: Range<usize>) -> Self {
        self.bounds = Some(bounds);
        self
    }

    fn word(&self, base: usize, index: usize) -> Option<usize> {
        self.memory.read::<usize>(base.checked_add(index * WORD)?)
    }
}

impl<P: Peeker> Iterator for FrameChain<P> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        let base = core::mem::take(&mut self.next);
        if base == 0 {
            return None;
        }
        if let Some(bounds) = self.bounds.as_ref() {
            if !bounds.contains(&base) {
                return None;
            }
        }

        let link = self.word(base, 0)?;
        let return_address = self.word(base, 1)?;
        let mut args = [None; FRAME_ARGS];
        for (i, arg) in args.iter_mut().enumerate() {
            *arg = self.word(base, 2 + i);
        }

        // The stack grows down, so every caller lives above its callee. A link
        // that does not climb is a cycle or garbage; stop after this frame.
        if link > base {
            self.next = link;
        }
        Some(Frame {
            base,
            return_address,
            args,
        })
    }
}

impl<P: Peeker> core::iter::FusedIterator for FrameChain<P> {}
