mod common;

use abyss::unwind::{BoundedMemory, Frame, FrameChain, Peeker};
use common::FakeMemory;
use kmon::{
    backtrace,
    symbols::{NoSymbols, Symbol, SymbolTable},
};

fn symbols() -> SymbolTable {
    SymbolTable::new(vec![
        Symbol {
            start: 0x4000,
            size: 0x100,
            name: "kmon::monitor::Monitor::run".into(),
        },
        Symbol {
            start: 0x5000,
            size: 0x80,
            name: "kernel::main".into(),
        },
    ])
}

/// Three frames: two inside known functions, the outermost in unknown code.
fn stack() -> FakeMemory {
    let mut memory = FakeMemory::new();
    memory
        .frame(0x1000, 0x1100, 0x4010, [1, 2, 3, 4, 5])
        .frame(0x1100, 0x1200, 0x5020, [6, 7, 8, 9, 10])
        .frame(0x1200, 0, 0x9999, [0; 5]);
    memory
}

fn print(chain: FrameChain<&FakeMemory>, symbols: &SymbolTable) -> (usize, String) {
    let mut out = String::new();
    let depth = backtrace::print(chain, symbols, &mut out).unwrap();
    (depth, out)
}

#[test]
fn walks_every_frame_innermost_first() {
    let memory = stack();
    let frames = FrameChain::new(0x1000, &memory).collect::<Vec<_>>();
    assert_eq!(
        frames.iter().map(|frame| frame.base).collect::<Vec<_>>(),
        vec![0x1000, 0x1100, 0x1200]
    );
    assert_eq!(
        frames[0],
        Frame {
            base: 0x1000,
            return_address: 0x4010,
            args: [Some(1), Some(2), Some(3), Some(4), Some(5)],
        }
    );
    // The last frame's link is the zero sentinel.
    assert_eq!(memory.read::<usize>(0x1200), Some(0));
}

#[test]
fn prints_symbolized_frames() {
    let memory = stack();
    let (depth, out) = print(FrameChain::new(0x1000, &memory), &symbols());
    assert_eq!(depth, 3);
    assert_eq!(
        out,
        "Stack backtrace:\n\
         \x20 rbp 0000000000001000  rip 0000000000004010  args 0000000000000001 0000000000000002 0000000000000003 0000000000000004 0000000000000005\n\
         \x20        ?:?: kmon::monitor::Monitor::run+16\n\
         \x20 rbp 0000000000001100  rip 0000000000005020  args 0000000000000006 0000000000000007 0000000000000008 0000000000000009 000000000000000a\n\
         \x20        ?:?: kernel::main+32\n\
         \x20 rbp 0000000000001200  rip 0000000000009999  args 0000000000000000 0000000000000000 0000000000000000 0000000000000000 0000000000000000\n\
         \x20        <no symbol>\n"
    );
}

#[test]
fn unknown_symbols_do_not_stop_the_walk() {
    let memory = stack();
    let (depth, out) = print(FrameChain::new(0x1000, &memory), &SymbolTable::default());
    assert_eq!(depth, 3);
    assert_eq!(out.matches("<no symbol>").count(), 3);

    let frames = backtrace::resolve(FrameChain::new(0x1000, &memory), &NoSymbols).collect::<Vec<_>>();
    assert_eq!(frames.len(), 3);
    assert!(frames.iter().all(|frame| frame.symbol.is_none()));
}

#[test]
fn stops_at_a_link_that_does_not_climb() {
    let mut memory = FakeMemory::new();
    memory
        .frame(0x2000, 0x2100, 0x4000, [0; 5])
        // Points back to the first frame.
        .frame(0x2100, 0x2000, 0x4000, [0; 5]);
    let frames = FrameChain::new(0x2000, &memory).collect::<Vec<_>>();
    assert_eq!(frames.len(), 2);

    let mut memory = FakeMemory::new();
    memory.frame(0x2000, 0x2000, 0x4000, [0; 5]);
    assert_eq!(FrameChain::new(0x2000, &memory).count(), 1);
}

#[test]
fn honors_stack_bounds() {
    let memory = stack();
    let chain = FrameChain::new(0x1000, &memory).with_bounds(0x1000..0x1200);
    assert_eq!(chain.count(), 2);

    let chain = FrameChain::new(0x1000, &memory).with_bounds(0x2000..0x3000);
    assert_eq!(chain.count(), 0);
}

#[test]
fn unreadable_words() {
    // No return address: the frame cannot be reported.
    let mut memory = FakeMemory::new();
    memory.store(0x1000, &[0x1100]);
    assert_eq!(FrameChain::new(0x1000, &memory).count(), 0);

    // Missing argument words are reported as such.
    let mut memory = FakeMemory::new();
    memory.store(0x1000, &[0, 0x4000, 7]);
    let frames = FrameChain::new(0x1000, &memory).collect::<Vec<_>>();
    assert_eq!(frames[0].args, [Some(7), None, None, None, None]);
    let (_, out) = print(FrameChain::new(0x1000, &memory), &symbols());
    assert!(out.contains("args 0000000000000007 ???????????????? ????????????????"));
}

#[test]
fn empty_chain() {
    let memory = FakeMemory::new();
    let (depth, out) = print(FrameChain::new(0, &memory), &symbols());
    assert_eq!(depth, 0);
    assert_eq!(out, "Stack backtrace:\n");
}

/// Walks a chain laid out in a real buffer through `BoundedMemory`.
#[test]
fn bounded_memory_reads_inside_its_range() {
    let mut stack = [0usize; 32];
    let base = stack.as_ptr() as usize;
    let outer = base + 8 * std::mem::size_of::<usize>();
    stack[0] = outer;
    stack[1] = 0x4010;
    stack[8] = 0;
    stack[9] = 0x5020;
    let end = base + std::mem::size_of_val(&stack);
    let memory = BoundedMemory::new(base..end);
    let frames = FrameChain::new(base, &memory).collect::<Vec<_>>();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[1].base, outer);
    assert_eq!(frames[1].return_address, 0x5020);

    assert_eq!(memory.read::<usize>(end), None);
    assert_eq!(memory.read::<usize>(base - 8), None);
    std::hint::black_box(&mut stack);
}
