//! The monitor's commands.
use super::{MonitorContext, kerninfo};
use crate::{
    KernelError, backtrace,
    hex::parse_hex,
    mm::{
        dump::dump,
        inspect::{PermissionBit, inspect_range, set_bit},
    },
};
use abyss::unwind::{FrameChain, Peeker};
use core::fmt::Write;

/// One entry of the command table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `help`: list the commands.
    Help,
    /// `kerninfo`: print the kernel image layout.
    KernInfo,
    /// `backtrace`: walk the frame-pointer chain.
    Backtrace,
    /// `showmp begin end`: print the protection bits of a range of pages.
    ShowMappings,
    /// `setperm addr 0|1 P|W|U`: flip one protection bit of one page.
    SetPerm,
    /// `showvm addr count`: dump raw words.
    ShowVm,
}

impl Command {
    /// Every command, in the order `help` lists them.
    pub const ALL: [Command; 6] = [
        Command::Help,
        Command::KernInfo,
        Command::Backtrace,
        Command::ShowMappings,
        Command::SetPerm,
        Command::ShowVm,
    ];

    /// The name typed at the prompt.
    pub const fn name(self) -> &'static str {
        match self {
            Command::Help => "help",
            Command::KernInfo => "kerninfo",
            Command::Backtrace => "backtrace",
            Command::ShowMappings => "showmp",
            Command::SetPerm => "setperm",
            Command::ShowVm => "showvm",
        }
    }

    /// One-line description printed by `help`.
    pub const fn description(self) -> &'static str {
        match self {
            Command::Help => "Display this list of commands",
            Command::KernInfo => "Display information about the kernel",
            Command::Backtrace => "Display a backtrace of the kernel stack",
            Command::ShowMappings => "Display the permissions of a range of pages",
            Command::SetPerm => "Set or clear a permission bit of a page",
            Command::ShowVm => "Display words of virtual memory",
        }
    }

    /// Usage line printed on malformed arguments.
    pub const fn usage(self) -> &'static str {
        match self {
            Command::Help => "Usage: help",
            Command::KernInfo => "Usage: kerninfo",
            Command::Backtrace => "Usage: backtrace",
            Command::ShowMappings => "Usage: showmp 0xbegin_addr 0xend_addr",
            Command::SetPerm => "Usage: setperm 0xaddr [clear(0)|set(1)] [P|W|U]",
            Command::ShowVm => "Usage: showvm 0xaddr 0xn",
        }
    }

    /// Runs the command with `args`, the tokens after its name.
    pub(super) fn run<P: Peeker>(
        self,
        args: &[&str],
        cx: &mut MonitorContext<'_, P>,
        out: &mut dyn Write,
    ) -> Result<(), KernelError> {
        match self {
            Command::Help => help(cx, out),
            Command::KernInfo => kerninfo::print(cx.layout.as_ref(), out),
            Command::Backtrace => {
                let rbp = cx
                    .start_frame
                    .unwrap_or_else(abyss::x86_64::read_rbp);
                let mut chain = FrameChain::new(rbp, &cx.memory);
                if let Some(stack) = cx.stack.clone() {
                    chain = chain.with_bounds(stack);
                }
                backtrace::print(chain, cx.symbols, out).map(|_| ())
            }
            Command::ShowMappings => match args {
                [begin, end] => match (parse_hex(begin), parse_hex(end)) {
                    (Ok(begin), Ok(end)) => {
                        inspect_range(&mut *cx.walker, begin, end, !cx.read_only_probe, out)
                    }
                    _ => self.print_usage(out),
                },
                _ => self.print_usage(out),
            },
            Command::SetPerm => match args {
                [addr, value, bit] => {
                    let value = match *value {
                        "0" => Some(false),
                        "1" => Some(true),
                        _ => None,
                    };
                    match (parse_hex(addr), value, PermissionBit::from_name(bit)) {
                        (Ok(addr), Some(value), Some(bit)) => {
                            set_bit(&mut *cx.walker, addr, value, bit, out)
                        }
                        _ => self.print_usage(out),
                    }
                }
                _ => self.print_usage(out),
            },
            Command::ShowVm => match args {
                [addr, count] => match (parse_hex(addr), parse_hex(count)) {
                    (Ok(addr), Ok(count)) => dump(&cx.memory, addr, count, out),
                    _ => self.print_usage(out),
                },
                _ => self.print_usage(out),
            },
        }
    }

    fn print_usage(self, out: &mut dyn Write) -> Result<(), KernelError> {
        writeln!(out, "{}", self.usage())?;
        Ok(())
    }
}

fn help<P: Peeker>(cx: &MonitorContext<'_, P>, out: &mut dyn Write) -> Result<(), KernelError> {
    for command in cx.commands.iter() {
        writeln!(out, "{} - {}", command.name(), command.description())?;
    }
    Ok(())
}

/// Commands looked up by name.
#[derive(Debug, Clone)]
pub struct CommandTable {
    commands: [Command; 6],
}

impl CommandTable {
    /// The table of every [`Command`].
    pub const fn new() -> Self {
        Self {
            commands: Command::ALL,
        }
    }

    /// The command called `name`.
    pub fn lookup(&self, name: &str) -> Option<Command> {
        self.commands
            .iter()
            .copied()
            .find(|command| command.name() == name)
    }

    /// Iterates over the commands in table order.
    pub fn iter(&self) -> impl Iterator<Item = Command> + '_ {
        self.commands.iter().copied()
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}
