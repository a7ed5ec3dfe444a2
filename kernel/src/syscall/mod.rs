//! System call handling module.
//!
//! Loaded programs reach the kernel through `int 0x80` (see [`entry`]).
//! Each call is looked up in a fixed 256-slot table; unregistered numbers
//! return [`SYSCALL_FAILURE`] to the program and are otherwise harmless.
//!
//! # Calling Convention
//!
//! | Register | Meaning |
//! |----------|---------|
//! | `rax` | syscall number / return value |
//! | `rdi`, `rsi`, `rdx`, `r10`, `r8`, `r9` | arguments 1-6 |

pub mod entry;
pub mod handlers;

use core::fmt;
use log::{debug, warn};

use crate::config::MAX_SYSCALLS;
use crate::exec::{ExecContext, ExecSlot};

/// Value returned to a program for a failed or unknown syscall.
pub const SYSCALL_FAILURE: i64 = -1;

/// System call numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum SyscallNumber {
    /// Terminate the calling program.
    Exit = 1,
    /// Read from a file descriptor.
    Read = 3,
    /// Write to a file descriptor.
    Write = 4,
    /// Get the calling process's ID.
    GetPid = 20,
}

impl SyscallNumber {
    /// Convert from a raw number.
    pub fn from_u64(nr: u64) -> Option<Self> {
        match nr {
            1 => Some(Self::Exit),
            3 => Some(Self::Read),
            4 => Some(Self::Write),
            20 => Some(Self::GetPid),
            _ => None,
        }
    }
}

/// Register-passed syscall arguments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyscallArgs {
    /// First argument (`rdi`).
    pub arg1: i64,
    /// Second argument (`rsi`).
    pub arg2: i64,
    /// Third argument (`rdx`).
    pub arg3: i64,
    /// Fourth argument (`r10`).
    pub arg4: i64,
    /// Fifth argument (`r8`).
    pub arg5: i64,
    /// Sixth argument (`r9`).
    pub arg6: i64,
}

impl SyscallArgs {
    /// Arguments with the first three set and the rest zero.
    pub fn new(arg1: i64, arg2: i64, arg3: i64) -> Self {
        Self {
            arg1,
            arg2,
            arg3,
            ..Self::default()
        }
    }
}

/// Syscall handler function.
pub type SyscallHandler = fn(&mut ExecContext, &SyscallArgs) -> i64;

/// One slot of the syscall table.
#[derive(Clone, Copy)]
pub struct SyscallEntry {
    /// Function invoked for this number.
    pub handler: SyscallHandler,
    /// Name used in diagnostics.
    pub name: &'static str,
    /// Number of meaningful arguments.
    pub arg_count: u8,
}

impl fmt::Debug for SyscallEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyscallEntry")
            .field("name", &self.name)
            .field("arg_count", &self.arg_count)
            .finish()
    }
}

impl SyscallEntry {
    const INVALID: SyscallEntry = SyscallEntry {
        handler: handlers::sys_invalid,
        name: "invalid",
        arg_count: 0,
    };

    /// Whether a real handler is installed.
    pub fn is_registered(&self) -> bool {
        self.handler as usize != handlers::sys_invalid as usize
    }
}

/// Syscall registration errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
    /// Number is not below the table size.
    OutOfRange(u64),
}

impl fmt::Display for RegisterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterError::OutOfRange(nr) => {
                write!(f, "syscall number {} out of range (max {})", nr, MAX_SYSCALLS - 1)
            }
        }
    }
}

/// Fixed-size syscall table.
pub struct SyscallTable {
    entries: [SyscallEntry; MAX_SYSCALLS],
    registered: usize,
}

impl Default for SyscallTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SyscallTable {
    /// Table with every slot set to the `invalid` handler.
    pub fn new() -> Self {
        Self {
            entries: [SyscallEntry::INVALID; MAX_SYSCALLS],
            registered: 0,
        }
    }

    /// Table with the built-in syscalls installed.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        handlers::register_builtins(&mut table);
        table
    }

    /// Install `handler` at `number`, replacing whatever was there.
    pub fn register(
        &mut self,
        number: u64,
        handler: SyscallHandler,
        name: &'static str,
        arg_count: u8,
    ) -> Result<(), RegisterError> {
        let slot = usize::try_from(number)
            .ok()
            .and_then(|index| self.entries.get_mut(index))
            .ok_or_else(|| {
                warn!("[SYSCALL] cannot register '{}': number {} out of range", name, number);
                RegisterError::OutOfRange(number)
            })?;

        let was_registered = slot.is_registered();
        *slot = SyscallEntry {
            handler,
            name,
            arg_count,
        };
        match (was_registered, slot.is_registered()) {
            (false, true) => self.registered += 1,
            (true, false) => self.registered -= 1,
            _ => {}
        }
        debug!("[SYSCALL] registered {} ({}) with {} args", name, number, arg_count);
        Ok(())
    }

    /// Entry for `number`, if it is inside the table.
    pub fn info(&self, number: u64) -> Option<&SyscallEntry> {
        usize::try_from(number).ok().and_then(|index| self.entries.get(index))
    }

    /// Number of slots holding a real handler.
    pub fn registered(&self) -> usize {
        self.registered
    }
}

impl ExecContext {
    /// Run syscall `number` against this context.
    pub fn dispatch(&mut self, number: u64, args: &SyscallArgs) -> i64 {
        let Some(entry) = self.syscalls.info(number).copied() else {
            warn!("[SYSCALL] invalid syscall number {}", number);
            return SYSCALL_FAILURE;
        };

        #[cfg(feature = "trace-syscalls")]
        debug!(
            "[SYSCALL] {}({}) args=({:#x}, {:#x}, {:#x}) pid={}",
            entry.name,
            number,
            args.arg1,
            args.arg2,
            args.arg3,
            self.processes.current_pid()
        );

        let result = (entry.handler)(self, args);

        #[cfg(feature = "trace-syscalls")]
        debug!("[SYSCALL] {} -> {}", entry.name, result);

        result
    }
}

/// Lock `slot` and run syscall `number`.
pub fn dispatch(slot: &ExecSlot, number: u64, args: &SyscallArgs) -> i64 {
    slot.lock().dispatch(number, args)
}
