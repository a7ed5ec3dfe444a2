//! Program execution.
//!
//! Ties the loader, the process table and the syscall table together.
//! A program runs as one synchronous call from [`execute`]; it ends either
//! by returning from its entry function or by calling `exit`, which only
//! records the request. The request is honored once the call unwinds.
//!
//! All mutable engine state lives in an [`ExecContext`] held by an
//! [`ExecSlot`]. The slot is unlocked while a program runs so that its
//! syscalls, and any programs it launches in turn, can take the lock.

pub mod launch;
pub mod run;

use alloc::boxed::Box;
use core::fmt;
use lazy_static::lazy_static;
use log::{debug, info};
use spin::Mutex;

pub use launch::{EntryLauncher, NativeLauncher};
pub use run::run_file;

use crate::arch;
use crate::console::Console;
use crate::loader::{LoadError, LoadedImage};
use crate::process::{ProcessError, ProcessId, ProcessTable};
use crate::syscall::SyscallTable;

/// Result reported to the shell when a program cannot be run.
pub const EXEC_FAILURE: i64 = -1;

/// Exit request left behind by the `exit` syscall.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitFlags {
    requested: bool,
    status: i64,
}

impl ExitFlags {
    /// Record an exit request.
    pub fn request(&mut self, status: i64) {
        self.requested = true;
        self.status = status;
    }

    /// Forget any pending request.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Status of the pending request, if any.
    pub fn requested(&self) -> Option<i64> {
        self.requested.then_some(self.status)
    }
}

/// Mutable state of the execution engine.
pub struct ExecContext {
    /// Process control blocks
    pub processes: ProcessTable,
    /// Installed syscalls
    pub syscalls: SyscallTable,
    /// Pending exit request
    pub exit: ExitFlags,
    /// Output of `write(1, ..)` and shell diagnostics
    pub console: Box<dyn Console + Send>,
}

impl ExecContext {
    /// Fresh context with the built-in syscalls installed.
    pub fn new(console: Box<dyn Console + Send>) -> Self {
        Self {
            processes: ProcessTable::new(),
            syscalls: SyscallTable::with_builtins(),
            exit: ExitFlags::default(),
            console,
        }
    }

    /// Write formatted text to the console.
    pub fn report(&mut self, args: fmt::Arguments<'_>) {
        // Console writes cannot fail.
        let _ = fmt::Write::write_fmt(&mut *self.console, args);
    }
}

/// The single place engine state lives.
pub type ExecSlot = Mutex<ExecContext>;

fn kernel_console() -> Box<dyn Console + Send> {
    #[cfg(all(feature = "serial-console", target_arch = "x86_64"))]
    {
        Box::new(crate::console::SerialConsole)
    }
    #[cfg(not(all(feature = "serial-console", target_arch = "x86_64")))]
    {
        Box::new(crate::console::NullConsole)
    }
}

lazy_static! {
    /// Engine state used by the `int 0x80` path and the shell.
    pub static ref KERNEL_EXEC: ExecSlot = Mutex::new(ExecContext::new(kernel_console()));
}

/// Why a program could not be run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecError {
    /// The image no longer owns any memory
    InvalidImage,
    /// Loading failed
    Load(LoadError),
    /// Every process slot has been used
    ProcessTableExhausted,
    /// No such path
    NotFound,
    /// Path names a directory
    NotAFile,
    /// File has no contents
    EmptyFile,
}

impl From<LoadError> for ExecError {
    fn from(err: LoadError) -> Self {
        ExecError::Load(err)
    }
}

impl From<ProcessError> for ExecError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::TableFull => ExecError::ProcessTableExhausted,
        }
    }
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::InvalidImage => write!(f, "image is not loaded"),
            ExecError::Load(err) => write!(f, "{}", err),
            ExecError::ProcessTableExhausted => write!(f, "no free process slot"),
            ExecError::NotFound => write!(f, "file not found"),
            ExecError::NotAFile => write!(f, "not a regular file"),
            ExecError::EmptyFile => write!(f, "file is empty"),
        }
    }
}

/// Run a loaded image to completion and return its exit status.
///
/// The status is the value passed to `exit` if the program called it,
/// otherwise the entry function's return value. Either way the image hands
/// its memory off to the finished program and no longer owns it.
///
/// If no process slot is free, the image is left untouched and still owns
/// its memory.
pub fn execute<L: EntryLauncher + ?Sized>(
    slot: &ExecSlot,
    image: &mut LoadedImage<'_>,
    name: &str,
    launcher: &mut L,
) -> Result<i64, ExecError> {
    let entry = image.entry_address().ok_or(ExecError::InvalidImage)?;

    let pid = {
        let mut ctx = slot.lock();
        let pid = ctx.processes.create(name, entry, image.region())?;
        ctx.processes.set_current(pid);
        ctx.exit.clear();
        pid
    };
    arch::enable_interrupts();
    debug!(
        "[EXEC] pid {} '{}' entering {:#x} (interrupts {})",
        pid,
        name,
        entry,
        if arch::interrupts_enabled() { "on" } else { "off" }
    );

    // SAFETY: `entry` points into the relocated runtime area of `image`,
    // which stays allocated for at least the duration of the call.
    let returned = unsafe { launcher.launch(entry) };

    let mut ctx = slot.lock();
    let status = match ctx.exit.requested() {
        Some(status) => {
            debug!(
                "[EXEC] pid {} called exit({}), entry returned {}",
                pid, status, returned
            );
            status
        }
        None => {
            let status = i64::from(returned);
            ctx.processes.exit_and_restore_parent(pid, status);
            status
        }
    };
    image.hand_off();
    ctx.exit.clear();
    ctx.processes.set_current(ProcessId::KERNEL);

    info!("[EXEC] '{}' (pid {}) finished with status {}", name, pid, status);
    Ok(status)
}
