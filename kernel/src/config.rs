//! Kernel configuration constants.
//!
//! This module contains compile-time configuration for the execution engine.
//! Values here affect table sizes, the syscall ABI and logging defaults.

/// Maximum number of process control blocks.
///
/// Slots are never reclaimed after a process exits, so this is also the
/// number of programs the kernel can launch over its lifetime.
pub const MAX_PROCESSES: usize = 32;

/// Size of a process name field, including the terminating NUL of the
/// on-disk representation. Names are truncated to `PROCESS_NAME_LEN - 1`.
pub const PROCESS_NAME_LEN: usize = 64;

/// Number of slots in the syscall table.
pub const MAX_SYSCALLS: usize = 256;

/// Interrupt vector carrying syscalls (`int 0x80`).
pub const SYSCALL_VECTOR: u8 = 0x80;

/// Symbol names accepted as program entry points, in lookup order.
pub const ENTRY_SYMBOLS: [&str; 2] = ["_start", "main"];

/// Alignment of every executable-memory allocation.
pub const EXEC_ALLOC_ALIGN: usize = 16;

/// Size of the dedicated executable-memory pool (4 MB).
pub const EXEC_HEAP_SIZE: usize = 4 * 1024 * 1024;

/// Serial port for debug output (COM1).
pub const DEBUG_SERIAL_PORT: u16 = 0x3F8;

/// Default log level for the serial logger.
pub const LOG_LEVEL: log::LevelFilter = if cfg!(debug_assertions) {
    log::LevelFilter::Debug
} else {
    log::LevelFilter::Info
};
