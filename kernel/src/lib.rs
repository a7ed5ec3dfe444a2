//! CLD Kernel: program execution engine
//!
//! Loads relocatable x86_64 ELF objects, runs them as nested synchronous
//! calls and serves their `int 0x80` syscalls.
//!
//! # Layout
//!
//! - [`loader`]: object validation, section layout, relocation
//! - [`process`]: process control blocks
//! - [`syscall`]: syscall table, handlers and the interrupt entry
//! - [`exec`]: running an image and the shell's `exec` command
//! - [`memory`], [`console`], [`vfs`]: what the engine needs from the rest
//!   of the kernel
//!
//! The crate builds for bare metal and for the host; `cargo test` runs
//! every unit and scenario test as an ordinary process.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod arch;
pub mod config;
pub mod console;
pub mod exec;
pub mod loader;
pub mod memory;
pub mod process;
pub mod syscall;
pub mod vfs;

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub mod interrupts;
#[cfg(target_arch = "x86_64")]
pub mod serial;

#[cfg(test)]
mod tests;

/// Bring up the execution engine on bare metal.
///
/// Call once, after the kernel heap is ready.
///
/// # Safety
///
/// `exec_heap` must point to [`config::EXEC_HEAP_SIZE`] bytes of writable,
/// executable memory reserved for loaded programs.
#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub unsafe fn init(exec_heap: *mut u8) {
    serial::init();
    serial::init_logger(config::LOG_LEVEL);
    interrupts::init();

    // SAFETY: forwarded caller contract.
    unsafe { memory::EXEC_HEAP.init(exec_heap, config::EXEC_HEAP_SIZE) };
    exec::KERNEL_EXEC.lock().processes.init();

    log::info!(
        "[EXEC] engine ready: {} KB executable memory",
        memory::EXEC_HEAP.size() / 1024
    );
}
