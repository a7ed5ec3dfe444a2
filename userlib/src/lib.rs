//! CLD Userspace Library
//!
//! Syscall wrappers for programs that the CLD kernel loads from
//! relocatable objects.
//!
//! # Architecture
//!
//! Programs share the kernel's address space and privilege level and
//! reach it through `int 0x80`. A program is a single object file whose
//! entry symbol is `_start` (or `main`) with the signature
//! `extern "C" fn() -> i32`.
//!
//! # Example
//!
//! ```rust,ignore
//! use userlib::{io, process};
//!
//! #[no_mangle]
//! pub extern "C" fn _start() -> i32 {
//!     io::println("Hello from ELF!");
//!     process::getpid() as i32
//! }
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod syscall;

#[cfg(target_arch = "x86_64")]
pub mod io;
#[cfg(target_arch = "x86_64")]
pub mod process;

/// Re-export commonly used items.
#[cfg(target_arch = "x86_64")]
pub mod prelude {
    pub use crate::io::{print, println};
    pub use crate::process::{exit, getpid};
    pub use crate::syscall::SyscallError;
}
