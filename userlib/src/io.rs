//! I/O functions for loaded programs.
//!
//! Only stdout is backed by the kernel; `read` always reports end of
//! input.

use crate::syscall::{syscall3, SyscallNumber, SyscallResult};

/// File descriptor for stdin.
pub const STDIN: u64 = 0;
/// File descriptor for stdout.
pub const STDOUT: u64 = 1;

/// Write bytes to a file descriptor.
///
/// The console stops printing at the first NUL byte.
pub fn write(fd: u64, buf: &[u8]) -> SyscallResult {
    // SAFETY: `buf` is valid for `buf.len()` bytes.
    unsafe {
        syscall3(
            SyscallNumber::Write,
            fd,
            buf.as_ptr() as u64,
            buf.len() as u64,
        )
    }
}

/// Read bytes from a file descriptor.
pub fn read(fd: u64, buf: &mut [u8]) -> SyscallResult {
    // SAFETY: `buf` is valid for `buf.len()` bytes.
    unsafe {
        syscall3(
            SyscallNumber::Read,
            fd,
            buf.as_mut_ptr() as u64,
            buf.len() as u64,
        )
    }
}

/// Print a string to stdout.
pub fn print(s: &str) {
    let _ = write(STDOUT, s.as_bytes());
}

/// Print a string to stdout with a newline.
pub fn println(s: &str) {
    print(s);
    print("\n");
}
