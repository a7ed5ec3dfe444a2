//! Raw system call interface.
//!
//! Programs enter the kernel with `int 0x80`: number in `rax`, arguments
//! in `rdi`, `rsi`, `rdx`, `r10`, `r8`, `r9`, result in `rax`. The kernel
//! preserves every other register.
//!
//! Programs run at ring 0, so the interrupt frame lands on the program's
//! own stack. The `asm!` blocks must not be marked `nostack`.

#[cfg(target_arch = "x86_64")]
use core::arch::asm;

/// System call numbers - must match the kernel's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum SyscallNumber {
    Exit = 1,
    Read = 3,
    Write = 4,
    GetPid = 20,
}

/// System call error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    /// The kernel rejected the call (bad descriptor, bad buffer, or an
    /// unknown syscall number).
    Failed,
    /// Any other negative return value.
    Unknown(i64),
}

impl SyscallError {
    /// Convert raw return value to error.
    pub fn from_raw(val: i64) -> Self {
        match val {
            -1 => Self::Failed,
            other => Self::Unknown(other),
        }
    }
}

/// Result type for system calls.
pub type SyscallResult = Result<u64, SyscallError>;

/// Convert raw syscall return value to Result.
#[inline]
pub fn convert_result(ret: i64) -> SyscallResult {
    if ret >= 0 {
        Ok(ret as u64)
    } else {
        Err(SyscallError::from_raw(ret))
    }
}

/// System call with no arguments.
///
/// # Safety
///
/// Must run inside the CLD kernel, which owns vector 0x80.
#[cfg(target_arch = "x86_64")]
#[inline]
pub unsafe fn syscall0(nr: SyscallNumber) -> SyscallResult {
    let ret: i64;
    // SAFETY: the kernel's gate clobbers nothing but rax.
    unsafe {
        asm!(
            "int 0x80",
            inout("rax") nr as u64 => ret,
        );
    }
    convert_result(ret)
}

/// System call with 1 argument.
///
/// # Safety
///
/// See [`syscall0`].
#[cfg(target_arch = "x86_64")]
#[inline]
pub unsafe fn syscall1(nr: SyscallNumber, arg1: u64) -> SyscallResult {
    let ret: i64;
    // SAFETY: see `syscall0`.
    unsafe {
        asm!(
            "int 0x80",
            inout("rax") nr as u64 => ret,
            in("rdi") arg1,
        );
    }
    convert_result(ret)
}

/// System call with 3 arguments.
///
/// # Safety
///
/// See [`syscall0`]. Pointer arguments must be valid for the call.
#[cfg(target_arch = "x86_64")]
#[inline]
pub unsafe fn syscall3(nr: SyscallNumber, arg1: u64, arg2: u64, arg3: u64) -> SyscallResult {
    let ret: i64;
    // SAFETY: see `syscall0`.
    unsafe {
        asm!(
            "int 0x80",
            inout("rax") nr as u64 => ret,
            in("rdi") arg1,
            in("rsi") arg2,
            in("rdx") arg3,
        );
    }
    convert_result(ret)
}
