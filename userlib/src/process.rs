//! Process control for loaded programs.

use crate::syscall::{syscall0, syscall1, SyscallNumber};

/// Ask the kernel to end this program with `code`.
///
/// Exit is cooperative: the kernel records the request and this call
/// returns. The program must then return from its entry function, at
/// which point `code` is reported regardless of the value returned.
///
/// ```rust,ignore
/// #[no_mangle]
/// pub extern "C" fn _start() -> i32 {
///     userlib::process::exit(9)
/// }
/// ```
pub fn exit(code: i32) -> i32 {
    // SAFETY: exit takes no pointers.
    let _ = unsafe { syscall1(SyscallNumber::Exit, code as i64 as u64) };
    code
}

/// Get current process ID.
pub fn getpid() -> u64 {
    // SAFETY: getpid takes no arguments.
    unsafe { syscall0(SyscallNumber::GetPid).unwrap_or(0) }
}
