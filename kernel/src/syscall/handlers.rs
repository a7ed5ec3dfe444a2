//! System call handlers.
//!
//! Each handler receives the execution context and the raw register
//! arguments. Pointers passed by a program are used as-is: programs share
//! the kernel's address space and privilege level.

use log::{error, info, warn};

use super::{SyscallArgs, SyscallNumber, SyscallTable, SYSCALL_FAILURE};
use crate::exec::ExecContext;

/// File descriptor routed to the console.
const STDOUT: i64 = 1;

/// Install `exit`, `read`, `write` and `getpid`.
pub fn register_builtins(table: &mut SyscallTable) {
    let builtins: [(SyscallNumber, super::SyscallHandler, &'static str, u8); 4] = [
        (SyscallNumber::Exit, sys_exit, "exit", 1),
        (SyscallNumber::Read, sys_read, "read", 3),
        (SyscallNumber::Write, sys_write, "write", 3),
        (SyscallNumber::GetPid, sys_getpid, "getpid", 0),
    ];
    for (number, handler, name, arg_count) in builtins {
        if let Err(err) = table.register(number as u64, handler, name, arg_count) {
            error!("[SYSCALL] cannot install built-in '{}': {}", name, err);
        }
    }
}

/// Default handler for unregistered numbers.
pub(super) fn sys_invalid(_ctx: &mut ExecContext, _args: &SyscallArgs) -> i64 {
    SYSCALL_FAILURE
}

/// `exit(status)`: end the current process.
///
/// The program keeps running until its entry function returns; the
/// orchestrator sees the exit flags afterwards and reports `status`.
fn sys_exit(ctx: &mut ExecContext, args: &SyscallArgs) -> i64 {
    let status = args.arg1;
    match ctx.processes.current().map(|pcb| pcb.pid) {
        Some(pid) => {
            ctx.processes.exit_and_restore_parent(pid, status);
            ctx.exit.request(status);
            info!("[SYSCALL] exit: pid {} status {}", pid, status);
        }
        None => warn!("[SYSCALL] exit({}) called from kernel context", status),
    }
    status
}

/// `read(fd, buf, count)`: no input source exists yet, so nothing is read.
fn sys_read(_ctx: &mut ExecContext, _args: &SyscallArgs) -> i64 {
    0
}

/// `write(fd, buf, count)`: copy bytes to the console.
///
/// Only stdout is supported. Output stops early at a NUL byte, but the
/// full `count` is reported as written.
fn sys_write(ctx: &mut ExecContext, args: &SyscallArgs) -> i64 {
    let fd = args.arg1;
    let buf = args.arg2 as usize as *const u8;
    let count = args.arg3;

    if fd != STDOUT {
        return SYSCALL_FAILURE;
    }
    if count <= 0 {
        return 0;
    }
    if buf.is_null() {
        return SYSCALL_FAILURE;
    }

    // SAFETY: programs run in the kernel's address space and hand us a
    // pointer to `count` bytes of their own memory.
    let bytes = unsafe { core::slice::from_raw_parts(buf, count as usize) };
    for &byte in bytes.iter().take_while(|&&b| b != 0) {
        ctx.console.put_byte(byte);
    }
    count
}

/// `getpid()`: the current process's ID, or 0 in kernel context.
fn sys_getpid(ctx: &mut ExecContext, _args: &SyscallArgs) -> i64 {
    i64::from(ctx.processes.current_pid().as_u32())
}
