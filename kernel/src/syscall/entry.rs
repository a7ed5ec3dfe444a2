//! `int 0x80` entry point.
//!
//! The assembly stub saves the caller-saved registers, hands a pointer to
//! them to [`syscall_interrupt_dispatch`] and returns the result in `rax`.
//! Everything else a program had in its registers survives the call.
//!
//! Stack layout at the `call` (lowest address first):
//!
//! ```text
//! rax rdi rsi rdx r10 r8 r9 rcx r11 | rip cs rflags rsp ss
//! ```
//!
//! Nine pushes on top of the five-word interrupt frame leave the stack
//! 16-byte aligned.

use super::SyscallArgs;
use crate::exec::ExecSlot;

/// Registers saved by the entry stub.
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct SyscallFrame {
    /// Syscall number (`rax`)
    pub nr: u64,
    /// Argument 1
    pub rdi: u64,
    /// Argument 2
    pub rsi: u64,
    /// Argument 3
    pub rdx: u64,
    /// Argument 4
    pub r10: u64,
    /// Argument 5
    pub r8: u64,
    /// Argument 6
    pub r9: u64,
    /// Saved, not an argument
    pub rcx: u64,
    /// Saved, not an argument
    pub r11: u64,
}

impl SyscallFrame {
    /// Arguments in ABI order.
    pub fn args(&self) -> SyscallArgs {
        SyscallArgs {
            arg1: self.rdi as i64,
            arg2: self.rsi as i64,
            arg3: self.rdx as i64,
            arg4: self.r10 as i64,
            arg5: self.r8 as i64,
            arg6: self.r9 as i64,
        }
    }
}

/// Dispatch the syscall described by `frame` against `slot`.
pub fn dispatch_frame(slot: &ExecSlot, frame: &SyscallFrame) -> i64 {
    super::dispatch(slot, frame.nr, &frame.args())
}

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
core::arch::global_asm!(
    ".global syscall_interrupt_entry",
    "syscall_interrupt_entry:",
    "push r11",
    "push rcx",
    "push r9",
    "push r8",
    "push r10",
    "push rdx",
    "push rsi",
    "push rdi",
    "push rax",
    "cld",
    "mov rdi, rsp",
    "call syscall_interrupt_dispatch",
    // drop the saved rax; the result is already in rax
    "add rsp, 8",
    "pop rdi",
    "pop rsi",
    "pop rdx",
    "pop r10",
    "pop r8",
    "pop r9",
    "pop rcx",
    "pop r11",
    "iretq",
);

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
extern "C" {
    fn syscall_interrupt_entry();
}

/// Called by the assembly stub with the saved registers.
#[cfg(all(target_arch = "x86_64", target_os = "none"))]
#[no_mangle]
extern "C" fn syscall_interrupt_dispatch(frame: &SyscallFrame) -> i64 {
    dispatch_frame(&crate::exec::KERNEL_EXEC, frame)
}

/// Point the syscall vector of `idt` at the entry stub.
#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub fn install(idt: &mut x86_64::structures::idt::InterruptDescriptorTable) {
    use x86_64::VirtAddr;

    let handler = VirtAddr::new(syscall_interrupt_entry as usize as u64);
    // SAFETY: the stub is a complete interrupt handler ending in `iretq`.
    unsafe {
        idt[crate::config::SYSCALL_VECTOR].set_handler_addr(handler);
    }
    log::info!(
        "[SYSCALL] int {:#x} gate installed",
        crate::config::SYSCALL_VECTOR
    );
}
