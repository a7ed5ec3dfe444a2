//! Saved execution context
//!
//! Register snapshot attached to each process control block. Programs run
//! as nested calls on the kernel stack, so nothing populates this
//! automatically; it is storage for callers that want to record state.

/// CPU register context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct ExecutionContext {
    // General purpose registers
    /// RAX register
    pub rax: u64,
    /// RBX register
    pub rbx: u64,
    /// RCX register
    pub rcx: u64,
    /// RDX register
    pub rdx: u64,
    /// RSI register
    pub rsi: u64,
    /// RDI register
    pub rdi: u64,
    /// RBP register (frame pointer)
    pub rbp: u64,
    /// RSP register (stack pointer)
    pub rsp: u64,
    /// R8 register
    pub r8: u64,
    /// R9 register
    pub r9: u64,
    /// R10 register
    pub r10: u64,
    /// R11 register
    pub r11: u64,
    /// R12 register
    pub r12: u64,
    /// R13 register
    pub r13: u64,
    /// R14 register
    pub r14: u64,
    /// R15 register
    pub r15: u64,

    /// Instruction pointer
    pub rip: u64,
    /// RFLAGS register
    pub rflags: u64,
}

impl ExecutionContext {
    /// Context that would start execution at `entry`.
    pub fn at_entry(entry: u64) -> Self {
        Self {
            rip: entry,
            // IF set, reserved bit 1 set
            rflags: 0x202,
            ..Self::default()
        }
    }
}
