//! Transferring control to loaded code.

/// Calls a program's entry point.
pub trait EntryLauncher {
    /// Call the code at `entry` and return what it returns.
    ///
    /// # Safety
    ///
    /// `entry` must be the address of a function with the signature
    /// `extern "C" fn() -> i32`, fully written before this call.
    unsafe fn launch(&mut self, entry: u64) -> i32;
}

/// Calls the entry point directly on the current stack.
///
/// This is the one place the kernel turns data into code.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeLauncher;

impl EntryLauncher for NativeLauncher {
    unsafe fn launch(&mut self, entry: u64) -> i32 {
        // SAFETY: the caller guarantees `entry` is a valid `extern "C"`
        // function taking no arguments and returning `i32`.
        let program: extern "C" fn() -> i32 =
            unsafe { core::mem::transmute(entry as usize as *const ()) };
        program()
    }
}
