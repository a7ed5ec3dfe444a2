//! Kernel Unit Tests Module
//!
//! End-to-end scenarios for the execution engine plus shared fixtures.

pub(crate) mod object;

mod loader_tests;

use alloc::boxed::Box;
use alloc::vec;

use crate::console::BufferConsole;
use crate::exec::{EntryLauncher, ExecContext, ExecSlot};
use crate::memory::ExecHeap;

/// Executable-memory pool over a leaked buffer; each test gets its own.
pub(crate) fn test_heap(size: usize) -> &'static ExecHeap {
    let backing: &'static mut [u128] = Box::leak(vec![0u128; size / 16].into_boxed_slice());
    let heap: &'static ExecHeap = Box::leak(Box::new(ExecHeap::empty()));
    unsafe { heap.init(backing.as_mut_ptr() as *mut u8, backing.len() * 16) };
    heap
}

/// Execution slot whose console output can be inspected.
pub(crate) fn test_slot() -> (ExecSlot, BufferConsole) {
    let console = BufferConsole::new();
    let slot = ExecSlot::new(ExecContext::new(Box::new(console.clone())));
    (slot, console)
}

/// Launcher that runs a closure in place of the loaded code.
///
/// Host memory is not executable, so scenarios script what the program
/// does (syscalls, nested launches, its return value).
pub(crate) struct ScriptedLauncher<F>(F);

impl<F: FnMut(u64) -> i32> ScriptedLauncher<F> {
    pub(crate) fn new(script: F) -> Self {
        Self(script)
    }
}

impl<F: FnMut(u64) -> i32> EntryLauncher for ScriptedLauncher<F> {
    unsafe fn launch(&mut self, entry: u64) -> i32 {
        (self.0)(entry)
    }
}
