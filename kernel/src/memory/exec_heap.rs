//! Executable Memory Allocation
//!
//! Loaded programs live in memory that is written by the loader and then
//! called into. All heap pages are executable in this kernel, so "executable
//! memory" is ordinary heap memory with a dedicated accounting boundary.
//!
//! # Implementations
//!
//! - [`ExecHeap`]: a dedicated pool managed by `linked_list_allocator`,
//!   which lets callers observe exactly how many bytes loaded images hold.
//! - [`KernelHeap`]: forwards to the global allocator.

use alloc::alloc::{alloc, dealloc, Layout};
use core::ptr::NonNull;
use linked_list_allocator::LockedHeap;

use crate::config::EXEC_ALLOC_ALIGN;

/// Source of memory for loaded program images.
pub trait ExecMemory {
    /// Allocate `size` bytes aligned to [`EXEC_ALLOC_ALIGN`].
    ///
    /// Returns `None` when the request cannot be satisfied.
    fn allocate(&self, size: usize) -> Option<NonNull<u8>>;

    /// Return a block obtained from [`ExecMemory::allocate`].
    ///
    /// # Safety
    ///
    /// `ptr` must come from `allocate` on this same instance with the same
    /// `size`, and must not be released twice.
    unsafe fn release(&self, ptr: NonNull<u8>, size: usize);
}

fn exec_layout(size: usize) -> Option<Layout> {
    Layout::from_size_align(size.max(1), EXEC_ALLOC_ALIGN).ok()
}

/// Dedicated executable-memory pool.
pub struct ExecHeap {
    heap: LockedHeap,
}

impl ExecHeap {
    /// Create a pool with no backing memory; every allocation fails until
    /// [`ExecHeap::init`] is called.
    pub const fn empty() -> Self {
        Self {
            heap: LockedHeap::empty(),
        }
    }

    /// Hand a memory region to the pool.
    ///
    /// # Safety
    ///
    /// `start..start + size` must be valid, writable, executable memory that
    /// is used for nothing else, and this must be called at most once.
    pub unsafe fn init(&self, start: *mut u8, size: usize) {
        // SAFETY: forwarded caller contract.
        unsafe {
            self.heap.lock().init(start, size);
        }
    }

    /// Bytes currently handed out.
    pub fn used(&self) -> usize {
        self.heap.lock().used()
    }

    /// Bytes still available.
    pub fn free(&self) -> usize {
        self.heap.lock().free()
    }

    /// Total pool size.
    pub fn size(&self) -> usize {
        self.heap.lock().size()
    }
}

impl ExecMemory for ExecHeap {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        let layout = exec_layout(size)?;
        self.heap.lock().allocate_first_fit(layout).ok()
    }

    unsafe fn release(&self, ptr: NonNull<u8>, size: usize) {
        if let Some(layout) = exec_layout(size) {
            // SAFETY: caller guarantees `ptr` came from `allocate(size)` here.
            unsafe {
                self.heap.lock().deallocate(ptr, layout);
            }
        }
    }
}

/// Executable memory taken from the kernel's global heap.
#[derive(Debug, Default, Clone, Copy)]
pub struct KernelHeap;

impl ExecMemory for KernelHeap {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        let layout = exec_layout(size)?;
        // SAFETY: layout has non-zero size.
        NonNull::new(unsafe { alloc(layout) })
    }

    unsafe fn release(&self, ptr: NonNull<u8>, size: usize) {
        if let Some(layout) = exec_layout(size) {
            // SAFETY: caller guarantees `ptr` came from `allocate(size)`.
            unsafe { dealloc(ptr.as_ptr(), layout) }
        }
    }
}
