//! Memory for loaded programs.

pub mod exec_heap;

pub use exec_heap::{ExecHeap, ExecMemory, KernelHeap};

/// Global executable-memory pool.
///
/// Empty until the boot code donates a region with [`ExecHeap::init`].
pub static EXEC_HEAP: ExecHeap = ExecHeap::empty();
