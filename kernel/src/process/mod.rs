//! Process Management
//!
//! Bookkeeping for programs launched by the execution engine.

pub mod context;
pub mod table;

pub use context::ExecutionContext;
pub use table::{ProcessControlBlock, ProcessError, ProcessId, ProcessState, ProcessTable};
