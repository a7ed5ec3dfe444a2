//! Process Table
//!
//! Fixed-capacity registry of process control blocks. A "process" here is
//! a program running as a nested call on the kernel stack; the table only
//! does bookkeeping (ids, parent links, exit status).
//!
//! Slots become `Exited` when a process ends and are never returned to
//! `Unused`, so the table admits [`MAX_PROCESSES`] creations in total.

use alloc::string::String;
use core::fmt;
use log::{debug, info, warn};

use super::context::ExecutionContext;
use crate::config::{MAX_PROCESSES, PROCESS_NAME_LEN};
use crate::loader::ImageRegion;

/// Process ID type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ProcessId(pub u32);

impl ProcessId {
    /// The kernel itself (no process running)
    pub const KERNEL: ProcessId = ProcessId(0);

    /// Get the raw ID value
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Whether this is the kernel pseudo-process
    pub fn is_kernel(&self) -> bool {
        *self == Self::KERNEL
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessState {
    /// Slot is free
    #[default]
    Unused,
    /// Program is executing (somewhere on the call stack)
    Running,
    /// Program has finished; the slot is not reused
    Exited,
}

/// Process table errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessError {
    /// No `Unused` slot left
    TableFull,
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessError::TableFull => write!(f, "process table full ({} slots)", MAX_PROCESSES),
        }
    }
}

/// Process control block
#[derive(Debug, Clone, Default)]
pub struct ProcessControlBlock {
    /// Process ID
    pub pid: ProcessId,
    /// Lifecycle state
    pub state: ProcessState,
    /// Display name
    pub name: String,
    /// Absolute entry address
    pub entry_point: u64,
    /// Address execution returns to in the caller
    pub return_address: u64,
    /// Private stack (unused: programs run on the kernel stack)
    pub stack_pointer: Option<u64>,
    /// Exit status, valid once `Exited`
    pub exit_status: i64,
    /// Memory of the loaded image, kept for later cleanup
    pub image: Option<ImageRegion>,
    /// Process that was current when this one was created
    pub parent: ProcessId,
    /// Saved register state
    pub saved_context: ExecutionContext,
}

/// Truncate `name` to fit the fixed-size name field.
fn clamp_name(name: &str) -> String {
    let name = if name.is_empty() { "unknown" } else { name };
    let mut end = name.len().min(PROCESS_NAME_LEN - 1);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    String::from(&name[..end])
}

/// Process table
#[derive(Debug)]
pub struct ProcessTable {
    slots: [ProcessControlBlock; MAX_PROCESSES],
    next_pid: u32,
    current: ProcessId,
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| ProcessControlBlock::default()),
            next_pid: 1,
            current: ProcessId::KERNEL,
        }
    }

    /// Reset every slot to `Unused` and restart pid numbering
    pub fn init(&mut self) {
        *self = Self::new();
        info!("[PROCESS] process table initialized ({} slots)", MAX_PROCESSES);
    }

    /// Create a process in the first `Unused` slot.
    ///
    /// The new process's parent is whatever process is current.
    pub fn create(
        &mut self,
        name: &str,
        entry_point: u64,
        image: Option<ImageRegion>,
    ) -> Result<ProcessId, ProcessError> {
        let parent = self.current;
        let Some(slot) = self
            .slots
            .iter_mut()
            .find(|pcb| pcb.state == ProcessState::Unused)
        else {
            warn!("[PROCESS] cannot create '{}': table full", name);
            return Err(ProcessError::TableFull);
        };

        let pid = ProcessId(self.next_pid);
        self.next_pid += 1;

        *slot = ProcessControlBlock {
            pid,
            state: ProcessState::Running,
            name: clamp_name(name),
            entry_point,
            image,
            parent,
            ..ProcessControlBlock::default()
        };

        info!(
            "[PROCESS] created pid {} '{}' entry {:#x} parent {}",
            pid, slot.name, entry_point, parent
        );
        Ok(pid)
    }

    /// Mark `pid` exited with `status` and return control to the kernel.
    ///
    /// The image record is dropped without freeing the memory behind it.
    /// Unknown pids are reported and ignored.
    pub fn exit(&mut self, pid: ProcessId, status: i64) {
        let Some(pcb) = self.get_mut(pid) else {
            warn!("[PROCESS] exit: no process with pid {}", pid);
            return;
        };
        pcb.state = ProcessState::Exited;
        pcb.exit_status = status;
        if let Some(image) = pcb.image.take() {
            debug!(
                "[PROCESS] pid {} leaves {} bytes at {:#x} allocated",
                pid, image.size, image.base
            );
        }
        info!("[PROCESS] pid {} exited with status {}", pid, status);
        self.current = ProcessId::KERNEL;
    }

    /// [`ProcessTable::exit`], then make the exited process's parent current.
    pub fn exit_and_restore_parent(&mut self, pid: ProcessId, status: i64) {
        let parent = self.get(pid).map(|pcb| pcb.parent);
        self.exit(pid, status);
        if let Some(parent) = parent {
            self.current = parent;
            debug!("[PROCESS] current process restored to {}", parent);
        }
    }

    /// Look up a live (non-`Unused`) process
    pub fn get(&self, pid: ProcessId) -> Option<&ProcessControlBlock> {
        self.slots
            .iter()
            .find(|pcb| pcb.state != ProcessState::Unused && pcb.pid == pid)
    }

    /// Look up a live process mutably
    pub fn get_mut(&mut self, pid: ProcessId) -> Option<&mut ProcessControlBlock> {
        self.slots
            .iter_mut()
            .find(|pcb| pcb.state != ProcessState::Unused && pcb.pid == pid)
    }

    /// The running process, or `None` in kernel context
    pub fn current(&self) -> Option<&ProcessControlBlock> {
        if self.current.is_kernel() {
            None
        } else {
            self.get(self.current)
        }
    }

    /// ID of the running process (`KERNEL` when none)
    pub fn current_pid(&self) -> ProcessId {
        self.current
    }

    /// Make `pid` the running process
    pub fn set_current(&mut self, pid: ProcessId) {
        self.current = pid;
    }

    /// Store a register snapshot for `pid`
    pub fn save_context(&mut self, pid: ProcessId, context: ExecutionContext) -> bool {
        match self.get_mut(pid) {
            Some(pcb) => {
                pcb.saved_context = context;
                true
            }
            None => false,
        }
    }

    /// Fetch the snapshot stored for `pid`
    pub fn restore_context(&self, pid: ProcessId) -> Option<ExecutionContext> {
        self.get(pid).map(|pcb| pcb.saved_context)
    }

    /// Iterate over live processes in slot order
    pub fn iter(&self) -> impl Iterator<Item = &ProcessControlBlock> {
        self.slots
            .iter()
            .filter(|pcb| pcb.state != ProcessState::Unused)
    }

    /// Number of live (running or exited) processes
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Whether no process has been created
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
