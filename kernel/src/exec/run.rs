//! The shell's `exec <path>` command.

use log::warn;

use super::{execute, EntryLauncher, ExecError, ExecSlot, EXEC_FAILURE};
use crate::loader::LoadedImage;
use crate::memory::ExecMemory;
use crate::vfs::{Node, ProgramSource};

/// Load the object file at `path` from `fs` and run it.
///
/// Returns the program's exit status, or [`EXEC_FAILURE`] after printing a
/// diagnostic to the console.
pub fn run_file<L: EntryLauncher + ?Sized>(
    slot: &ExecSlot,
    fs: &dyn ProgramSource,
    path: &str,
    memory: &dyn ExecMemory,
    launcher: &mut L,
) -> i64 {
    match try_run(slot, fs, path, memory, launcher) {
        Ok(status) => status,
        Err(err) => {
            warn!("[EXEC] {}: {}", path, err);
            slot.lock().report(format_args!("exec: {}: {}\n", path, err));
            EXEC_FAILURE
        }
    }
}

fn try_run<L: EntryLauncher + ?Sized>(
    slot: &ExecSlot,
    fs: &dyn ProgramSource,
    path: &str,
    memory: &dyn ExecMemory,
    launcher: &mut L,
) -> Result<i64, ExecError> {
    let bytes = match fs.lookup(path) {
        None => return Err(ExecError::NotFound),
        Some(Node::Directory) => return Err(ExecError::NotAFile),
        Some(Node::File(bytes)) if bytes.is_empty() => return Err(ExecError::EmptyFile),
        Some(Node::File(bytes)) => bytes,
    };

    let name = path.rsplit('/').next().unwrap_or(path);
    let mut image = LoadedImage::load(bytes, memory)?;
    execute(slot, &mut image, name, launcher)
}
