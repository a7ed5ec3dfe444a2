//! Console output sink.
//!
//! Loaded programs write to the console through the `write` syscall and the
//! shell reports `exec` diagnostics here. The kernel wires the serial port in;
//! tests and the shell's capture mode use [`BufferConsole`].

use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;

/// Byte-oriented text sink.
pub trait Console {
    /// Emit one byte.
    fn put_byte(&mut self, byte: u8);

    /// Emit every byte of `s`.
    fn write_str(&mut self, s: &str) {
        for byte in s.bytes() {
            self.put_byte(byte);
        }
    }
}

/// Console backed by the COM1 serial port.
#[cfg(target_arch = "x86_64")]
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialConsole;

#[cfg(target_arch = "x86_64")]
impl Console for SerialConsole {
    fn put_byte(&mut self, byte: u8) {
        crate::serial::write_byte(byte);
    }
}

/// Console that discards its output.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullConsole;

impl Console for NullConsole {
    fn put_byte(&mut self, _byte: u8) {}
}

/// Console that records everything written to it.
///
/// Clones share the same buffer, so one handle can be given to the kernel
/// while another is kept to inspect the output.
#[derive(Debug, Default, Clone)]
pub struct BufferConsole {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl BufferConsole {
    /// Create an empty recording console.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.bytes.lock().clone()
    }

    /// Everything written so far, lossily decoded as UTF-8.
    pub fn text(&self) -> alloc::string::String {
        alloc::string::String::from_utf8_lossy(&self.bytes.lock()).into_owned()
    }

    /// Discard recorded output.
    pub fn clear(&self) {
        self.bytes.lock().clear();
    }
}

impl Console for BufferConsole {
    fn put_byte(&mut self, byte: u8) {
        self.bytes.lock().push(byte);
    }
}

impl core::fmt::Write for dyn Console + Send {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        Console::write_str(self, s);
        Ok(())
    }
}
