//! Serial port driver for console and log output.
//!
//! This module provides serial output using the 16550 UART on COM1 and a
//! [`log::Log`] backend on top of it. Until [`init`] runs, all writes are
//! silently dropped, which keeps host-side unit tests free of port I/O.

use core::fmt;
use core::fmt::Write;
use log::{LevelFilter, Metadata, Record};
use spin::Mutex;
use uart_16550::SerialPort;

use crate::config::DEBUG_SERIAL_PORT;

/// Global serial port (COM1).
static SERIAL1: Mutex<Option<SerialPort>> = Mutex::new(None);

/// Initialize COM1.
///
/// Must only be called on bare metal, where port 0x3F8 is a 16550 UART.
pub fn init() {
    let mut port = unsafe { SerialPort::new(DEBUG_SERIAL_PORT) };
    port.init();
    *SERIAL1.lock() = Some(port);
}

/// Write a byte to COM1.
pub fn write_byte(byte: u8) {
    if let Some(ref mut serial) = *SERIAL1.lock() {
        serial.send(byte);
    }
}

/// Write a string to COM1.
pub fn write_str(s: &str) {
    for byte in s.bytes() {
        write_byte(byte);
    }
}

/// Serial writer for formatting.
pub struct SerialWriter;

impl fmt::Write for SerialWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        write_str(s);
        Ok(())
    }
}

/// Print macro for serial output.
#[macro_export]
macro_rules! serial_print {
    ($($arg:tt)*) => {
        $crate::serial::_print(format_args!($($arg)*));
    };
}

/// Println macro for serial output.
#[macro_export]
macro_rules! serial_println {
    () => ($crate::serial_print!("\n"));
    ($($arg:tt)*) => {
        $crate::serial_print!("{}\n", format_args!($($arg)*));
    };
}

/// Internal print function.
#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    // A formatting error here has nowhere better to be reported.
    let _ = SerialWriter.write_fmt(args);
}

/// `log` backend writing `[LEVEL] message` lines to COM1.
pub struct SerialLogger;

impl log::Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let prefix = match record.level() {
            log::Level::Trace => "[TRACE]",
            log::Level::Debug => "[DEBUG]",
            log::Level::Info => "[INFO ]",
            log::Level::Warn => "[WARN ]",
            log::Level::Error => "[ERROR]",
        };
        serial_println!("{} {}", prefix, record.args());
    }

    fn flush(&self) {}
}

static LOGGER: SerialLogger = SerialLogger;

/// Install the serial logger as the global `log` backend.
///
/// Returns `false` if another logger was installed first.
pub fn init_logger(level: LevelFilter) -> bool {
    match log::set_logger(&LOGGER) {
        Ok(()) => {
            log::set_max_level(level);
            true
        }
        Err(_) => false,
    }
}
