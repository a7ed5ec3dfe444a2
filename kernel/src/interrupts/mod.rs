//! Interrupt handling subsystem.
//!
//! Owns the Interrupt Descriptor Table. The execution engine needs a
//! single gate: the `int 0x80` syscall vector. Exception and IRQ handlers
//! belong to the platform layer and are installed there.

use lazy_static::lazy_static;
use x86_64::structures::idt::InterruptDescriptorTable;

lazy_static! {
    /// The interrupt descriptor table.
    static ref IDT: InterruptDescriptorTable = {
        let mut idt = InterruptDescriptorTable::new();
        crate::syscall::entry::install(&mut idt);
        idt
    };
}

/// Load the IDT.
pub fn init() {
    IDT.load();
    log::info!("[INT] IDT loaded");
}
