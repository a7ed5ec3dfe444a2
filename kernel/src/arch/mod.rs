//! Architecture-specific code for x86_64.
//!
//! Privileged instructions are only issued on bare metal
//! (`target_os = "none"`). Hosted builds, which run the unit tests as an
//! ordinary process, get no-op stand-ins.

/// Enable interrupts.
///
/// Programs always start with interrupts on.
#[inline]
pub fn enable_interrupts() {
    #[cfg(all(target_arch = "x86_64", target_os = "none"))]
    x86_64::instructions::interrupts::enable();
}

/// Check if interrupts are enabled.
#[inline]
pub fn interrupts_enabled() -> bool {
    #[cfg(all(target_arch = "x86_64", target_os = "none"))]
    {
        x86_64::instructions::interrupts::are_enabled()
    }
    #[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
    {
        true
    }
}
