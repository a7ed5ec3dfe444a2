//! x86_64 relocation arithmetic.
//!
//! `S` is the symbol's runtime address, `A` the addend and `P` the runtime
//! address of the patched bytes. Arithmetic wraps like the hardware does;
//! only the final value is range checked.

use core::fmt;

/// Relocation type: direct 64-bit, `S + A`
pub const R_X86_64_64: u32 = 1;

/// Relocation type: PC-relative 32-bit signed, `S + A - P`
pub const R_X86_64_PC32: u32 = 2;

/// Relocation type: PLT-relative 32-bit (not supported)
pub const R_X86_64_PLT32: u32 = 4;

/// Relocation type: direct 32-bit zero-extended, `S + A`
pub const R_X86_64_32: u32 = 10;

/// Relocation type: direct 32-bit sign-extended, `S + A`
pub const R_X86_64_32S: u32 = 11;

/// Relocation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationError {
    /// Relocation type this loader does not implement
    Unsupported(u32),
    /// Computed value does not fit the patched field
    Overflow {
        /// Relocation type
        kind: u32,
        /// Value that did not fit
        value: i64,
    },
    /// Patch would fall outside its target section
    OutOfBounds {
        /// Offset within the target section
        offset: u64,
    },
}

impl fmt::Display for RelocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported(kind) => write!(f, "unsupported relocation type {}", kind),
            Self::Overflow { kind, value } => {
                write!(f, "relocation type {} overflow (value {:#x})", kind, value)
            }
            Self::OutOfBounds { offset } => {
                write!(f, "relocation at offset {:#x} outside its section", offset)
            }
        }
    }
}

/// Value to store at a relocation site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Patch {
    /// 8 bytes, little endian
    Quad(u64),
    /// 4 bytes, little endian
    Word(u32),
}

impl Patch {
    /// Number of bytes written.
    pub fn width(&self) -> usize {
        match self {
            Patch::Quad(_) => 8,
            Patch::Word(_) => 4,
        }
    }
}

/// Whether [`resolve`] implements relocation type `kind`.
pub fn is_supported(kind: u32) -> bool {
    matches!(kind, R_X86_64_64 | R_X86_64_PC32 | R_X86_64_32 | R_X86_64_32S)
}

/// Compute the value for one relocation.
pub fn resolve(kind: u32, symbol: u64, addend: i64, place: u64) -> Result<Patch, RelocationError> {
    let target = symbol.wrapping_add(addend as u64);
    match kind {
        R_X86_64_64 => Ok(Patch::Quad(target)),
        R_X86_64_PC32 => {
            let value = target.wrapping_sub(place) as i64;
            i32::try_from(value)
                .map(|v| Patch::Word(v as u32))
                .map_err(|_| RelocationError::Overflow { kind, value })
        }
        R_X86_64_32 => u32::try_from(target)
            .map(Patch::Word)
            .map_err(|_| RelocationError::Overflow {
                kind,
                value: target as i64,
            }),
        R_X86_64_32S => {
            let value = target as i64;
            i32::try_from(value)
                .map(|v| Patch::Word(v as u32))
                .map_err(|_| RelocationError::Overflow { kind, value })
        }
        other => Err(RelocationError::Unsupported(other)),
    }
}

/// Store `patch` at `offset` within `section`.
pub fn apply(section: &mut [u8], offset: u64, patch: Patch) -> Result<(), RelocationError> {
    let start = usize::try_from(offset).map_err(|_| RelocationError::OutOfBounds { offset })?;
    let end = start
        .checked_add(patch.width())
        .filter(|&end| end <= section.len())
        .ok_or(RelocationError::OutOfBounds { offset })?;
    match patch {
        Patch::Quad(v) => section[start..end].copy_from_slice(&v.to_le_bytes()),
        Patch::Word(v) => section[start..end].copy_from_slice(&v.to_le_bytes()),
    }
    Ok(())
}
