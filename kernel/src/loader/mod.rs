//! Relocatable Object Loader
//!
//! This module loads x86_64 relocatable ELF objects (`.o` files) into
//! executable memory and links them against themselves.
//!
//! # Supported Input
//!
//! - ELF64, little endian, `ET_REL`, `EM_X86_64`
//! - Allocatable `PROGBITS` and `NOBITS` sections
//! - `RELA` relocations of type `R_X86_64_64`, `PC32`, `32` and `32S`
//!
//! # Limitations
//!
//! - No external symbol resolution; undefined symbols keep their raw value
//! - No W^X: the loaded image is writable and executable at the same time

pub mod elf;
pub mod image;
pub mod reloc;

use core::fmt;

pub use elf::{Elf64Header, Elf64SectionHeader, FormatError, SectionFlags};
pub use image::{ImageRegion, LoadedImage};
pub use reloc::RelocationError;

/// Errors from [`LoadedImage::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadError {
    /// The file is not a loadable relocatable object
    Format(FormatError),
    /// Executable memory could not be allocated
    Allocation {
        /// Bytes requested
        size: usize,
    },
    /// A relocation could not be applied
    Relocation(RelocationError),
}

impl From<FormatError> for LoadError {
    fn from(err: FormatError) -> Self {
        LoadError::Format(err)
    }
}

impl From<RelocationError> for LoadError {
    fn from(err: RelocationError) -> Self {
        LoadError::Relocation(err)
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Format(err) => write!(f, "invalid object file: {}", err),
            LoadError::Allocation { size } => {
                write!(f, "cannot allocate {} bytes of executable memory", size)
            }
            LoadError::Relocation(err) => write!(f, "relocation failed: {}", err),
        }
    }
}
