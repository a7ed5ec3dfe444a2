//! Loaded program images.
//!
//! A [`LoadedImage`] owns one block of executable memory laid out as:
//!
//! ```text
//! +---------------------+---------+-------------------------------------+
//! | copy of the file    | padding | runtime area: allocatable sections  |
//! +---------------------+---------+-------------------------------------+
//! ^ base                          ^ exec base (aligned to max alignment)
//! ```
//!
//! Sections are addressed through an offset table (`layout`) into the
//! runtime area rather than through raw pointers, and each allocatable
//! section's `sh_addr` is rewritten to its offset there.

use alloc::vec::Vec;
use core::ops::Range;
use core::ptr::NonNull;
use log::{debug, info, warn};

use super::elf::{self, Elf64Header, Elf64SectionHeader, Elf64Symbol, FormatError};
use super::elf::{SHN_UNDEF, SHT_RELA, SHT_SYMTAB};
use super::reloc;
use super::LoadError;
use crate::config::ENTRY_SYMBOLS;
use crate::memory::ExecMemory;

/// Base and size of an image's allocation, as recorded in a PCB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRegion {
    /// Start of the allocation
    pub base: u64,
    /// Allocation size in bytes
    pub size: usize,
}

/// One owned allocation from an [`ExecMemory`].
struct ExecRegion {
    ptr: NonNull<u8>,
    size: usize,
}

impl ExecRegion {
    fn addr(&self) -> u64 {
        self.ptr.as_ptr() as u64
    }

    fn as_slice(&self) -> &[u8] {
        // SAFETY: the region is a live allocation of `size` bytes, zeroed at
        // creation, and only reachable through its owning image.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.size) }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above; `&mut self` guarantees exclusive access.
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.size) }
    }
}

/// Where each allocatable section goes inside the runtime area.
struct LayoutPlan {
    ranges: Vec<Option<Range<usize>>>,
    footprint: usize,
    max_align: usize,
}

fn align_up(value: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    value.checked_add(align - 1).map(|v| v & !(align - 1))
}

/// Assign every allocatable section an offset in the runtime area.
///
/// The footprint includes the padding each alignment adds.
fn plan_layout(sections: &[Elf64SectionHeader], file_len: usize) -> Result<LayoutPlan, FormatError> {
    let mut ranges = Vec::with_capacity(sections.len());
    let mut cursor = 0usize;
    let mut max_align = 1usize;

    for section in sections {
        if !section.is_alloc() {
            ranges.push(None);
            continue;
        }
        if section.has_file_data() {
            section.file_range(file_len)?;
        }
        let align = section.alignment()?;
        let size = usize::try_from(section.sh_size).map_err(|_| FormatError::SectionOutOfBounds)?;
        let start = align_up(cursor, align).ok_or(FormatError::SectionOutOfBounds)?;
        let end = start.checked_add(size).ok_or(FormatError::SectionOutOfBounds)?;
        ranges.push(Some(start..end));
        cursor = end;
        max_align = max_align.max(align);
    }

    Ok(LayoutPlan {
        ranges,
        footprint: cursor,
        max_align,
    })
}

/// A relocated object in executable memory.
pub struct LoadedImage<'m> {
    memory: &'m dyn ExecMemory,
    region: Option<ExecRegion>,
    file_len: usize,
    exec_offset: usize,
    size: usize,
    entry: u64,
    header: Elf64Header,
    sections: Vec<Elf64SectionHeader>,
    layout: Vec<Option<Range<usize>>>,
    shstrtab: Option<Range<usize>>,
}

impl<'m> LoadedImage<'m> {
    /// Validate, lay out and relocate `bytes` in memory taken from `memory`.
    ///
    /// On failure nothing stays allocated.
    pub fn load(bytes: &[u8], memory: &'m dyn ExecMemory) -> Result<Self, LoadError> {
        let header = elf::validate(bytes)?;
        let sections = elf::section_headers(bytes, &header)?;
        let plan = plan_layout(&sections, bytes.len())?;

        let size = bytes
            .len()
            .checked_add(plan.footprint)
            .and_then(|n| n.checked_add(plan.max_align))
            .ok_or(LoadError::Allocation { size: usize::MAX })?;
        let ptr = memory.allocate(size).ok_or_else(|| {
            warn!("[ELF] failed to allocate {} bytes of executable memory", size);
            LoadError::Allocation { size }
        })?;
        // SAFETY: `ptr` is a fresh allocation of `size` bytes.
        unsafe { ptr.as_ptr().write_bytes(0, size) };

        let base = ptr.as_ptr() as usize;
        let exec_start = align_up(base + bytes.len(), plan.max_align)
            .ok_or(LoadError::Allocation { size })?;

        // From here on, returning early drops `image`, which releases the
        // allocation.
        let mut image = LoadedImage {
            memory,
            region: Some(ExecRegion { ptr, size }),
            file_len: bytes.len(),
            exec_offset: exec_start - base,
            size,
            entry: 0,
            header,
            sections,
            layout: plan.ranges,
            shstrtab: None,
        };

        image.place_sections(bytes)?;
        image.apply_relocations(bytes)?;
        image.entry = image.find_entry(bytes)?;

        info!(
            "[ELF] loaded {} sections: {} bytes at {:#x}, entry offset {:#x}",
            image.sections.len(),
            size,
            base,
            image.entry
        );
        Ok(image)
    }

    /// Copy the file and every allocatable section into the region.
    fn place_sections(&mut self, bytes: &[u8]) -> Result<(), LoadError> {
        let Some(region) = self.region.as_mut() else {
            return Ok(());
        };
        let memory = region.as_mut_slice();
        memory[..bytes.len()].copy_from_slice(bytes);

        let shstrndx = usize::from(self.header.e_shstrndx);
        if shstrndx > 0 && shstrndx < self.sections.len() {
            self.shstrtab = self.sections[shstrndx].file_range(bytes.len()).ok();
        }

        let runtime = &mut memory[self.exec_offset..];
        for (index, slot) in self.layout.iter().enumerate() {
            let Some(range) = slot.clone() else { continue };
            let section = &mut self.sections[index];
            if section.has_file_data() {
                let source = section.file_range(bytes.len())?;
                runtime[range.clone()].copy_from_slice(&bytes[source]);
            }
            // NOBITS sections are already zero.
            section.sh_addr = range.start as u64;

            #[cfg(feature = "trace-loader")]
            debug!(
                "[ELF] section {} -> offset {:#x} ({} bytes)",
                index,
                range.start,
                range.len()
            );
        }
        Ok(())
    }

    /// Runtime address of a symbol.
    ///
    /// Symbols defined in a section are relative to that section's runtime
    /// location; anything else (absolute or undefined) uses its raw value.
    fn symbol_address(&self, exec_base: u64, symbol: &Elf64Symbol) -> u64 {
        let shndx = symbol.st_shndx;
        let value = symbol.st_value;
        if shndx != SHN_UNDEF && usize::from(shndx) < self.sections.len() {
            let section_base = self.sections[usize::from(shndx)].sh_addr;
            return exec_base.wrapping_add(section_base).wrapping_add(value);
        }
        if shndx == SHN_UNDEF {
            warn!("[ELF] undefined symbol, using raw value {:#x}", value);
        }
        value
    }

    fn apply_relocations(&mut self, bytes: &[u8]) -> Result<(), LoadError> {
        let exec_base = match self.exec_base() {
            Some(base) => base,
            None => return Ok(()),
        };
        let count = self.sections.len();

        for index in 0..count {
            let rela_section = self.sections[index];
            if rela_section.sh_type != SHT_RELA {
                continue;
            }
            let target = rela_section.sh_info as usize;
            let symtab = rela_section.sh_link as usize;
            if target >= count || symtab >= count {
                return Err(FormatError::InvalidSectionIndex.into());
            }
            let entries = elf::relocations(bytes, &rela_section)?;
            if let Some(rela) = entries.iter().find(|rela| !reloc::is_supported(rela.kind())) {
                let err = reloc::RelocationError::Unsupported(rela.kind());
                warn!("[ELF] section {}: {}", target, err);
                return Err(err.into());
            }
            let Some(target_range) = self.layout[target].clone() else {
                debug!("[ELF] skipping relocations for non-allocated section {}", target);
                continue;
            };

            let symbols = elf::symbols(bytes, &self.sections[symtab])?;
            let target_addr = exec_base + target_range.start as u64;

            for rela in &entries {
                let symbol = symbols
                    .get(rela.symbol() as usize)
                    .ok_or(FormatError::InvalidSymbolIndex)?;
                let value = self.symbol_address(exec_base, symbol);
                let offset = rela.r_offset;
                let place = target_addr.wrapping_add(offset);
                let patch = reloc::resolve(rela.kind(), value, rela.r_addend, place)
                    .inspect_err(|err| warn!("[ELF] section {}: {}", target, err))?;

                let exec_offset = self.exec_offset;
                let Some(region) = self.region.as_mut() else {
                    return Ok(());
                };
                let section = &mut region.as_mut_slice()[exec_offset..][target_range.clone()];
                reloc::apply(section, offset, patch)?;
            }

            #[cfg(feature = "trace-loader")]
            debug!(
                "[ELF] applied {} relocations to section {}",
                entries.len(),
                target
            );
        }
        Ok(())
    }

    /// Entry offset: the first `_start` or `main` symbol in any symbol table.
    fn find_entry(&self, bytes: &[u8]) -> Result<u64, FormatError> {
        for section in self.sections.iter().filter(|s| s.sh_type == SHT_SYMTAB) {
            let strtab = self
                .sections
                .get(section.sh_link as usize)
                .ok_or(FormatError::InvalidSectionIndex)?
                .file_range(bytes.len())?;

            for symbol in elf::symbols(bytes, section)? {
                let Some(name) = elf::string_at(bytes, strtab.clone(), symbol.st_name) else {
                    continue;
                };
                if !ENTRY_SYMBOLS.contains(&name) {
                    continue;
                }
                let shndx = usize::from(symbol.st_shndx);
                let section_base = match self.sections.get(shndx) {
                    Some(owner) if shndx > 0 => owner.sh_addr,
                    _ => 0,
                };
                let entry = section_base.wrapping_add(symbol.st_value);
                debug!("[ELF] entry symbol '{}' at offset {:#x}", name, entry);
                return Ok(entry);
            }
        }

        warn!("[ELF] no _start or main symbol, entry offset defaults to 0");
        Ok(0)
    }

    /// Start of the allocation, or `None` once the image no longer owns it.
    pub fn base(&self) -> Option<u64> {
        self.region.as_ref().map(ExecRegion::addr)
    }

    /// Start of the runtime area.
    pub fn exec_base(&self) -> Option<u64> {
        self.base().map(|base| base + self.exec_offset as u64)
    }

    /// Total allocation size.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Entry point offset relative to [`LoadedImage::exec_base`].
    pub fn entry_offset(&self) -> u64 {
        self.entry
    }

    /// Absolute entry address.
    pub fn entry_address(&self) -> Option<u64> {
        self.exec_base().map(|base| base.wrapping_add(self.entry))
    }

    /// Whether the image still owns its memory.
    pub fn is_loaded(&self) -> bool {
        self.region.is_some()
    }

    /// The validated file header.
    pub fn header(&self) -> &Elf64Header {
        &self.header
    }

    /// Section headers, with `sh_addr` holding runtime offsets.
    pub fn sections(&self) -> &[Elf64SectionHeader] {
        &self.sections
    }

    /// Allocation record for the process table.
    pub fn region(&self) -> Option<ImageRegion> {
        self.region.as_ref().map(|region| ImageRegion {
            base: region.addr(),
            size: region.size,
        })
    }

    /// Name of section `index`, or `"unknown"`.
    pub fn section_name(&self, index: usize) -> &str {
        let (Some(region), Some(strtab), Some(section)) =
            (self.region.as_ref(), self.shstrtab.clone(), self.sections.get(index))
        else {
            return "unknown";
        };
        elf::string_at(region.as_slice(), strtab, section.sh_name).unwrap_or("unknown")
    }

    /// Runtime address of an allocatable section.
    pub fn section_address(&self, index: usize) -> Option<u64> {
        let range = self.layout.get(index)?.as_ref()?;
        Some(self.exec_base()? + range.start as u64)
    }

    /// Runtime contents of an allocatable section.
    pub fn section_data(&self, index: usize) -> Option<&[u8]> {
        let range = self.layout.get(index)?.clone()?;
        let region = self.region.as_ref()?;
        region.as_slice()[self.exec_offset..].get(range)
    }

    /// The copy of the input file at the start of the allocation.
    pub fn file(&self) -> Option<&[u8]> {
        let region = self.region.as_ref()?;
        region.as_slice().get(..self.file_len)
    }

    /// Give up ownership of the memory without freeing it.
    ///
    /// The running program (or its process record) keeps using the memory
    /// after this; the image only forgets it.
    pub fn hand_off(&mut self) -> Option<ImageRegion> {
        let region = self.region();
        self.region = None;
        region
    }

    /// Free the image's memory. Calling this again is a no-op.
    pub fn unload(&mut self) {
        if let Some(region) = self.region.take() {
            // SAFETY: the region came from `self.memory.allocate(size)` and
            // `take` guarantees it is released once.
            unsafe { self.memory.release(region.ptr, region.size) };
            debug!("[ELF] released {} bytes at {:#x}", region.size, region.addr());
        }
    }
}

impl Drop for LoadedImage<'_> {
    fn drop(&mut self) {
        self.unload();
    }
}

impl core::fmt::Debug for LoadedImage<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LoadedImage")
            .field("base", &self.base())
            .field("exec_offset", &self.exec_offset)
            .field("size", &self.size)
            .field("entry", &self.entry)
            .field("sections", &self.sections.len())
            .finish()
    }
}
