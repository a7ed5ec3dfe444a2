//! ELF64 Relocatable Object Parser
//!
//! Validates x86_64 relocatable objects (`ET_REL`) and reads their section,
//! symbol and relocation tables. Everything here is a pure view over the
//! file bytes; placing sections in memory is done by [`super::image`].

use alloc::vec::Vec;
use bitflags::bitflags;
use core::fmt;
use core::mem::size_of;
use core::ops::Range;

/// ELF magic number: 0x7F 'E' 'L' 'F'
pub const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];

/// ELF class: 64-bit
pub const ELFCLASS64: u8 = 2;

/// ELF data encoding: little endian
pub const ELFDATA2LSB: u8 = 1;

/// ELF version: current
pub const EV_CURRENT: u8 = 1;

/// ELF type: relocatable object
pub const ET_REL: u16 = 1;

/// ELF type: executable
pub const ET_EXEC: u16 = 2;

/// ELF type: shared object
pub const ET_DYN: u16 = 3;

/// Machine type: x86_64
pub const EM_X86_64: u16 = 62;

/// Section type: inactive
pub const SHT_NULL: u32 = 0;

/// Section type: program-defined data
pub const SHT_PROGBITS: u32 = 1;

/// Section type: symbol table
pub const SHT_SYMTAB: u32 = 2;

/// Section type: string table
pub const SHT_STRTAB: u32 = 3;

/// Section type: relocations with explicit addends
pub const SHT_RELA: u32 = 4;

/// Section type: occupies no file space (BSS)
pub const SHT_NOBITS: u32 = 8;

/// Special section index: undefined symbol
pub const SHN_UNDEF: u16 = 0;

/// Special section index: absolute value
pub const SHN_ABS: u16 = 0xFFF1;

bitflags! {
    /// Section attribute flags (`sh_flags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SectionFlags: u64 {
        /// Writable at runtime
        const WRITE = 0x1;
        /// Occupies memory at runtime
        const ALLOC = 0x2;
        /// Contains machine instructions
        const EXECINSTR = 0x4;
    }
}

/// ELF64 file header
#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct Elf64Header {
    /// Magic number and other info
    pub e_ident: [u8; 16],
    /// Object file type
    pub e_type: u16,
    /// Machine type
    pub e_machine: u16,
    /// Object file version
    pub e_version: u32,
    /// Entry point virtual address (unused for relocatable objects)
    pub e_entry: u64,
    /// Program header table file offset
    pub e_phoff: u64,
    /// Section header table file offset
    pub e_shoff: u64,
    /// Processor-specific flags
    pub e_flags: u32,
    /// ELF header size
    pub e_ehsize: u16,
    /// Program header table entry size
    pub e_phentsize: u16,
    /// Program header table entry count
    pub e_phnum: u16,
    /// Section header table entry size
    pub e_shentsize: u16,
    /// Section header table entry count
    pub e_shnum: u16,
    /// Section name string table index
    pub e_shstrndx: u16,
}

/// ELF64 section header
#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct Elf64SectionHeader {
    /// Section name (string table index)
    pub sh_name: u32,
    /// Section type
    pub sh_type: u32,
    /// Section flags
    pub sh_flags: u64,
    /// Section address; rewritten to the runtime offset once loaded
    pub sh_addr: u64,
    /// Section file offset
    pub sh_offset: u64,
    /// Section size
    pub sh_size: u64,
    /// Link to another section
    pub sh_link: u32,
    /// Additional section information
    pub sh_info: u32,
    /// Section alignment
    pub sh_addralign: u64,
    /// Entry size if section holds table
    pub sh_entsize: u64,
}

impl Elf64SectionHeader {
    /// Section attribute flags.
    pub fn flags(&self) -> SectionFlags {
        SectionFlags::from_bits_truncate(self.sh_flags)
    }

    /// Whether the section occupies memory at runtime.
    pub fn is_alloc(&self) -> bool {
        self.flags().contains(SectionFlags::ALLOC)
    }

    /// Whether the section has bytes in the file.
    pub fn has_file_data(&self) -> bool {
        let sh_type = self.sh_type;
        sh_type != SHT_NOBITS && sh_type != SHT_NULL
    }

    /// Effective alignment; `0` and `1` both mean "no constraint".
    pub fn alignment(&self) -> Result<usize, FormatError> {
        let align = self.sh_addralign;
        match align {
            0 | 1 => Ok(1),
            a if a.is_power_of_two() => usize::try_from(a).map_err(|_| FormatError::InvalidAlignment),
            _ => Err(FormatError::InvalidAlignment),
        }
    }

    /// Byte range of the section's contents inside the file.
    pub fn file_range(&self, file_len: usize) -> Result<Range<usize>, FormatError> {
        let start = usize::try_from(self.sh_offset).map_err(|_| FormatError::SectionOutOfBounds)?;
        let size = usize::try_from(self.sh_size).map_err(|_| FormatError::SectionOutOfBounds)?;
        let end = start.checked_add(size).ok_or(FormatError::SectionOutOfBounds)?;
        if end > file_len {
            return Err(FormatError::SectionOutOfBounds);
        }
        Ok(start..end)
    }
}

/// ELF64 symbol table entry
#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct Elf64Symbol {
    /// Symbol name (string table index)
    pub st_name: u32,
    /// Type and binding
    pub st_info: u8,
    /// Visibility
    pub st_other: u8,
    /// Index of the section the symbol is defined in
    pub st_shndx: u16,
    /// Symbol value (offset within its section)
    pub st_value: u64,
    /// Symbol size
    pub st_size: u64,
}

/// ELF64 relocation entry with addend
#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct Elf64Rela {
    /// Offset of the patch within the target section
    pub r_offset: u64,
    /// Symbol index (high 32 bits) and relocation type (low 32 bits)
    pub r_info: u64,
    /// Constant addend
    pub r_addend: i64,
}

impl Elf64Rela {
    /// Index into the associated symbol table.
    pub fn symbol(&self) -> u32 {
        (self.r_info >> 32) as u32
    }

    /// Relocation type.
    pub fn kind(&self) -> u32 {
        (self.r_info & 0xFFFF_FFFF) as u32
    }
}

/// Object file format errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    /// Buffer too small to contain an ELF header
    TooSmall,
    /// Invalid ELF magic number
    InvalidMagic,
    /// Invalid ELF class (not 64-bit)
    InvalidClass,
    /// Invalid data encoding (not little endian)
    InvalidEncoding,
    /// Invalid ELF version
    InvalidVersion,
    /// Invalid ELF type (not a relocatable object)
    InvalidType,
    /// Invalid machine type (not x86_64)
    InvalidMachine,
    /// Section header table extends beyond the file
    SectionTableOutOfBounds,
    /// Unexpected section header entry size
    InvalidSectionHeaderSize,
    /// Section contents extend beyond the file
    SectionOutOfBounds,
    /// Section index (link, info or symbol index) out of range
    InvalidSectionIndex,
    /// Section alignment is not a power of two
    InvalidAlignment,
    /// Symbol or relocation entry size does not match the table format
    InvalidEntrySize,
    /// Symbol index beyond the end of its table
    InvalidSymbolIndex,
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::TooSmall => "file too small for an ELF header",
            Self::InvalidMagic => "bad ELF magic",
            Self::InvalidClass => "not a 64-bit object",
            Self::InvalidEncoding => "not little endian",
            Self::InvalidVersion => "unsupported ELF version",
            Self::InvalidType => "not a relocatable object",
            Self::InvalidMachine => "not an x86_64 object",
            Self::SectionTableOutOfBounds => "section header table out of bounds",
            Self::InvalidSectionHeaderSize => "bad section header size",
            Self::SectionOutOfBounds => "section data out of bounds",
            Self::InvalidSectionIndex => "section index out of range",
            Self::InvalidAlignment => "section alignment is not a power of two",
            Self::InvalidEntrySize => "bad table entry size",
            Self::InvalidSymbolIndex => "symbol index out of range",
        };
        f.write_str(msg)
    }
}

/// Read a packed structure from `bytes` at `offset`.
fn read_struct<T: Copy>(bytes: &[u8], offset: usize) -> Option<T> {
    let end = offset.checked_add(size_of::<T>())?;
    if end > bytes.len() {
        return None;
    }
    // SAFETY: bounds checked above; T is a packed plain-old-data struct.
    Some(unsafe { core::ptr::read_unaligned(bytes.as_ptr().add(offset) as *const T) })
}

/// Validate the ELF header of a candidate relocatable object.
///
/// # Returns
///
/// * `Ok(Elf64Header)` - A copy of the validated header
/// * `Err(FormatError)` - The first check that failed
pub fn validate(bytes: &[u8]) -> Result<Elf64Header, FormatError> {
    let header: Elf64Header = read_struct(bytes, 0).ok_or(FormatError::TooSmall)?;

    if header.e_ident[0..4] != ELF_MAGIC {
        return Err(FormatError::InvalidMagic);
    }
    if header.e_ident[4] != ELFCLASS64 {
        return Err(FormatError::InvalidClass);
    }
    if header.e_ident[5] != ELFDATA2LSB {
        return Err(FormatError::InvalidEncoding);
    }
    if header.e_ident[6] != EV_CURRENT {
        return Err(FormatError::InvalidVersion);
    }
    if header.e_type != ET_REL {
        return Err(FormatError::InvalidType);
    }
    if header.e_machine != EM_X86_64 {
        return Err(FormatError::InvalidMachine);
    }

    Ok(header)
}

/// Read the section header table.
pub fn section_headers(
    bytes: &[u8],
    header: &Elf64Header,
) -> Result<Vec<Elf64SectionHeader>, FormatError> {
    let count = usize::from(header.e_shnum);
    if count == 0 {
        return Ok(Vec::new());
    }
    if usize::from(header.e_shentsize) != size_of::<Elf64SectionHeader>() {
        return Err(FormatError::InvalidSectionHeaderSize);
    }

    let table_start =
        usize::try_from(header.e_shoff).map_err(|_| FormatError::SectionTableOutOfBounds)?;
    let table_end = count
        .checked_mul(size_of::<Elf64SectionHeader>())
        .and_then(|len| table_start.checked_add(len))
        .ok_or(FormatError::SectionTableOutOfBounds)?;
    if table_end > bytes.len() {
        return Err(FormatError::SectionTableOutOfBounds);
    }

    (0..count)
        .map(|i| {
            read_struct(bytes, table_start + i * size_of::<Elf64SectionHeader>())
                .ok_or(FormatError::SectionTableOutOfBounds)
        })
        .collect()
}

/// Read every entry of a symbol table section.
pub fn symbols(bytes: &[u8], symtab: &Elf64SectionHeader) -> Result<Vec<Elf64Symbol>, FormatError> {
    read_table(bytes, symtab)
}

/// Read every entry of a relocation section.
pub fn relocations(bytes: &[u8], rela: &Elf64SectionHeader) -> Result<Vec<Elf64Rela>, FormatError> {
    read_table(bytes, rela)
}

fn read_table<T: Copy>(bytes: &[u8], section: &Elf64SectionHeader) -> Result<Vec<T>, FormatError> {
    let entsize = section.sh_entsize;
    if entsize != 0 && entsize != size_of::<T>() as u64 {
        return Err(FormatError::InvalidEntrySize);
    }
    let range = section.file_range(bytes.len())?;
    let count = range.len() / size_of::<T>();
    (0..count)
        .map(|i| {
            read_struct(bytes, range.start + i * size_of::<T>())
                .ok_or(FormatError::SectionOutOfBounds)
        })
        .collect()
}

/// Read the NUL-terminated name at `offset` in string table `strtab`.
///
/// Returns `None` when the table or offset is out of bounds or the name is
/// not valid UTF-8.
pub fn string_at<'a>(bytes: &'a [u8], strtab: Range<usize>, offset: u32) -> Option<&'a str> {
    let table = bytes.get(strtab)?;
    let tail = table.get(usize::try_from(offset).ok()?..)?;
    let len = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    core::str::from_utf8(&tail[..len]).ok()
}
