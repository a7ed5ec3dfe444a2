//! Relocatable object builder for tests.
//!
//! Produces ET_REL files with this section order:
//! null, user sections, one `.rela<name>` per relocated section, `.symtab`,
//! `.strtab`, `.shstrtab`. User section `n` (in call order, from 0) has
//! section index `n + 1`; symbol `n` has symbol index `n + 1`.

use alloc::string::String;
use alloc::vec::Vec;

use crate::loader::elf::{
    SectionFlags, EM_X86_64, ET_REL, SHT_NOBITS, SHT_PROGBITS, SHT_RELA, SHT_STRTAB, SHT_SYMTAB,
};

const EHDR_SIZE: usize = 64;
const SHDR_SIZE: usize = 64;
const SYM_SIZE: u64 = 24;
const RELA_SIZE: u64 = 24;

struct SectionSpec {
    name: String,
    sh_type: u32,
    flags: u64,
    align: u64,
    data: Vec<u8>,
    size: u64,
}

struct SymbolSpec {
    name: String,
    shndx: u16,
    value: u64,
}

struct RelaSpec {
    target: u16,
    offset: u64,
    symbol: u32,
    kind: u32,
    addend: i64,
}

/// Section header fields as written to the file.
struct Header {
    name: u32,
    sh_type: u32,
    flags: u64,
    offset: u64,
    size: u64,
    link: u32,
    info: u32,
    align: u64,
    entsize: u64,
}

/// Builder for x86_64 relocatable objects.
#[derive(Default)]
pub struct ObjectBuilder {
    sections: Vec<SectionSpec>,
    symbols: Vec<SymbolSpec>,
    relas: Vec<RelaSpec>,
}

fn pad_to(buf: &mut Vec<u8>, align: usize) {
    while buf.len() % align != 0 {
        buf.push(0);
    }
}

fn add_name(table: &mut Vec<u8>, name: &str) -> u32 {
    let offset = table.len() as u32;
    table.extend_from_slice(name.as_bytes());
    table.push(0);
    offset
}

impl ObjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a section with file contents.
    pub fn section(
        mut self,
        name: &str,
        sh_type: u32,
        flags: SectionFlags,
        align: u64,
        data: &[u8],
    ) -> Self {
        self.sections.push(SectionSpec {
            name: String::from(name),
            sh_type,
            flags: flags.bits(),
            align,
            data: data.to_vec(),
            size: data.len() as u64,
        });
        self
    }

    /// Add an executable `.text` section.
    pub fn text(self, code: &[u8]) -> Self {
        self.section(
            ".text",
            SHT_PROGBITS,
            SectionFlags::ALLOC | SectionFlags::EXECINSTR,
            16,
            code,
        )
    }

    /// Add a writable `.data` section.
    pub fn data(self, bytes: &[u8]) -> Self {
        self.section(
            ".data",
            SHT_PROGBITS,
            SectionFlags::ALLOC | SectionFlags::WRITE,
            8,
            bytes,
        )
    }

    /// Add a NOBITS section of `size` bytes.
    pub fn bss(mut self, name: &str, size: u64, align: u64) -> Self {
        self.sections.push(SectionSpec {
            name: String::from(name),
            sh_type: SHT_NOBITS,
            flags: (SectionFlags::ALLOC | SectionFlags::WRITE).bits(),
            align,
            data: Vec::new(),
            size,
        });
        self
    }

    /// Add a global symbol defined at `value` in section `shndx`.
    pub fn symbol(mut self, name: &str, shndx: u16, value: u64) -> Self {
        self.symbols.push(SymbolSpec {
            name: String::from(name),
            shndx,
            value,
        });
        self
    }

    /// Add a relocation against section index `target`.
    pub fn rela(mut self, target: u16, offset: u64, symbol: u32, kind: u32, addend: i64) -> Self {
        self.relas.push(RelaSpec {
            target,
            offset,
            symbol,
            kind,
            addend,
        });
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = alloc::vec![0u8; EHDR_SIZE];
        let mut shstrtab = alloc::vec![0u8];
        let mut headers: Vec<Header> = Vec::new();

        headers.push(Header {
            name: 0,
            sh_type: 0,
            flags: 0,
            offset: 0,
            size: 0,
            link: 0,
            info: 0,
            align: 0,
            entsize: 0,
        });

        for section in &self.sections {
            pad_to(&mut out, 8);
            let offset = out.len() as u64;
            out.extend_from_slice(&section.data);
            headers.push(Header {
                name: add_name(&mut shstrtab, &section.name),
                sh_type: section.sh_type,
                flags: section.flags,
                offset,
                size: section.size,
                link: 0,
                info: 0,
                align: section.align,
                entsize: 0,
            });
        }

        let mut targets: Vec<u16> = self.relas.iter().map(|r| r.target).collect();
        targets.sort_unstable();
        targets.dedup();
        let symtab_index = (1 + self.sections.len() + targets.len()) as u32;
        let strtab_index = symtab_index + 1;

        for &target in &targets {
            pad_to(&mut out, 8);
            let offset = out.len() as u64;
            let mut count = 0u64;
            for rela in self.relas.iter().filter(|r| r.target == target) {
                out.extend_from_slice(&rela.offset.to_le_bytes());
                let info = (u64::from(rela.symbol) << 32) | u64::from(rela.kind);
                out.extend_from_slice(&info.to_le_bytes());
                out.extend_from_slice(&rela.addend.to_le_bytes());
                count += 1;
            }
            let target_name = self
                .sections
                .get(usize::from(target).wrapping_sub(1))
                .map(|s| s.name.as_str())
                .unwrap_or(".unknown");
            let name = alloc::format!(".rela{}", target_name);
            headers.push(Header {
                name: add_name(&mut shstrtab, &name),
                sh_type: SHT_RELA,
                flags: 0,
                offset,
                size: count * RELA_SIZE,
                link: symtab_index,
                info: u32::from(target),
                align: 8,
                entsize: RELA_SIZE,
            });
        }

        // .symtab and .strtab
        let mut strtab = alloc::vec![0u8];
        pad_to(&mut out, 8);
        let symtab_offset = out.len() as u64;
        out.extend_from_slice(&[0u8; SYM_SIZE as usize]);
        for symbol in &self.symbols {
            let name = add_name(&mut strtab, &symbol.name);
            out.extend_from_slice(&name.to_le_bytes());
            out.push(0x12); // STB_GLOBAL | STT_FUNC
            out.push(0);
            out.extend_from_slice(&symbol.shndx.to_le_bytes());
            out.extend_from_slice(&symbol.value.to_le_bytes());
            out.extend_from_slice(&0u64.to_le_bytes());
        }
        headers.push(Header {
            name: add_name(&mut shstrtab, ".symtab"),
            sh_type: SHT_SYMTAB,
            flags: 0,
            offset: symtab_offset,
            size: (self.symbols.len() as u64 + 1) * SYM_SIZE,
            link: strtab_index,
            info: 1,
            align: 8,
            entsize: SYM_SIZE,
        });

        let strtab_offset = out.len() as u64;
        out.extend_from_slice(&strtab);
        headers.push(Header {
            name: add_name(&mut shstrtab, ".strtab"),
            sh_type: SHT_STRTAB,
            flags: 0,
            offset: strtab_offset,
            size: strtab.len() as u64,
            link: 0,
            info: 0,
            align: 1,
            entsize: 0,
        });

        let shstrtab_name = add_name(&mut shstrtab, ".shstrtab");
        let shstrtab_offset = out.len() as u64;
        out.extend_from_slice(&shstrtab);
        headers.push(Header {
            name: shstrtab_name,
            sh_type: SHT_STRTAB,
            flags: 0,
            offset: shstrtab_offset,
            size: shstrtab.len() as u64,
            link: 0,
            info: 0,
            align: 1,
            entsize: 0,
        });

        pad_to(&mut out, 8);
        let shoff = out.len() as u64;
        for header in &headers {
            out.extend_from_slice(&header.name.to_le_bytes());
            out.extend_from_slice(&header.sh_type.to_le_bytes());
            out.extend_from_slice(&header.flags.to_le_bytes());
            out.extend_from_slice(&0u64.to_le_bytes()); // sh_addr
            out.extend_from_slice(&header.offset.to_le_bytes());
            out.extend_from_slice(&header.size.to_le_bytes());
            out.extend_from_slice(&header.link.to_le_bytes());
            out.extend_from_slice(&header.info.to_le_bytes());
            out.extend_from_slice(&header.align.to_le_bytes());
            out.extend_from_slice(&header.entsize.to_le_bytes());
        }

        // ELF header
        let shnum = headers.len() as u16;
        let ehdr = &mut out[..EHDR_SIZE];
        ehdr[0..4].copy_from_slice(&[0x7F, b'E', b'L', b'F']);
        ehdr[4] = 2; // ELFCLASS64
        ehdr[5] = 1; // ELFDATA2LSB
        ehdr[6] = 1; // EV_CURRENT
        ehdr[16..18].copy_from_slice(&ET_REL.to_le_bytes());
        ehdr[18..20].copy_from_slice(&EM_X86_64.to_le_bytes());
        ehdr[20..24].copy_from_slice(&1u32.to_le_bytes());
        ehdr[40..48].copy_from_slice(&shoff.to_le_bytes());
        ehdr[52..54].copy_from_slice(&(EHDR_SIZE as u16).to_le_bytes());
        ehdr[58..60].copy_from_slice(&(SHDR_SIZE as u16).to_le_bytes());
        ehdr[60..62].copy_from_slice(&shnum.to_le_bytes());
        ehdr[62..64].copy_from_slice(&(shnum - 1).to_le_bytes());
        out
    }
}
