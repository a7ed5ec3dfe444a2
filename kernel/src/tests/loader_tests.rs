//! Loader Unit Tests
//!
//! Layout, relocation and failure cleanup of relocatable objects.

#[cfg(test)]
mod tests {
    use crate::loader::elf::{SectionFlags, SHN_ABS, SHN_UNDEF, SHT_PROGBITS};
    use crate::loader::reloc::{
        R_X86_64_32, R_X86_64_32S, R_X86_64_64, R_X86_64_PC32, R_X86_64_PLT32,
    };
    use crate::loader::{FormatError, LoadError, LoadedImage, RelocationError};
    use crate::memory::{ExecHeap, ExecMemory};
    use crate::tests::object::ObjectBuilder;
    use crate::tests::test_heap;

    const HEAP_SIZE: usize = 64 * 1024;

    fn read_u32(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    fn read_u64(bytes: &[u8], offset: usize) -> u64 {
        u64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap())
    }

    /// Load must fail and leave nothing allocated.
    fn load_fails_cleanly(heap: &ExecHeap, bytes: &[u8]) -> LoadError {
        let err = LoadedImage::load(bytes, heap).unwrap_err();
        assert_eq!(heap.used(), 0, "failed load leaked memory: {:?}", err);
        err
    }

    // ========================================
    // Entry Point Tests
    // ========================================

    #[test]
    fn test_entry_address_is_section_base_plus_value() {
        let heap = test_heap(HEAP_SIZE);
        let bytes = ObjectBuilder::new()
            .data(&[1, 2, 3])
            .text(&[0x90; 16])
            .symbol("_start", 2, 8)
            .build();

        let image = LoadedImage::load(&bytes, heap).unwrap();
        let text_base = image.section_address(2).unwrap();
        assert_eq!(image.entry_address(), Some(text_base + 8));
        assert_eq!(image.entry_offset(), { image.sections()[2].sh_addr } + 8);
        assert_eq!(text_base % 16, 0);
    }

    #[test]
    fn test_first_entry_name_wins() {
        let heap = test_heap(HEAP_SIZE);
        let bytes = ObjectBuilder::new()
            .text(&[0x90; 32])
            .symbol("helper", 1, 0)
            .symbol("main", 1, 4)
            .symbol("_start", 1, 12)
            .build();

        let image = LoadedImage::load(&bytes, heap).unwrap();
        assert_eq!(image.entry_address(), Some(image.section_address(1).unwrap() + 4));
    }

    #[test]
    fn test_missing_entry_defaults_to_zero() {
        let heap = test_heap(HEAP_SIZE);
        let bytes = ObjectBuilder::new()
            .text(&[0xC3])
            .symbol("helper", 1, 0)
            .build();

        let image = LoadedImage::load(&bytes, heap).unwrap();
        assert_eq!(image.entry_offset(), 0);
        assert_eq!(image.entry_address(), image.exec_base());
    }

    // ========================================
    // Layout Tests
    // ========================================

    #[test]
    fn test_file_copy_and_section_names() {
        let heap = test_heap(HEAP_SIZE);
        let bytes = ObjectBuilder::new()
            .text(&[0xC3])
            .symbol("_start", 1, 0)
            .build();

        let image = LoadedImage::load(&bytes, heap).unwrap();
        assert_eq!(image.file(), Some(&bytes[..]));
        assert_eq!(image.section_name(1), ".text");
        assert_eq!(image.section_name(0), "");
        assert_eq!(image.section_name(99), "unknown");
        assert_eq!(image.section_data(1), Some(&[0xC3][..]));
        assert!(image.exec_base().unwrap() >= image.base().unwrap() + bytes.len() as u64);
    }

    #[test]
    fn test_bss_is_zero_filled() {
        let heap = test_heap(HEAP_SIZE);

        // Dirty the pool so a missing zero-fill would show.
        let dirty = heap.allocate(4096).unwrap();
        unsafe {
            dirty.as_ptr().write_bytes(0xAA, 4096);
            heap.release(dirty, 4096);
        }

        let bytes = ObjectBuilder::new()
            .text(&[0xC3])
            .bss(".bss", 64, 32)
            .symbol("_start", 1, 0)
            .build();

        let image = LoadedImage::load(&bytes, heap).unwrap();
        let bss = image.section_data(2).unwrap();
        assert_eq!(bss.len(), 64);
        assert!(bss.iter().all(|&b| b == 0));
        assert_eq!(image.section_address(2).unwrap() % 32, 0);
    }

    #[test]
    fn test_non_alloc_sections_have_no_runtime_address() {
        let heap = test_heap(HEAP_SIZE);
        let bytes = ObjectBuilder::new()
            .text(&[0xC3])
            .section(".comment", SHT_PROGBITS, SectionFlags::empty(), 1, b"cc 1.0\0")
            .build();

        let image = LoadedImage::load(&bytes, heap).unwrap();
        assert!(image.section_address(1).is_some());
        assert_eq!(image.section_address(2), None);
        assert_eq!(image.section_data(2), None);
    }

    // ========================================
    // Relocation Tests
    // ========================================

    #[test]
    fn test_abs64_relocation() {
        let heap = test_heap(HEAP_SIZE);
        let bytes = ObjectBuilder::new()
            .data(b"hello\0\0\0")
            .text(&[0x48, 0xB8, 0, 0, 0, 0, 0, 0, 0, 0, 0xC3]) // movabs rax, imm64; ret
            .symbol("msg", 1, 0)
            .symbol("_start", 2, 0)
            .rela(2, 2, 1, R_X86_64_64, 3)
            .build();

        let image = LoadedImage::load(&bytes, heap).unwrap();
        let data_addr = image.section_address(1).unwrap();
        let text = image.section_data(2).unwrap();
        assert_eq!(read_u64(text, 2), data_addr + 3);
        assert_eq!(text[10], 0xC3);
    }

    #[test]
    fn test_pc32_relocation() {
        let heap = test_heap(HEAP_SIZE);
        let mut code = [0x90u8; 32];
        code[0] = 0xE8; // call rel32
        let bytes = ObjectBuilder::new()
            .text(&code)
            .symbol("_start", 1, 0)
            .symbol("func", 1, 0x10)
            .rela(1, 1, 2, R_X86_64_PC32, -4)
            .build();

        let image = LoadedImage::load(&bytes, heap).unwrap();
        let text = image.section_data(1).unwrap();
        // target 0x10, next instruction at 5
        assert_eq!(read_u32(text, 1) as i32, 0x10 - 5);
    }

    #[test]
    fn test_pc32_across_sections() {
        let heap = test_heap(HEAP_SIZE);
        let bytes = ObjectBuilder::new()
            .text(&[0x90; 16])
            .data(&[0; 8])
            .symbol("_start", 1, 0)
            .symbol("counter", 2, 4)
            .rela(1, 3, 2, R_X86_64_PC32, -4)
            .build();

        let image = LoadedImage::load(&bytes, heap).unwrap();
        let text_addr = image.section_address(1).unwrap();
        let data_addr = image.section_address(2).unwrap();
        let expected = (data_addr + 4) as i64 - 4 - (text_addr + 3) as i64;
        assert_eq!(read_u32(image.section_data(1).unwrap(), 3) as i32 as i64, expected);
    }

    #[test]
    fn test_abs32_relocations_with_absolute_symbol() {
        let heap = test_heap(HEAP_SIZE);
        let bytes = ObjectBuilder::new()
            .data(&[0; 8])
            .symbol("port", SHN_ABS, 0x1234)
            .rela(1, 0, 1, R_X86_64_32, 0x10)
            .rela(1, 4, 1, R_X86_64_32S, -0x2000)
            .build();

        let image = LoadedImage::load(&bytes, heap).unwrap();
        let data = image.section_data(1).unwrap();
        assert_eq!(read_u32(data, 0), 0x1244);
        assert_eq!(read_u32(data, 4) as i32, 0x1234 - 0x2000);
    }

    #[test]
    fn test_undefined_symbol_uses_raw_value() {
        let heap = test_heap(HEAP_SIZE);
        let bytes = ObjectBuilder::new()
            .data(&[0; 8])
            .symbol("external", SHN_UNDEF, 0x5000)
            .rela(1, 0, 1, R_X86_64_64, 8)
            .build();

        let image = LoadedImage::load(&bytes, heap).unwrap();
        assert_eq!(read_u64(image.section_data(1).unwrap(), 0), 0x5008);
    }

    #[test]
    fn test_relocations_for_non_alloc_sections_are_skipped() {
        let heap = test_heap(HEAP_SIZE);
        let bytes = ObjectBuilder::new()
            .text(&[0xC3])
            .section(".debug_info", SHT_PROGBITS, SectionFlags::empty(), 1, &[0; 16])
            .symbol("_start", 1, 0)
            .rela(2, 0, 1, R_X86_64_64, 0)
            .build();

        let image = LoadedImage::load(&bytes, heap).unwrap();
        assert_eq!(image.section_address(2), None);
    }

    #[test]
    fn test_unsupported_type_in_non_alloc_section_is_rejected() {
        let heap = test_heap(HEAP_SIZE);
        let bytes = ObjectBuilder::new()
            .text(&[0xC3])
            .section(".debug_info", SHT_PROGBITS, SectionFlags::empty(), 1, &[0; 16])
            .symbol("_start", 1, 0)
            .rela(2, 0, 1, 0x7777, 0)
            .build();

        assert_eq!(
            load_fails_cleanly(heap, &bytes),
            LoadError::Relocation(RelocationError::Unsupported(0x7777))
        );
    }

    // ========================================
    // Failure Cleanup Tests
    // ========================================

    #[test]
    fn test_pc32_overflow_releases_memory() {
        let heap = test_heap(HEAP_SIZE);
        let bytes = ObjectBuilder::new()
            .text(&[0x90; 16])
            .symbol("far", SHN_ABS, 0x4000_0000_0000_0000)
            .rela(1, 0, 1, R_X86_64_PC32, -4)
            .build();

        let err = load_fails_cleanly(heap, &bytes);
        assert!(matches!(
            err,
            LoadError::Relocation(RelocationError::Overflow { kind: R_X86_64_PC32, .. })
        ));
    }

    #[test]
    fn test_abs32_overflow_releases_memory() {
        let heap = test_heap(HEAP_SIZE);
        let bytes = ObjectBuilder::new()
            .data(&[0; 8])
            .symbol("high", SHN_ABS, 0x1_0000_0000)
            .rela(1, 0, 1, R_X86_64_32, 0)
            .build();

        let err = load_fails_cleanly(heap, &bytes);
        assert!(matches!(
            err,
            LoadError::Relocation(RelocationError::Overflow { kind: R_X86_64_32, .. })
        ));
    }

    #[test]
    fn test_abs32s_overflow_releases_memory() {
        let heap = test_heap(HEAP_SIZE);
        let bytes = ObjectBuilder::new()
            .data(&[0; 8])
            .symbol("high", SHN_ABS, 0x8000_0000)
            .rela(1, 0, 1, R_X86_64_32S, 0)
            .build();

        let err = load_fails_cleanly(heap, &bytes);
        assert!(matches!(
            err,
            LoadError::Relocation(RelocationError::Overflow { kind: R_X86_64_32S, .. })
        ));
    }

    #[test]
    fn test_unsupported_relocation_releases_memory() {
        let heap = test_heap(HEAP_SIZE);
        let bytes = ObjectBuilder::new()
            .text(&[0x90; 16])
            .symbol("_start", 1, 0)
            .rela(1, 1, 1, R_X86_64_PLT32, -4)
            .build();

        assert_eq!(
            load_fails_cleanly(heap, &bytes),
            LoadError::Relocation(RelocationError::Unsupported(R_X86_64_PLT32))
        );
    }

    #[test]
    fn test_out_of_section_patch_releases_memory() {
        let heap = test_heap(HEAP_SIZE);
        let bytes = ObjectBuilder::new()
            .text(&[0x90; 16])
            .symbol("_start", 1, 0)
            .rela(1, 12, 1, R_X86_64_64, 0)
            .build();

        assert_eq!(
            load_fails_cleanly(heap, &bytes),
            LoadError::Relocation(RelocationError::OutOfBounds { offset: 12 })
        );
    }

    #[test]
    fn test_allocation_failure() {
        let heap = test_heap(4096);
        let bytes = ObjectBuilder::new()
            .text(&[0x90; 8192])
            .symbol("_start", 1, 0)
            .build();

        assert!(matches!(
            load_fails_cleanly(heap, &bytes),
            LoadError::Allocation { .. }
        ));
    }

    #[test]
    fn test_format_errors_allocate_nothing() {
        let heap = test_heap(HEAP_SIZE);
        let mut bytes = ObjectBuilder::new().text(&[0xC3]).build();
        bytes[0] = b'M';
        assert_eq!(
            load_fails_cleanly(heap, &bytes),
            LoadError::Format(FormatError::InvalidMagic)
        );
    }

    #[test]
    fn test_section_beyond_file_is_rejected() {
        let heap = test_heap(HEAP_SIZE);
        let mut bytes = ObjectBuilder::new().text(&[0xC3]).build();

        // Inflate .text's sh_size (section 1, field at +32).
        let shoff = read_u64(&bytes, 40) as usize;
        let size_field = shoff + 64 + 32;
        bytes[size_field..size_field + 8].copy_from_slice(&0x10_0000u64.to_le_bytes());

        assert_eq!(
            load_fails_cleanly(heap, &bytes),
            LoadError::Format(FormatError::SectionOutOfBounds)
        );
    }

    #[test]
    fn test_bad_alignment_is_rejected() {
        let heap = test_heap(HEAP_SIZE);
        let bytes = ObjectBuilder::new()
            .section(".text", SHT_PROGBITS, SectionFlags::ALLOC, 12, &[0xC3])
            .build();

        assert_eq!(
            load_fails_cleanly(heap, &bytes),
            LoadError::Format(FormatError::InvalidAlignment)
        );
    }

    // ========================================
    // Ownership Tests
    // ========================================

    #[test]
    fn test_unload_is_idempotent() {
        let heap = test_heap(HEAP_SIZE);
        let bytes = ObjectBuilder::new()
            .text(&[0xC3])
            .symbol("_start", 1, 0)
            .build();

        let mut image = LoadedImage::load(&bytes, heap).unwrap();
        assert!(heap.used() >= image.size());

        image.unload();
        assert!(!image.is_loaded());
        assert_eq!(image.base(), None);
        assert_eq!(image.exec_base(), None);
        assert_eq!(image.entry_address(), None);
        assert_eq!(image.section_name(1), "unknown");
        assert_eq!(heap.used(), 0);

        image.unload();
        assert_eq!(heap.used(), 0);
    }

    #[test]
    fn test_drop_releases_memory() {
        let heap = test_heap(HEAP_SIZE);
        let bytes = ObjectBuilder::new().text(&[0xC3]).build();
        {
            let _image = LoadedImage::load(&bytes, heap).unwrap();
            assert!(heap.used() > 0);
        }
        assert_eq!(heap.used(), 0);
    }

    #[test]
    fn test_hand_off_keeps_memory_allocated() {
        let heap = test_heap(HEAP_SIZE);
        let bytes = ObjectBuilder::new().text(&[0xC3]).build();

        let mut image = LoadedImage::load(&bytes, heap).unwrap();
        let base = image.base().unwrap();
        let region = image.hand_off().unwrap();
        assert_eq!(region.base, base);
        assert_eq!(region.size, image.size());
        assert!(!image.is_loaded());

        drop(image);
        assert!(heap.used() >= region.size);
    }
}
