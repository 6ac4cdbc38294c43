//! End-to-end scenarios, hand-assembling tiny x86-64 byte sequences rather
//! than depending on external binaries.

use disasm_core::{disasm, Arch, Binary, Bits, DisasmOptions, FileType, LinearSweepStrategy, Section, SectionKind};

fn binary(file_type: FileType, bytes: Vec<u8>) -> Binary {
    Binary {
        arch: Arch::X86,
        bits: Bits::Bits64,
        file_type,
        sections: vec![Section {
            name: ".text".to_string(),
            kind: SectionKind::Code,
            vma: 0x1000,
            bytes,
        }],
    }
}

fn run(b: &Binary) -> Vec<disasm_core::DisasmSection<'_>> {
    disasm(
        b,
        DisasmOptions::default(),
        Box::new(LinearSweepStrategy::new()),
    )
    .expect("run should succeed")
}

#[test]
fn single_ret() {
    let b = binary(FileType::Elf, vec![0xC3]);
    let sections = run(&b);
    assert_eq!(sections.len(), 1);
    let bbs = sections[0].bbs();
    assert_eq!(bbs.len(), 1);
    assert_eq!((bbs[0].start, bbs[0].end), (0x1000, 0x1001));
    assert_eq!(bbs[0].insns.len(), 1);
}

#[test]
fn call_then_ret_splits_into_two_blocks() {
    let b = binary(FileType::Elf, vec![0xE8, 0x00, 0x00, 0x00, 0x00, 0xC3]);
    let sections = run(&b);
    let mut bbs: Vec<_> = sections[0].bbs().to_vec();
    bbs.sort_by_key(|bb| bb.start);
    assert_eq!(bbs.len(), 2);
    assert_eq!((bbs[0].start, bbs[0].end), (0x1000, 0x1005));
    assert_eq!((bbs[1].start, bbs[1].end), (0x1005, 0x1006));
}

#[test]
fn nop_padding_forms_its_own_block() {
    let b = binary(FileType::Elf, vec![0x90, 0x90, 0x90, 0xC3]);
    let sections = run(&b);
    let mut bbs: Vec<_> = sections[0].bbs().to_vec();
    bbs.sort_by_key(|bb| bb.start);
    assert_eq!(bbs.len(), 2);
    assert_eq!((bbs[0].start, bbs[0].end), (0x1000, 0x1003));
    assert!(bbs[0].padding);
    assert_eq!(bbs[0].insns.len(), 3);
    assert_eq!((bbs[1].start, bbs[1].end), (0x1003, 0x1004));
}

#[test]
fn semantic_nop_recognized_on_elf() {
    let b = binary(FileType::Elf, vec![0x48, 0x89, 0xC0, 0xC3]);
    let sections = run(&b);
    let mut bbs: Vec<_> = sections[0].bbs().to_vec();
    bbs.sort_by_key(|bb| bb.start);
    assert_eq!(bbs.len(), 2);
    assert_eq!((bbs[0].start, bbs[0].end), (0x1000, 0x1003));
    assert!(bbs[0].padding);
    assert_eq!((bbs[1].start, bbs[1].end), (0x1003, 0x1004));
}

#[test]
fn same_bytes_on_pe_do_not_split() {
    let b = binary(FileType::Pe, vec![0x48, 0x89, 0xC0, 0xC3]);
    let sections = run(&b);
    let bbs = sections[0].bbs();
    assert_eq!(bbs.len(), 1);
    assert_eq!((bbs[0].start, bbs[0].end), (0x1000, 0x1004));
    assert!(!bbs[0].padding);
    assert_eq!(bbs[0].insns.len(), 2);
}

#[test]
fn invalid_byte_still_makes_forward_progress() {
    let b = binary(FileType::Elf, vec![0xFF, 0xFF]);
    let sections = run(&b);
    let bbs = sections[0].bbs();
    assert!(!bbs.is_empty());
    assert!(bbs[0].end > bbs[0].start);
}
