//! The linear sweep: decodes one basic block starting at a seed VMA.

use log::trace;

use crate::addrmap::AddrFlags;
use crate::binary::{Binary, FileType};
use crate::decode::{DecodeStep, Decoder};
use crate::error::DisasmError;
use crate::instruction::{InsFlags, Instruction, InstructionFacts};
use crate::section::DisasmSection;

/// A basic block, committed or still a mutant awaiting scoring/selection.
#[derive(Debug, Clone)]
pub struct BB {
    pub start: u64,
    pub end: u64,
    pub insns: Vec<Instruction>,
    pub invalid: bool,
    pub padding: bool,
    pub trap: bool,
    pub privileged: bool,
    pub alive: bool,
    pub score: f64,
    /// Free-form scratch slot a [`crate::strategy::DisasmStrategy`] may use
    /// to stash state between `mutate`, `score`, and `select` for a single
    /// mutant; the core places no meaning on its contents.
    pub scratch: i64,
}

impl BB {
    /// A fresh mutant seeded at `start`, not yet swept.
    pub fn seed(start: u64) -> Self {
        Self {
            start,
            end: start,
            insns: Vec::new(),
            invalid: false,
            padding: false,
            trap: false,
            privileged: false,
            alive: false,
            score: 0.0,
            scratch: 0,
        }
    }
}

/// Whether `facts` counts as a nop for the purposes of block-boundary
/// detection, under the binary's file-type-sensitive policy: MSVC PE images
/// pad with `int3` rather than semantic nops, so the two halves of the
/// policy are mutually exclusive across file types.
fn is_effective_nop(facts: &InstructionFacts, file_type: FileType) -> bool {
    facts.nop
        || (facts.semantic_nop && file_type != FileType::Pe)
        || (facts.trap && file_type == FileType::Pe)
}

/// Decodes a basic block starting at `bb.start` into `bb`, in place.
///
/// Returns the number of instructions decoded (zero is valid: a lone invalid
/// byte still "decodes" zero instructions while still making forward
/// progress).
pub(crate) fn disasm_bb(
    binary: &Binary,
    section: &DisasmSection<'_>,
    bb: &mut BB,
) -> Result<usize, DisasmError> {
    let sec = section.section();
    if bb.start < sec.vma {
        return Err(DisasmError::OutOfSection {
            start: bb.start,
            section: sec.name.clone(),
        });
    }
    let offset = (bb.start - sec.vma) as usize;
    if offset >= sec.bytes.len() {
        return Err(DisasmError::OutOfSection {
            start: bb.start,
            section: sec.name.clone(),
        });
    }

    let decoder = Decoder::new(binary.bits)?;

    bb.end = bb.start;
    let mut ndisassembled = 0usize;
    let mut only_nop: Option<bool> = None;
    let mut cursor = bb.start;

    loop {
        let rel = (cursor - sec.vma) as usize;
        let slice = &sec.bytes[rel..];
        let (mut ins, facts) = match decoder.decode_one(slice, cursor)? {
            DecodeStep::Decoded(ins, facts) => (ins, facts),
            DecodeStep::Invalid => {
                bb.invalid = true;
                bb.end = bb.end.max(bb.start) + 1;
                break;
            }
            DecodeStep::ZeroSize => break,
        };

        let effective_nop = is_effective_nop(&facts, binary.file_type);
        match only_nop {
            None => only_nop = Some(effective_nop),
            Some(true) if !effective_nop => break,
            Some(false) if effective_nop => break,
            _ => {}
        }

        bb.privileged |= facts.privileged;
        bb.trap |= facts.trap;
        if effective_nop {
            bb.padding = true;
            ins.flags |= InsFlags::NOP;
        }

        let stop_after = facts.cflow;
        bb.end += ins.size as u64;
        cursor += ins.size as u64;
        ndisassembled += 1;
        bb.insns.push(ins);

        if stop_after || cursor >= sec.end_vma() {
            break;
        }
    }

    if ndisassembled == 0 && !bb.invalid {
        bb.invalid = true;
        bb.end = bb.start + 1;
    }

    trace!(
        "disasm_bb: [{:#x}, {:#x}) ndisassembled={} invalid={}",
        bb.start, bb.end, ndisassembled, bb.invalid
    );
    Ok(ndisassembled)
}

pub(crate) fn commit_flags(addrmap: &mut crate::addrmap::AddressMap, bb: &BB) -> Result<(), DisasmError> {
    addrmap.add_addr_flag(bb.start, AddrFlags::BB_START)?;
    for ins in &bb.insns {
        addrmap.add_addr_flag(ins.start, AddrFlags::INS_START)?;
    }
    let mut vma = bb.start;
    while vma < bb.end {
        addrmap.add_addr_flag(vma, AddrFlags::CODE)?;
        vma += 1;
    }
    Ok(())
}
