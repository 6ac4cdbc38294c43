//! The one production decoder adapter this crate ships: a thin wrapper over
//! `capstone`'s x86 support, translating its types into this crate's own
//! [`Instruction`]/[`Operand`] so no `capstone` type leaks past this module.

use capstone::arch::x86::{ArchMode, ArchSyntax, X86Insn};
use capstone::arch::ArchOperand;
use capstone::prelude::*;
use capstone::{Capstone, InsnId, RegId as CsRegId};

use crate::binary::Bits;
use crate::error::DisasmError;
use crate::instruction::{classify, DecodedView, InsFlags, Instruction, InstructionFacts, Mnemonic};
use crate::operand::{MemOperand, Operand, OperandKind, RegId};

/// Owns a configured `Capstone` handle and decodes one instruction at a time.
///
/// A fresh handle is created per [`crate::bb::disasm_bb`] call and dropped
/// when that call returns; nothing here survives across block sweeps.
pub(crate) struct Decoder {
    cs: Capstone,
    addr_size: u8,
}

impl Decoder {
    pub(crate) fn new(bits: Bits) -> Result<Self, DisasmError> {
        let mode = match bits {
            Bits::Bits16 => ArchMode::Mode16,
            Bits::Bits32 => ArchMode::Mode32,
            Bits::Bits64 => ArchMode::Mode64,
        };
        let cs = Capstone::new()
            .x86()
            .mode(mode)
            .syntax(ArchSyntax::Intel)
            .detail(true)
            .build()
            .map_err(|e| DisasmError::DecoderInit(e.to_string()))?;
        Ok(Self {
            cs,
            addr_size: bits.as_u32() as u8,
        })
    }

    /// Decodes a single instruction at `vma` from the front of `bytes`.
    ///
    /// The invalid-opcode and zero-size termination cases are kept distinct:
    /// an invalid opcode means "nothing decoded here, and never will", while
    /// a zero-size read is a defensive stop that does not impugn the bytes
    /// already decoded into the block.
    pub(crate) fn decode_one(&self, bytes: &[u8], vma: u64) -> Result<DecodeStep, DisasmError> {
        if bytes.is_empty() {
            return Ok(DecodeStep::Invalid);
        }
        let insns = self
            .cs
            .disasm_count(bytes, vma, 1)
            .map_err(|e| DisasmError::DecoderInit(e.to_string()))?;
        let Some(insn) = insns.iter().next() else {
            return Ok(DecodeStep::Invalid);
        };
        let size = insn.bytes().len() as u32;
        if size == 0 {
            return Ok(DecodeStep::ZeroSize);
        }

        let detail = self
            .cs
            .insn_detail(&insn)
            .map_err(|e| DisasmError::DecoderInit(e.to_string()))?;
        let operands: Vec<Operand> = detail
            .arch_detail()
            .operands()
            .into_iter()
            .filter_map(|op| match op {
                ArchOperand::X86Operand(op) => Some(convert_operand(op)),
                _ => None,
            })
            .collect();

        let mnemonic = map_mnemonic(insn.id());
        let view = DecodedView {
            mnemonic,
            operands: &operands,
        };
        let facts = classify(&view);

        let mut flags = InsFlags::empty();
        if facts.ret {
            flags |= InsFlags::RET;
        }
        if facts.jmp {
            flags |= InsFlags::JMP;
        }
        if facts.cond {
            flags |= InsFlags::COND;
        }
        if facts.cflow {
            flags |= InsFlags::CFLOW;
        }
        if facts.call {
            flags |= InsFlags::CALL;
        }
        if facts.indirect {
            flags |= InsFlags::INDIRECT;
        }

        let instruction = Instruction {
            start: vma,
            size,
            addr_size: self.addr_size,
            mnemonic: insn.mnemonic().unwrap_or_default().to_string(),
            op_str: insn.op_str().unwrap_or_default().to_string(),
            flags,
            privileged: facts.privileged,
            trap: facts.trap,
            target: facts.target,
            operands,
        };
        Ok(DecodeStep::Decoded(instruction, facts))
    }
}

/// The three outcomes a single decode step can produce, kept as distinct
/// variants so a caller can't conflate "this byte run is garbage" with
/// "stop here, but the bytes so far still stand."
pub(crate) enum DecodeStep {
    Decoded(Instruction, InstructionFacts),
    Invalid,
    ZeroSize,
}

fn convert_operand(op: capstone::arch::x86::X86Operand) -> Operand {
    use capstone::arch::x86::X86OperandType;
    let kind = match op.op_type {
        X86OperandType::Reg(r) => OperandKind::Reg(convert_reg(r)),
        X86OperandType::Imm(v) => OperandKind::Imm(v),
        X86OperandType::Mem(mem) => OperandKind::Mem(MemOperand {
            segment: convert_reg(mem.segment()),
            base: convert_reg(mem.base()),
            index: convert_reg(mem.index()),
            scale: mem.scale(),
            disp: mem.disp(),
        }),
        X86OperandType::Fp(v) => OperandKind::Fp(v),
        _ => OperandKind::None,
    };
    Operand {
        kind,
        size: op.size as u32,
    }
}

fn convert_reg(reg: CsRegId) -> RegId {
    use capstone::arch::x86::X86Reg::*;
    if reg.0 == X86_REG_EIZ as u16 || reg.0 == X86_REG_RIZ as u16 {
        RegId::ZERO_INDEX
    } else {
        RegId(reg.0)
    }
}

/// Collapses capstone's fine-grained x86 instruction ids into the coarse
/// [`Mnemonic`] families the classifier cares about.
fn map_mnemonic(id: InsnId) -> Mnemonic {
    use X86Insn::*;
    let one_of = |ids: &[X86Insn]| ids.iter().any(|&i| id == InsnId(i as u32));

    if one_of(&[X86_INS_NOP]) {
        return Mnemonic::Nop;
    }
    if one_of(&[X86_INS_FNOP]) {
        return Mnemonic::Fnop;
    }
    if one_of(&[X86_INS_MOV]) {
        return Mnemonic::Mov;
    }
    if one_of(&[X86_INS_XCHG]) {
        return Mnemonic::Xchg;
    }
    if one_of(&[X86_INS_LEA]) {
        return Mnemonic::Lea;
    }
    if one_of(&[X86_INS_INT3]) {
        return Mnemonic::Int3;
    }
    if one_of(&[X86_INS_UD2]) {
        return Mnemonic::Ud2;
    }
    if one_of(&[X86_INS_CALL]) {
        return Mnemonic::Call;
    }
    if one_of(&[X86_INS_LCALL]) {
        return Mnemonic::Lcall;
    }
    if one_of(&[X86_INS_RET]) {
        return Mnemonic::Ret;
    }
    if one_of(&[X86_INS_RETF, X86_INS_RETFQ]) {
        return Mnemonic::Retf;
    }
    if one_of(&[X86_INS_JMP]) {
        return Mnemonic::Jmp;
    }
    if one_of(&[
        X86_INS_JAE, X86_INS_JA, X86_INS_JBE, X86_INS_JB, X86_INS_JCXZ, X86_INS_JE,
        X86_INS_JECXZ, X86_INS_JG, X86_INS_JGE, X86_INS_JL, X86_INS_JLE, X86_INS_JNE,
        X86_INS_JNO, X86_INS_JNP, X86_INS_JNS, X86_INS_JO, X86_INS_JP, X86_INS_JRCXZ,
        X86_INS_JS,
    ]) {
        return Mnemonic::Jcc;
    }
    if one_of(&[X86_INS_IRET, X86_INS_IRETD, X86_INS_IRETQ]) {
        return Mnemonic::Iret;
    }
    if one_of(&[X86_INS_HLT]) {
        return Mnemonic::Hlt;
    }
    if one_of(&[X86_INS_IN]) {
        return Mnemonic::In;
    }
    if one_of(&[X86_INS_OUT]) {
        return Mnemonic::Out;
    }
    if one_of(&[X86_INS_INSB, X86_INS_INSW, X86_INS_INSD]) {
        return Mnemonic::Ins;
    }
    if one_of(&[X86_INS_OUTSB, X86_INS_OUTSW, X86_INS_OUTSD]) {
        return Mnemonic::Outs;
    }
    if one_of(&[X86_INS_RDMSR]) {
        return Mnemonic::Rdmsr;
    }
    if one_of(&[X86_INS_WRMSR]) {
        return Mnemonic::Wrmsr;
    }
    if one_of(&[X86_INS_RDPMC]) {
        return Mnemonic::Rdpmc;
    }
    if one_of(&[X86_INS_RDTSC]) {
        return Mnemonic::Rdtsc;
    }
    if one_of(&[X86_INS_LGDT]) {
        return Mnemonic::Lgdt;
    }
    if one_of(&[X86_INS_LLDT]) {
        return Mnemonic::Lldt;
    }
    if one_of(&[X86_INS_LTR]) {
        return Mnemonic::Ltr;
    }
    if one_of(&[X86_INS_LMSW]) {
        return Mnemonic::Lmsw;
    }
    if one_of(&[X86_INS_CLTS]) {
        return Mnemonic::Clts;
    }
    if one_of(&[X86_INS_INVD]) {
        return Mnemonic::Invd;
    }
    if one_of(&[X86_INS_INVLPG]) {
        return Mnemonic::Invlpg;
    }
    if one_of(&[X86_INS_WBINVD]) {
        return Mnemonic::Wbinvd;
    }
    Mnemonic::Other
}
