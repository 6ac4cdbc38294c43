//! Instruction data model and the (decoder-library-agnostic) classifier.
//!
//! [`classify`] is deliberately blind to `capstone`: it consumes a
//! [`DecodedView`] built by the decoder adapter (`crate::decode`) from
//! whichever concrete id/operand set that library reported, so the
//! nop/trap/call/jump predicates can be exercised in unit tests without a
//! real decode.

use bitflags::bitflags;

use crate::operand::{Operand, OperandKind, RegId};

bitflags! {
    /// Control-flow and nop classification, attached to a committed
    /// [`Instruction`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InsFlags: u8 {
        const NOP      = 0b000_0001;
        const RET      = 0b000_0010;
        const JMP      = 0b000_0100;
        const COND     = 0b000_1000;
        const CFLOW    = 0b001_0000;
        const CALL     = 0b010_0000;
        const INDIRECT = 0b100_0000;
    }
}

/// A fully decoded, classified instruction as it sits inside a [`crate::bb::BB`].
#[derive(Debug, Clone)]
pub struct Instruction {
    pub start: u64,
    pub size: u32,
    pub addr_size: u8,
    pub mnemonic: String,
    pub op_str: String,
    pub flags: InsFlags,
    pub privileged: bool,
    pub trap: bool,
    pub target: Option<u64>,
    pub operands: Vec<Operand>,
}

/// Mnemonic-level identity of a decoded instruction, independent of any
/// particular decoder library's instruction-id numbering.
///
/// `Jcc` stands for the whole conditional-jump family (`Jcc`, `JCXZ`,
/// `JECXZ`, `JRCXZ`) since the classifier treats them identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mnemonic {
    Nop,
    Fnop,
    Mov,
    Xchg,
    Lea,
    Int3,
    Ud2,
    Call,
    Lcall,
    Ret,
    Retf,
    Jmp,
    Jcc,
    Iret,
    Hlt,
    In,
    Out,
    Ins,
    Outs,
    Rdmsr,
    Wrmsr,
    Rdpmc,
    Rdtsc,
    Lgdt,
    Lldt,
    Ltr,
    Lmsw,
    Clts,
    Invd,
    Invlpg,
    Wbinvd,
    Other,
}

/// The minimal view of a decoded instruction the classifier needs: its
/// mnemonic identity and its operand list.
pub struct DecodedView<'a> {
    pub mnemonic: Mnemonic,
    pub operands: &'a [Operand],
}

/// The ten classifier booleans plus the extracted branch target, computed
/// once per decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InstructionFacts {
    pub nop: bool,
    pub semantic_nop: bool,
    pub trap: bool,
    pub ret: bool,
    pub cflow: bool,
    pub call: bool,
    pub cond: bool,
    pub jmp: bool,
    pub indirect: bool,
    pub privileged: bool,
    pub target: Option<u64>,
}

pub fn is_nop(m: Mnemonic) -> bool {
    matches!(m, Mnemonic::Nop | Mnemonic::Fnop)
}

/// Recognizes the three syntactic-nop-free idioms compilers emit for
/// padding: `MOV r,r`, `XCHG r,r`, and `LEA r,[r]` / `LEA r,[r+eiz*s+0]`.
pub fn is_semantic_nop(view: &DecodedView<'_>) -> bool {
    let [a, b] = view.operands else {
        return false;
    };
    match view.mnemonic {
        Mnemonic::Mov | Mnemonic::Xchg => match (a.kind, b.kind) {
            (OperandKind::Reg(r1), OperandKind::Reg(r2)) => r1 == r2,
            _ => false,
        },
        Mnemonic::Lea => match (a.kind, b.kind) {
            (OperandKind::Reg(r), OperandKind::Mem(mem)) => {
                mem.base == r
                    && mem.disp == 0
                    && mem.segment == RegId::INVALID
                    && (mem.index == RegId::INVALID || mem.index == RegId::ZERO_INDEX)
            }
            _ => false,
        },
        _ => false,
    }
}

pub fn is_trap(m: Mnemonic) -> bool {
    matches!(m, Mnemonic::Int3 | Mnemonic::Ud2)
}

pub fn is_call(m: Mnemonic) -> bool {
    matches!(m, Mnemonic::Call | Mnemonic::Lcall)
}

pub fn is_ret(m: Mnemonic) -> bool {
    matches!(m, Mnemonic::Ret | Mnemonic::Retf)
}

pub fn is_uncond_jmp(m: Mnemonic) -> bool {
    matches!(m, Mnemonic::Jmp)
}

/// Conditional jumps, explicitly excluding unconditional `JMP`.
pub fn is_cond_cflow(m: Mnemonic) -> bool {
    matches!(m, Mnemonic::Jcc)
}

pub fn is_cflow(m: Mnemonic) -> bool {
    is_call(m) || is_ret(m) || is_uncond_jmp(m) || is_cond_cflow(m) || matches!(m, Mnemonic::Iret)
}

pub fn is_privileged(m: Mnemonic) -> bool {
    matches!(
        m,
        Mnemonic::Hlt
            | Mnemonic::In
            | Mnemonic::Out
            | Mnemonic::Ins
            | Mnemonic::Outs
            | Mnemonic::Rdmsr
            | Mnemonic::Wrmsr
            | Mnemonic::Rdpmc
            | Mnemonic::Rdtsc
            | Mnemonic::Lgdt
            | Mnemonic::Lldt
            | Mnemonic::Ltr
            | Mnemonic::Lmsw
            | Mnemonic::Clts
            | Mnemonic::Invd
            | Mnemonic::Invlpg
            | Mnemonic::Wbinvd
    )
}

/// Computes every classifier predicate for one decoded instruction.
///
/// The binary-type-sensitive effective-nop policy is *not* applied here —
/// that belongs to the linear sweep (`crate::bb`), which is the only place
/// that knows the binary's file type.
pub fn classify(view: &DecodedView<'_>) -> InstructionFacts {
    let call = is_call(view.mnemonic);
    let ret = is_ret(view.mnemonic);
    let jmp = is_uncond_jmp(view.mnemonic);
    let cond = is_cond_cflow(view.mnemonic);
    let cflow = is_cflow(view.mnemonic);
    let indirect = cflow && view.operands.iter().any(|o| o.kind.is_reg() || o.kind.is_mem());
    let target = if cflow {
        view.operands
            .iter()
            .find_map(|o| o.kind.as_imm())
            .map(|imm| imm as u64)
    } else {
        None
    };
    InstructionFacts {
        nop: is_nop(view.mnemonic),
        semantic_nop: is_semantic_nop(view),
        trap: is_trap(view.mnemonic),
        ret,
        cflow,
        call,
        cond,
        jmp,
        indirect,
        privileged: is_privileged(view.mnemonic),
        target,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operand::MemOperand;

    fn reg(id: u16) -> Operand {
        Operand {
            kind: OperandKind::Reg(RegId(id)),
            size: 8,
        }
    }

    fn imm(v: i64) -> Operand {
        Operand {
            kind: OperandKind::Imm(v),
            size: 4,
        }
    }

    #[test]
    fn mov_self_is_semantic_nop() {
        let ops = [reg(1), reg(1)];
        let view = DecodedView {
            mnemonic: Mnemonic::Mov,
            operands: &ops,
        };
        assert!(is_semantic_nop(&view));
    }

    #[test]
    fn mov_distinct_regs_is_not_semantic_nop() {
        let ops = [reg(1), reg(2)];
        let view = DecodedView {
            mnemonic: Mnemonic::Mov,
            operands: &ops,
        };
        assert!(!is_semantic_nop(&view));
    }

    #[test]
    fn lea_own_base_zero_disp_is_semantic_nop() {
        let mem = Operand {
            kind: OperandKind::Mem(MemOperand {
                segment: RegId::INVALID,
                base: RegId(1),
                index: RegId::INVALID,
                scale: 1,
                disp: 0,
            }),
            size: 8,
        };
        let ops = [reg(1), mem];
        let view = DecodedView {
            mnemonic: Mnemonic::Lea,
            operands: &ops,
        };
        assert!(is_semantic_nop(&view));
    }

    #[test]
    fn lea_with_eiz_index_is_still_semantic_nop() {
        let mem = Operand {
            kind: OperandKind::Mem(MemOperand {
                segment: RegId::INVALID,
                base: RegId(1),
                index: RegId::ZERO_INDEX,
                scale: 1,
                disp: 0,
            }),
            size: 8,
        };
        let ops = [reg(1), mem];
        let view = DecodedView {
            mnemonic: Mnemonic::Lea,
            operands: &ops,
        };
        assert!(is_semantic_nop(&view));
    }

    #[test]
    fn lea_nonzero_disp_is_not_semantic_nop() {
        let mem = Operand {
            kind: OperandKind::Mem(MemOperand {
                segment: RegId::INVALID,
                base: RegId(1),
                index: RegId::INVALID,
                scale: 1,
                disp: 8,
            }),
            size: 8,
        };
        let ops = [reg(1), mem];
        let view = DecodedView {
            mnemonic: Mnemonic::Lea,
            operands: &ops,
        };
        assert!(!is_semantic_nop(&view));
    }

    #[test]
    fn call_with_immediate_target_is_not_indirect() {
        let ops = [imm(0x1000)];
        let view = DecodedView {
            mnemonic: Mnemonic::Call,
            operands: &ops,
        };
        let facts = classify(&view);
        assert!(facts.cflow);
        assert!(facts.call);
        assert!(!facts.indirect);
        assert_eq!(facts.target, Some(0x1000));
    }

    #[test]
    fn call_through_register_is_indirect_with_no_target() {
        let ops = [reg(1)];
        let view = DecodedView {
            mnemonic: Mnemonic::Call,
            operands: &ops,
        };
        let facts = classify(&view);
        assert!(facts.indirect);
        assert_eq!(facts.target, None);
    }

    #[test]
    fn cond_and_uncond_jump_are_mutually_exclusive() {
        assert!(is_cond_cflow(Mnemonic::Jcc));
        assert!(!is_uncond_jmp(Mnemonic::Jcc));
        assert!(is_uncond_jmp(Mnemonic::Jmp));
        assert!(!is_cond_cflow(Mnemonic::Jmp));
    }

    #[test]
    fn cflow_is_exactly_the_union_of_its_components() {
        for m in [Mnemonic::Call, Mnemonic::Ret, Mnemonic::Jmp, Mnemonic::Jcc, Mnemonic::Iret] {
            assert!(is_cflow(m), "{m:?} should be cflow");
        }
        for m in [Mnemonic::Mov, Mnemonic::Nop, Mnemonic::Hlt] {
            assert!(!is_cflow(m), "{m:?} should not be cflow");
        }
    }

    #[test]
    fn privileged_mnemonics_are_recognized() {
        for m in [
            Mnemonic::Hlt,
            Mnemonic::In,
            Mnemonic::Out,
            Mnemonic::Rdmsr,
            Mnemonic::Wrmsr,
            Mnemonic::Invlpg,
        ] {
            assert!(is_privileged(m));
        }
        assert!(!is_privileged(Mnemonic::Mov));
    }
}
