//! Recursive basic-block reconstruction for stripped x86 binaries.
//!
//! Given a loaded [`binary::Binary`] with no symbol table, [`engine::disasm`]
//! explores its code (and, optionally, data) sections from candidate seed
//! addresses, recovering basic blocks via a pluggable [`strategy::DisasmStrategy`].
//! The crate does not symbolicate, resolve indirect targets, reconstruct
//! functions, or rewrite code — it hands back committed blocks, their
//! instructions, and an address map a caller can build those analyses on.

pub mod addrmap;
pub mod binary;
mod bb;
mod decode;
pub mod engine;
pub mod error;
pub mod instruction;
pub mod operand;
pub mod section;
pub mod strategy;

pub use crate::bb::BB;
pub use crate::binary::{Arch, Binary, Bits, FileType, Section, SectionKind};
pub use crate::engine::{disasm, DisasmOptions};
pub use crate::error::DisasmError;
pub use crate::instruction::{InsFlags, Instruction, Mnemonic};
pub use crate::operand::{MemOperand, Operand, OperandKind, RegId};
pub use crate::section::DisasmSection;
pub use crate::strategy::{DisasmStrategy, LinearSweepStrategy};
