use std::{error, fmt};

use crate::binary::Arch;

/// Errors produced while reconstructing basic blocks.
///
/// `UnsupportedArchitecture` and `UnsupportedBits` abort the whole run before
/// any section is touched; every other variant aborts only the section being
/// explored at the time (see the error-handling design: partial-section
/// results are discarded, not returned, on a per-section failure).
#[derive(Debug, Clone)]
pub enum DisasmError {
    /// The binary's CPU is not one this engine implements a sweep for.
    UnsupportedArchitecture(Arch),
    /// The binary declares a bit width other than 16/32/64.
    UnsupportedBits(u32),
    /// The decoder library failed to initialize (allocation or config error).
    DecoderInit(String),
    /// A mutant's `start` fell outside the section it was proposed for.
    OutOfSection { start: u64, section: String },
    /// A strategy's `score` or `select` reported a fatal error.
    StrategyFailed { section: String, reason: String },
    /// An address map query or mutation was attempted on an address that was
    /// never `insert`-ed into the map.
    AddressNotTracked(u64),
}

impl fmt::Display for DisasmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedArchitecture(arch) => {
                write!(f, "unsupported architecture: {arch}")
            }
            Self::UnsupportedBits(bits) => write!(f, "unsupported bit width: {bits}"),
            Self::DecoderInit(reason) => write!(f, "decoder initialization failed: {reason}"),
            Self::OutOfSection { start, section } => {
                write!(f, "seed 0x{start:x} lies outside section `{section}`")
            }
            Self::StrategyFailed { section, reason } => {
                write!(f, "strategy failed in section `{section}`: {reason}")
            }
            Self::AddressNotTracked(addr) => {
                write!(f, "address 0x{addr:x} is not tracked by the address map")
            }
        }
    }
}

impl error::Error for DisasmError {}
