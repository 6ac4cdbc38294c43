//! The pluggable strategy interface and a default implementation.

use crate::addrmap::AddrFlags;
use crate::bb::BB;
use crate::error::DisasmError;
use crate::instruction::InsFlags;
use crate::section::DisasmSection;

/// The three operations an exploration heuristic must supply.
///
/// Object-safe so an engine can hold `Box<dyn DisasmStrategy>` and swap
/// heuristics at runtime without a generic parameter threading through
/// [`crate::engine::disasm`].
pub trait DisasmStrategy {
    /// Proposes mutant basic blocks. `parent` is `None` for the initial seed
    /// of a section, `Some` for every subsequent call driven off a just
    /// committed block. Returns an empty vector to signal the section is
    /// fully explored.
    fn mutate(&mut self, section: &DisasmSection<'_>, parent: Option<&BB>) -> Vec<BB>;

    /// Assigns a confidence score to a swept mutant.
    fn score(&mut self, section: &DisasmSection<'_>, mutant: &BB) -> Result<f64, DisasmError>;

    /// Inspects `mutants[..n]`, setting `alive = true` on those to commit.
    /// Returns the prefix length the caller should scan for committal.
    fn select(
        &mut self,
        section: &DisasmSection<'_>,
        mutants: &mut [BB],
    ) -> Result<usize, DisasmError>;
}

/// The default heuristic: linear sweep with fallthrough-and-branch
/// recursion. A worked example, not a claim of state-of-the-art function
/// boundary recovery.
#[derive(Debug, Default)]
pub struct LinearSweepStrategy;

impl LinearSweepStrategy {
    pub fn new() -> Self {
        Self
    }

    fn propose(&self, section: &DisasmSection<'_>, addr: u64) -> Option<BB> {
        let sec = section.section();
        if !sec.contains(addr) {
            return None;
        }
        if section
            .addrmap()
            .contains(addr)
            .then(|| section.addrmap().addr_type(addr).ok())
            .flatten()
            .is_some_and(|f| f.contains(AddrFlags::INS_START))
        {
            return None;
        }
        Some(BB::seed(addr))
    }
}

impl DisasmStrategy for LinearSweepStrategy {
    fn mutate(&mut self, section: &DisasmSection<'_>, parent: Option<&BB>) -> Vec<BB> {
        let Some(parent) = parent else {
            return self
                .propose(section, section.section().vma)
                .into_iter()
                .collect();
        };

        let mut mutants = Vec::new();
        let last = parent.insns.last();
        let unconditional_terminator = last.is_some_and(|ins| {
            ins.flags.contains(InsFlags::JMP) || ins.flags.contains(InsFlags::RET) || ins.trap
        });

        if !unconditional_terminator {
            if let Some(m) = self.propose(section, parent.end) {
                mutants.push(m);
            }
        }
        if let Some(ins) = last {
            if let Some(target) = ins.target {
                if let Some(m) = self.propose(section, target) {
                    mutants.push(m);
                }
            }
        }
        mutants
    }

    fn score(&mut self, _section: &DisasmSection<'_>, mutant: &BB) -> Result<f64, DisasmError> {
        let mut score = 1.0;
        if mutant.invalid {
            score -= 0.6;
        }
        if mutant.privileged {
            score -= 0.3;
        }
        if mutant.padding && mutant.insns.iter().all(|i| i.flags.contains(InsFlags::NOP)) {
            score -= 0.1;
        }
        Ok(score.max(0.0))
    }

    fn select(
        &mut self,
        section: &DisasmSection<'_>,
        mutants: &mut [BB],
    ) -> Result<usize, DisasmError> {
        let mut claimed_this_batch = std::collections::HashSet::new();
        for m in mutants.iter_mut() {
            let already_claimed = section
                .addrmap()
                .addr_type(m.start)
                .map(|f| f.contains(AddrFlags::BB_START))
                .unwrap_or(false);
            m.alive = m.score > 0.0 && !already_claimed && claimed_this_batch.insert(m.start);
        }
        Ok(mutants.len())
    }
}
