//! The section explorer and `DisasmSection`'s sorted print.

use std::io;

use log::{debug, trace};

use crate::addrmap::AddressMap;
use crate::bb::{commit_flags, disasm_bb, BB};
use crate::binary::{Binary, Section};
use crate::error::DisasmError;
use crate::strategy::DisasmStrategy;

/// One in-scope section's disassembly state: a borrowed [`Section`], its own
/// [`AddressMap`], and the committed basic blocks discovered so far.
pub struct DisasmSection<'a> {
    section: &'a Section,
    addrmap: AddressMap,
    bbs: Vec<BB>,
}

impl<'a> DisasmSection<'a> {
    pub(crate) fn new(section: &'a Section, addrmap: AddressMap) -> Self {
        Self {
            section,
            addrmap,
            bbs: Vec::new(),
        }
    }

    pub fn section(&self) -> &Section {
        self.section
    }

    pub fn addrmap(&self) -> &AddressMap {
        &self.addrmap
    }

    pub fn bbs(&self) -> &[BB] {
        &self.bbs
    }

    /// Emits committed blocks sorted ascending by `start`, one per
    /// paragraph. Does not reorder `self.bbs` in place — a sorted index is
    /// built just for this call.
    pub fn print(&self, w: &mut impl io::Write) -> io::Result<()> {
        let mut order: Vec<&BB> = self.bbs.iter().collect();
        order.sort_by_key(|bb| bb.start);
        for bb in order {
            writeln!(w, "{:#x}-{:#x}:", bb.start, bb.end)?;
            for ins in &bb.insns {
                writeln!(w, "  {:#x}: {} {}", ins.start, ins.mnemonic, ins.op_str)?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for DisasmSection<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut buf = Vec::new();
        self.print(&mut buf).map_err(|_| std::fmt::Error)?;
        f.write_str(&String::from_utf8_lossy(&buf))
    }
}

/// Drives one section's worklist: mutate -> sweep -> score -> select ->
/// commit -> enqueue successors, until the strategy yields no further
/// mutants.
pub(crate) fn disasm_section(
    binary: &Binary,
    section: &mut DisasmSection<'_>,
    strategy: &mut dyn DisasmStrategy,
) -> Result<(), DisasmError> {
    let mut queue: Vec<usize> = Vec::new();
    let mut first = true;

    loop {
        let parent_idx = if first {
            first = false;
            None
        } else if queue.is_empty() {
            break;
        } else {
            Some(queue.remove(0))
        };

        let mut mutants = {
            let parent = parent_idx.map(|i| &section.bbs[i]);
            strategy.mutate(section, parent)
        };
        if mutants.is_empty() {
            if parent_idx.is_none() {
                // No entry candidate at all: section has nothing to explore.
                break;
            }
            continue;
        }

        for mutant in mutants.iter_mut() {
            trace!("considering mutant at {:#x}", mutant.start);
            disasm_bb(binary, section, mutant)?;
            mutant.score = strategy.score(section, mutant)?;
        }

        let k = strategy.select(section, &mut mutants)?;
        let k = k.min(mutants.len());

        for mutant in mutants.into_iter().take(k) {
            if !mutant.alive {
                continue;
            }
            commit_flags(&mut section.addrmap, &mutant)?;
            debug!(
                "committed BB [{:#x}, {:#x}) insns={} score={:.2}",
                mutant.start,
                mutant.end,
                mutant.insns.len(),
                mutant.score
            );
            section.bbs.push(mutant);
            queue.push(section.bbs.len() - 1);
        }
    }

    Ok(())
}
