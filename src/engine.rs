//! The engine orchestrator and its options value object.

use log::{info, warn};

use crate::addrmap::AddressMap;
use crate::binary::{Binary, SectionKind};
use crate::error::DisasmError;
use crate::section::{disasm_section, DisasmSection};
use crate::strategy::DisasmStrategy;

/// Process-wide knobs for a single [`disasm`] run.
#[derive(Debug, Clone, Copy)]
pub struct DisasmOptions {
    pub only_code_sections: bool,
    /// Advisory only: shapes how much detail attaches to a trace notice, it
    /// does not by itself gate which notices fire (the `log` crate's level
    /// filter does that).
    pub verbosity: u8,
}

impl Default for DisasmOptions {
    fn default() -> Self {
        Self {
            only_code_sections: true,
            verbosity: 0,
        }
    }
}

impl DisasmOptions {
    pub fn with_only_code_sections(mut self, only_code_sections: bool) -> Self {
        self.only_code_sections = only_code_sections;
        self
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }
}

/// Reconstructs basic blocks for every in-scope section of `binary`.
///
/// Aborts the whole run on an unsupported architecture or bit width before
/// touching any section; a failure while exploring one section aborts the
/// run with that section's error (partial results are not returned).
pub fn disasm<'a>(
    binary: &'a Binary,
    options: DisasmOptions,
    mut strategy: Box<dyn DisasmStrategy>,
) -> Result<Vec<DisasmSection<'a>>, DisasmError> {
    if binary.arch != crate::binary::Arch::X86 {
        return Err(DisasmError::UnsupportedArchitecture(binary.arch));
    }

    let mut sections = Vec::new();
    for section in &binary.sections {
        let in_scope = match section.kind {
            SectionKind::Code => true,
            SectionKind::Data => !options.only_code_sections,
        };
        if !in_scope {
            warn!("skipping data section `{}` (only_code_sections)", section.name);
            continue;
        }

        let mut map = AddressMap::new();
        for vma in section.vma..section.end_vma() {
            map.insert(vma);
        }
        sections.push(DisasmSection::new(section, map));
    }

    for section in sections.iter_mut() {
        info!("entering section `{}`", section.section().name);
        disasm_section(binary, section, &mut *strategy)?;
        info!(
            "finished section `{}`: {} committed blocks",
            section.section().name,
            section.bbs().len()
        );
    }

    info!("disasm run complete: {} sections processed", sections.len());
    Ok(sections)
}
