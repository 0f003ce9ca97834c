//! Interrupt and reset vectors at the top of bank 0.

use crate::{addr::Addr, cart::SnesMemory, metadata::MetadataSource, state::State};

/// Vector locations in bank 0 with their names. Native mode first.
pub const VECTORS: [(u16, &str); 10] = [
    (0xffe4, "COP"),
    (0xffe6, "BRK"),
    (0xffe8, "ABORT"),
    (0xffea, "NMI"),
    (0xffee, "IRQ"),
    (0xfff4, "COP (emulation)"),
    (0xfff8, "ABORT (emulation)"),
    (0xfffa, "NMI (emulation)"),
    (0xfffc, "RESET"),
    (0xfffe, "IRQ/BRK (emulation)"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vector {
    pub name: &'static str,
    pub vector_address: Addr,
    /// Where the processor jumps to. Vectors always point into bank 0.
    pub code_address: Addr,
    pub label: Option<String>,
}

impl Vector {
    fn read(
        memory: &SnesMemory,
        metadata: &dyn MetadataSource,
        offset: u16,
        name: &'static str,
    ) -> Option<Self> {
        let vector_address = Addr::new(0, offset);
        let code_address = Addr::new(0, memory.read_word(vector_address)?);
        let label = metadata
            .label(memory.to_canonical(code_address))
            .map(str::to_owned);
        Some(Self {
            name,
            vector_address,
            code_address,
            label,
        })
    }

    /// The processor state on entry: 8 bit registers.
    pub fn entry_state(&self) -> State {
        State::new(self.code_address, State::parse_flags("MX"))
    }
}

/// All readable vectors.
pub fn vectors(memory: &SnesMemory, metadata: &dyn MetadataSource) -> Vec<Vector> {
    VECTORS
        .iter()
        .filter_map(|&(offset, name)| Vector::read(memory, metadata, offset, name))
        .collect()
}

/// The vector the console starts from.
pub fn reset(memory: &SnesMemory, metadata: &dyn MetadataSource) -> Option<Vector> {
    Vector::read(memory, metadata, 0xfffc, "RESET")
}
