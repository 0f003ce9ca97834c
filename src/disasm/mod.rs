//! Recursive traversal disassembler.
//!
//! Starting from one processor state, instructions are decoded breadth first.
//! Fall through, branch targets and (in exhaustive mode) call and jump
//! targets are queued until nothing new is found. Every address is decoded at
//! most once, with the first state that reached it.

pub mod table;

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, trace};

use crate::{
    addr::Addr,
    cart::SnesMemory,
    instruction::{Certainty, CodeUnit, DataBlock, Instruction, PrintedCodeUnit},
    metadata::{InstructionFlag, MetadataSource},
    opcode::Continuation,
    state::State,
};

use self::table::TableLength;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Follow calls and jumps as well, not only branches.
    pub exhaustive: bool,
    /// Entries tried for a call table whose length is not annotated.
    pub guessed_table_entries: u32,
    /// Certainty lost per guessed entry.
    pub guessed_table_decay: u32,
}

impl Options {
    pub fn exhaustive() -> Self {
        Self {
            exhaustive: true,
            ..Self::default()
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            exhaustive: false,
            guessed_table_entries: 30,
            guessed_table_decay: 5,
        }
    }
}

/// The code units found by one run, in listing order.
#[derive(Debug, Clone, Default)]
pub struct Disassembly {
    units: Vec<CodeUnit>,
    known: HashSet<Addr>,
}

impl Disassembly {
    pub fn new(units: Vec<CodeUnit>) -> Self {
        let known = units.iter().filter_map(CodeUnit::address).collect();
        Self { units, known }
    }

    /// Whether an instruction or addressed data block starts at `addr`.
    pub fn contains(&self, addr: Addr) -> bool {
        self.known.contains(&addr)
    }

    /// Where the unit links to, and whether that target is part of this run.
    pub fn link(&self, unit: &CodeUnit) -> Option<(Addr, bool)> {
        let target = unit.linked_state()?.address;
        Some((target, self.contains(target)))
    }

    pub fn instruction(&self, addr: Addr) -> Option<&Instruction> {
        self.units
            .iter()
            .filter_map(CodeUnit::as_instruction)
            .find(|ins| ins.address() == addr)
    }

    pub fn iter(&self) -> core::slice::Iter<'_, CodeUnit> {
        self.units.iter()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn print(
        &self,
        memory: &SnesMemory,
        metadata: &dyn MetadataSource,
    ) -> Vec<PrintedCodeUnit> {
        self.units
            .iter()
            .map(|unit| unit.print(memory, Some(metadata)))
            .collect()
    }
}

impl<'a> IntoIterator for &'a Disassembly {
    type Item = &'a CodeUnit;
    type IntoIter = core::slice::Iter<'a, CodeUnit>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.iter()
    }
}

/// Disassembles everything reachable from `initial`.
pub fn disassemble(
    initial: State,
    memory: &SnesMemory,
    metadata: &dyn MetadataSource,
    options: &Options,
) -> Disassembly {
    debug!(
        "disassembling from {} ({}), exhaustive: {}",
        initial.address,
        initial.flags_string(),
        options.exhaustive
    );
    let mut disasm = Disassembler::new(memory, metadata, options);
    disasm.offer(initial, None);
    while !disasm.is_done() {
        disasm.step();
    }
    disasm.propagate_fatal();
    let disassembly = disasm.finish();
    debug!("found {} code units", disassembly.len());
    disassembly
}

struct Disassembler<'a> {
    memory: &'a SnesMemory,
    metadata: &'a dyn MetadataSource,
    options: &'a Options,
    queue: VecDeque<State>,
    seen: HashSet<Addr>,
    /// For every queued address, the addresses of the units that led to it.
    origins: HashMap<Addr, Vec<Addr>>,
    units: Vec<CodeUnit>,
    /// Position of each decoded instruction in `units`.
    instructions: HashMap<Addr, usize>,
}

impl<'a> Disassembler<'a> {
    fn new(
        memory: &'a SnesMemory,
        metadata: &'a dyn MetadataSource,
        options: &'a Options,
    ) -> Self {
        Self {
            memory,
            metadata,
            options,
            queue: VecDeque::new(),
            seen: HashSet::new(),
            origins: HashMap::new(),
            units: vec![],
            instructions: HashMap::new(),
        }
    }

    fn is_done(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queues `state` unless its address was queued before. The origin is
    /// recorded either way.
    fn offer(&mut self, state: State, origin: Option<Addr>) {
        let address = state.address;
        if let Some(origin) = origin {
            let origins = self.origins.entry(address).or_default();
            if !origins.contains(&origin) {
                origins.push(origin);
            }
        }
        if self.seen.insert(address) {
            self.queue.push_back(state);
        }
    }

    fn step(&mut self) {
        let Some(state) = self.queue.pop_front() else {
            return;
        };
        let mut ins = Instruction::decode(state, self.memory);
        if ins.opcode.mode.instruction_length(&ins.pre_state).is_none() {
            ins.continuation = Continuation::InsufficientData;
        }
        trace!("{}", ins.display(self.memory));

        let address = ins.address();
        let metadata = self.metadata;
        let exhaustive = self.options.exhaustive;
        let mut continuation = ins.continuation;
        let mut blocks = vec![];

        let local = self.memory.to_canonical(address);
        for flag in metadata.flags(local) {
            match flag {
                InstructionFlag::InterleavedPointerTableDispatch { start, entries } => {
                    debug!("{address}: jump through interleaved table at {start}");
                    continuation = Continuation::Stop;
                    blocks = table::interleaved(&ins, *start, *entries, self.memory);
                    if exhaustive {
                        for target in table::interleaved_targets(*start, *entries, self.memory) {
                            self.offer(ins.post_state.with_address(target), Some(address));
                        }
                    }
                    break;
                }
                // read together with the flag of the called routine
                InstructionFlag::PointerTableLength { .. } => {}
                // only matter where the routine is called
                InstructionFlag::NonReturningRoutine
                | InstructionFlag::DynamicJumpTable { .. } => {}
            }
        }

        if let Some(remote) = ins.link().map(|addr| self.memory.to_canonical(addr)) {
            for flag in metadata.flags(remote) {
                match flag {
                    InstructionFlag::DynamicJumpTable { entry } => {
                        let known = self.table_length(local);
                        let length = match known {
                            Some(entries) => TableLength::known(entries),
                            None => TableLength::guessed(
                                self.options.guessed_table_entries,
                                self.options.guessed_table_decay,
                            ),
                        };
                        debug!("{address}: call table with {} entries", length.entries);
                        continuation = Continuation::Stop;
                        let table = table::following_call(&ins, *entry, length, self.memory);
                        if exhaustive && known.is_some() {
                            self.offer_targets(&ins, &table);
                        }
                        blocks.extend(table);
                    }
                    InstructionFlag::NonReturningRoutine => {
                        debug!("{address}: call does not return");
                        continuation = Continuation::Stop;
                    }
                    InstructionFlag::InterleavedPointerTableDispatch { .. }
                    | InstructionFlag::PointerTableLength { .. } => {}
                }
            }
        }
        ins.continuation = continuation;

        if !continuation.should_stop() {
            self.offer(ins.post_state.clone(), Some(address));
        }
        if let Some(linked) = &ins.linked_state {
            if ins.opcode.branch || exhaustive {
                self.offer(linked.clone(), Some(address));
            }
        }

        self.instructions.insert(address, self.units.len());
        self.units.push(CodeUnit::Instruction(ins));
        self.units.extend(blocks.into_iter().map(CodeUnit::Data));
    }

    fn table_length(&self, addr: Addr) -> Option<u32> {
        self.metadata.flags(addr).iter().find_map(|flag| match flag {
            InstructionFlag::PointerTableLength { entries } => Some(*entries),
            _ => None,
        })
    }

    fn offer_targets(&mut self, ins: &Instruction, blocks: &[DataBlock]) {
        for block in blocks {
            if let Some(linked) = &block.linked_state {
                self.offer(ins.post_state.with_address(linked.address), Some(ins.address()));
            }
        }
    }

    /// Marks everything that only led up to a fatal instruction as probably
    /// wrong. Calls are left alone, along with whatever led to them.
    fn propagate_fatal(&mut self) {
        let mut queue: VecDeque<Addr> = self
            .units
            .iter()
            .filter_map(CodeUnit::as_instruction)
            .filter(|ins| ins.continuation == Continuation::FatalError)
            .map(Instruction::address)
            .collect();
        let mut seen: HashSet<Addr> = queue.iter().copied().collect();

        while let Some(addr) = queue.pop_front() {
            let Some(&index) = self.instructions.get(&addr) else {
                continue;
            };
            let CodeUnit::Instruction(ins) = &mut self.units[index] else {
                continue;
            };
            if ins.opcode.mnemonic.is_call() {
                continue;
            }
            ins.certainty = Certainty::PROBABLY_WRONG;
            for origin in self.origins.get(&addr).into_iter().flatten() {
                if seen.insert(*origin) {
                    queue.push_back(*origin);
                }
            }
        }
    }

    fn finish(mut self) -> Disassembly {
        self.units.sort_by_key(CodeUnit::sorted_address);
        Disassembly::new(self.units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cart::Rom,
        metadata::{Metadata, MetadataLine, PointerSize},
        opcode::Mnemonic,
    };
    use pretty_assertions::assert_eq;

    fn rom(fill: u8, patches: &[(u16, &[u8])]) -> SnesMemory {
        let mut data = vec![fill; 0x8000];
        for (addr, bytes) in patches {
            let offset = usize::from(addr - 0x8000);
            data[offset..offset + bytes.len()].copy_from_slice(bytes);
        }
        SnesMemory::lorom(Rom::from_bytes(data))
    }

    fn start(flags: &str) -> State {
        State::new(Addr::new(0, 0x8000), State::parse_flags(flags))
    }

    fn flags(entries: &[(u16, Vec<InstructionFlag>)]) -> Metadata {
        let mut metadata = Metadata::new();
        for (addr, flags) in entries {
            let line = MetadataLine {
                flags: flags.clone(),
                ..Default::default()
            };
            metadata.set(Addr::new(0, *addr), Some(line));
        }
        metadata
    }

    fn addresses(disassembly: &Disassembly) -> Vec<Option<Addr>> {
        disassembly.iter().map(CodeUnit::address).collect()
    }

    fn data_blocks(disassembly: &Disassembly) -> Vec<&DataBlock> {
        disassembly
            .iter()
            .filter_map(|unit| match unit {
                CodeUnit::Data(data) => Some(data),
                CodeUnit::Instruction(_) => None,
            })
            .collect()
    }

    #[test]
    fn zeroes_are_fatal() {
        let memory = rom(0x00, &[]);
        let result = disassemble(start("MX"), &memory, &(), &Options::default());
        assert_eq!(result.len(), 1);
        let ins = result.instruction(Addr::new(0, 0x8000)).unwrap();
        assert_eq!(ins.opcode.mnemonic, Mnemonic::Brk);
        assert_eq!(ins.continuation, Continuation::FatalError);
        assert_eq!(ins.operand_length(), Some(1));
        assert_eq!(ins.certainty, Certainty::PROBABLY_WRONG);
    }

    #[test]
    fn jump_to_self_terminates() {
        let memory = rom(0x00, &[(0x8000, &[0x4c, 0x00, 0x80])]);
        let result = disassemble(start("MX"), &memory, &(), &Options::exhaustive());
        assert_eq!(result.len(), 1);
        let unit = result.iter().next().unwrap();
        assert_eq!(
            unit.linked_state().map(|s| s.address),
            Some(Addr::new(0, 0x8000))
        );
        assert_eq!(result.link(unit), Some((Addr::new(0, 0x8000), true)));
    }

    #[test]
    fn sep_narrows_accumulator() {
        let memory = rom(0x00, &[(0x8000, &[0xe2, 0x20, 0xa9, 0x00, 0x60])]);
        let result = disassemble(start(""), &memory, &(), &Options::default());
        assert_eq!(
            addresses(&result),
            vec![
                Some(Addr::new(0, 0x8000)),
                Some(Addr::new(0, 0x8002)),
                Some(Addr::new(0, 0x8004)),
            ]
        );
        let sep = result.instruction(Addr::new(0, 0x8000)).unwrap();
        assert_eq!(sep.post_state.m_width(), Some(1));
        let lda = result.instruction(Addr::new(0, 0x8002)).unwrap();
        assert_eq!(lda.operand_length(), Some(1));
        assert_eq!(lda.bytes.as_slice(), &[0xa9, 0x00]);
    }

    #[test]
    fn unknown_width_stops() {
        // LDA # with an unknown accumulator width
        let memory = rom(0xea, &[(0x8000, &[0xa9, 0x00, 0x00])]);
        let result = disassemble(start("x"), &memory, &(), &Options::default());
        assert_eq!(result.len(), 1);
        let ins = result.instruction(Addr::new(0, 0x8000)).unwrap();
        assert_eq!(ins.continuation, Continuation::InsufficientData);
        assert_eq!(ins.bytes.as_slice(), &[0xa9]);
    }

    #[test]
    fn branches_are_followed_calls_are_not() {
        // BEQ +2; JSR $9000; RTS
        let memory = rom(
            0xea,
            &[(0x8000, &[0xf0, 0x03, 0x20, 0x00, 0x90, 0x60]), (0x9000, &[0x60])],
        );
        let result = disassemble(start("MX"), &memory, &(), &Options::default());
        assert_eq!(result.len(), 3);
        assert!(result.contains(Addr::new(0, 0x8005)));
        assert!(!result.contains(Addr::new(0, 0x9000)));
        let jsr = result.iter().nth(1).unwrap();
        assert_eq!(result.link(jsr), Some((Addr::new(0, 0x9000), false)));

        let result = disassemble(start("MX"), &memory, &(), &Options::exhaustive());
        assert_eq!(result.len(), 4);
        assert!(result.contains(Addr::new(0, 0x9000)));
    }

    #[test]
    fn visits_every_address_once() {
        // a loop with two ways back to the start
        let memory = rom(
            0xea,
            &[(0x8000, &[0xea, 0xd0, 0xfd, 0xf0, 0xfb, 0x80, 0xf9])],
        );
        let result = disassemble(start("MX"), &memory, &(), &Options::exhaustive());
        let addresses = addresses(&result);
        let unique: HashSet<_> = addresses.iter().collect();
        assert_eq!(addresses.len(), unique.len());
        assert_eq!(result.len(), 4);
    }

    #[test]
    fn fatal_propagates_backwards() {
        // NOP; NOP; BRK
        let memory = rom(0x00, &[(0x8000, &[0xea, 0xea])]);
        let result = disassemble(start("MX"), &memory, &(), &Options::default());
        let certainties: Vec<_> = result.iter().map(CodeUnit::certainty).collect();
        assert_eq!(certainties, vec![Certainty::PROBABLY_WRONG; 3]);
    }

    #[test]
    fn fatal_stops_at_calls() {
        // NOP; JSR $8006; (BRK at $8004); RTS at $8006
        let memory = rom(0x00, &[(0x8000, &[0xea, 0x20, 0x06, 0x80]), (0x8006, &[0x60])]);
        let result = disassemble(start("MX"), &memory, &(), &Options::exhaustive());
        let certainty = |addr| result.instruction(Addr::new(0, addr)).unwrap().certainty;
        assert_eq!(certainty(0x8004), Certainty::PROBABLY_WRONG);
        assert_eq!(certainty(0x8001), Certainty::PROBABLY_CORRECT);
        assert_eq!(certainty(0x8000), Certainty::PROBABLY_CORRECT);
        assert_eq!(certainty(0x8006), Certainty::PROBABLY_CORRECT);
    }

    #[test]
    fn non_returning_call() {
        let memory = rom(
            0xea,
            &[(0x8000, &[0x20, 0x00, 0x90, 0xea]), (0x9000, &[0x60])],
        );
        let metadata = flags(&[(0x9000, vec![InstructionFlag::NonReturningRoutine])]);
        let result = disassemble(start("MX"), &memory, &metadata, &Options::exhaustive());
        assert_eq!(
            addresses(&result),
            vec![Some(Addr::new(0, 0x8000)), Some(Addr::new(0, 0x9000))]
        );
        let jsr = result.instruction(Addr::new(0, 0x8000)).unwrap();
        assert_eq!(jsr.continuation, Continuation::Stop);
    }

    #[test]
    fn partially_readable_interleaved_table() {
        let memory = rom(
            0x00,
            &[
                (0x8000, &[0xdc, 0x00, 0x00]),
                (0xa000, &[0x60]),
                (0xfff9, &[0x00, 0x10, 0x20, 0xa0, 0xa0, 0xa0, 0x00]),
            ],
        );
        let metadata = flags(&[(
            0x8000,
            vec![InstructionFlag::InterleavedPointerTableDispatch {
                start: Addr::new(0, 0xfff9),
                entries: 3,
            }],
        )]);
        let result = disassemble(start("MX"), &memory, &metadata, &Options::exhaustive());
        assert_eq!(
            addresses(&result),
            vec![Some(Addr::new(0, 0x8000)), Some(Addr::new(0, 0xa000))]
        );
    }

    #[test]
    fn long_push_run_drops() {
        let memory = rom(0x48, &[]);
        let result = disassemble(start("MX"), &memory, &(), &Options::default());
        assert_eq!(result.len(), 0x8001);
        let last = result.iter().last().and_then(CodeUnit::pre_state).unwrap();
        assert_eq!(last.stack.len(), 0x8000);
        drop(result);
    }

    #[test]
    fn interleaved_table_dispatch() {
        let memory = rom(
            0x00,
            &[
                (0x8000, &[0xdc, 0x00, 0x00]),
                (0x9000, &[0x00, 0x10, 0xa0, 0xa0, 0x00, 0x00]),
                (0xa000, &[0x60]),
                (0xa010, &[0x60]),
            ],
        );
        let metadata = flags(&[(
            0x8000,
            vec![InstructionFlag::InterleavedPointerTableDispatch {
                start: Addr::new(0, 0x9000),
                entries: 2,
            }],
        )]);
        let result = disassemble(start("MX"), &memory, &metadata, &Options::exhaustive());
        assert!(result.contains(Addr::new(0, 0xa000)));
        assert!(result.contains(Addr::new(0, 0xa010)));
        let blocks = data_blocks(&result);
        let indicative: Vec<_> = blocks.iter().map(|b| b.indicative_address).collect();
        assert_eq!(indicative, vec![Addr::new(0, 0x9000), Addr::new(0, 0x9003)]);
        let jump = result.instruction(Addr::new(0, 0x8000)).unwrap();
        assert_eq!(jump.continuation, Continuation::Stop);
        assert_eq!(
            addresses(&result),
            vec![
                Some(Addr::new(0, 0x8000)),
                None,
                None,
                Some(Addr::new(0, 0xa000)),
                Some(Addr::new(0, 0xa010)),
            ]
        );

        let result = disassemble(start("MX"), &memory, &metadata, &Options::default());
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn guessed_call_table() {
        let memory = rom(
            0xea,
            &[(0x8000, &[0x22, 0x00, 0xc0, 0x00]), (0xc000, &[0x6b])],
        );
        let metadata = flags(&[(
            0xc000,
            vec![InstructionFlag::DynamicJumpTable {
                entry: PointerSize::Long,
            }],
        )]);
        let result = disassemble(start("MX"), &memory, &metadata, &Options::exhaustive());
        let blocks = data_blocks(&result);
        assert_eq!(blocks.len(), 30);
        assert_eq!(blocks[0].certainty, Certainty::UNCERTAIN);
        assert_eq!(blocks[0].address, Some(Addr::new(0, 0x8004)));
        // targets of a guessed table are not followed
        assert!(!result.contains(Addr::new(0xea, 0xeaea)));
        assert!(result.contains(Addr::new(0, 0xc000)));
        assert_eq!(result.len(), 32);
    }

    #[test]
    fn known_call_table() {
        let memory = rom(
            0x00,
            &[
                (0x8000, &[0x20, 0x00, 0xc0, 0x00, 0xa0, 0x10, 0xa0]),
                (0xa000, &[0x60]),
                (0xa010, &[0x60]),
                (0xc000, &[0x60]),
            ],
        );
        let metadata = flags(&[
            (
                0x8000,
                vec![InstructionFlag::PointerTableLength { entries: 2 }],
            ),
            (
                0xc000,
                vec![InstructionFlag::DynamicJumpTable {
                    entry: PointerSize::Word,
                }],
            ),
        ]);
        let result = disassemble(start("MX"), &memory, &metadata, &Options::exhaustive());
        let blocks = data_blocks(&result);
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| b.certainty == Certainty::PROBABLY_CORRECT));
        assert!(result.contains(Addr::new(0, 0xa000)));
        assert!(result.contains(Addr::new(0, 0xa010)));
        assert!(result.contains(Addr::new(0, 0xc000)));
        // the table is not decoded as code
        assert!(result.instruction(Addr::new(0, 0x8003)).is_none());
        let sorted: Vec<_> = result.iter().map(CodeUnit::sorted_address).collect();
        let mut expected = sorted.clone();
        expected.sort();
        assert_eq!(sorted, expected);
    }

    #[test]
    fn print_uses_labels() {
        let memory = rom(0x00, &[(0x8000, &[0x20, 0x00, 0x90]), (0x9000, &[0x60])]);
        let mut metadata = Metadata::new();
        metadata.update(
            Addr::new(0, 0x9000),
            crate::metadata::MetadataField::Label,
            "done",
        );
        let result = disassemble(start("MX"), &memory, &metadata, &Options::exhaustive());
        let printed = result.print(&memory, &metadata);
        assert_eq!(printed.len(), 3);
        assert_eq!(printed[0].operands, "done");
        assert_eq!(printed[2].label.as_deref(), Some("done"));
    }
}
