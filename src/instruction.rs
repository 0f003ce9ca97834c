//! Decoded code units: instructions and data blocks.

use crate::{
    addr::Addr,
    addr_space::{MemorySpace, ValidMemory},
    cart::SnesMemory,
    metadata::MetadataSource,
    mode::Operand,
    opcode::{Continuation, Opcode, UNKNOWN_OPCODE},
    state::State,
};

/// How much a decoded unit can be trusted, from 0 to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Certainty(u32);

impl Certainty {
    pub const PROBABLY_CORRECT: Self = Self(100);
    pub const UNCERTAIN: Self = Self(50);
    pub const PROBABLY_WRONG: Self = Self(0);

    pub const fn value(&self) -> u32 {
        self.0
    }
}

/// Saturates at [`Certainty::PROBABLY_WRONG`].
impl core::ops::Sub<u32> for Certainty {
    type Output = Self;
    fn sub(self, rhs: u32) -> Self {
        Self(self.0.saturating_sub(rhs))
    }
}

impl core::ops::SubAssign<u32> for Certainty {
    fn sub_assign(&mut self, rhs: u32) {
        *self = *self - rhs;
    }
}

/// One decoded instruction together with the processor state around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub bytes: ValidMemory,
    pub opcode: &'static Opcode,
    pub pre_state: State,
    /// State after falling through.
    pub post_state: State,
    /// State at the jump, branch or pointer target.
    pub linked_state: Option<State>,
    pub continuation: Continuation,
    pub certainty: Certainty,
}

impl Instruction {
    pub fn new(
        bytes: ValidMemory,
        opcode: &'static Opcode,
        pre_state: State,
        continuation: Continuation,
        certainty: Certainty,
        memory: &SnesMemory,
    ) -> Self {
        let address = pre_state.address;
        let mutated = opcode.mutate(&pre_state, &bytes);
        let post_state = mutated
            .with_address(address.add24(bytes.len() as u32))
            .with_origin(address);
        let link = if opcode.link {
            let operand = Operand {
                bytes: &bytes,
                operand_index: opcode.operand_index(),
                pre_state: Some(&pre_state),
                relative_address: address,
                memory,
            };
            opcode.mode.referenced_address(&operand)
        } else {
            None
        };
        let linked_state = link.map(|target| mutated.with_address(target).with_origin(address));
        Self {
            bytes,
            opcode,
            pre_state,
            post_state,
            linked_state,
            continuation,
            certainty,
        }
    }

    /// Decodes the instruction at `state.address`.
    ///
    /// If the opcode or any operand byte is unreadable, the result is a
    /// placeholder with [`Continuation::InsufficientData`]. If the length
    /// depends on an unknown register width only the opcode byte is taken.
    pub fn decode(state: State, memory: &SnesMemory) -> Self {
        let Some(byte) = memory.read(state.address) else {
            return Self::placeholder(ValidMemory::default(), state, memory);
        };
        let opcode = Opcode::get(byte);
        let length = opcode.mode.instruction_length(&state).unwrap_or(1);
        match memory.range(state.address.to_u32(), length).validate() {
            Some(bytes) => Self::new(
                bytes,
                opcode,
                state,
                opcode.continuation,
                Certainty::PROBABLY_CORRECT,
                memory,
            ),
            None => Self::placeholder(ValidMemory::from(vec![byte]), state, memory),
        }
    }

    fn placeholder(bytes: ValidMemory, state: State, memory: &SnesMemory) -> Self {
        Self::new(
            bytes,
            &UNKNOWN_OPCODE,
            state,
            Continuation::InsufficientData,
            Certainty::PROBABLY_WRONG,
            memory,
        )
    }

    pub const fn address(&self) -> Addr {
        self.pre_state.address
    }

    /// The target this instruction links to, if any.
    pub fn link(&self) -> Option<Addr> {
        self.linked_state.as_ref().map(|state| state.address)
    }

    pub fn referenced_address(&self, memory: &SnesMemory) -> Option<Addr> {
        self.opcode.mode.referenced_address(&self.operand(memory))
    }

    pub fn operand_length(&self) -> Option<u32> {
        self.opcode.mode.operand_length(&self.pre_state)
    }

    pub fn show_length_suffix(&self) -> bool {
        self.opcode.mode.show_length_suffix() && self.opcode.mnemonic.show_length_suffix()
    }

    pub fn length_suffix(&self) -> Option<&'static str> {
        if !self.show_length_suffix() {
            return None;
        }
        match self.operand_length() {
            None => Some(".?"),
            Some(1) => Some(".b"),
            Some(2) => Some(".w"),
            Some(3) => Some(".l"),
            Some(_) => None,
        }
    }

    pub fn operand<'a>(&'a self, memory: &'a SnesMemory) -> Operand<'a> {
        Operand {
            bytes: &self.bytes,
            operand_index: self.opcode.operand_index(),
            pre_state: Some(&self.pre_state),
            relative_address: self.address(),
            memory,
        }
    }

    /// `address bytes MNEMsuffix operands (pre -> post)`
    pub fn display<'a>(&'a self, memory: &'a SnesMemory) -> impl core::fmt::Display + 'a {
        InstructionDisplay(self, memory)
    }
}

struct InstructionDisplay<'a>(&'a Instruction, &'a SnesMemory);

impl core::fmt::Display for InstructionDisplay<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let Self(ins, memory) = self;
        let unit = CodeUnit::Instruction((*ins).clone());
        let printed = unit.print(memory, None);
        write!(
            f,
            "{} {} {}{} {} ({} -> {})",
            printed.address.as_deref().unwrap_or("$xx:xxxx"),
            printed.bytes,
            printed.primary_mnemonic,
            printed.suffix.unwrap_or_default(),
            printed.operands,
            ins.pre_state,
            ins.post_state,
        )
    }
}

/// Bytes shown as data, for example the entries of a jump table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBlock {
    pub opcode: &'static Opcode,
    pub bytes: ValidMemory,
    /// `None` if the bytes do not live at a single address, as with
    /// deinterleaved tables.
    pub address: Option<Addr>,
    /// Where the metadata for this block is looked up.
    pub indicative_address: Addr,
    /// Position in the final listing.
    pub sorted_address: Addr,
    pub relative_address: Addr,
    pub linked_state: Option<State>,
    pub certainty: Certainty,
}

impl DataBlock {
    pub fn new(
        opcode: &'static Opcode,
        bytes: ValidMemory,
        address: Addr,
        relative_address: Addr,
        linked_state: Option<State>,
        certainty: Certainty,
    ) -> Self {
        Self {
            opcode,
            bytes,
            address: Some(address),
            indicative_address: address,
            sorted_address: address,
            relative_address,
            linked_state,
            certainty,
        }
    }

    /// A block without an address of its own.
    pub fn detached(
        opcode: &'static Opcode,
        bytes: ValidMemory,
        indicative_address: Addr,
        sorted_address: Addr,
        relative_address: Addr,
        linked_state: Option<State>,
        certainty: Certainty,
    ) -> Self {
        Self {
            opcode,
            bytes,
            address: None,
            indicative_address,
            sorted_address,
            relative_address,
            linked_state,
            certainty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeUnit {
    Instruction(Instruction),
    Data(DataBlock),
}

impl CodeUnit {
    pub fn address(&self) -> Option<Addr> {
        match self {
            Self::Instruction(ins) => Some(ins.address()),
            Self::Data(data) => data.address,
        }
    }

    pub fn relative_address(&self) -> Addr {
        match self {
            Self::Instruction(ins) => ins.address(),
            Self::Data(data) => data.relative_address,
        }
    }

    pub fn indicative_address(&self) -> Addr {
        match self {
            Self::Instruction(ins) => ins.address(),
            Self::Data(data) => data.indicative_address,
        }
    }

    pub fn sorted_address(&self) -> Addr {
        match self {
            Self::Instruction(ins) => ins.address(),
            Self::Data(data) => data.sorted_address,
        }
    }

    pub fn next_sorted_address(&self) -> Addr {
        match self {
            Self::Instruction(ins) => ins.post_state.address,
            Self::Data(data) => data.sorted_address.add24(data.bytes.len() as u32),
        }
    }

    pub fn pre_state(&self) -> Option<&State> {
        match self {
            Self::Instruction(ins) => Some(&ins.pre_state),
            Self::Data(_) => None,
        }
    }

    pub fn post_state(&self) -> Option<&State> {
        match self {
            Self::Instruction(ins) => Some(&ins.post_state),
            Self::Data(_) => None,
        }
    }

    pub fn linked_state(&self) -> Option<&State> {
        match self {
            Self::Instruction(ins) => ins.linked_state.as_ref(),
            Self::Data(data) => data.linked_state.as_ref(),
        }
    }

    pub fn bytes(&self) -> &ValidMemory {
        match self {
            Self::Instruction(ins) => &ins.bytes,
            Self::Data(data) => &data.bytes,
        }
    }

    pub fn opcode(&self) -> &'static Opcode {
        match self {
            Self::Instruction(ins) => ins.opcode,
            Self::Data(data) => data.opcode,
        }
    }

    pub fn certainty(&self) -> Certainty {
        match self {
            Self::Instruction(ins) => ins.certainty,
            Self::Data(data) => data.certainty,
        }
    }

    pub fn as_instruction(&self) -> Option<&Instruction> {
        match self {
            Self::Instruction(ins) => Some(ins),
            Self::Data(_) => None,
        }
    }

    pub fn operand_length(&self) -> Option<u32> {
        match self {
            Self::Instruction(ins) => ins.operand_length(),
            Self::Data(data) => Some(data.bytes.len() as u32),
        }
    }

    pub fn length_suffix(&self) -> Option<&'static str> {
        match self {
            Self::Instruction(ins) => ins.length_suffix(),
            Self::Data(_) => None,
        }
    }

    /// The operand as a number, if its length is known.
    pub fn value(&self) -> Option<u32> {
        let len = self.operand_length()? as usize;
        if len > 3 {
            return None;
        }
        let operand = self.bytes().as_slice().get(self.opcode().operand_index()..)?;
        let mut le = [0; 4];
        for (dst, src) in le.iter_mut().zip(operand.iter().take(len)) {
            *dst = *src;
        }
        Some(u32::from_le_bytes(le))
    }

    pub fn operand<'a>(&'a self, memory: &'a SnesMemory) -> Operand<'a> {
        Operand {
            bytes: self.bytes(),
            operand_index: self.opcode().operand_index(),
            pre_state: self.pre_state(),
            relative_address: self.relative_address(),
            memory,
        }
    }

    /// Hex bytes separated by spaces, padded for four bytes.
    pub fn bytes_to_string(&self) -> String {
        let hex: Vec<_> = self.bytes().iter().map(|b| format!("{b:02x}")).collect();
        format!("{:<11}", hex.join(" "))
    }

    /// Renders the unit for display. With metadata, operands referring to a
    /// labelled address show the label and the length suffix.
    pub fn print(
        &self,
        memory: &SnesMemory,
        metadata: Option<&dyn MetadataSource>,
    ) -> PrintedCodeUnit {
        let opcode = self.opcode();
        let mode = opcode.mode;
        let operand = self.operand(memory);

        let (operands, suffix) = match metadata.and_then(|m| mode.print_with_label(&operand, m)) {
            Some(labelled) => (labelled, self.length_suffix()),
            None => (mode.print_raw(&operand), None),
        };

        let own = memory.to_canonical(self.indicative_address());
        let line = metadata.and_then(|m| m.line(own));
        let label_address = if mode.can_have_label() {
            mode.referenced_address(&operand)
                .map(|addr| memory.to_canonical(addr))
        } else {
            None
        };

        PrintedCodeUnit {
            address: self.address().map(|addr| addr.to_string()),
            bytes: self.bytes_to_string(),
            label: line.and_then(|line| line.label.clone()),
            pre_comment: line.and_then(|line| line.pre_comment.clone()),
            primary_mnemonic: opcode.mnemonic.name(),
            secondary_mnemonic: opcode.mnemonic.alternative_name(),
            suffix,
            operands,
            state: self.post_state().map(|state| state.to_string()),
            comment: line.and_then(|line| line.comment.clone()),
            label_address,
            certainty: self.certainty(),
        }
    }
}

/// A code unit rendered to text, ready for a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintedCodeUnit {
    pub address: Option<String>,
    pub bytes: String,
    pub label: Option<String>,
    pub pre_comment: Option<String>,
    pub primary_mnemonic: &'static str,
    pub secondary_mnemonic: Option<&'static str>,
    pub suffix: Option<&'static str>,
    pub operands: String,
    pub state: Option<String>,
    pub comment: Option<String>,
    /// Canonical address the operand refers to.
    pub label_address: Option<Addr>,
    pub certainty: Certainty,
}
