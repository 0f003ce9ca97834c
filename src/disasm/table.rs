//! Pointer tables that code jumps through.
//!
//! The tables are turned into data blocks so that they show up in the
//! listing. Every block links to the code its entry points to.

use crate::{
    addr::Addr,
    addr_space::MemorySpace,
    cart::SnesMemory,
    instruction::{Certainty, DataBlock, Instruction},
    metadata::PointerSize,
    opcode::{CODE_POINTER_LONG, CODE_POINTER_WORD},
};

/// How many entries a table following a call has and how far to trust them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLength {
    pub entries: u32,
    pub certainty: Certainty,
    /// Subtracted from the certainty after every emitted entry.
    pub decay: u32,
}

impl TableLength {
    /// The length is known from metadata.
    pub const fn known(entries: u32) -> Self {
        Self {
            entries,
            certainty: Certainty::PROBABLY_CORRECT,
            decay: 0,
        }
    }

    /// The length is a guess. Later entries are trusted less.
    pub const fn guessed(entries: u32, decay: u32) -> Self {
        Self {
            entries,
            certainty: Certainty::UNCERTAIN,
            decay,
        }
    }
}

/// Tables never span more than one bank worth of bytes.
const MAX_TABLE_BYTES: u32 = 0x1_0000;

/// Byte offsets of the low, high and bank arrays of an interleaved table.
/// `None` if the table would not fit in a bank.
fn interleaved_offsets(start: Addr, entries: u32) -> Option<[u32; 3]> {
    entries.checked_mul(3).filter(|&size| size <= MAX_TABLE_BYTES)?;
    Some([
        start.to_u32(),
        start.add24(entries).to_u32(),
        start.add24(entries * 2).to_u32(),
    ])
}

/// A table of long pointers stored as three arrays of `entries` bytes
/// each: low bytes at `start`, then high bytes, then bank bytes.
///
/// The blocks are listed right after the jumping instruction. Nothing is
/// produced if any byte of the table is unreadable.
pub fn interleaved(
    jump: &Instruction,
    start: Addr,
    entries: u32,
    memory: &SnesMemory,
) -> Vec<DataBlock> {
    let Some(offsets) = interleaved_offsets(start, entries) else {
        return vec![];
    };
    let Some(table) = memory.deinterleave(entries, &offsets).validate() else {
        return vec![];
    };
    (0..entries)
        .filter_map(|index| {
            let offset = index * 3;
            let bytes = table.slice(offset as usize, 3)?;
            let target = Addr::from_u32(bytes.get_long(0)?);
            Some(DataBlock::detached(
                &CODE_POINTER_LONG,
                bytes,
                start.add24(offset),
                jump.post_state.address.add24(offset),
                jump.address(),
                Some(linked_state(jump, target)),
                Certainty::PROBABLY_CORRECT,
            ))
        })
        .collect()
}

/// The targets of an interleaved table, read entry by entry. Entries with
/// an unreadable byte are left out.
pub fn interleaved_targets(start: Addr, entries: u32, memory: &SnesMemory) -> Vec<Addr> {
    let Some([low, high, bank]) = interleaved_offsets(start, entries) else {
        return vec![];
    };
    (0..entries)
        .filter_map(|index| {
            let read = |base: u32| memory.read(Addr::from_u32(base).add24(index));
            let bytes = [read(low)?, read(high)?, read(bank)?];
            Some(Addr::from_bytes(bytes))
        })
        .collect()
}

/// A table of code pointers placed directly after a call, as used by
/// routines that pick their return target from the data following the call.
///
/// Word pointers are combined with the program bank. Unreadable entries are
/// skipped and do not count towards the certainty decay.
pub fn following_call(
    call: &Instruction,
    entry: PointerSize,
    length: TableLength,
    memory: &SnesMemory,
) -> Vec<DataBlock> {
    let size = entry.bytes();
    let entries = length.entries.min(MAX_TABLE_BYTES / size);
    let mut certainty = length.certainty;
    let mut blocks = vec![];
    for index in 0..entries {
        let location = call.post_state.address.add24(index * size);
        let Some(bytes) = memory.range(location.to_u32(), size).validate() else {
            continue;
        };
        let (opcode, target) = match entry {
            PointerSize::Word => {
                let Some(word) = bytes.get_word(0) else {
                    continue;
                };
                let bank = call.post_state.program_bank();
                (&CODE_POINTER_WORD, Addr::new(bank, word))
            }
            PointerSize::Long => {
                let Some(long) = bytes.get_long(0) else {
                    continue;
                };
                (&CODE_POINTER_LONG, Addr::from_u32(long))
            }
        };
        blocks.push(DataBlock::new(
            opcode,
            bytes,
            location,
            call.address(),
            Some(linked_state(call, target)),
            certainty,
        ));
        certainty -= length.decay;
    }
    blocks
}

fn linked_state(ins: &Instruction, target: Addr) -> crate::state::State {
    ins.opcode
        .mutate(&ins.pre_state, &ins.bytes)
        .with_address(target)
        .with_origin(ins.address())
}
