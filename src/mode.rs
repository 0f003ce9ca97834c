//! Addressing modes.
//!
//! Every mode knows its operand length, how to render its operand and which
//! address the operand refers to. Indexed and indirect forms are built by
//! wrapping a base mode.

use crate::{addr::Addr, cart::SnesMemory, metadata::MetadataSource, state::State};

/// The operand bytes of one code unit together with what is needed to
/// interpret them.
#[derive(Debug, Clone, Copy)]
pub struct Operand<'a> {
    pub bytes: &'a [u8],
    /// Index of the first operand byte: 1 for instructions, 0 for data.
    pub operand_index: usize,
    pub pre_state: Option<&'a State>,
    /// Address relative branches are computed from.
    pub relative_address: Addr,
    pub memory: &'a SnesMemory,
}

impl Operand<'_> {
    fn operand_byte(&self, i: usize) -> u8 {
        self.bytes
            .get(self.operand_index + i)
            .copied()
            .unwrap_or_default()
    }

    pub fn byte(&self) -> u8 {
        self.operand_byte(0)
    }

    pub fn byte2(&self) -> u8 {
        self.operand_byte(1)
    }

    pub fn word(&self) -> u16 {
        u16::from_le_bytes([self.operand_byte(0), self.operand_byte(1)])
    }

    pub fn long(&self) -> Addr {
        Addr::from_bytes([
            self.operand_byte(0),
            self.operand_byte(1),
            self.operand_byte(2),
        ])
    }

    pub fn signed_byte(&self) -> i8 {
        self.byte() as i8
    }

    pub fn signed_word(&self) -> i16 {
        self.word() as i16
    }
}

pub trait Mode: Send + Sync {
    /// Data modes have no opcode byte in front of the operand.
    fn data_mode(&self) -> bool {
        false
    }

    fn show_length_suffix(&self) -> bool {
        true
    }

    fn can_have_label(&self) -> bool;

    /// `None` if the length depends on a register width that is unknown.
    fn operand_length(&self, state: &State) -> Option<u32>;

    fn print_raw(&self, op: &Operand) -> String;

    fn referenced_address(&self, op: &Operand) -> Option<Addr>;

    /// The operand rendered as a label, if the referenced address has one.
    fn print_with_label(&self, op: &Operand, metadata: &dyn MetadataSource) -> Option<String> {
        let addr = self.referenced_address(op)?;
        metadata.label(op.memory.to_canonical(addr)).map(str::to_owned)
    }

    fn instruction_length(&self, state: &State) -> Option<u32> {
        let opcode_len = if self.data_mode() { 0 } else { 1 };
        Some(self.operand_length(state)? + opcode_len)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Implied;

impl Mode for Implied {
    fn show_length_suffix(&self) -> bool {
        false
    }

    fn can_have_label(&self) -> bool {
        false
    }

    fn operand_length(&self, _state: &State) -> Option<u32> {
        Some(0)
    }

    fn print_raw(&self, _op: &Operand) -> String {
        String::new()
    }

    fn referenced_address(&self, _op: &Operand) -> Option<Addr> {
        None
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Immediate8;

impl Mode for Immediate8 {
    fn show_length_suffix(&self) -> bool {
        false
    }

    fn can_have_label(&self) -> bool {
        false
    }

    fn operand_length(&self, _state: &State) -> Option<u32> {
        Some(1)
    }

    fn print_raw(&self, op: &Operand) -> String {
        format!("#${:02x}", op.byte())
    }

    fn referenced_address(&self, _op: &Operand) -> Option<Addr> {
        None
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Immediate16;

impl Mode for Immediate16 {
    fn show_length_suffix(&self) -> bool {
        false
    }

    fn can_have_label(&self) -> bool {
        false
    }

    fn operand_length(&self, _state: &State) -> Option<u32> {
        Some(2)
    }

    fn print_raw(&self, op: &Operand) -> String {
        format!("#${:04x}", op.word())
    }

    fn referenced_address(&self, _op: &Operand) -> Option<Addr> {
        None
    }
}

/// Immediate operand whose width is not known.
#[derive(Debug, Clone, Copy)]
struct ImmediateUnknown;

impl Mode for ImmediateUnknown {
    fn can_have_label(&self) -> bool {
        false
    }

    fn operand_length(&self, _state: &State) -> Option<u32> {
        None
    }

    fn print_raw(&self, _op: &Operand) -> String {
        "???".to_owned()
    }

    fn referenced_address(&self, _op: &Operand) -> Option<Addr> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidthRegister {
    /// Accumulator and memory
    M,
    /// Index registers
    X,
}

/// Immediate operand sized by the M or X flag.
#[derive(Debug, Clone, Copy)]
pub struct ImmediateSized(pub WidthRegister);

impl ImmediateSized {
    fn pick(&self, state: Option<&State>) -> &'static dyn Mode {
        let width = state.and_then(|state| match self.0 {
            WidthRegister::M => state.m_width(),
            WidthRegister::X => state.x_width(),
        });
        match width {
            Some(1) => &Immediate8,
            Some(2) => &Immediate16,
            _ => &ImmediateUnknown,
        }
    }
}

impl Mode for ImmediateSized {
    fn can_have_label(&self) -> bool {
        false
    }

    fn show_length_suffix(&self) -> bool {
        false
    }

    fn operand_length(&self, state: &State) -> Option<u32> {
        self.pick(Some(state)).operand_length(state)
    }

    fn print_raw(&self, op: &Operand) -> String {
        self.pick(op.pre_state).print_raw(op)
    }

    fn referenced_address(&self, _op: &Operand) -> Option<Addr> {
        None
    }

    fn print_with_label(&self, _op: &Operand, _metadata: &dyn MetadataSource) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Direct;

impl Mode for Direct {
    fn can_have_label(&self) -> bool {
        true
    }

    fn operand_length(&self, _state: &State) -> Option<u32> {
        Some(1)
    }

    fn print_raw(&self, op: &Operand) -> String {
        format!("${:02x}", op.byte())
    }

    fn referenced_address(&self, op: &Operand) -> Option<Addr> {
        op.pre_state?.resolve_direct_page(op.byte())
    }
}

/// Absolute data address, combined with the data bank.
#[derive(Debug, Clone, Copy)]
pub struct Absolute;

impl Mode for Absolute {
    fn can_have_label(&self) -> bool {
        true
    }

    fn operand_length(&self, _state: &State) -> Option<u32> {
        Some(2)
    }

    fn print_raw(&self, op: &Operand) -> String {
        format!("${:04x}", op.word())
    }

    fn referenced_address(&self, op: &Operand) -> Option<Addr> {
        op.pre_state?.resolve_absolute_data(op.word())
    }
}

/// Absolute code address, combined with the program bank.
#[derive(Debug, Clone, Copy)]
pub struct AbsoluteCode;

impl Mode for AbsoluteCode {
    fn can_have_label(&self) -> bool {
        true
    }

    fn operand_length(&self, _state: &State) -> Option<u32> {
        Some(2)
    }

    fn print_raw(&self, op: &Operand) -> String {
        format!("${:04x}", op.word())
    }

    fn referenced_address(&self, op: &Operand) -> Option<Addr> {
        op.pre_state?.resolve_absolute_code(op.word())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AbsoluteLong;

impl Mode for AbsoluteLong {
    fn can_have_label(&self) -> bool {
        true
    }

    fn operand_length(&self, _state: &State) -> Option<u32> {
        Some(3)
    }

    fn print_raw(&self, op: &Operand) -> String {
        format!("${:06x}", op.long().to_u32())
    }

    fn referenced_address(&self, op: &Operand) -> Option<Addr> {
        Some(op.memory.to_canonical(op.long()))
    }
}

/// Branch target with an 8 bit (`Relative`) or 16 bit (`RelativeLong`)
/// signed displacement.
#[derive(Debug, Clone, Copy)]
pub struct Relative {
    long: bool,
}

impl Relative {
    pub const SHORT: Self = Self { long: false };
    pub const LONG: Self = Self { long: true };

    const fn len(&self) -> u32 {
        if self.long { 2 } else { 1 }
    }

    fn target(&self, op: &Operand) -> Addr {
        let displacement = if self.long {
            i32::from(op.signed_word())
        } else {
            i32::from(op.signed_byte())
        };
        let target = op
            .relative_address
            .offset(displacement + 1 + self.len() as i32);
        op.memory.to_canonical(target)
    }
}

impl Mode for Relative {
    fn show_length_suffix(&self) -> bool {
        false
    }

    fn can_have_label(&self) -> bool {
        true
    }

    fn operand_length(&self, _state: &State) -> Option<u32> {
        Some(self.len())
    }

    fn print_raw(&self, op: &Operand) -> String {
        format!("${:06x}", self.target(op).to_u32())
    }

    fn referenced_address(&self, op: &Operand) -> Option<Addr> {
        Some(self.target(op))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BlockMove;

impl Mode for BlockMove {
    fn show_length_suffix(&self) -> bool {
        false
    }

    fn can_have_label(&self) -> bool {
        false
    }

    fn operand_length(&self, _state: &State) -> Option<u32> {
        Some(2)
    }

    fn print_raw(&self, op: &Operand) -> String {
        format!("#${:02x},#${:02x}", op.byte(), op.byte2())
    }

    fn referenced_address(&self, _op: &Operand) -> Option<Addr> {
        None
    }
}

/// How the value of a data block is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    /// Plain data, never a label.
    Value,
    /// Points to data.
    DataPointer,
    /// Points to code.
    CodePointer,
}

/// A 1, 2 or 3 byte data value without opcode.
#[derive(Debug, Clone, Copy)]
pub struct Data {
    pub width: u32,
    pub kind: DataKind,
}

impl Data {
    pub const fn new(width: u32, kind: DataKind) -> Self {
        Self { width, kind }
    }
}

impl Mode for Data {
    fn data_mode(&self) -> bool {
        true
    }

    fn show_length_suffix(&self) -> bool {
        false
    }

    fn can_have_label(&self) -> bool {
        self.kind != DataKind::Value
    }

    fn operand_length(&self, _state: &State) -> Option<u32> {
        Some(self.width)
    }

    fn print_raw(&self, op: &Operand) -> String {
        match self.width {
            1 => format!("${:02x}", op.byte()),
            2 => format!("${:04x}", op.word()),
            _ => format!("${:06x}", op.long().to_u32()),
        }
    }

    fn referenced_address(&self, op: &Operand) -> Option<Addr> {
        let state = op.pre_state;
        match (self.kind, self.width) {
            (DataKind::Value, _) => None,
            (_, 1) => state?.resolve_direct_page(op.byte()),
            (DataKind::DataPointer, 2) => state?.resolve_absolute_data(op.word()),
            (DataKind::CodePointer, 2) => state?.resolve_absolute_code(op.word()),
            _ => Some(op.memory.to_canonical(op.long())),
        }
    }
}

/// A mode decorated with text around its operand.
///
/// Wrapped modes refer to the same address as their parent. A `raw` wrapper
/// never shows a label.
pub struct Wrapped {
    parent: &'static dyn Mode,
    prefix: &'static str,
    suffix: &'static str,
    raw: bool,
}

impl Wrapped {
    /// `,x`
    pub const fn x(parent: &'static dyn Mode) -> Self {
        Self::new(parent, "", ",x", false)
    }

    /// `,y`
    pub const fn y(parent: &'static dyn Mode) -> Self {
        Self::new(parent, "", ",y", false)
    }

    /// `,s`
    pub const fn s(parent: &'static dyn Mode) -> Self {
        Self::new(parent, "", ",s", true)
    }

    /// `( )`
    pub const fn indirect(parent: &'static dyn Mode) -> Self {
        Self::new(parent, "(", ")", false)
    }

    /// `[ ]`
    pub const fn indirect_long(parent: &'static dyn Mode) -> Self {
        Self::new(parent, "[", "]", false)
    }

    const fn new(
        parent: &'static dyn Mode,
        prefix: &'static str,
        suffix: &'static str,
        raw: bool,
    ) -> Self {
        Self {
            parent,
            prefix,
            suffix,
            raw,
        }
    }

    fn wrap(&self, inner: String) -> String {
        format!("{}{inner}{}", self.prefix, self.suffix)
    }
}

impl Mode for Wrapped {
    fn data_mode(&self) -> bool {
        self.parent.data_mode()
    }

    fn show_length_suffix(&self) -> bool {
        self.parent.show_length_suffix()
    }

    fn can_have_label(&self) -> bool {
        !self.raw && self.parent.can_have_label()
    }

    fn operand_length(&self, state: &State) -> Option<u32> {
        self.parent.operand_length(state)
    }

    fn print_raw(&self, op: &Operand) -> String {
        self.wrap(self.parent.print_raw(op))
    }

    fn referenced_address(&self, op: &Operand) -> Option<Addr> {
        self.parent.referenced_address(op)
    }

    fn print_with_label(&self, op: &Operand, metadata: &dyn MetadataSource) -> Option<String> {
        if self.raw {
            return Some(self.print_raw(op));
        }
        self.parent
            .print_with_label(op, metadata)
            .map(|inner| self.wrap(inner))
    }
}

impl core::fmt::Debug for Wrapped {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "Wrapped({:?}, {:?})", self.prefix, self.suffix)
    }
}
