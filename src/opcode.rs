//! The 65816 opcode table and the synthetic opcodes used for data.

use std::sync::OnceLock;

use crate::{
    mode::{
        Absolute, AbsoluteCode, AbsoluteLong, BlockMove, Data, DataKind, Direct, Immediate8,
        Immediate16, ImmediateSized, Implied, Mode, Relative, WidthRegister, Wrapped,
    },
    state::State,
    tvl::VagueU8,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mnemonic {
    Adc,
    And,
    Asl,
    Bcc,
    Bcs,
    Beq,
    Bit,
    Bmi,
    Bne,
    Bpl,
    Bra,
    Brk,
    Brl,
    Bvc,
    Bvs,
    Clc,
    Cld,
    Cli,
    Clv,
    Cmp,
    Cop,
    Cpx,
    Cpy,
    Dec,
    Dex,
    Dey,
    Eor,
    Inc,
    Inx,
    Iny,
    Jml,
    Jmp,
    Jsl,
    Jsr,
    Lda,
    Ldx,
    Ldy,
    Lsr,
    Mvn,
    Mvp,
    Nop,
    Ora,
    Pea,
    Pei,
    Per,
    Pha,
    Phb,
    Phd,
    Phk,
    Php,
    Phx,
    Phy,
    Pla,
    Plb,
    Pld,
    Plp,
    Plx,
    Ply,
    Rep,
    Rol,
    Ror,
    Rti,
    Rtl,
    Rts,
    Sbc,
    Sec,
    Sed,
    Sei,
    Sep,
    Sta,
    Stp,
    Stx,
    Sty,
    Stz,
    Tax,
    Tay,
    Tcd,
    Tcs,
    Tdc,
    Trb,
    Tsb,
    Tsc,
    Tsx,
    Txa,
    Txs,
    Txy,
    Tya,
    Tyx,
    Wai,
    Wdm,
    Xba,
    Xce,
    /// Data byte
    Db,
    /// Data word
    Dw,
    /// Data long
    Dl,
    /// Placeholder for bytes that could not be decoded
    Unknown,
}

impl Mnemonic {
    pub fn name(&self) -> &'static str {
        use Mnemonic::*;
        match self {
            Adc => "ADC",
            And => "AND",
            Asl => "ASL",
            Bcc => "BCC",
            Bcs => "BCS",
            Beq => "BEQ",
            Bit => "BIT",
            Bmi => "BMI",
            Bne => "BNE",
            Bpl => "BPL",
            Bra => "BRA",
            Brk => "BRK",
            Brl => "BRL",
            Bvc => "BVC",
            Bvs => "BVS",
            Clc => "CLC",
            Cld => "CLD",
            Cli => "CLI",
            Clv => "CLV",
            Cmp => "CMP",
            Cop => "COP",
            Cpx => "CPX",
            Cpy => "CPY",
            Dec => "DEC",
            Dex => "DEX",
            Dey => "DEY",
            Eor => "EOR",
            Inc => "INC",
            Inx => "INX",
            Iny => "INY",
            Jml => "JML",
            Jmp => "JMP",
            Jsl => "JSL",
            Jsr => "JSR",
            Lda => "LDA",
            Ldx => "LDX",
            Ldy => "LDY",
            Lsr => "LSR",
            Mvn => "MVN",
            Mvp => "MVP",
            Nop => "NOP",
            Ora => "ORA",
            Pea => "PEA",
            Pei => "PEI",
            Per => "PER",
            Pha => "PHA",
            Phb => "PHB",
            Phd => "PHD",
            Phk => "PHK",
            Php => "PHP",
            Phx => "PHX",
            Phy => "PHY",
            Pla => "PLA",
            Plb => "PLB",
            Pld => "PLD",
            Plp => "PLP",
            Plx => "PLX",
            Ply => "PLY",
            Rep => "REP",
            Rol => "ROL",
            Ror => "ROR",
            Rti => "RTI",
            Rtl => "RTL",
            Rts => "RTS",
            Sbc => "SBC",
            Sec => "SEC",
            Sed => "SED",
            Sei => "SEI",
            Sep => "SEP",
            Sta => "STA",
            Stp => "STP",
            Stx => "STX",
            Sty => "STY",
            Stz => "STZ",
            Tax => "TAX",
            Tay => "TAY",
            Tcd => "TCD",
            Tcs => "TCS",
            Tdc => "TDC",
            Trb => "TRB",
            Tsb => "TSB",
            Tsc => "TSC",
            Tsx => "TSX",
            Txa => "TXA",
            Txs => "TXS",
            Txy => "TXY",
            Tya => "TYA",
            Tyx => "TYX",
            Wai => "WAI",
            Wdm => "WDM",
            Xba => "XBA",
            Xce => "XCE",
            Db => "db",
            Dw => "dw",
            Dl => "dl",
            Unknown => "???",
        }
    }

    /// e.g. `BLT` for `BCC`
    pub fn alternative_name(&self) -> Option<&'static str> {
        match self {
            Self::Bcc => Some("BLT"),
            Self::Bcs => Some("BGE"),
            _ => None,
        }
    }

    /// Jumps, calls and data directives have a fixed operand size that is
    /// implied by the mnemonic.
    pub fn show_length_suffix(&self) -> bool {
        use Mnemonic::*;
        !matches!(self, Jmp | Jml | Jsr | Jsl | Pea | Pei | Db | Dw | Dl)
    }

    pub fn is_call(&self) -> bool {
        matches!(self, Self::Jsr | Self::Jsl)
    }
}

impl core::fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether control flow falls through past an instruction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Continuation {
    #[default]
    Continue,
    /// Subroutine calls. The callee might never return.
    MayStop,
    Stop,
    FatalError,
    InsufficientData,
}

impl Continuation {
    pub const fn should_stop(&self) -> bool {
        matches!(self, Self::Stop | Self::FatalError | Self::InsufficientData)
    }
}

/// Computes the state after an instruction from its pre state and bytes.
/// The address is advanced by the caller.
pub type Mutation = fn(&State, &[u8]) -> State;

#[derive(Clone, Copy)]
pub struct Opcode {
    pub mnemonic: Mnemonic,
    pub mode: &'static dyn Mode,
    pub continuation: Continuation,
    /// The referenced address is a jump, branch or pointer target.
    pub link: bool,
    /// The referenced address is followed even outside exhaustive mode.
    pub branch: bool,
    mutation: Option<Mutation>,
}

impl Opcode {
    const fn new(mnemonic: Mnemonic, mode: &'static dyn Mode) -> Self {
        Self {
            mnemonic,
            mode,
            continuation: Continuation::Continue,
            link: false,
            branch: false,
            mutation: None,
        }
    }

    const fn stop(mut self) -> Self {
        self.continuation = Continuation::Stop;
        self
    }

    const fn may_stop(mut self) -> Self {
        self.continuation = Continuation::MayStop;
        self
    }

    const fn fatal(mut self) -> Self {
        self.continuation = Continuation::FatalError;
        self
    }

    const fn insufficient_data(mut self) -> Self {
        self.continuation = Continuation::InsufficientData;
        self
    }

    const fn linking(mut self) -> Self {
        self.link = true;
        self
    }

    const fn branching(mut self) -> Self {
        self.link = true;
        self.branch = true;
        self
    }

    const fn mutating(mut self, mutation: Mutation) -> Self {
        self.mutation = Some(mutation);
        self
    }

    /// 0 for data, 1 for real instructions.
    pub fn operand_index(&self) -> usize {
        if self.mode.data_mode() { 0 } else { 1 }
    }

    /// Applies the register and stack effects of this opcode.
    pub fn mutate(&self, state: &State, bytes: &[u8]) -> State {
        match self.mutation {
            Some(mutation) => mutation(state, bytes),
            None => state.clone(),
        }
    }

    /// Looks up the opcode for a byte value.
    pub fn get(byte: u8) -> &'static Self {
        &table()[usize::from(byte)]
    }
}

impl core::fmt::Debug for Opcode {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Opcode")
            .field("mnemonic", &self.mnemonic)
            .field("continuation", &self.continuation)
            .field("link", &self.link)
            .field("branch", &self.branch)
            .finish_non_exhaustive()
    }
}

/// Opcodes are equal when they decode and render the same way.
impl PartialEq for Opcode {
    fn eq(&self, other: &Self) -> bool {
        self.mnemonic == other.mnemonic
            && self.continuation == other.continuation
            && self.link == other.link
            && self.branch == other.branch
            && core::ptr::addr_eq(self.mode, other.mode)
    }
}

impl Eq for Opcode {}

pub static UNKNOWN_OPCODE: Opcode = Opcode::new(Mnemonic::Unknown, &Implied).insufficient_data();

static VALUE_BYTE: Data = Data::new(1, DataKind::Value);
static VALUE_WORD: Data = Data::new(2, DataKind::Value);
static VALUE_LONG: Data = Data::new(3, DataKind::Value);
static DATA_POINTER_WORD_MODE: Data = Data::new(2, DataKind::DataPointer);
static DATA_POINTER_LONG_MODE: Data = Data::new(3, DataKind::DataPointer);
static CODE_POINTER_WORD_MODE: Data = Data::new(2, DataKind::CodePointer);
static CODE_POINTER_LONG_MODE: Data = Data::new(3, DataKind::CodePointer);

pub static DATA_BYTE: Opcode = Opcode::new(Mnemonic::Db, &VALUE_BYTE);
pub static DATA_WORD: Opcode = Opcode::new(Mnemonic::Dw, &VALUE_WORD);
pub static DATA_LONG: Opcode = Opcode::new(Mnemonic::Dl, &VALUE_LONG);
pub static DATA_POINTER_WORD: Opcode =
    Opcode::new(Mnemonic::Dw, &DATA_POINTER_WORD_MODE).linking();
pub static DATA_POINTER_LONG: Opcode =
    Opcode::new(Mnemonic::Dl, &DATA_POINTER_LONG_MODE).linking();
pub static CODE_POINTER_WORD: Opcode =
    Opcode::new(Mnemonic::Dw, &CODE_POINTER_WORD_MODE).linking();
pub static CODE_POINTER_LONG: Opcode =
    Opcode::new(Mnemonic::Dl, &CODE_POINTER_LONG_MODE).linking();

static IMMEDIATE_M: ImmediateSized = ImmediateSized(WidthRegister::M);
static IMMEDIATE_X: ImmediateSized = ImmediateSized(WidthRegister::X);
static RELATIVE: Relative = Relative::SHORT;
static RELATIVE_LONG: Relative = Relative::LONG;

static DIRECT_X: Wrapped = Wrapped::x(&Direct);
static DIRECT_Y: Wrapped = Wrapped::y(&Direct);
static DIRECT_S: Wrapped = Wrapped::s(&Direct);
static DIRECT_X_INDIRECT: Wrapped = Wrapped::indirect(&DIRECT_X);
static DIRECT_INDIRECT: Wrapped = Wrapped::indirect(&Direct);
static DIRECT_INDIRECT_Y: Wrapped = Wrapped::y(&DIRECT_INDIRECT);
static DIRECT_INDIRECT_LONG: Wrapped = Wrapped::indirect_long(&Direct);
static DIRECT_INDIRECT_LONG_Y: Wrapped = Wrapped::y(&DIRECT_INDIRECT_LONG);
static DIRECT_S_INDIRECT: Wrapped = Wrapped::indirect(&DIRECT_S);
static DIRECT_S_INDIRECT_Y: Wrapped = Wrapped::y(&DIRECT_S_INDIRECT);
static ABSOLUTE_X: Wrapped = Wrapped::x(&Absolute);
static ABSOLUTE_Y: Wrapped = Wrapped::y(&Absolute);
static ABSOLUTE_INDIRECT: Wrapped = Wrapped::indirect(&Absolute);
static ABSOLUTE_X_INDIRECT: Wrapped = Wrapped::indirect(&ABSOLUTE_X);
static ABSOLUTE_INDIRECT_LONG: Wrapped = Wrapped::indirect_long(&Absolute);
static ABSOLUTE_LONG_X: Wrapped = Wrapped::x(&AbsoluteLong);

fn table() -> &'static [Opcode; 256] {
    static TABLE: OnceLock<[Opcode; 256]> = OnceLock::new();
    TABLE.get_or_init(build_table)
}

/// The accumulator group shares one layout of addressing modes relative to
/// its base opcode. STA has no immediate form.
fn alu_group(table: &mut [Opcode; 256], base: u8, mnemonic: Mnemonic) {
    let modes: [(u8, &'static dyn Mode); 15] = [
        (0x01, &DIRECT_X_INDIRECT),
        (0x03, &DIRECT_S),
        (0x05, &Direct),
        (0x07, &DIRECT_INDIRECT_LONG),
        (0x09, &IMMEDIATE_M),
        (0x0d, &Absolute),
        (0x0f, &AbsoluteLong),
        (0x11, &DIRECT_INDIRECT_Y),
        (0x12, &DIRECT_INDIRECT),
        (0x13, &DIRECT_S_INDIRECT_Y),
        (0x15, &DIRECT_X),
        (0x17, &DIRECT_INDIRECT_LONG_Y),
        (0x19, &ABSOLUTE_Y),
        (0x1d, &ABSOLUTE_X),
        (0x1f, &ABSOLUTE_LONG_X),
    ];
    for (offset, mode) in modes {
        if mnemonic == Mnemonic::Sta && offset == 0x09 {
            continue;
        }
        table[usize::from(base + offset)] = Opcode::new(mnemonic, mode);
    }
}

fn build_table() -> [Opcode; 256] {
    use Mnemonic::*;

    let mut t = [UNKNOWN_OPCODE; 256];
    let mut add = |byte: u8, opcode: Opcode| t[usize::from(byte)] = opcode;
    let op = Opcode::new;

    add(0x00, op(Brk, &Immediate8).fatal());
    add(0x02, op(Cop, &Immediate8).fatal());
    add(0x42, op(Wdm, &Immediate8).fatal());
    add(0xdb, op(Stp, &Implied).fatal());

    add(0xea, op(Nop, &Implied));
    add(0xcb, op(Wai, &Implied));

    add(0x10, op(Bpl, &RELATIVE).branching());
    add(0x30, op(Bmi, &RELATIVE).branching());
    add(0x50, op(Bvc, &RELATIVE).branching());
    add(0x70, op(Bvs, &RELATIVE).branching());
    add(0x80, op(Bra, &RELATIVE).branching().stop());
    add(0x90, op(Bcc, &RELATIVE).branching());
    add(0xb0, op(Bcs, &RELATIVE).branching());
    add(0xd0, op(Bne, &RELATIVE).branching());
    add(0xf0, op(Beq, &RELATIVE).branching());
    add(0x82, op(Brl, &RELATIVE_LONG).branching().stop());

    add(0x4c, op(Jmp, &AbsoluteCode).linking().stop());
    add(0x5c, op(Jml, &AbsoluteLong).linking().stop());
    add(0x6c, op(Jmp, &ABSOLUTE_INDIRECT).stop());
    add(0x7c, op(Jmp, &ABSOLUTE_X_INDIRECT).stop());
    add(0xdc, op(Jmp, &ABSOLUTE_INDIRECT_LONG).stop());

    add(0x22, op(Jsl, &AbsoluteLong).linking().may_stop());
    add(0x20, op(Jsr, &AbsoluteCode).linking().may_stop());
    add(0xfc, op(Jsr, &ABSOLUTE_X_INDIRECT).may_stop());

    add(0x60, op(Rts, &Implied).stop());
    add(0x6b, op(Rtl, &Implied).stop());
    add(0x40, op(Rti, &Implied).stop());

    for (byte, mnemonic) in [
        (0x1b, Tcs),
        (0x3b, Tsc),
        (0x5b, Tcd),
        (0x7b, Tdc),
        (0xaa, Tax),
        (0xa8, Tay),
        (0xba, Tsx),
        (0x8a, Txa),
        (0x9a, Txs),
        (0x9b, Txy),
        (0x98, Tya),
        (0xbb, Tyx),
        (0xeb, Xba),
        (0x18, Clc),
        (0x38, Sec),
        (0x58, Cli),
        (0x78, Sei),
        (0xf8, Sed),
        (0xd8, Cld),
        (0xb8, Clv),
        (0xfb, Xce),
        (0xca, Dex),
        (0x88, Dey),
        (0xe8, Inx),
        (0xc8, Iny),
    ] {
        add(byte, op(mnemonic, &Implied));
    }

    add(
        0xe2,
        op(Sep, &Immediate8).mutating(|s, b| b.get(1).map_or_else(|| s.clone(), |&m| s.sep(m))),
    );
    add(
        0xc2,
        op(Rep, &Immediate8).mutating(|s, b| b.get(1).map_or_else(|| s.clone(), |&m| s.rep(m))),
    );

    add(0xe0, op(Cpx, &IMMEDIATE_X));
    add(0xe4, op(Cpx, &Direct));
    add(0xec, op(Cpx, &Absolute));
    add(0xc0, op(Cpy, &IMMEDIATE_X));
    add(0xc4, op(Cpy, &Direct));
    add(0xcc, op(Cpy, &Absolute));

    add(0xa2, op(Ldx, &IMMEDIATE_X));
    add(0xa6, op(Ldx, &Direct));
    add(0xae, op(Ldx, &Absolute));
    add(0xb6, op(Ldx, &DIRECT_Y));
    add(0xbe, op(Ldx, &ABSOLUTE_Y));
    add(0xa0, op(Ldy, &IMMEDIATE_X));
    add(0xa4, op(Ldy, &Direct));
    add(0xac, op(Ldy, &Absolute));
    add(0xb4, op(Ldy, &DIRECT_X));
    add(0xbc, op(Ldy, &ABSOLUTE_X));

    add(0x86, op(Stx, &Direct));
    add(0x8e, op(Stx, &Absolute));
    add(0x96, op(Stx, &DIRECT_Y));
    add(0x84, op(Sty, &Direct));
    add(0x8c, op(Sty, &Absolute));
    add(0x94, op(Sty, &DIRECT_X));
    add(0x64, op(Stz, &Direct));
    add(0x74, op(Stz, &DIRECT_X));
    add(0x9c, op(Stz, &Absolute));
    add(0x9e, op(Stz, &ABSOLUTE_X));

    add(0x48, op(Pha, &Implied).mutating(|s, _| s.push_unknown(s.m_width())));
    add(0xda, op(Phx, &Implied).mutating(|s, _| s.push_unknown(s.x_width())));
    add(0x5a, op(Phy, &Implied).mutating(|s, _| s.push_unknown(s.x_width())));
    add(0x68, op(Pla, &Implied).mutating(|s, _| s.pull(s.m_width())));
    add(0xfa, op(Plx, &Implied).mutating(|s, _| s.pull(s.x_width())));
    add(0x7a, op(Ply, &Implied).mutating(|s, _| s.pull(s.x_width())));

    add(0x8b, op(Phb, &Implied).mutating(|s, _| s.push_unknown(Some(1))));
    add(0xab, op(Plb, &Implied).mutating(|s, _| s.pull(Some(1))));
    add(0x0b, op(Phd, &Implied).mutating(|s, _| s.push_unknown(Some(2))));
    add(0x2b, op(Pld, &Implied).mutating(|s, _| s.pull(Some(2))));
    add(0x4b, op(Phk, &Implied).mutating(|s, _| s.push(VagueU8::new(s.program_bank()))));
    add(0x08, op(Php, &Implied).mutating(|s, _| s.push(s.flags)));
    add(
        0x28,
        op(Plp, &Implied).mutating(|s, _| {
            let (flags, s) = s.pop();
            s.with_flags(flags)
        }),
    );

    add(0x3a, op(Dec, &Implied));
    add(0xc6, op(Dec, &Direct));
    add(0xce, op(Dec, &Absolute));
    add(0xd6, op(Dec, &DIRECT_X));
    add(0xde, op(Dec, &ABSOLUTE_X));
    add(0x1a, op(Inc, &Implied));
    add(0xe6, op(Inc, &Direct));
    add(0xee, op(Inc, &Absolute));
    add(0xf6, op(Inc, &DIRECT_X));
    add(0xfe, op(Inc, &ABSOLUTE_X));

    for (base, mnemonic) in [(0x00, Asl), (0x40, Lsr), (0x20, Rol), (0x60, Ror)] {
        add(base + 0x06, op(mnemonic, &Direct));
        add(base + 0x0a, op(mnemonic, &Implied));
        add(base + 0x0e, op(mnemonic, &Absolute));
        add(base + 0x16, op(mnemonic, &DIRECT_X));
        add(base + 0x1e, op(mnemonic, &ABSOLUTE_X));
    }

    add(0x14, op(Trb, &Direct));
    add(0x1c, op(Trb, &Absolute));
    add(0x04, op(Tsb, &Direct));
    add(0x0c, op(Tsb, &Absolute));

    add(0x24, op(Bit, &Direct));
    add(0x2c, op(Bit, &Absolute));
    add(0x34, op(Bit, &DIRECT_X));
    add(0x3c, op(Bit, &ABSOLUTE_X));
    add(0x89, op(Bit, &IMMEDIATE_M));

    add(0x54, op(Mvn, &BlockMove));
    add(0x44, op(Mvp, &BlockMove));

    add(0xf4, op(Pea, &Immediate16));
    add(0xd4, op(Pei, &Direct));
    add(0x62, op(Per, &RELATIVE_LONG));

    for (base, mnemonic) in [
        (0x00, Ora),
        (0x20, And),
        (0x40, Eor),
        (0x60, Adc),
        (0x80, Sta),
        (0xa0, Lda),
        (0xc0, Cmp),
        (0xe0, Sbc),
    ] {
        alu_group(&mut t, base, mnemonic);
    }

    t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::Addr;
    use pretty_assertions::assert_eq;

    fn state(flags: &str) -> State {
        State::new(Addr::new(0x80, 0x8000), State::parse_flags(flags))
    }

    #[test]
    fn table_is_complete() {
        for byte in 0..=255u8 {
            assert_ne!(Opcode::get(byte).mnemonic, Mnemonic::Unknown, "{byte:02x}");
        }
    }

    #[test]
    fn equality() {
        assert_eq!(Opcode::get(0xa9), Opcode::get(0xa9));
        assert_eq!(*Opcode::get(0xa9), *Opcode::get(0xa9));
        assert_ne!(Opcode::get(0xa9), Opcode::get(0xa5));
        assert_ne!(DATA_WORD, CODE_POINTER_WORD);
        assert_ne!(UNKNOWN_OPCODE, *Opcode::get(0x42));
    }

    #[test]
    fn mnemonics() {
        let expect = [
            (0x00, Mnemonic::Brk),
            (0x01, Mnemonic::Ora),
            (0x1f, Mnemonic::Ora),
            (0x3d, Mnemonic::And),
            (0x5f, Mnemonic::Eor),
            (0x69, Mnemonic::Adc),
            (0x81, Mnemonic::Sta),
            (0x89, Mnemonic::Bit),
            (0x9f, Mnemonic::Sta),
            (0xa9, Mnemonic::Lda),
            (0xc9, Mnemonic::Cmp),
            (0xff, Mnemonic::Sbc),
            (0x0a, Mnemonic::Asl),
            (0x7e, Mnemonic::Ror),
            (0xfc, Mnemonic::Jsr),
            (0x62, Mnemonic::Per),
        ];
        for (byte, mnemonic) in expect {
            assert_eq!(Opcode::get(byte).mnemonic, mnemonic, "{byte:02x}");
        }
    }

    #[test]
    fn lengths() {
        let mx = state("MX");
        let mx16 = state("mx");
        let unknown = state("");
        let len = |byte: u8, s: &State| Opcode::get(byte).mode.instruction_length(s);
        assert_eq!(len(0xea, &mx), Some(1));
        assert_eq!(len(0xa9, &mx), Some(2));
        assert_eq!(len(0xa9, &mx16), Some(3));
        assert_eq!(len(0xa9, &unknown), None);
        assert_eq!(len(0xa2, &mx), Some(2));
        assert_eq!(len(0xa2, &state("Mx")), Some(3));
        assert_eq!(len(0xe2, &unknown), Some(2));
        assert_eq!(len(0x22, &unknown), Some(4));
        assert_eq!(len(0x82, &unknown), Some(3));
        assert_eq!(len(0x54, &unknown), Some(3));
        assert_eq!(len(0xb7, &unknown), Some(2));
        assert_eq!(len(0xbf, &unknown), Some(4));
        assert_eq!(len(0xfc, &unknown), Some(3));
    }

    #[test]
    fn control_flow() {
        let jmp = Opcode::get(0x4c);
        assert!(jmp.link && !jmp.branch);
        assert_eq!(jmp.continuation, Continuation::Stop);
        let beq = Opcode::get(0xf0);
        assert!(beq.link && beq.branch);
        assert_eq!(beq.continuation, Continuation::Continue);
        assert_eq!(Opcode::get(0x80).continuation, Continuation::Stop);
        assert_eq!(Opcode::get(0x20).continuation, Continuation::MayStop);
        assert_eq!(Opcode::get(0xfc).continuation, Continuation::MayStop);
        assert!(!Opcode::get(0xfc).link);
        assert_eq!(Opcode::get(0x7c).continuation, Continuation::Stop);
        assert_eq!(Opcode::get(0xdb).continuation, Continuation::FatalError);
        assert!(Continuation::InsufficientData.should_stop());
        assert!(!Continuation::MayStop.should_stop());
    }

    #[test]
    fn mutations() {
        let s = state("");
        let sep = Opcode::get(0xe2).mutate(&s, &[0xe2, 0x20]);
        assert_eq!(sep.m_width(), Some(1));
        assert_eq!(sep.x_width(), None);
        let rep = Opcode::get(0xc2).mutate(&sep, &[0xc2, 0x30]);
        assert_eq!(rep.m_width(), Some(2));
        assert_eq!(rep.x_width(), Some(2));

        let pushed = Opcode::get(0x48).mutate(&rep, &[0x48]);
        assert_eq!(pushed.stack.len(), 2);
        let pulled = Opcode::get(0xfa).mutate(&pushed, &[0xfa]);
        assert!(pulled.stack.is_empty());

        let phk = Opcode::get(0x4b).mutate(&s, &[0x4b]);
        assert_eq!(phk.stack.top(), Some(VagueU8::new(0x80)));

        let php = Opcode::get(0x08).mutate(&sep, &[0x08]);
        let plp = Opcode::get(0x28).mutate(&php.rep(0x20), &[0x28]);
        assert_eq!(plp.m_width(), Some(1));
        assert!(plp.stack.is_empty());
    }

    #[test]
    fn names() {
        assert_eq!(Mnemonic::Bcc.to_string(), "BCC");
        assert_eq!(Mnemonic::Bcc.alternative_name(), Some("BLT"));
        assert_eq!(Mnemonic::Dl.name(), "dl");
        assert!(!Mnemonic::Jsl.show_length_suffix());
        assert!(Mnemonic::Lda.show_length_suffix());
        assert!(Mnemonic::Jsl.is_call() && !Mnemonic::Jml.is_call());
    }
}
