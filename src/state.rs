use std::sync::Arc;

use crate::{
    addr::Addr,
    pf,
    tvl::{TBool, VagueU8, VagueU16},
};

struct Node {
    value: VagueU8,
    next: Option<Arc<Node>>,
}

/// Persistent stack of bytes. Pushing and popping return new stacks that
/// share their tails with the old one.
#[derive(Clone, Default)]
pub struct Stack {
    top: Option<Arc<Node>>,
    len: usize,
}

impl Stack {
    pub const fn new() -> Self {
        Self { top: None, len: 0 }
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn top(&self) -> Option<VagueU8> {
        self.top.as_ref().map(|node| node.value)
    }

    #[must_use]
    pub fn push(&self, value: VagueU8) -> Self {
        Self {
            top: Some(Arc::new(Node {
                value,
                next: self.top.clone(),
            })),
            len: self.len + 1,
        }
    }

    /// Popping an empty stack yields an empty stack.
    #[must_use]
    pub fn pop(&self) -> Self {
        match &self.top {
            Some(node) => Self {
                top: node.next.clone(),
                len: self.len - 1,
            },
            None => Self::new(),
        }
    }

    /// From top to bottom.
    pub fn iter(&self) -> impl Iterator<Item = VagueU8> + '_ {
        core::iter::successors(self.top.as_deref(), |node| node.next.as_deref())
            .map(|node| node.value)
    }
}

/// Unlinks nodes one at a time. Dropping a long chain recursively would
/// overflow the call stack.
impl Drop for Stack {
    fn drop(&mut self) {
        let mut next = self.top.take();
        while let Some(node) = next {
            next = Arc::into_inner(node).and_then(|mut node| node.next.take());
        }
    }
}

impl PartialEq for Stack {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl Eq for Stack {}

impl core::fmt::Debug for Stack {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Bottom first, one byte per entry.
impl core::fmt::Display for Stack {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let bytes: Vec<_> = self.iter().collect();
        for (i, byte) in bytes.iter().rev().enumerate() {
            if i != 0 {
                f.write_str(" ")?;
            }
            f.write_str(&byte.to_hex_string())?;
        }
        Ok(())
    }
}

/// What is known about the processor right before executing at `address`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    pub address: Addr,
    pub flags: VagueU8,
    pub direct_page: VagueU16,
    pub stack: Stack,
    /// Address of the instruction that produced this state.
    pub origin: Option<Addr>,
}

impl State {
    pub const fn new(address: Addr, flags: VagueU8) -> Self {
        Self {
            address,
            flags,
            direct_page: VagueU16::new(0),
            stack: Stack::new(),
            origin: None,
        }
    }

    /// Parses flag strings like `MX`, `mx` or `Mx`. Uppercase sets the
    /// flag (8 bit), lowercase clears it (16 bit), absent flags are unknown.
    pub fn parse_flags(s: &str) -> VagueU8 {
        let mut flags = VagueU8::UNKNOWN;
        for (set, clear, mask) in [('M', 'm', pf::M), ('X', 'x', pf::X)] {
            if s.contains(set) {
                flags = flags.set_bits(mask);
            } else if s.contains(clear) {
                flags = flags.clear_bits(mask);
            }
        }
        flags
    }

    /// Inverse of [`State::parse_flags`].
    pub fn flags_string(&self) -> String {
        let mut out = String::new();
        for (flag, set, clear) in [(self.x(), 'X', 'x'), (self.m(), 'M', 'm')] {
            match flag {
                TBool::True => out.push(set),
                TBool::False => out.push(clear),
                TBool::Unknown => {}
            }
        }
        out
    }

    /// Accumulator is 8 bit.
    pub const fn m(&self) -> TBool {
        self.flags.get_flag(pf::M)
    }

    /// Index registers are 8 bit.
    pub const fn x(&self) -> TBool {
        self.flags.get_flag(pf::X)
    }

    pub const fn m_width(&self) -> Option<u32> {
        width(self.m())
    }

    pub const fn x_width(&self) -> Option<u32> {
        width(self.x())
    }

    pub const fn program_bank(&self) -> u8 {
        self.address.bank
    }

    // TODO: track PLB/PHK pairs so the data bank can differ from the program bank
    pub const fn data_bank(&self) -> Option<u8> {
        Some(self.program_bank())
    }

    #[must_use]
    pub fn sep(&self, mask: u8) -> Self {
        self.with_flags(self.flags.set_bits(mask))
    }

    #[must_use]
    pub fn rep(&self, mask: u8) -> Self {
        self.with_flags(self.flags.clear_bits(mask))
    }

    #[must_use]
    pub fn uncertain(&self) -> Self {
        self.with_flags(VagueU8::UNKNOWN)
    }

    #[must_use]
    pub fn with_flags(&self, flags: VagueU8) -> Self {
        Self {
            flags,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_address(&self, address: Addr) -> Self {
        Self {
            address,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_origin(&self, origin: Addr) -> Self {
        Self {
            origin: Some(origin),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn push(&self, value: VagueU8) -> Self {
        Self {
            stack: self.stack.push(value),
            ..self.clone()
        }
    }

    /// Pushes `count` unknown bytes. An unknown count leaves nothing
    /// known about the stack.
    #[must_use]
    pub fn push_unknown(&self, count: Option<u32>) -> Self {
        let Some(count) = count else {
            return self.clear_stack();
        };
        let mut stack = self.stack.clone();
        for _ in 0..count {
            stack = stack.push(VagueU8::UNKNOWN);
        }
        Self {
            stack,
            ..self.clone()
        }
    }

    /// Pops one byte. An empty stack yields an unknown byte.
    pub fn pop(&self) -> (VagueU8, Self) {
        let value = self.stack.top().unwrap_or(VagueU8::UNKNOWN);
        let state = Self {
            stack: self.stack.pop(),
            ..self.clone()
        };
        (value, state)
    }

    /// Drops `count` bytes, or everything if the count is unknown.
    #[must_use]
    pub fn pull(&self, count: Option<u32>) -> Self {
        let Some(count) = count else {
            return self.clear_stack();
        };
        let mut stack = self.stack.clone();
        for _ in 0..count {
            stack = stack.pop();
        }
        Self {
            stack,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn clear_stack(&self) -> Self {
        Self {
            stack: Stack::new(),
            ..self.clone()
        }
    }

    pub fn resolve_direct_page(&self, offset: u8) -> Option<Addr> {
        let base = self.direct_page.get()?;
        Some(Addr::new(0, base.wrapping_add(u16::from(offset))))
    }

    pub fn resolve_absolute_data(&self, offset: u16) -> Option<Addr> {
        Some(Addr::new(self.data_bank()?, offset))
    }

    pub fn resolve_absolute_code(&self, offset: u16) -> Option<Addr> {
        Some(Addr::new(self.program_bank(), offset))
    }
}

const fn width(flag: TBool) -> Option<u32> {
    match flag {
        TBool::True => Some(1),
        TBool::False => Some(2),
        TBool::Unknown => None,
    }
}

fn size_name(flag: TBool) -> &'static str {
    match flag {
        TBool::True => " 8",
        TBool::False => "16",
        TBool::Unknown => "??",
    }
}

impl core::fmt::Display for State {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "A:{} XY:{} S:{}",
            size_name(self.m()),
            size_name(self.x()),
            self.stack
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn state(flags: &str) -> State {
        State::new(Addr::new(0, 0x8000), State::parse_flags(flags))
    }

    #[test]
    fn parse_flags() {
        assert_eq!(state("MX").m_width(), Some(1));
        assert_eq!(state("MX").x_width(), Some(1));
        assert_eq!(state("mx").m_width(), Some(2));
        assert_eq!(state("M").x_width(), None);
        assert_eq!(state("").m(), TBool::Unknown);
        assert_eq!(state("Mx").flags_string(), "xM");
        assert_eq!(state("").flags_string(), "");
    }

    #[test]
    fn sep_rep() {
        let s = state("").sep(0x20);
        assert_eq!(s.m(), TBool::True);
        assert_eq!(s.x(), TBool::Unknown);
        let s = s.rep(0x30);
        assert_eq!(s.m(), TBool::False);
        assert_eq!(s.x(), TBool::False);
        assert_eq!(s.uncertain().m(), TBool::Unknown);
    }

    #[test]
    fn stack_is_persistent() {
        let base = state("MX");
        let pushed = base.push(VagueU8::new(0x12)).push(VagueU8::new(0x34));
        let (top, popped) = pushed.pop();
        assert_eq!(top, VagueU8::new(0x34));
        assert_eq!(popped.stack.len(), 1);
        assert_eq!(pushed.stack.len(), 2);
        assert!(base.stack.is_empty());
        assert_eq!(popped.stack.top(), Some(VagueU8::new(0x12)));
    }

    #[test]
    fn long_stacks_drop() {
        let mut stack = Stack::new();
        for i in 0..1_000_000u32 {
            stack = stack.push(VagueU8::new(i as u8));
        }
        let shared = stack.pop().pop();
        drop(stack);
        assert_eq!(shared.len(), 999_998);
        assert_eq!(shared.top(), Some(VagueU8::new((999_997u32 % 256) as u8)));
    }

    #[test]
    fn pop_empty_is_unknown() {
        let (value, s) = state("MX").pop();
        assert_eq!(value, VagueU8::UNKNOWN);
        assert!(s.stack.is_empty());
    }

    #[test]
    fn unknown_counts_clear() {
        let s = state("MX").push(VagueU8::new(1)).push_unknown(Some(2));
        assert_eq!(s.stack.len(), 3);
        assert!(s.push_unknown(None).stack.is_empty());
        assert_eq!(s.pull(Some(2)).stack.len(), 1);
        assert!(s.pull(None).stack.is_empty());
    }

    #[test]
    fn resolve() {
        let s = State::new(Addr::new(0x81, 0x8000), VagueU8::UNKNOWN);
        assert_eq!(s.resolve_direct_page(0x12), Some(Addr::new(0, 0x0012)));
        assert_eq!(s.resolve_absolute_data(0x1234), Some(Addr::new(0x81, 0x1234)));
        assert_eq!(s.resolve_absolute_code(0x9000), Some(Addr::new(0x81, 0x9000)));
        let unknown_dp = State {
            direct_page: VagueU16::UNKNOWN,
            ..s
        };
        assert_eq!(unknown_dp.resolve_direct_page(0x12), None);
    }

    #[test]
    fn display() {
        let s = state("Mx")
            .push(VagueU8::new(0xab))
            .push(VagueU8::UNKNOWN)
            .push(VagueU8::UNKNOWN.set_bits(0xf0));
        assert_eq!(s.to_string(), "A: 8 XY:16 S:ab ?? f?");
    }
}
