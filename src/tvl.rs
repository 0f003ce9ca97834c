//! Types using Kleene's Three-Valued logic K₃.

/// Three-Valued "bool". It can be either false, true or unknown.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TBool {
    False,
    True,
    #[default]
    Unknown,
}

impl TBool {
    pub const fn is_known(&self) -> bool {
        matches!(self, Self::False | Self::True)
    }

    pub const fn either(self, rhs: Self) -> Self {
        match (self, rhs) {
            (Self::False, Self::False) => Self::False,
            (Self::True, Self::True) => Self::True,
            _ => Self::Unknown,
        }
    }

    pub const fn get(&self) -> Option<bool> {
        match self {
            Self::False => Some(false),
            Self::True => Some(true),
            Self::Unknown => None,
        }
    }
}

impl From<bool> for TBool {
    fn from(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }
}

impl From<Option<bool>> for TBool {
    fn from(value: Option<bool>) -> Self {
        value.map_or(Self::Unknown, Self::from)
    }
}

impl core::ops::Not for TBool {
    type Output = Self;
    fn not(self) -> Self::Output {
        match self {
            Self::False => Self::True,
            Self::True => Self::False,
            Self::Unknown => Self::Unknown,
        }
    }
}

/// A number where every bit is either known or unknown.
///
/// `mask` holds the certainty: a set bit is known. Unknown bits are always
/// kept at zero in `val`.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VagueNumber<T> {
    mask: T,
    val: T,
}

pub type VagueU8 = VagueNumber<u8>;
pub type VagueU16 = VagueNumber<u16>;
pub type VagueU32 = VagueNumber<u32>;

macro_rules! impl_vague {
    ($($t:ty),*) => { $(
        impl VagueNumber<$t> {
            pub const UNKNOWN: Self = Self { mask: 0, val: 0 };

            pub const fn new(val: $t) -> Self {
                Self { mask: <$t>::MAX, val }
            }

            pub const fn is_fully_known(&self) -> bool {
                self.mask == <$t>::MAX
            }

            pub const fn is_fully_unknown(&self) -> bool {
                self.mask == 0
            }

            pub const fn get(&self) -> Option<$t> {
                if self.is_fully_known() {
                    Some(self.val)
                } else {
                    None
                }
            }

            /// The bits selected by `mask`, if all of them are known.
            pub const fn get_masked(&self, mask: $t) -> Option<$t> {
                if self.mask & mask != mask {
                    None
                } else {
                    Some(self.val & mask)
                }
            }

            /// Whether all bits in `mask` are set.
            pub const fn get_flag(&self, mask: $t) -> TBool {
                match self.get_masked(mask) {
                    Some(v) if v == mask => TBool::True,
                    Some(_) => TBool::False,
                    None => TBool::Unknown,
                }
            }

            pub const fn known_bits(&self) -> $t {
                self.mask
            }

            pub const fn known_ones(&self) -> $t {
                self.mask & self.val
            }

            pub const fn with_bits(mut self, mask: $t, val: TBool) -> Self {
                match val {
                    TBool::Unknown => {
                        self.mask &= !mask;
                        self.val &= !mask;
                    }
                    TBool::True => {
                        self.mask |= mask;
                        self.val |= mask;
                    }
                    TBool::False => {
                        self.mask |= mask;
                        self.val &= !mask;
                    }
                }
                self
            }

            /// Marks the bits in `mask` as known ones.
            pub const fn set_bits(self, mask: $t) -> Self {
                self.with_bits(mask, TBool::True)
            }

            /// Marks the bits in `mask` as known zeros.
            pub const fn clear_bits(self, mask: $t) -> Self {
                self.with_bits(mask, TBool::False)
            }

            pub const fn either(self, rhs: Self) -> Self {
                let mask = self.mask & rhs.mask & !(self.val ^ rhs.val);
                Self {
                    mask,
                    val: self.val & mask,
                }
            }
        }

        impl From<$t> for VagueNumber<$t> {
            fn from(value: $t) -> Self {
                Self::new(value)
            }
        }

        /// One character per bit, most significant first: `1`, `0` or `?`.
        impl core::fmt::Display for VagueNumber<$t> {
            fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
                use core::fmt::Write;
                for i in (0..<$t>::BITS).rev() {
                    f.write_char(match self.get_flag(1 << i) {
                        TBool::True => '1',
                        TBool::False => '0',
                        TBool::Unknown => '?',
                    })?;
                }
                Ok(())
            }
        }
    )* };
}

impl_vague!(u8, u16, u32);

impl VagueU8 {
    /// Two hex digits where unknown nibbles are shown as `?`.
    pub fn to_hex_string(&self) -> String {
        let nibble = |shift: u32| {
            if (self.mask >> shift) & 0xf == 0xf {
                format!("{:x}", (self.val >> shift) & 0xf)
            } else {
                "?".to_owned()
            }
        };
        if self.is_fully_unknown() {
            "??".to_owned()
        } else {
            nibble(4) + &nibble(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn tbool_ops() {
        assert_eq!(!TBool::True, TBool::False);
        assert_eq!(!TBool::Unknown, TBool::Unknown);
        assert_eq!(TBool::True.either(TBool::False), TBool::Unknown);
        assert_eq!(TBool::from(Some(true)), TBool::True);
        assert_eq!(TBool::from(None), TBool::Unknown);
    }

    #[test]
    fn set_and_clear_mark_certain() {
        let v = VagueU8::UNKNOWN.set_bits(0x20).clear_bits(0x10);
        assert_eq!(v.get_flag(0x20), TBool::True);
        assert_eq!(v.get_flag(0x10), TBool::False);
        assert_eq!(v.get_flag(0x01), TBool::Unknown);
        assert_eq!(v.get_masked(0x30), Some(0x20));
        assert_eq!(v.get_masked(0x31), None);
        assert_eq!(v.get(), None);
    }

    #[test]
    fn bit_independence() {
        let bases = [
            VagueU8::UNKNOWN,
            VagueU8::new(0xa5),
            VagueU8::new(0x5a).with_bits(0x0f, TBool::Unknown),
        ];
        let pairs = [(0x20u8, 0x10u8), (0xf0, 0x0f), (0x81, 0x42), (0x00, 0xff)];
        for base in bases {
            for (m1, m2) in pairs {
                assert_eq!(m1 & m2, 0);
                let v = base.set_bits(m1).clear_bits(m2);
                let rest = !(m1 | m2);
                assert_eq!(v.known_bits() & rest, base.known_bits() & rest);
                assert_eq!(v.known_ones() & rest, base.known_ones() & rest);
                assert_eq!(v.get_masked(m1), Some(m1));
                assert_eq!(v.get_masked(m2), Some(0));
            }
        }
    }

    #[test]
    fn unknown_bits_are_zeroed() {
        let v = VagueU16::new(0xffff).with_bits(0x00f0, TBool::Unknown);
        assert_eq!(v.known_ones(), 0xff0f);
        assert_eq!(v.either(VagueU16::new(0xff0f)), v);
    }

    #[test]
    fn either_forgets_differences() {
        let a = VagueU8::new(0b1100);
        let b = VagueU8::new(0b1010);
        let e = a.either(b);
        assert_eq!(e.get_flag(0b1000), TBool::True);
        assert_eq!(e.get_flag(0b0001), TBool::False);
        assert_eq!(e.get_flag(0b0100), TBool::Unknown);
        assert_eq!(e.get_flag(0b0010), TBool::Unknown);
    }

    #[test]
    fn display() {
        let v = VagueU8::UNKNOWN.set_bits(0x20).clear_bits(0x10);
        assert_eq!(v.to_string(), "??10????");
        assert_eq!(VagueU8::new(0x3c).to_hex_string(), "3c");
        assert_eq!(VagueU8::UNKNOWN.to_hex_string(), "??");
        assert_eq!(VagueU8::UNKNOWN.set_bits(0x30).clear_bits(0xc0).to_hex_string(), "3?");
    }
}
