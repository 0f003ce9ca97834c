use bytemuck::*;

/// A 24 bit address as seen by the CPU, split into bank and offset.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Zeroable)]
pub struct Addr {
    pub bank: u8,
    pub addr: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid address `{0}`")]
pub struct ParseAddrError(pub String);

impl Addr {
    pub const NULL: Self = Self::new(0, 0);
    pub const MAX: Self = Self::new(0xff, 0xffff);

    pub const fn new(bank: u8, addr: u16) -> Self {
        Self { bank, addr }
    }

    pub const fn from_bytes(bytes: [u8; 3]) -> Self {
        let [addr @ .., bank] = bytes;
        Self {
            bank,
            addr: u16::from_le_bytes(addr),
        }
    }

    pub const fn into_bytes(self) -> [u8; 3] {
        let [lo, hi] = self.addr.to_le_bytes();
        [lo, hi, self.bank]
    }

    pub const fn to_u32(&self) -> u32 {
        let [lo, hi, ba] = self.into_bytes();
        u32::from_le_bytes([lo, hi, ba, 0])
    }

    pub const fn from_u32(n: u32) -> Self {
        let [bytes @ .., _] = n.to_le_bytes();
        Self::from_bytes(bytes)
    }

    /// Same bank, different offset.
    pub const fn within_bank(self, addr: u16) -> Self {
        Self::new(self.bank, addr)
    }

    pub const fn add16(mut self, val: u16) -> Self {
        self.addr = self.addr.wrapping_add(val);
        self
    }

    pub const fn add24(self, val: u32) -> Self {
        Self::from_u32(self.to_u32().wrapping_add(val))
    }

    pub const fn sub24(self, val: u32) -> Self {
        Self::from_u32(self.to_u32().wrapping_sub(val))
    }

    /// Signed offset, wrapping around the 24 bit space.
    pub const fn offset(self, val: i32) -> Self {
        self.add24(val as u32)
    }

    pub const fn distance_to(self, other: Self) -> u32 {
        self.to_u32().abs_diff(other.to_u32())
    }

    /// Six hex digits without separators, e.g. `008000`.
    pub fn to_simple_string(&self) -> String {
        format!("{:06x}", self.to_u32())
    }

    /// Parses a hexadecimal address. A leading `$` and a `:` between bank and
    /// offset are accepted, so `$00:8000`, `00:8000` and `8000` all work.
    pub fn parse(s: &str) -> Result<Self, ParseAddrError> {
        let digits: String = s
            .trim()
            .trim_start_matches('$')
            .chars()
            .filter(|&c| c != ':')
            .collect();
        if digits.is_empty() || digits.len() > 6 {
            return Err(ParseAddrError(s.to_owned()));
        }
        u32::from_str_radix(&digits, 16)
            .map(Self::from_u32)
            .map_err(|_| ParseAddrError(s.to_owned()))
    }
}

impl core::str::FromStr for Addr {
    type Err = ParseAddrError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl core::fmt::Display for Addr {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "${:02x}:{:04x}", self.bank, self.addr)
    }
}

impl core::fmt::Debug for Addr {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{:02x}:{:04x}", self.bank, self.addr)
    }
}

impl serde::Serialize for Addr {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_simple_string())
    }
}

impl<'de> serde::Deserialize<'de> for Addr {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
