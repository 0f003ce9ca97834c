//! Byte addressable memory spaces and views over them.

use std::sync::Arc;

/// A sized span of bytes where every single byte may or may not be readable.
pub trait MemorySpace {
    fn size(&self) -> u32;

    fn get(&self, offset: u32) -> Option<u8>;

    /// Little endian 16 bit read.
    fn get_word(&self, offset: u32) -> Option<u16> {
        Some(u16::from_le_bytes([
            self.get(offset)?,
            self.get(offset.wrapping_add(1))?,
        ]))
    }

    /// Little endian 24 bit read.
    fn get_long(&self, offset: u32) -> Option<u32> {
        Some(u32::from_le_bytes([
            self.get(offset)?,
            self.get(offset.wrapping_add(1))?,
            self.get(offset.wrapping_add(2))?,
            0,
        ]))
    }

    /// A view of `len` bytes starting at `start`. Nothing is checked up front.
    fn range(self, start: u32, len: u32) -> MemoryRange<Self>
    where
        Self: Sized,
    {
        MemoryRange {
            parent: self,
            start,
            len,
        }
    }

    /// Reassembles a table that is stored as `offsets.len()` separate
    /// arrays of `entries` bytes each. Logical index `i` reads
    /// `offsets[i % n] + i / n` of the parent.
    fn deinterleave(self, entries: u32, offsets: &[u32]) -> Deinterleaved<Self>
    where
        Self: Sized,
    {
        Deinterleaved {
            parent: self,
            entries,
            offsets: offsets.to_vec(),
        }
    }

    /// Copies the whole space out, failing if any byte is unreadable.
    fn validate(&self) -> Option<ValidMemory> {
        (0..self.size())
            .map(|i| self.get(i))
            .collect::<Option<Vec<u8>>>()
            .map(ValidMemory::from)
    }
}

impl<M: MemorySpace + ?Sized> MemorySpace for &M {
    fn size(&self) -> u32 {
        (**self).size()
    }

    fn get(&self, offset: u32) -> Option<u8> {
        (**self).get(offset)
    }
}

impl<M: MemorySpace + ?Sized> MemorySpace for Arc<M> {
    fn size(&self) -> u32 {
        (**self).size()
    }

    fn get(&self, offset: u32) -> Option<u8> {
        (**self).get(offset)
    }
}

/// Plain owned bytes. Reads past the end fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayMemory {
    data: Vec<u8>,
}

impl ArrayMemory {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl MemorySpace for ArrayMemory {
    fn size(&self) -> u32 {
        self.data.len() as u32
    }

    fn get(&self, offset: u32) -> Option<u8> {
        self.data.get(offset as usize).copied()
    }
}

/// RAM, registers and other areas without static contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnreadableMemory {
    size: u32,
}

impl UnreadableMemory {
    pub const fn new(size: u32) -> Self {
        Self { size }
    }
}

impl MemorySpace for UnreadableMemory {
    fn size(&self) -> u32 {
        self.size
    }

    fn get(&self, _offset: u32) -> Option<u8> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct MemoryRange<M> {
    parent: M,
    start: u32,
    len: u32,
}

impl<M: MemorySpace> MemorySpace for MemoryRange<M> {
    fn size(&self) -> u32 {
        self.len
    }

    fn get(&self, offset: u32) -> Option<u8> {
        if offset >= self.len {
            return None;
        }
        self.parent.get(self.start.wrapping_add(offset))
    }
}

#[derive(Debug, Clone)]
pub struct Deinterleaved<M> {
    parent: M,
    entries: u32,
    offsets: Vec<u32>,
}

impl<M: MemorySpace> MemorySpace for Deinterleaved<M> {
    fn size(&self) -> u32 {
        self.entries.saturating_mul(self.offsets.len() as u32)
    }

    fn get(&self, offset: u32) -> Option<u8> {
        if offset >= self.size() {
            return None;
        }
        let n = self.offsets.len() as u32;
        let base = self.offsets[(offset % n) as usize];
        self.parent.get(base.wrapping_add(offset / n))
    }
}

/// Bytes that are known to be readable. Produced by [`MemorySpace::validate`].
#[derive(Default, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidMemory {
    bytes: Box<[u8]>,
}

impl ValidMemory {
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// A sub view that is valid again. `None` if it reaches past the end.
    pub fn slice(&self, start: usize, len: usize) -> Option<Self> {
        self.bytes
            .get(start..start.checked_add(len)?)
            .map(|bytes| Self::from(bytes.to_vec()))
    }
}

impl From<Vec<u8>> for ValidMemory {
    fn from(value: Vec<u8>) -> Self {
        Self {
            bytes: value.into_boxed_slice(),
        }
    }
}

impl core::ops::Deref for ValidMemory {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl MemorySpace for ValidMemory {
    fn size(&self) -> u32 {
        self.bytes.len() as u32
    }

    fn get(&self, offset: u32) -> Option<u8> {
        self.bytes.get(offset as usize).copied()
    }
}
