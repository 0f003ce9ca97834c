use bytemuck::*;

use crate::{
    addr::Addr,
    addr_space::{ArrayMemory, MemorySpace, UnreadableMemory},
};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Rom {
    pub data: Vec<u8>,
}

impl Rom {
    /// Raw image, used as is.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Image as read from a file. Strips a copier header if there is one.
    pub fn from_file_bytes(mut data: Vec<u8>) -> Self {
        let offset = data.len() & 0x3ff;
        if offset != 0 {
            data.drain(..offset);
        }
        Self { data }
    }

    pub const fn len(&self) -> u32 {
        self.data.len() as _
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum MappingType {
    LoRom,
    HiRom,
    ExHiRom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Zeroable, TransparentWrapper, Pod)]
#[repr(transparent)]
pub struct Title(pub [u8; 21]);

impl Title {
    pub fn unpadded_bytes(&self) -> &[u8] {
        let mut slice: &[u8] = &self.0;
        if slice[20] == 0 {
            slice = &slice[..20];
        }
        slice.trim_ascii_end()
    }
}

impl core::fmt::Display for Title {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        use core::fmt::Write;
        for c in self
            .unpadded_bytes()
            .iter()
            .take_while(|&&c| c != 0)
            .map(|c| match c {
                // these JIS X 0201 chars are different from ascii
                b'\\' => '¥',
                b'~' => '‾',
                0..=0xa0 => *c as char,
                // half width katakana
                0xa1..=0xdf => char::from_u32(u32::from(*c) - 0xa1 + u32::from('｡'))
                    .unwrap_or(char::REPLACEMENT_CHARACTER),
                0xe0..=0xff => char::REPLACEMENT_CHARACTER,
            })
        {
            f.write_char(c)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Zeroable, TransparentWrapper, Pod)]
#[repr(transparent)]
pub struct BankedSize(pub u8);

impl BankedSize {
    pub fn bytes(&self) -> u32 {
        match self.0 {
            0 => 0,
            _ => 1024 << self.0.min(21),
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl core::fmt::Display for BankedSize {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self.0 {
            1..=9 => write!(f, "{}KiB", 1 << self.0),
            10..=19 => write!(f, "{}MiB", 1 << (self.0 - 10)),
            20..=21 => write!(f, "{}GiB", 1 << (self.0 - 20)),
            _ => write!(f, "0B"),
        }
    }
}

/// The internal header at `$00:ffb0`, including the extended part.
#[derive(Debug, Clone, Copy, Zeroable, Pod)]
#[repr(C)]
pub struct Header {
    pub maker_code: [u8; 2],
    pub game_code: [u8; 4],
    pub reserved: [u8; 6],
    pub expansion_flash_size: BankedSize,
    pub expansion_ram_size: BankedSize,
    pub special_version: u8,
    pub chipset_subtype: u8,
    pub title: Title,
    pub mode: u8,
    pub chipset: u8,
    pub rom_size: BankedSize,
    pub ram_size: BankedSize,
    pub country: u8,
    pub developer_id: u8,
    pub rom_version: u8,
    pub checksum_cpl: [u8; 2],
    pub checksum: [u8; 2],
}

impl Header {
    pub const LOCATION: Addr = Addr::new(0x00, 0xffb0);

    pub const fn mapping_type(&self) -> MappingType {
        match self.mode & 15 {
            1 | 10 => MappingType::HiRom,
            5 => MappingType::ExHiRom,
            _ => MappingType::LoRom,
        }
    }

    pub const fn checksum(&self) -> u16 {
        u16::from_le_bytes(self.checksum)
    }

    pub const fn checksum_cpl(&self) -> u16 {
        u16::from_le_bytes(self.checksum_cpl)
    }

    pub const fn is_checksum_consistent(&self) -> bool {
        self.checksum() == !self.checksum_cpl()
    }
}

type Space = Box<dyn MemorySpace + Send + Sync>;

struct MapperEntry {
    start: u32,
    canonical_start: Addr,
    space: Space,
}

const PAGE_BITS: u32 = 13;
const PAGE_SIZE: u32 = 1 << PAGE_BITS;
const PAGE_COUNT: usize = 1 << (24 - PAGE_BITS);

/// The 24 bit address space of the console, composed from smaller spaces.
///
/// Bindings are made in 8KiB pages. A later binding replaces an earlier one
/// for every page it covers, so lookups always see the most recent binding.
pub struct SnesMemory {
    entries: Vec<MapperEntry>,
    pages: Box<[Option<u16>]>,
}

impl SnesMemory {
    pub const SIZE: u32 = 0x100_0000;

    fn empty() -> Self {
        Self {
            entries: vec![],
            pages: vec![None; PAGE_COUNT].into_boxed_slice(),
        }
    }

    fn bind(
        &mut self,
        start: u32,
        canonical_start: u32,
        space: impl MemorySpace + Send + Sync + 'static,
    ) {
        debug_assert_eq!(start % PAGE_SIZE, 0);
        debug_assert_eq!(space.size() % PAGE_SIZE, 0);
        let index = self.entries.len() as u16;
        let first = (start >> PAGE_BITS) as usize;
        let count = (space.size() >> PAGE_BITS) as usize;
        for page in &mut self.pages[first..(first + count).min(PAGE_COUNT)] {
            *page = Some(index);
        }
        self.entries.push(MapperEntry {
            start,
            canonical_start: Addr::from_u32(canonical_start),
            space: Box::new(space),
        });
    }

    fn entry(&self, address: u32) -> Option<&MapperEntry> {
        let page = self.pages.get((address >> PAGE_BITS) as usize)?;
        self.entries.get(usize::from((*page)?))
    }

    /// Lays out a LoROM cartridge. The image is used from offset 0, reads
    /// past its end are unreadable.
    pub fn lorom(rom: Rom) -> Self {
        let rom = Arc::new(ArrayMemory::new(rom.data));
        let ram = Arc::new(UnreadableMemory::new(0x2_0000));
        let registers = Arc::new(UnreadableMemory::new(0x6_0000));
        let sram = Arc::new(UnreadableMemory::new(0x8000));
        let ram_start = 0x7e_0000;
        let reg_start = 0x00_2000;
        let srm_start = 0x70_0000;
        let high = 0x80_0000;

        let mut mem = Self::empty();
        let mut pc = 0;
        for bank in 0x00..=0x3fu32 {
            let ram_area = bank << 16;
            let reg_area = ram_area | 0x2000;
            let rom_area = ram_area | 0x8000;
            for mirror in [0, high] {
                mem.bind(ram_area + mirror, ram_start, ram.clone().range(0, 0x2000));
                mem.bind(reg_area + mirror, reg_start, registers.clone().range(0, 0x6000));
                mem.bind(rom_area + mirror, rom_area, rom.clone().range(pc, 0x8000));
            }
            pc += 0x8000;
        }
        for bank in 0x40..=0x6fu32 {
            // Some boards mirror the upper half into the lower half, some leave
            // it open. Mirroring supports both, the upper half is canonical.
            let lower = bank << 16;
            let upper = lower | 0x8000;
            for mirror in [0, high] {
                mem.bind(lower + mirror, upper, rom.clone().range(pc, 0x8000));
                mem.bind(upper + mirror, upper, rom.clone().range(pc, 0x8000));
            }
            pc += 0x8000;
        }
        for bank in 0x70..=0x7du32 {
            let srm_area = bank << 16;
            let rom_area = srm_area | 0x8000;
            for mirror in [0, high] {
                mem.bind(srm_area + mirror, srm_start, sram.clone());
                mem.bind(rom_area + mirror, rom_area, rom.clone().range(pc, 0x8000));
            }
            pc += 0x8000;
        }
        for bank in 0xfe..=0xffu32 {
            let rom_area = (bank << 16) | 0x8000;
            mem.bind(rom_area, rom_area, rom.clone().range(pc, 0x8000));
            pc += 0x8000;
        }
        mem.bind(ram_start, ram_start, ram);
        if let Some(header) = mem.header() {
            let mapping = header.mapping_type();
            if mapping != MappingType::LoRom {
                warn!("header declares {mapping:?}, mapping as LoROM anyway");
            }
        }
        mem
    }

    pub fn read(&self, addr: Addr) -> Option<u8> {
        self.get(addr.to_u32())
    }

    pub fn read_word(&self, addr: Addr) -> Option<u16> {
        self.get_word(addr.to_u32())
    }

    pub fn read_long(&self, addr: Addr) -> Option<Addr> {
        self.get_long(addr.to_u32()).map(Addr::from_u32)
    }

    /// The preferred representative of all addresses aliasing the same byte.
    /// Unbound addresses are their own canonical form.
    pub fn to_canonical(&self, addr: Addr) -> Addr {
        let address = addr.to_u32();
        match self.entry(address) {
            Some(entry) => entry.canonical_start.add24(address - entry.start),
            None => addr,
        }
    }

    pub fn header(&self) -> Option<Header> {
        let mut hdr = Header::zeroed();
        for (i, byte) in bytes_of_mut(&mut hdr).iter_mut().enumerate() {
            *byte = self.read(Header::LOCATION.add24(i as u32))?;
        }
        Some(hdr)
    }
}

impl MemorySpace for SnesMemory {
    fn size(&self) -> u32 {
        Self::SIZE
    }

    fn get(&self, offset: u32) -> Option<u8> {
        let entry = self.entry(offset)?;
        entry.space.get(offset - entry.start)
    }
}

impl core::fmt::Debug for SnesMemory {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("SnesMemory")
            .field("bindings", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// A LoROM image where every 32KiB bank is filled with its bank number.
    pub fn banked_rom(banks: u8) -> SnesMemory {
        let data = (0..banks)
            .flat_map(|bank| std::iter::repeat_n(bank, 0x8000))
            .collect();
        SnesMemory::lorom(Rom::from_bytes(data))
    }

    #[test]
    fn rom_banks_are_sequential() {
        let mem = banked_rom(4);
        assert_eq!(mem.read(Addr::new(0x00, 0x8000)), Some(0));
        assert_eq!(mem.read(Addr::new(0x01, 0xffff)), Some(1));
        assert_eq!(mem.read(Addr::new(0x03, 0x8000)), Some(3));
        // past the end of the image
        assert_eq!(mem.read(Addr::new(0x04, 0x8000)), None);
    }

    #[test]
    fn ram_and_registers_are_unreadable() {
        let mem = banked_rom(1);
        assert_eq!(mem.read(Addr::new(0x00, 0x0000)), None);
        assert_eq!(mem.read(Addr::new(0x00, 0x2100)), None);
        assert_eq!(mem.read(Addr::new(0x7e, 0x1234)), None);
        assert_eq!(mem.read(Addr::new(0x70, 0x0000)), None);
    }

    #[test]
    fn high_mirror_reads_same_bytes() {
        let mem = banked_rom(0x40);
        for bank in [0x00u8, 0x12, 0x3f] {
            for offset in [0x8000u16, 0x9abc, 0xffff] {
                let lo = Addr::new(bank, offset);
                let hi = Addr::new(bank | 0x80, offset);
                assert_eq!(mem.read(lo), mem.read(hi));
                assert!(mem.read(lo).is_some());
            }
        }
    }

    #[test]
    fn canonical_forms() {
        let mem = banked_rom(0x80);
        let cases = [
            (Addr::new(0x80, 0x8123), Addr::new(0x00, 0x8123)),
            (Addr::new(0x00, 0x8123), Addr::new(0x00, 0x8123)),
            (Addr::new(0x00, 0x0012), Addr::new(0x7e, 0x0012)),
            (Addr::new(0x3f, 0x1fff), Addr::new(0x7e, 0x1fff)),
            (Addr::new(0x85, 0x2100), Addr::new(0x00, 0x2100)),
            (Addr::new(0x40, 0x1234), Addr::new(0x40, 0x9234)),
            (Addr::new(0xc0, 0x1234), Addr::new(0x40, 0x9234)),
            (Addr::new(0x71, 0x0042), Addr::new(0x70, 0x0042)),
            (Addr::new(0x7f, 0x0042), Addr::new(0x7f, 0x0042)),
            (Addr::new(0xfe, 0x8000), Addr::new(0xfe, 0x8000)),
        ];
        for (raw, canonical) in cases {
            assert_eq!(mem.to_canonical(raw), canonical, "{raw}");
        }
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let mem = banked_rom(0x10);
        for bank in (0..=0xffu8).step_by(3) {
            for offset in (0..=0xffffu16).step_by(0x0fff) {
                let once = mem.to_canonical(Addr::new(bank, offset));
                assert_eq!(mem.to_canonical(once), once);
            }
        }
    }

    #[test]
    fn lower_half_of_40_mirrors_upper() {
        let mem = banked_rom(0x80);
        let lower = mem.read(Addr::new(0x40, 0x0000));
        assert_eq!(lower, mem.read(Addr::new(0x40, 0x8000)));
        assert_eq!(lower, Some(0x40));
    }

    #[test]
    fn words_and_longs() {
        let mut data = vec![0; 0x8000];
        data[0x7ffc..].copy_from_slice(&[0x34, 0x12, 0x56, 0x00]);
        let mem = SnesMemory::lorom(Rom::from_bytes(data));
        assert_eq!(mem.read_word(Addr::new(0, 0xfffc)), Some(0x1234));
        assert_eq!(mem.read_long(Addr::new(0, 0xfffc)), Some(Addr::new(0x56, 0x1234)));
        assert_eq!(mem.read_word(Addr::new(0, 0xffff)), None);
    }

    #[test]
    fn copier_header_is_stripped() {
        let mut data = vec![0xaa; 0x200];
        data.extend(std::iter::repeat_n(0x11, 0x8000));
        let rom = Rom::from_file_bytes(data);
        assert_eq!(rom.len(), 0x8000);
        assert_eq!(rom.data[0], 0x11);
    }

    #[test]
    fn header_title() {
        let mut data = vec![0; 0x8000];
        data[0x7fc0..0x7fd5].copy_from_slice(b"SUPER MARIOWORLD     ");
        data[0x7fd5] = 0x20;
        let mem = SnesMemory::lorom(Rom::from_bytes(data));
        let hdr = mem.header().unwrap();
        assert_eq!(hdr.title.to_string(), "SUPER MARIOWORLD");
        assert_eq!(hdr.mapping_type(), MappingType::LoRom);
    }
}
