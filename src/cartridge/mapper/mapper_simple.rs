//! Single-register "PRG and CHR bank in one byte" boards: Color Dreams
//! (11), BNROM / NINA-001 (34), GxROM (66), and NINA-03/06 (79). All four
//! combine a 32 KiB PRG window and an 8 KiB CHR window selected by a few
//! bits apiece in one or two writable registers; they differ only in the bit
//! layout and the CPU address range that is write-sensitive.

use crate::cartridge::header::{Header, Mirroring};
use crate::cartridge::mapper::{ChrStorage, Mapper, MapperCapabilities, PpuAccess};
use crate::memory::cpu as cpu_mem;
use crate::reset_kind::ResetKind;

const PRG_BANK_SIZE: usize = 32 * 1024;
const CHR_BANK_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone)]
struct OneRegisterMapper {
    prg_rom: Vec<u8>,
    chr: ChrStorage,
    mirroring: Mirroring,
    prg_bank: u8,
    chr_bank: u8,
}

impl OneRegisterMapper {
    fn new(header: &Header, prg_rom: Vec<u8>, chr_rom: Vec<u8>) -> Self {
        Self {
            prg_rom,
            chr: ChrStorage::new(header, chr_rom),
            mirroring: header.mirroring,
            prg_bank: 0,
            chr_bank: 0,
        }
    }

    fn prg_bank_count(&self) -> usize {
        (self.prg_rom.len() / PRG_BANK_SIZE).max(1)
    }

    fn chr_bank_count(&self) -> usize {
        (self.chr.as_slice().len() / CHR_BANK_SIZE).max(1)
    }

    fn read_prg(&self, addr: u16) -> u8 {
        if self.prg_rom.is_empty() {
            return 0;
        }
        let bank = self.prg_bank as usize % self.prg_bank_count();
        let offset = (addr - cpu_mem::PRG_ROM_START) as usize;
        self.prg_rom[bank * PRG_BANK_SIZE + offset]
    }

    fn chr_offset(&self, addr: u16) -> usize {
        let bank = self.chr_bank as usize % self.chr_bank_count();
        bank * CHR_BANK_SIZE + addr as usize
    }
}

/// Mapper 11 - Color Dreams. Low nibble selects PRG, high nibble selects
/// CHR; no bus-conflict protection (write value is taken verbatim).
#[derive(Debug, Clone)]
pub struct Mapper11(OneRegisterMapper);

impl Mapper11 {
    pub fn new(header: &Header, prg_rom: Vec<u8>, chr_rom: Vec<u8>) -> Self {
        Self(OneRegisterMapper::new(header, prg_rom, chr_rom))
    }
}

impl Mapper for Mapper11 {
    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            cpu_mem::PRG_ROM_START..=cpu_mem::CPU_ADDR_END => Some(self.0.read_prg(addr)),
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, data: u8) {
        if (cpu_mem::PRG_ROM_START..=cpu_mem::CPU_ADDR_END).contains(&addr) {
            self.0.prg_bank = data & 0x0F;
            self.0.chr_bank = data >> 4;
        }
    }

    fn ppu_read(&mut self, addr: u16, _ctx: PpuAccess) -> Option<u8> {
        Some(self.0.chr.read(self.0.chr_offset(addr)))
    }

    fn ppu_write(&mut self, addr: u16, data: u8) -> bool {
        let offset = self.0.chr_offset(addr);
        self.0.chr.write(offset, data);
        self.0.chr.is_ram()
    }

    fn reset(&mut self, _kind: ResetKind) {
        self.0.prg_bank = 0;
        self.0.chr_bank = 0;
    }

    fn capabilities(&self) -> MapperCapabilities {
        MapperCapabilities::default()
    }

    fn mirroring(&self) -> Mirroring {
        self.0.mirroring
    }

    fn mapper_id(&self) -> u16 {
        11
    }

    fn name(&self) -> &'static str {
        "Color Dreams"
    }

    fn save_state(&self) -> Vec<u8> {
        #[cfg(feature = "savestate-postcard")]
        {
            postcard::to_allocvec(&(self.0.prg_bank, self.0.chr_bank)).unwrap_or_default()
        }
        #[cfg(not(feature = "savestate-postcard"))]
        {
            Vec::new()
        }
    }

    fn load_state(&mut self, _bytes: &[u8]) {
        #[cfg(feature = "savestate-postcard")]
        {
            if let Ok((prg_bank, chr_bank)) = postcard::from_bytes::<(u8, u8)>(_bytes) {
                self.0.prg_bank = prg_bank;
                self.0.chr_bank = chr_bank;
            }
        }
    }
}

/// Mapper 34 - BNROM (no CHR banking, writes anywhere in $8000-$FFFF select
/// PRG) and NINA-001 (CHR banking via two dedicated $7FFD-$7FFF registers;
/// distinguished here by whether the cartridge carries CHR ROM at all, which
/// is how most emulators disambiguate the two boards sharing this id).
#[derive(Debug, Clone)]
pub struct Mapper34 {
    inner: OneRegisterMapper,
    is_nina001: bool,
    chr_bank_0: u8,
    chr_bank_1: u8,
}

impl Mapper34 {
    pub fn new(header: &Header, prg_rom: Vec<u8>, chr_rom: Vec<u8>) -> Self {
        let is_nina001 = !chr_rom.is_empty() && chr_rom.len() > CHR_BANK_SIZE;
        Self {
            inner: OneRegisterMapper::new(header, prg_rom, chr_rom),
            is_nina001,
            chr_bank_0: 0,
            chr_bank_1: 0,
        }
    }

    fn chr_offset_nina(&self, addr: u16) -> usize {
        const HALF: usize = 4 * 1024;
        if addr < 0x1000 {
            (self.chr_bank_0 as usize % self.inner.chr_bank_count().max(1).max(2)) * HALF
                + addr as usize
        } else {
            (self.chr_bank_1 as usize % self.inner.chr_bank_count().max(1).max(2)) * HALF
                + (addr as usize - HALF)
        }
    }
}

impl Mapper for Mapper34 {
    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            cpu_mem::PRG_ROM_START..=cpu_mem::CPU_ADDR_END => Some(self.inner.read_prg(addr)),
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, data: u8) {
        match addr {
            0x7FFD if self.is_nina001 => self.inner.prg_bank = data & 0x01,
            0x7FFE if self.is_nina001 => self.chr_bank_0 = data & 0x0F,
            0x7FFF if self.is_nina001 => self.chr_bank_1 = data & 0x0F,
            cpu_mem::PRG_ROM_START..=cpu_mem::CPU_ADDR_END if !self.is_nina001 => {
                self.inner.prg_bank = data & 0x0F;
            }
            _ => {}
        }
    }

    fn ppu_read(&mut self, addr: u16, _ctx: PpuAccess) -> Option<u8> {
        if self.is_nina001 {
            let offset = self.chr_offset_nina(addr);
            Some(self.inner.chr.read(offset))
        } else {
            Some(self.inner.chr.read(addr as usize))
        }
    }

    fn ppu_write(&mut self, addr: u16, data: u8) -> bool {
        let offset = if self.is_nina001 {
            self.chr_offset_nina(addr)
        } else {
            addr as usize
        };
        self.inner.chr.write(offset, data);
        self.inner.chr.is_ram()
    }

    fn reset(&mut self, _kind: ResetKind) {
        self.inner.prg_bank = 0;
        self.chr_bank_0 = 0;
        self.chr_bank_1 = 0;
    }

    fn capabilities(&self) -> MapperCapabilities {
        MapperCapabilities::default()
    }

    fn mirroring(&self) -> Mirroring {
        self.inner.mirroring
    }

    fn mapper_id(&self) -> u16 {
        34
    }

    fn name(&self) -> &'static str {
        if self.is_nina001 {
            "NINA-001"
        } else {
            "BNROM"
        }
    }

    fn save_state(&self) -> Vec<u8> {
        #[cfg(feature = "savestate-postcard")]
        {
            postcard::to_allocvec(&(self.inner.prg_bank, self.chr_bank_0, self.chr_bank_1))
                .unwrap_or_default()
        }
        #[cfg(not(feature = "savestate-postcard"))]
        {
            Vec::new()
        }
    }

    fn load_state(&mut self, _bytes: &[u8]) {
        #[cfg(feature = "savestate-postcard")]
        {
            if let Ok((prg_bank, chr0, chr1)) = postcard::from_bytes::<(u8, u8, u8)>(_bytes) {
                self.inner.prg_bank = prg_bank;
                self.chr_bank_0 = chr0;
                self.chr_bank_1 = chr1;
            }
        }
    }
}

/// Mapper 66 - GxROM. Low two bits select PRG, bits 4-5 select CHR.
#[derive(Debug, Clone)]
pub struct Mapper66(OneRegisterMapper);

impl Mapper66 {
    pub fn new(header: &Header, prg_rom: Vec<u8>, chr_rom: Vec<u8>) -> Self {
        Self(OneRegisterMapper::new(header, prg_rom, chr_rom))
    }
}

impl Mapper for Mapper66 {
    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            cpu_mem::PRG_ROM_START..=cpu_mem::CPU_ADDR_END => Some(self.0.read_prg(addr)),
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, data: u8) {
        if (cpu_mem::PRG_ROM_START..=cpu_mem::CPU_ADDR_END).contains(&addr) {
            self.0.prg_bank = data & 0x03;
            self.0.chr_bank = (data >> 4) & 0x03;
        }
    }

    fn ppu_read(&mut self, addr: u16, _ctx: PpuAccess) -> Option<u8> {
        Some(self.0.chr.read(self.0.chr_offset(addr)))
    }

    fn ppu_write(&mut self, addr: u16, data: u8) -> bool {
        let offset = self.0.chr_offset(addr);
        self.0.chr.write(offset, data);
        self.0.chr.is_ram()
    }

    fn reset(&mut self, _kind: ResetKind) {
        self.0.prg_bank = 0;
        self.0.chr_bank = 0;
    }

    fn capabilities(&self) -> MapperCapabilities {
        MapperCapabilities::default()
    }

    fn mirroring(&self) -> Mirroring {
        self.0.mirroring
    }

    fn mapper_id(&self) -> u16 {
        66
    }

    fn name(&self) -> &'static str {
        "GxROM"
    }

    fn save_state(&self) -> Vec<u8> {
        #[cfg(feature = "savestate-postcard")]
        {
            postcard::to_allocvec(&(self.0.prg_bank, self.0.chr_bank)).unwrap_or_default()
        }
        #[cfg(not(feature = "savestate-postcard"))]
        {
            Vec::new()
        }
    }

    fn load_state(&mut self, _bytes: &[u8]) {
        #[cfg(feature = "savestate-postcard")]
        {
            if let Ok((prg_bank, chr_bank)) = postcard::from_bytes::<(u8, u8)>(_bytes) {
                self.0.prg_bank = prg_bank;
                self.0.chr_bank = chr_bank;
            }
        }
    }
}

/// Mapper 79 - NINA-03/06. A single register at any address with A15 set
/// and A13 clear (conventionally $4100-$5FFF on these boards); bit 3
/// selects PRG, bits 0-2 select CHR.
#[derive(Debug, Clone)]
pub struct Mapper79(OneRegisterMapper);

impl Mapper79 {
    pub fn new(header: &Header, prg_rom: Vec<u8>, chr_rom: Vec<u8>) -> Self {
        Self(OneRegisterMapper::new(header, prg_rom, chr_rom))
    }
}

impl Mapper for Mapper79 {
    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            cpu_mem::PRG_ROM_START..=cpu_mem::CPU_ADDR_END => Some(self.0.read_prg(addr)),
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, data: u8) {
        if addr & 0x0100 != 0 {
            self.0.prg_bank = (data >> 3) & 0x01;
            self.0.chr_bank = data & 0x07;
        }
    }

    fn ppu_read(&mut self, addr: u16, _ctx: PpuAccess) -> Option<u8> {
        Some(self.0.chr.read(self.0.chr_offset(addr)))
    }

    fn ppu_write(&mut self, addr: u16, data: u8) -> bool {
        let offset = self.0.chr_offset(addr);
        self.0.chr.write(offset, data);
        self.0.chr.is_ram()
    }

    fn reset(&mut self, _kind: ResetKind) {
        self.0.prg_bank = 0;
        self.0.chr_bank = 0;
    }

    fn capabilities(&self) -> MapperCapabilities {
        MapperCapabilities::default()
    }

    fn mirroring(&self) -> Mirroring {
        self.0.mirroring
    }

    fn mapper_id(&self) -> u16 {
        79
    }

    fn name(&self) -> &'static str {
        "NINA-03/06"
    }

    fn save_state(&self) -> Vec<u8> {
        #[cfg(feature = "savestate-postcard")]
        {
            postcard::to_allocvec(&(self.0.prg_bank, self.0.chr_bank)).unwrap_or_default()
        }
        #[cfg(not(feature = "savestate-postcard"))]
        {
            Vec::new()
        }
    }

    fn load_state(&mut self, _bytes: &[u8]) {
        #[cfg(feature = "savestate-postcard")]
        {
            if let Ok((prg_bank, chr_bank)) = postcard::from_bytes::<(u8, u8)>(_bytes) {
                self.0.prg_bank = prg_bank;
                self.0.chr_bank = chr_bank;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::header::RomFormat;

    fn header(prg_rom_size: usize, chr_rom_size: usize) -> Header {
        Header {
            format: RomFormat::INes,
            mapper: 11,
            submapper: 0,
            mirroring: Mirroring::Horizontal,
            battery_backed: false,
            trainer_present: false,
            prg_rom_size,
            chr_rom_size,
            chr_is_ram: chr_rom_size == 0,
        }
    }

    #[test]
    fn color_dreams_splits_register_into_prg_and_chr() {
        let mut prg = vec![0u8; 4 * PRG_BANK_SIZE];
        for (bank, chunk) in prg.chunks_mut(PRG_BANK_SIZE).enumerate() {
            chunk.fill(bank as u8);
        }
        let mut chr = vec![0u8; 4 * CHR_BANK_SIZE];
        chr[CHR_BANK_SIZE] = 0x33;
        let mut mapper = Mapper11::new(&header(4 * PRG_BANK_SIZE, 4 * CHR_BANK_SIZE), prg, chr);
        mapper.cpu_write(0x8000, 0x12); // prg=2, chr=1
        assert_eq!(mapper.cpu_read(0x8000), Some(2));
        assert_eq!(mapper.ppu_read(0, PpuAccess::Background), Some(0x33));
    }

    #[test]
    fn gxrom_selects_independent_prg_and_chr_fields() {
        let mut prg = vec![0u8; 4 * PRG_BANK_SIZE];
        for (bank, chunk) in prg.chunks_mut(PRG_BANK_SIZE).enumerate() {
            chunk.fill(bank as u8);
        }
        let mut mapper = Mapper66::new(&header(4 * PRG_BANK_SIZE, 4 * CHR_BANK_SIZE), prg, vec![0u8; 4 * CHR_BANK_SIZE]);
        mapper.cpu_write(0x8000, 0b0011_0001);
        assert_eq!(mapper.cpu_read(0x8000), Some(1));
    }
}
