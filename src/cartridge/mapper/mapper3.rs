//! Mapper 3 - CNROM. Fixed PRG (16 or 32 KiB, mirrored), switchable 8 KiB
//! CHR ROM bank. No PRG RAM.

use crate::cartridge::header::{Header, Mirroring};
use crate::cartridge::mapper::{ChrStorage, Mapper, MapperCapabilities, PpuAccess};
use crate::memory::cpu as cpu_mem;
use crate::reset_kind::ResetKind;

const CHR_BANK_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone)]
pub struct Mapper3 {
    prg_rom: Vec<u8>,
    chr: ChrStorage,
    mirroring: Mirroring,
    chr_bank: u8,
}

impl Mapper3 {
    pub fn new(header: &Header, prg_rom: Vec<u8>, chr_rom: Vec<u8>) -> Self {
        Self {
            prg_rom,
            chr: ChrStorage::new(header, chr_rom),
            mirroring: header.mirroring,
            chr_bank: 0,
        }
    }

    fn read_prg(&self, addr: u16) -> u8 {
        if self.prg_rom.is_empty() {
            return 0;
        }
        let offset = (addr - cpu_mem::PRG_ROM_START) as usize % self.prg_rom.len();
        self.prg_rom[offset]
    }

    fn chr_bank_count(&self) -> usize {
        (self.chr.as_slice().len() / CHR_BANK_SIZE).max(1)
    }
}

impl Mapper for Mapper3 {
    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            cpu_mem::PRG_ROM_START..=cpu_mem::CPU_ADDR_END => Some(self.read_prg(addr)),
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, data: u8) {
        if (cpu_mem::PRG_ROM_START..=cpu_mem::CPU_ADDR_END).contains(&addr) {
            // CNROM boards have no latch between the CPU data bus and the
            // PRG ROM output enable, so a write to PRG-ROM space drives the
            // ROM's own output onto the bus at the same time as the CPU's
            // write value: the byte that actually reaches the bank register
            // is the AND of the two. Most boards only decode 2 bits; being
            // lenient here matches common real-world cartridges with extra
            // bonus bits.
            let bus_value = data & self.read_prg(addr);
            self.chr_bank = bus_value & 0x03;
        }
    }

    fn ppu_read(&mut self, addr: u16, _ctx: PpuAccess) -> Option<u8> {
        let bank = self.chr_bank as usize % self.chr_bank_count();
        Some(self.chr.read(bank * CHR_BANK_SIZE + addr as usize))
    }

    fn ppu_write(&mut self, addr: u16, data: u8) -> bool {
        let bank = self.chr_bank as usize % self.chr_bank_count();
        self.chr.write(bank * CHR_BANK_SIZE + addr as usize, data);
        self.chr.is_ram()
    }

    fn reset(&mut self, _kind: ResetKind) {
        self.chr_bank = 0;
    }

    fn capabilities(&self) -> MapperCapabilities {
        MapperCapabilities::default()
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn mapper_id(&self) -> u16 {
        3
    }

    fn name(&self) -> &'static str {
        "CNROM"
    }

    fn save_state(&self) -> Vec<u8> {
        #[cfg(feature = "savestate-postcard")]
        {
            postcard::to_allocvec(&self.chr_bank).unwrap_or_default()
        }
        #[cfg(not(feature = "savestate-postcard"))]
        {
            Vec::new()
        }
    }

    fn load_state(&mut self, _bytes: &[u8]) {
        #[cfg(feature = "savestate-postcard")]
        {
            if let Ok(bank) = postcard::from_bytes::<u8>(_bytes) {
                self.chr_bank = bank;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::header::RomFormat;

    fn header() -> Header {
        Header {
            format: RomFormat::INes,
            mapper: 3,
            submapper: 0,
            mirroring: Mirroring::Horizontal,
            battery_backed: false,
            trainer_present: false,
            prg_rom_size: 32 * 1024,
            chr_rom_size: 4 * CHR_BANK_SIZE,
            chr_is_ram: false,
        }
    }

    #[test]
    fn chr_bank_select_switches_full_8kb_window() {
        let mut chr = vec![0u8; 4 * CHR_BANK_SIZE];
        chr[CHR_BANK_SIZE + 10] = 0x7E;
        // Bus-conflict ANDing means the PRG ROM byte under the write must
        // not clear the bits we're trying to select.
        let mut prg_rom = vec![0xFFu8; 32 * 1024];
        prg_rom[0] = 0xFF;
        let mut mapper = Mapper3::new(&header(), prg_rom, chr);
        mapper.cpu_write(0x8000, 0x01);
        assert_eq!(mapper.ppu_read(10, PpuAccess::Background), Some(0x7E));
    }

    #[test]
    fn cpu_write_is_anded_with_prg_rom_bus_conflict() {
        let chr = vec![0u8; 4 * CHR_BANK_SIZE];
        let mut prg_rom = vec![0u8; 32 * 1024];
        // The byte sitting on the bus at $8000 only has bit 1 set, so a
        // write of 0b11 should land as 0b10 after the bus conflict.
        prg_rom[0] = 0b0000_0010;
        let mut mapper = Mapper3::new(&header(), prg_rom, chr);
        mapper.cpu_write(0x8000, 0b0000_0011);
        assert_eq!(mapper.chr_bank, 0b0000_0010);
    }

    #[test]
    fn chr_rom_is_read_only() {
        let mut chr = vec![0u8; CHR_BANK_SIZE];
        chr[3] = 0x55;
        let mut mapper = Mapper3::new(&header(), vec![0u8; 32 * 1024], chr);
        assert!(!mapper.ppu_write(3, 0xAA));
        assert_eq!(mapper.ppu_read(3, PpuAccess::Background), Some(0x55));
    }
}
