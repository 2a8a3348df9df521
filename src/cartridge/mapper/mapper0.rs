//! Mapper 0 - NROM. Fixed 16 or 32 KiB program; CHR ROM or CHR RAM; no
//! banking whatsoever.

use crate::cartridge::header::{Header, Mirroring};
use crate::cartridge::mapper::{ChrStorage, Mapper, MapperCapabilities, PpuAccess};
use crate::memory::cpu as cpu_mem;
use crate::reset_kind::ResetKind;

#[derive(Debug, Clone)]
pub struct Mapper0 {
    prg_rom: Vec<u8>,
    chr: ChrStorage,
    mirroring: Mirroring,
}

impl Mapper0 {
    pub fn new(header: &Header, prg_rom: Vec<u8>, chr_rom: Vec<u8>) -> Self {
        Self {
            prg_rom,
            chr: ChrStorage::new(header, chr_rom),
            mirroring: header.mirroring,
        }
    }

    fn read_prg(&self, addr: u16) -> u8 {
        if self.prg_rom.is_empty() {
            return 0;
        }
        // 16 KiB images mirror across $8000-$BFFF and $C000-$FFFF.
        let offset = (addr - cpu_mem::PRG_ROM_START) as usize % self.prg_rom.len();
        self.prg_rom[offset]
    }
}

impl Mapper for Mapper0 {
    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            cpu_mem::PRG_ROM_START..=cpu_mem::CPU_ADDR_END => Some(self.read_prg(addr)),
            _ => None,
        }
    }

    fn cpu_write(&mut self, _addr: u16, _data: u8) {}

    fn ppu_read(&mut self, addr: u16, _ctx: PpuAccess) -> Option<u8> {
        Some(self.chr.read(addr as usize))
    }

    fn ppu_write(&mut self, addr: u16, data: u8) -> bool {
        self.chr.write(addr as usize, data);
        self.chr.is_ram()
    }

    fn reset(&mut self, _kind: ResetKind) {}

    fn capabilities(&self) -> MapperCapabilities {
        MapperCapabilities::default()
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn mapper_id(&self) -> u16 {
        0
    }

    fn name(&self) -> &'static str {
        "NROM"
    }

    fn save_state(&self) -> Vec<u8> {
        Vec::new()
    }

    fn load_state(&mut self, _bytes: &[u8]) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::header::RomFormat;

    fn header(prg_rom_size: usize, chr_rom_size: usize) -> Header {
        Header {
            format: RomFormat::INes,
            mapper: 0,
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
    fn mirrors_16kb_image_across_both_windows() {
        let mut prg = vec![0u8; 16 * 1024];
        prg[0] = 0x42;
        let mut mapper = Mapper0::new(&header(16 * 1024, 8 * 1024), prg, vec![0u8; 8 * 1024]);
        assert_eq!(mapper.cpu_read(0x8000), Some(0x42));
        assert_eq!(mapper.cpu_read(0xC000), Some(0x42));
    }

    #[test]
    fn chr_ram_is_writable_when_chr_rom_absent() {
        let mut mapper = Mapper0::new(&header(32 * 1024, 0), vec![0u8; 32 * 1024], vec![]);
        assert!(mapper.ppu_write(0x0010, 0x99));
        assert_eq!(mapper.ppu_read(0x0010, PpuAccess::Background), Some(0x99));
    }

    #[test]
    fn chr_rom_writes_are_ignored() {
        let mut chr = vec![0u8; 8 * 1024];
        chr[5] = 0x11;
        let mut mapper = Mapper0::new(&header(32 * 1024, 8 * 1024), vec![0u8; 32 * 1024], chr);
        assert!(!mapper.ppu_write(5, 0x22));
        assert_eq!(mapper.ppu_read(5, PpuAccess::Background), Some(0x11));
    }
}
