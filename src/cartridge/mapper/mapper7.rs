//! Mapper 7 - AxROM. Switchable 32 KiB PRG bank, CHR is always RAM, and the
//! bank-select register's top bit chooses which CIRAM page is mirrored to
//! both nametables (single-screen mirroring only, never horizontal/vertical).

use crate::cartridge::header::{Header, Mirroring};
use crate::cartridge::mapper::{ChrStorage, Mapper, MapperCapabilities, PpuAccess};
use crate::memory::cpu as cpu_mem;
use crate::reset_kind::ResetKind;

const PRG_BANK_SIZE: usize = 32 * 1024;

#[derive(Debug, Clone)]
pub struct Mapper7 {
    prg_rom: Vec<u8>,
    chr: ChrStorage,
    mirroring: Mirroring,
    bank_select: u8,
    bank_count: usize,
}

impl Mapper7 {
    pub fn new(header: &Header, prg_rom: Vec<u8>, chr_rom: Vec<u8>) -> Self {
        let bank_count = (prg_rom.len() / PRG_BANK_SIZE).max(1);
        Self {
            prg_rom,
            chr: ChrStorage::new(header, chr_rom),
            mirroring: Mirroring::SingleScreenA,
            bank_select: 0,
            bank_count,
        }
    }

    fn read_prg(&self, addr: u16) -> u8 {
        if self.prg_rom.is_empty() {
            return 0;
        }
        let bank = (self.bank_select & 0x07) as usize % self.bank_count;
        let offset = (addr - cpu_mem::PRG_ROM_START) as usize;
        self.prg_rom[bank * PRG_BANK_SIZE + offset]
    }
}

impl Mapper for Mapper7 {
    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            cpu_mem::PRG_ROM_START..=cpu_mem::CPU_ADDR_END => Some(self.read_prg(addr)),
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, data: u8) {
        if (cpu_mem::PRG_ROM_START..=cpu_mem::CPU_ADDR_END).contains(&addr) {
            self.bank_select = data;
            self.mirroring = if data & 0x10 != 0 {
                Mirroring::SingleScreenB
            } else {
                Mirroring::SingleScreenA
            };
        }
    }

    fn ppu_read(&mut self, addr: u16, _ctx: PpuAccess) -> Option<u8> {
        Some(self.chr.read(addr as usize))
    }

    fn ppu_write(&mut self, addr: u16, data: u8) -> bool {
        self.chr.write(addr as usize, data);
        self.chr.is_ram()
    }

    fn reset(&mut self, _kind: ResetKind) {
        self.bank_select = 0;
        self.mirroring = Mirroring::SingleScreenA;
    }

    fn capabilities(&self) -> MapperCapabilities {
        MapperCapabilities::default()
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn mapper_id(&self) -> u16 {
        7
    }

    fn name(&self) -> &'static str {
        "AxROM"
    }

    fn save_state(&self) -> Vec<u8> {
        #[cfg(feature = "savestate-postcard")]
        {
            postcard::to_allocvec(&(self.bank_select, self.mirroring)).unwrap_or_default()
        }
        #[cfg(not(feature = "savestate-postcard"))]
        {
            Vec::new()
        }
    }

    fn load_state(&mut self, _bytes: &[u8]) {
        #[cfg(feature = "savestate-postcard")]
        {
            if let Ok((bank_select, mirroring)) = postcard::from_bytes::<(u8, Mirroring)>(_bytes) {
                self.bank_select = bank_select;
                self.mirroring = mirroring;
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
            mapper: 7,
            submapper: 0,
            mirroring: Mirroring::Horizontal,
            battery_backed: false,
            trainer_present: false,
            prg_rom_size: 4 * PRG_BANK_SIZE,
            chr_rom_size: 0,
            chr_is_ram: true,
        }
    }

    #[test]
    fn bank_select_switches_full_32kb_window() {
        let mut prg = vec![0u8; 4 * PRG_BANK_SIZE];
        for (bank, chunk) in prg.chunks_mut(PRG_BANK_SIZE).enumerate() {
            chunk.fill(bank as u8);
        }
        let mut mapper = Mapper7::new(&header(), prg, vec![]);
        mapper.cpu_write(0x8000, 2);
        assert_eq!(mapper.cpu_read(0x8000), Some(2));
        assert_eq!(mapper.cpu_read(0xFFFF), Some(2));
    }

    #[test]
    fn mirroring_is_always_single_screen() {
        let mut mapper = Mapper7::new(&header(), vec![0u8; 4 * PRG_BANK_SIZE], vec![]);
        assert_eq!(mapper.mirroring(), Mirroring::SingleScreenA);
        mapper.cpu_write(0x8000, 0x10);
        assert_eq!(mapper.mirroring(), Mirroring::SingleScreenB);
    }
}
