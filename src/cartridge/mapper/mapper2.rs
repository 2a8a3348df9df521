//! Mapper 2 - UxROM. Switchable 16 KiB bank at $8000, fixed last bank at
//! $C000; CHR is always RAM (no CHR banking).

use crate::cartridge::header::{Header, Mirroring};
use crate::cartridge::mapper::{
    allocate_prg_ram_with_trainer, ChrStorage, Mapper, MapperCapabilities, PpuAccess,
};
use crate::memory::cpu as cpu_mem;
use crate::reset_kind::ResetKind;

const PRG_BANK_SIZE: usize = 16 * 1024;

#[derive(Debug, Clone)]
pub struct Mapper2 {
    prg_rom: Vec<u8>,
    prg_ram: Vec<u8>,
    chr: ChrStorage,
    mirroring: Mirroring,
    bank_select: u8,
    bank_count: usize,
}

impl Mapper2 {
    pub fn new(header: &Header, prg_rom: Vec<u8>, chr_rom: Vec<u8>, trainer: Option<&[u8]>) -> Self {
        let bank_count = (prg_rom.len() / PRG_BANK_SIZE).max(1);
        Self {
            prg_rom,
            prg_ram: allocate_prg_ram_with_trainer(8 * 1024, trainer),
            chr: ChrStorage::new(header, chr_rom),
            mirroring: header.mirroring,
            bank_select: 0,
            bank_count,
        }
    }

    fn read_prg(&self, addr: u16) -> u8 {
        if self.prg_rom.is_empty() {
            return 0;
        }
        let bank = match addr {
            0x8000..=0xBFFF => self.bank_select as usize % self.bank_count,
            _ => self.bank_count - 1,
        };
        let offset = (addr as usize) & (PRG_BANK_SIZE - 1);
        self.prg_rom[bank * PRG_BANK_SIZE + offset]
    }
}

impl Mapper for Mapper2 {
    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            cpu_mem::PRG_RAM_START..=cpu_mem::PRG_RAM_END => {
                if self.prg_ram.is_empty() {
                    None
                } else {
                    let idx = (addr - cpu_mem::PRG_RAM_START) as usize % self.prg_ram.len();
                    Some(self.prg_ram[idx])
                }
            }
            cpu_mem::PRG_ROM_START..=cpu_mem::CPU_ADDR_END => Some(self.read_prg(addr)),
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, data: u8) {
        match addr {
            cpu_mem::PRG_RAM_START..=cpu_mem::PRG_RAM_END => {
                if !self.prg_ram.is_empty() {
                    let len = self.prg_ram.len();
                    self.prg_ram[(addr - cpu_mem::PRG_RAM_START) as usize % len] = data;
                }
            }
            cpu_mem::PRG_ROM_START..=cpu_mem::CPU_ADDR_END => {
                // Bus conflicts aside (most boards wire-AND the ROM value in
                // practice), the low bits select the swappable bank.
                self.bank_select = data & 0x0F;
            }
            _ => {}
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
    }

    fn capabilities(&self) -> MapperCapabilities {
        MapperCapabilities::default()
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn mapper_id(&self) -> u16 {
        2
    }

    fn name(&self) -> &'static str {
        "UxROM"
    }

    fn prg_ram(&self) -> Option<&[u8]> {
        (!self.prg_ram.is_empty()).then_some(&self.prg_ram)
    }

    fn prg_ram_mut(&mut self) -> Option<&mut [u8]> {
        if self.prg_ram.is_empty() {
            None
        } else {
            Some(&mut self.prg_ram)
        }
    }

    fn save_state(&self) -> Vec<u8> {
        #[cfg(feature = "savestate-postcard")]
        {
            postcard::to_allocvec(&(self.prg_ram.clone(), self.bank_select)).unwrap_or_default()
        }
        #[cfg(not(feature = "savestate-postcard"))]
        {
            Vec::new()
        }
    }

    fn load_state(&mut self, _bytes: &[u8]) {
        #[cfg(feature = "savestate-postcard")]
        {
            if let Ok((prg_ram, bank_select)) = postcard::from_bytes::<(Vec<u8>, u8)>(_bytes) {
                self.prg_ram = prg_ram;
                self.bank_select = bank_select;
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
            mapper: 2,
            submapper: 0,
            mirroring: Mirroring::Vertical,
            battery_backed: false,
            trainer_present: false,
            prg_rom_size: 4 * PRG_BANK_SIZE,
            chr_rom_size: 0,
            chr_is_ram: true,
        }
    }

    fn banked_prg() -> Vec<u8> {
        let mut prg = vec![0u8; 4 * PRG_BANK_SIZE];
        for (bank, chunk) in prg.chunks_mut(PRG_BANK_SIZE).enumerate() {
            chunk.fill(bank as u8);
        }
        prg
    }

    #[test]
    fn last_bank_is_fixed_at_c000() {
        let mut mapper = Mapper2::new(&header(), banked_prg(), vec![], None);
        assert_eq!(mapper.cpu_read(0xC000), Some(3));
        mapper.cpu_write(0x8000, 0x02);
        assert_eq!(mapper.cpu_read(0xC000), Some(3));
    }

    #[test]
    fn write_selects_low_bank() {
        let mut mapper = Mapper2::new(&header(), banked_prg(), vec![], None);
        mapper.cpu_write(0x8000, 0x02);
        assert_eq!(mapper.cpu_read(0x8000), Some(2));
    }
}
