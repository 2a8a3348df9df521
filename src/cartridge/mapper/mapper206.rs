//! Mapper 206 - DxROM/Namco 118. The bank-select/data register pair from
//! MMC3 without the IRQ generator, PRG-RAM-enable register, or PRG-ROM
//! inversion bit: a strict subset used by early Namco and Tengen boards.

use crate::cartridge::header::{Header, Mirroring};
use crate::cartridge::mapper::{ChrStorage, Mapper, MapperCapabilities, PpuAccess};
use crate::memory::cpu as cpu_mem;
use crate::reset_kind::ResetKind;

const PRG_BANK_SIZE: usize = 8 * 1024;
const CHR_BANK_1K: usize = 1024;

#[derive(Debug, Clone)]
pub struct Mapper206 {
    prg_rom: Vec<u8>,
    chr: ChrStorage,
    mirroring: Mirroring,
    bank_select: u8,
    bank_registers: [u8; 8],
    prg_bank_count_8k: usize,
}

impl Mapper206 {
    pub fn new(header: &Header, prg_rom: Vec<u8>, chr_rom: Vec<u8>) -> Self {
        let prg_bank_count_8k = (prg_rom.len() / PRG_BANK_SIZE).max(1);
        Self {
            prg_rom,
            chr: ChrStorage::new(header, chr_rom),
            mirroring: header.mirroring,
            bank_select: 0,
            bank_registers: [0; 8],
            prg_bank_count_8k,
        }
    }

    fn read_prg(&self, addr: u16) -> u8 {
        if self.prg_rom.is_empty() {
            return 0;
        }
        let last = self.prg_bank_count_8k.saturating_sub(1);
        let window = ((addr - cpu_mem::PRG_ROM_START) / PRG_BANK_SIZE as u16) as usize;
        let bank = match window {
            0 => (self.bank_registers[6] as usize % self.prg_bank_count_8k).min(last),
            1 => (self.bank_registers[7] as usize % self.prg_bank_count_8k).min(last),
            2 => last.saturating_sub(1),
            _ => last,
        };
        let offset = (addr as usize) & (PRG_BANK_SIZE - 1);
        self.prg_rom[bank * PRG_BANK_SIZE + offset]
    }

    fn chr_bank_count(&self) -> usize {
        (self.chr.as_slice().len() / CHR_BANK_1K).max(1)
    }

    fn chr_offset(&self, addr: u16) -> usize {
        let local = addr as usize & 0x1FFF;
        if local < 0x1000 {
            let reg_index = local / (2 * CHR_BANK_1K);
            let base = (self.bank_registers[reg_index] & 0xFE) as usize % self.chr_bank_count().max(2);
            base * CHR_BANK_1K + (local % (2 * CHR_BANK_1K))
        } else {
            let local = local - 0x1000;
            let reg_index = 2 + local / CHR_BANK_1K;
            let base = self.bank_registers[reg_index] as usize % self.chr_bank_count();
            base * CHR_BANK_1K + (local % CHR_BANK_1K)
        }
    }
}

impl Mapper for Mapper206 {
    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            cpu_mem::PRG_ROM_START..=cpu_mem::CPU_ADDR_END => Some(self.read_prg(addr)),
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, data: u8) {
        match addr {
            0x8000..=0x9FFF if addr % 2 == 0 => self.bank_select = data & 0x07,
            0x8000..=0x9FFF => {
                let index = self.bank_select as usize;
                self.bank_registers[index] = data;
            }
            _ => {}
        }
    }

    fn ppu_read(&mut self, addr: u16, _ctx: PpuAccess) -> Option<u8> {
        let offset = self.chr_offset(addr);
        Some(self.chr.read(offset))
    }

    fn ppu_write(&mut self, addr: u16, data: u8) -> bool {
        let offset = self.chr_offset(addr);
        self.chr.write(offset, data);
        self.chr.is_ram()
    }

    fn reset(&mut self, _kind: ResetKind) {
        self.bank_select = 0;
        self.bank_registers = [0; 8];
    }

    fn capabilities(&self) -> MapperCapabilities {
        MapperCapabilities::default()
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn mapper_id(&self) -> u16 {
        206
    }

    fn name(&self) -> &'static str {
        "DxROM"
    }

    fn save_state(&self) -> Vec<u8> {
        #[cfg(feature = "savestate-postcard")]
        {
            postcard::to_allocvec(&(self.bank_select, self.bank_registers)).unwrap_or_default()
        }
        #[cfg(not(feature = "savestate-postcard"))]
        {
            Vec::new()
        }
    }

    fn load_state(&mut self, _bytes: &[u8]) {
        #[cfg(feature = "savestate-postcard")]
        {
            if let Ok((bank_select, bank_registers)) = postcard::from_bytes::<(u8, [u8; 8])>(_bytes) {
                self.bank_select = bank_select;
                self.bank_registers = bank_registers;
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
            mapper: 206,
            submapper: 0,
            mirroring: Mirroring::Horizontal,
            battery_backed: false,
            trainer_present: false,
            prg_rom_size: 8 * PRG_BANK_SIZE,
            chr_rom_size: 8 * 1024,
            chr_is_ram: false,
        }
    }

    #[test]
    fn last_two_banks_are_fixed() {
        let mut prg = vec![0u8; 8 * PRG_BANK_SIZE];
        for (bank, chunk) in prg.chunks_mut(PRG_BANK_SIZE).enumerate() {
            chunk.fill(bank as u8);
        }
        let mut mapper = Mapper206::new(&header(), prg, vec![0u8; 8 * 1024]);
        assert_eq!(mapper.cpu_read(0xC000), Some(6));
        assert_eq!(mapper.cpu_read(0xE000), Some(7));
    }

    #[test]
    fn has_no_irq_capability() {
        let mapper = Mapper206::new(&header(), vec![0u8; 8 * PRG_BANK_SIZE], vec![0u8; 8 * 1024]);
        assert!(!mapper.capabilities().scanline_irq);
    }
}
