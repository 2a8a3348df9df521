//! Mapper 6 - MMC6. A scaled-down MMC3 sibling: the same bank-select/data
//! register pair and scanline IRQ counter, but CHR is fixed 8 KiB RAM (no
//! CHR banking) and PRG RAM is a single 1 KiB window split into two
//! independently write-protectable 512-byte halves.

use crate::cartridge::header::{Header, Mirroring};
use crate::cartridge::mapper::{ChrStorage, Mapper, MapperCapabilities, PpuAccess};
use crate::memory::cpu as cpu_mem;
use crate::reset_kind::ResetKind;

const PRG_BANK_SIZE: usize = 8 * 1024;
const PRG_RAM_HALF: usize = 512;

#[derive(Debug, Clone)]
pub struct Mapper6 {
    prg_rom: Vec<u8>,
    prg_ram: [u8; PRG_RAM_HALF * 2],
    chr_ram: Vec<u8>,
    mirroring: Mirroring,

    bank_select: u8,
    bank_registers: [u8; 8],
    ram_enable: u8,

    irq_latch: u8,
    irq_counter: u8,
    irq_enabled: bool,
    irq_reload_pending: bool,
    irq_pending: bool,

    prg_bank_count_8k: usize,
}

impl Mapper6 {
    pub fn new(header: &Header, prg_rom: Vec<u8>, _chr_rom: Vec<u8>, _trainer: Option<&[u8]>) -> Self {
        let prg_bank_count_8k = (prg_rom.len() / PRG_BANK_SIZE).max(1);
        Self {
            prg_rom,
            prg_ram: [0; PRG_RAM_HALF * 2],
            chr_ram: vec![0u8; 8 * 1024],
            mirroring: header.mirroring,
            bank_select: 0,
            bank_registers: [0; 8],
            ram_enable: 0,
            irq_latch: 0,
            irq_counter: 0,
            irq_enabled: false,
            irq_reload_pending: false,
            irq_pending: false,
            prg_bank_count_8k,
        }
    }

    fn prg_rom_inversion(&self) -> bool {
        self.bank_select & 0x40 != 0
    }

    fn prg_bank_for(&self, addr: u16) -> usize {
        let window = (addr - cpu_mem::PRG_ROM_START) / PRG_BANK_SIZE as u16;
        let last = self.prg_bank_count_8k.saturating_sub(1);
        let second_last = self.prg_bank_count_8k.saturating_sub(2);
        let r6 = self.bank_registers[6] as usize % self.prg_bank_count_8k.max(1);
        let r7 = self.bank_registers[7] as usize % self.prg_bank_count_8k.max(1);

        let bank = if self.prg_rom_inversion() {
            match window {
                0 => second_last,
                1 => r7,
                2 => r6,
                _ => last,
            }
        } else {
            match window {
                0 => r6,
                1 => r7,
                2 => second_last,
                _ => last,
            }
        };
        bank.min(last)
    }

    /// Half-index (0 or 1) and read/write enable bits for the 1 KiB PRG RAM
    /// window, decoded from the $A001 control register.
    fn ram_half_enabled(&self, half: usize) -> (bool, bool) {
        let shift = half * 2;
        let enabled = self.ram_enable & (0x80 >> 0) != 0; // bit 7: RAM present at all
        let read_enable = enabled && (self.ram_enable & (0x10 << shift) != 0);
        let write_enable = enabled && (self.ram_enable & (0x20 << shift) != 0);
        (read_enable, write_enable)
    }
}

impl Mapper for Mapper6 {
    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x7000..=0x71FF => {
                let half = 0;
                let (read_enable, _) = self.ram_half_enabled(half);
                if read_enable {
                    Some(self.prg_ram[(addr - 0x7000) as usize])
                } else {
                    None
                }
            }
            0x7200..=0x73FF => {
                let half = 1;
                let (read_enable, _) = self.ram_half_enabled(half);
                if read_enable {
                    Some(self.prg_ram[PRG_RAM_HALF + (addr - 0x7200) as usize])
                } else {
                    None
                }
            }
            cpu_mem::PRG_ROM_START..=cpu_mem::CPU_ADDR_END => {
                if self.prg_rom.is_empty() {
                    Some(0)
                } else {
                    let bank = self.prg_bank_for(addr);
                    let offset = (addr as usize) & (PRG_BANK_SIZE - 1);
                    Some(self.prg_rom[bank * PRG_BANK_SIZE + offset])
                }
            }
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, data: u8) {
        match addr {
            0x7000..=0x71FF => {
                let (_, write_enable) = self.ram_half_enabled(0);
                if write_enable {
                    self.prg_ram[(addr - 0x7000) as usize] = data;
                }
            }
            0x7200..=0x73FF => {
                let (_, write_enable) = self.ram_half_enabled(1);
                if write_enable {
                    self.prg_ram[PRG_RAM_HALF + (addr - 0x7200) as usize] = data;
                }
            }
            0x8000..=0x9FFF if addr % 2 == 0 => self.bank_select = data,
            0x8000..=0x9FFF => {
                let index = (self.bank_select & 0x07) as usize;
                self.bank_registers[index] = data;
            }
            0xA000..=0xBFFF if addr % 2 == 0 => {
                self.mirroring = if data & 0x01 != 0 {
                    Mirroring::Horizontal
                } else {
                    Mirroring::Vertical
                };
            }
            0xA000..=0xBFFF => self.ram_enable = data,
            0xC000..=0xDFFF if addr % 2 == 0 => self.irq_latch = data,
            0xC000..=0xDFFF => self.irq_reload_pending = true,
            0xE000..=0xFFFF if addr % 2 == 0 => {
                self.irq_enabled = false;
                self.irq_pending = false;
            }
            0xE000..=0xFFFF => self.irq_enabled = true,
            _ => {}
        }
    }

    fn ppu_read(&mut self, addr: u16, _ctx: PpuAccess) -> Option<u8> {
        Some(self.chr_ram[addr as usize % self.chr_ram.len()])
    }

    fn ppu_write(&mut self, addr: u16, data: u8) -> bool {
        let len = self.chr_ram.len();
        self.chr_ram[addr as usize % len] = data;
        true
    }

    fn reset(&mut self, _kind: ResetKind) {
        self.bank_select = 0;
        self.bank_registers = [0; 8];
        self.irq_latch = 0;
        self.irq_counter = 0;
        self.irq_enabled = false;
        self.irq_reload_pending = false;
        self.irq_pending = false;
    }

    fn capabilities(&self) -> MapperCapabilities {
        MapperCapabilities {
            scanline_irq: true,
            ..Default::default()
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn mapper_id(&self) -> u16 {
        6
    }

    fn name(&self) -> &'static str {
        "MMC6"
    }

    fn irq_pending(&self) -> bool {
        self.irq_pending
    }

    fn clear_irq(&mut self) {
        self.irq_pending = false;
    }

    fn clock_scanline_irq(&mut self) {
        if self.irq_counter == 0 || self.irq_reload_pending {
            self.irq_counter = self.irq_latch;
            self.irq_reload_pending = false;
        } else {
            self.irq_counter -= 1;
        }
        if self.irq_counter == 0 && self.irq_enabled {
            self.irq_pending = true;
        }
    }

    fn save_state(&self) -> Vec<u8> {
        #[cfg(feature = "savestate-postcard")]
        {
            postcard::to_allocvec(&(
                self.prg_ram,
                self.chr_ram.clone(),
                self.bank_select,
                self.bank_registers,
                self.ram_enable,
                self.irq_latch,
                self.irq_counter,
                self.irq_enabled,
                self.irq_reload_pending,
                self.irq_pending,
                self.mirroring,
            ))
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
            type Blob = (
                [u8; PRG_RAM_HALF * 2],
                Vec<u8>,
                u8,
                [u8; 8],
                u8,
                u8,
                u8,
                bool,
                bool,
                bool,
                Mirroring,
            );
            if let Ok((
                prg_ram,
                chr_ram,
                bank_select,
                bank_registers,
                ram_enable,
                irq_latch,
                irq_counter,
                irq_enabled,
                irq_reload_pending,
                irq_pending,
                mirroring,
            )) = postcard::from_bytes::<Blob>(_bytes)
            {
                self.prg_ram = prg_ram;
                self.chr_ram = chr_ram;
                self.bank_select = bank_select;
                self.bank_registers = bank_registers;
                self.ram_enable = ram_enable;
                self.irq_latch = irq_latch;
                self.irq_counter = irq_counter;
                self.irq_enabled = irq_enabled;
                self.irq_reload_pending = irq_reload_pending;
                self.irq_pending = irq_pending;
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
            mapper: 6,
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
    fn ram_half_requires_both_present_and_write_bits() {
        let mut mapper = Mapper6::new(&header(), vec![0u8; 4 * PRG_BANK_SIZE], vec![], None);
        mapper.cpu_write(0x7000, 0xAB); // write enable not set yet
        assert_eq!(mapper.cpu_read(0x7000), None);

        mapper.cpu_write(0xA001, 0x80 | 0x20); // present + half-0 write enable
        mapper.cpu_write(0x7000, 0xAB);
        mapper.cpu_write(0xA001, 0x80 | 0x10 | 0x20); // present + read + write
        assert_eq!(mapper.cpu_read(0x7000), Some(0xAB));
    }

    #[test]
    fn chr_ram_is_always_writable() {
        let mut mapper = Mapper6::new(&header(), vec![0u8; 4 * PRG_BANK_SIZE], vec![], None);
        assert!(mapper.ppu_write(0x0100, 0x5A));
        assert_eq!(mapper.ppu_read(0x0100, PpuAccess::Background), Some(0x5A));
    }
}
