//! Mapper 4 - MMC3 (TxROM) and its close relatives 118 (TQROM) / 119
//! (TQROM-CHR-ROM-RAM). Bank-select/data register pair, scanline IRQ counter
//! clocked from PPU A12 rising edges, and the one-off PRG/CHR A/B layout
//! swap bit.

use crate::cartridge::header::{Header, Mirroring};
use crate::cartridge::mapper::{
    allocate_prg_ram_with_trainer, ChrStorage, Mapper, MapperCapabilities, PpuAccess,
};
use crate::memory::cpu as cpu_mem;
use crate::reset_kind::ResetKind;

const PRG_BANK_SIZE: usize = 8 * 1024;
const CHR_BANK_1K: usize = 1024;

#[derive(Debug, Clone)]
pub struct Mapper4 {
    prg_rom: Vec<u8>,
    prg_ram: Vec<u8>,
    chr: ChrStorage,
    mirroring: Mirroring,
    mirroring_locked: bool,

    bank_select: u8,
    bank_registers: [u8; 8],

    irq_latch: u8,
    irq_counter: u8,
    irq_enabled: bool,
    irq_reload_pending: bool,
    irq_pending: bool,

    prg_bank_count_8k: usize,
}

impl Mapper4 {
    pub fn new(header: &Header, prg_rom: Vec<u8>, chr_rom: Vec<u8>, trainer: Option<&[u8]>) -> Self {
        let prg_bank_count_8k = (prg_rom.len() / PRG_BANK_SIZE).max(1);
        let mirroring_locked = header.mirroring == Mirroring::FourScreen;
        Self {
            prg_rom,
            prg_ram: allocate_prg_ram_with_trainer(8 * 1024, trainer),
            chr: ChrStorage::new(header, chr_rom),
            mirroring: header.mirroring,
            mirroring_locked,
            bank_select: 0,
            bank_registers: [0; 8],
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

    fn chr_inversion(&self) -> bool {
        self.bank_select & 0x80 != 0
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

    fn read_prg(&self, addr: u16) -> u8 {
        if self.prg_rom.is_empty() {
            return 0;
        }
        let bank = self.prg_bank_for(addr);
        let offset = (addr as usize) & (PRG_BANK_SIZE - 1);
        self.prg_rom[bank * PRG_BANK_SIZE + offset]
    }

    fn chr_offset(&self, addr: u16) -> usize {
        let bank_1k_count = (self.chr.as_slice().len() / CHR_BANK_1K).max(1);
        // Two 2 KiB windows (registers 0/1, even bank numbers) followed by
        // four 1 KiB windows (registers 2-5), with the A/B halves swapped
        // when the CHR-inversion bit is set.
        let window_2k = |reg_even: u8, offset_within: usize| -> usize {
            let base = (reg_even & 0xFE) as usize;
            (base * CHR_BANK_1K + offset_within) % self.chr.as_slice().len().max(1)
        };
        let window_1k = |reg: u8, offset_within: usize| -> usize {
            (reg as usize * CHR_BANK_1K + offset_within) % self.chr.as_slice().len().max(1)
        };

        let local = addr as usize & 0x1FFF;
        let (low_half, high_half) = if self.chr_inversion() {
            (true, false)
        } else {
            (false, true)
        };
        let _ = bank_1k_count;

        if local < 0x1000 {
            if low_half {
                // $0000-$0FFF serves the four 1 KiB windows (R2-R5).
                let reg_index = local / CHR_BANK_1K;
                window_1k(self.bank_registers[2 + reg_index], local % CHR_BANK_1K)
            } else {
                let reg_index = local / (2 * CHR_BANK_1K);
                window_2k(self.bank_registers[reg_index], local % (2 * CHR_BANK_1K))
            }
        } else {
            let local = local - 0x1000;
            if high_half {
                let reg_index = local / CHR_BANK_1K;
                window_1k(self.bank_registers[2 + reg_index], local % CHR_BANK_1K)
            } else {
                let reg_index = local / (2 * CHR_BANK_1K);
                window_2k(self.bank_registers[reg_index], local % (2 * CHR_BANK_1K))
            }
        }
    }
}

impl Mapper for Mapper4 {
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
            0x8000..=0x9FFF if addr % 2 == 0 => self.bank_select = data,
            0x8000..=0x9FFF => {
                let index = (self.bank_select & 0x07) as usize;
                self.bank_registers[index] = data;
            }
            0xA000..=0xBFFF if addr % 2 == 0 => {
                if !self.mirroring_locked {
                    self.mirroring = if data & 0x01 != 0 {
                        Mirroring::Horizontal
                    } else {
                        Mirroring::Vertical
                    };
                }
            }
            0xA000..=0xBFFF => {
                // PRG RAM protect register; this core keeps PRG RAM always
                // accessible, so only the enable semantics would differ in
                // a stricter implementation.
            }
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
        4
    }

    fn name(&self) -> &'static str {
        "MMC3"
    }

    fn irq_pending(&self) -> bool {
        self.irq_pending
    }

    fn clear_irq(&mut self) {
        self.irq_pending = false;
    }

    /// Called by the PPU on each qualifying A12 rising edge (outside the
    /// ~12-dot re-trigger filter window).
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
            postcard::to_allocvec(&(
                self.prg_ram.clone(),
                self.chr.as_slice().to_vec(),
                self.bank_select,
                self.bank_registers,
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
                Vec<u8>,
                Vec<u8>,
                u8,
                [u8; 8],
                u8,
                u8,
                bool,
                bool,
                bool,
                Mirroring,
            );
            if let Ok((
                prg_ram,
                chr,
                bank_select,
                bank_registers,
                irq_latch,
                irq_counter,
                irq_enabled,
                irq_reload_pending,
                irq_pending,
                mirroring,
            )) = postcard::from_bytes::<Blob>(_bytes)
            {
                self.prg_ram = prg_ram;
                match &mut self.chr {
                    ChrStorage::Rom(_) => {}
                    ChrStorage::Ram(data) => *data = chr,
                }
                self.bank_select = bank_select;
                self.bank_registers = bank_registers;
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
            mapper: 4,
            submapper: 0,
            mirroring: Mirroring::Horizontal,
            battery_backed: false,
            trainer_present: false,
            prg_rom_size: 8 * PRG_BANK_SIZE,
            chr_rom_size: 8 * 1024,
            chr_is_ram: false,
        }
    }

    fn banked_prg() -> Vec<u8> {
        let mut prg = vec![0u8; 8 * PRG_BANK_SIZE];
        for (bank, chunk) in prg.chunks_mut(PRG_BANK_SIZE).enumerate() {
            chunk.fill(bank as u8);
        }
        prg
    }

    #[test]
    fn second_to_last_bank_is_fixed_by_default() {
        let mut mapper = Mapper4::new(&header(), banked_prg(), vec![0u8; 8 * 1024], None);
        assert_eq!(mapper.cpu_read(0xC000), Some(6));
        assert_eq!(mapper.cpu_read(0xE000), Some(7));
    }

    #[test]
    fn irq_fires_after_counter_reaches_zero() {
        let mut mapper = Mapper4::new(&header(), banked_prg(), vec![0u8; 8 * 1024], None);
        mapper.cpu_write(0xC000, 4); // irq latch
        mapper.cpu_write(0xC001, 0); // reload pending
        mapper.cpu_write(0xE001, 0); // enable

        for _ in 0..5 {
            mapper.clock_scanline_irq();
        }
        assert!(mapper.irq_pending());
    }

    #[test]
    fn irq_disable_clears_pending() {
        let mut mapper = Mapper4::new(&header(), banked_prg(), vec![0u8; 8 * 1024], None);
        mapper.cpu_write(0xC000, 0);
        mapper.cpu_write(0xC001, 0);
        mapper.cpu_write(0xE001, 0);
        mapper.clock_scanline_irq();
        assert!(mapper.irq_pending());
        mapper.cpu_write(0xE000, 0);
        assert!(!mapper.irq_pending());
    }

    #[test]
    fn bank_select_writes_route_to_selected_register() {
        let mut mapper = Mapper4::new(&header(), banked_prg(), vec![0u8; 8 * 1024], None);
        mapper.cpu_write(0x8000, 6); // select R6 (PRG window 0)
        mapper.cpu_write(0x8001, 2);
        assert_eq!(mapper.cpu_read(0x8000), Some(2));
    }
}
