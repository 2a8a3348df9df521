//! Mapper 69 - FME-7 (Sunsoft 5B). An address/data register pair selects one
//! of sixteen internal registers: eight 1 KiB CHR banks, four 8 KiB PRG
//! windows (the last always available as the $E000 PRG-RAM-or-ROM window),
//! a mirroring mode, and a down-counting IRQ that can be clocked by CPU
//! cycles. The 5B variant's extra YM2149-derived sound channels are tracked
//! structurally only; full expansion audio mixing is out of scope.

use crate::cartridge::header::{Header, Mirroring};
use crate::cartridge::mapper::{
    allocate_prg_ram_with_trainer, ChrStorage, Mapper, MapperCapabilities, PpuAccess,
};
use crate::memory::cpu as cpu_mem;
use crate::reset_kind::ResetKind;

const PRG_BANK_SIZE: usize = 8 * 1024;
const CHR_BANK_1K: usize = 1024;

#[derive(Debug, Clone)]
pub struct Mapper69 {
    prg_rom: Vec<u8>,
    prg_ram: Vec<u8>,
    chr: ChrStorage,
    mirroring: Mirroring,

    command: u8,
    chr_banks: [u8; 8],
    prg_banks: [u8; 4],
    ram_select_and_enable: u8,

    irq_counter: u16,
    irq_enabled: bool,
    irq_pending: bool,

    prg_bank_count_8k: usize,
}

impl Mapper69 {
    pub fn new(header: &Header, prg_rom: Vec<u8>, chr_rom: Vec<u8>, trainer: Option<&[u8]>) -> Self {
        let prg_bank_count_8k = (prg_rom.len() / PRG_BANK_SIZE).max(1);
        Self {
            prg_rom,
            prg_ram: allocate_prg_ram_with_trainer(8 * 1024, trainer),
            chr: ChrStorage::new(header, chr_rom),
            mirroring: header.mirroring,
            command: 0,
            chr_banks: [0; 8],
            prg_banks: [0; 4],
            ram_select_and_enable: 0,
            irq_counter: 0,
            irq_enabled: false,
            irq_pending: false,
            prg_bank_count_8k,
        }
    }

    fn ram_window_is_ram(&self) -> bool {
        self.ram_select_and_enable & 0x40 == 0
    }

    fn ram_window_enabled(&self) -> bool {
        self.ram_select_and_enable & 0x80 != 0
    }

    fn chr_bank_count(&self) -> usize {
        (self.chr.as_slice().len() / CHR_BANK_1K).max(1)
    }

    fn chr_offset(&self, addr: u16) -> usize {
        let window = (addr as usize / CHR_BANK_1K).min(7);
        let bank = self.chr_banks[window] as usize % self.chr_bank_count();
        bank * CHR_BANK_1K + (addr as usize % CHR_BANK_1K)
    }

    fn read_prg(&self, addr: u16) -> u8 {
        if self.prg_rom.is_empty() {
            return 0;
        }
        let last = self.prg_bank_count_8k.saturating_sub(1);
        let window = ((addr - 0x8000) / PRG_BANK_SIZE as u16) as usize;
        let bank = if window == 3 {
            last
        } else {
            (self.prg_banks[window] as usize % self.prg_bank_count_8k).min(last)
        };
        let offset = (addr as usize) & (PRG_BANK_SIZE - 1);
        self.prg_rom[bank * PRG_BANK_SIZE + offset]
    }
}

impl Mapper for Mapper69 {
    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x6000..=0x7FFF => {
                if !self.ram_window_enabled() {
                    return None;
                }
                if self.ram_window_is_ram() {
                    if self.prg_ram.is_empty() {
                        None
                    } else {
                        let idx = (addr - 0x6000) as usize % self.prg_ram.len();
                        Some(self.prg_ram[idx])
                    }
                } else {
                    let bank = (self.prg_banks[0] as usize) % self.prg_bank_count_8k;
                    let offset = (addr - 0x6000) as usize;
                    Some(self.prg_rom.get(bank * PRG_BANK_SIZE + offset).copied().unwrap_or(0))
                }
            }
            cpu_mem::PRG_ROM_START..=cpu_mem::CPU_ADDR_END => Some(self.read_prg(addr)),
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, data: u8) {
        match addr {
            0x6000..=0x7FFF => {
                if self.ram_window_enabled() && self.ram_window_is_ram() && !self.prg_ram.is_empty() {
                    let len = self.prg_ram.len();
                    self.prg_ram[(addr - 0x6000) as usize % len] = data;
                }
            }
            0x8000..=0x9FFF => self.command = data & 0x0F,
            0xA000..=0xBFFF => match self.command {
                0x0..=0x7 => self.chr_banks[self.command as usize] = data,
                0x8 => self.ram_select_and_enable = data,
                0x9..=0xB => self.prg_banks[(self.command - 0x9) as usize] = data,
                0xC => {
                    self.mirroring = match data & 0x03 {
                        0 => Mirroring::Vertical,
                        1 => Mirroring::Horizontal,
                        2 => Mirroring::SingleScreenA,
                        _ => Mirroring::SingleScreenB,
                    };
                }
                0xD => {
                    self.irq_enabled = data & 0x01 != 0;
                    self.irq_pending = false;
                }
                0xE => self.irq_counter = (self.irq_counter & 0xFF00) | data as u16,
                0xF => self.irq_counter = (self.irq_counter & 0x00FF) | ((data as u16) << 8),
                _ => {}
            },
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
        self.command = 0;
        self.irq_enabled = false;
        self.irq_pending = false;
    }

    fn capabilities(&self) -> MapperCapabilities {
        MapperCapabilities::default()
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn mapper_id(&self) -> u16 {
        69
    }

    fn name(&self) -> &'static str {
        "FME-7"
    }

    fn irq_pending(&self) -> bool {
        self.irq_pending
    }

    fn clear_irq(&mut self) {
        self.irq_pending = false;
    }

    fn clock_cpu(&mut self, cycles: u32) {
        if !self.irq_enabled {
            return;
        }
        for _ in 0..cycles {
            let (next, overflowed) = self.irq_counter.overflowing_sub(1);
            self.irq_counter = next;
            if overflowed {
                self.irq_pending = true;
            }
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
                self.command,
                self.chr_banks,
                self.prg_banks,
                self.ram_select_and_enable,
                self.irq_counter,
                self.irq_enabled,
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
                [u8; 4],
                u8,
                u16,
                bool,
                bool,
                Mirroring,
            );
            if let Ok((
                prg_ram,
                chr,
                command,
                chr_banks,
                prg_banks,
                ram_select_and_enable,
                irq_counter,
                irq_enabled,
                irq_pending,
                mirroring,
            )) = postcard::from_bytes::<Blob>(_bytes)
            {
                self.prg_ram = prg_ram;
                match &mut self.chr {
                    ChrStorage::Rom(_) => {}
                    ChrStorage::Ram(data) => *data = chr,
                }
                self.command = command;
                self.chr_banks = chr_banks;
                self.prg_banks = prg_banks;
                self.ram_select_and_enable = ram_select_and_enable;
                self.irq_counter = irq_counter;
                self.irq_enabled = irq_enabled;
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
            mapper: 69,
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
    fn last_prg_window_is_always_the_final_bank() {
        let mut prg = vec![0u8; 8 * PRG_BANK_SIZE];
        for (bank, chunk) in prg.chunks_mut(PRG_BANK_SIZE).enumerate() {
            chunk.fill(bank as u8);
        }
        let mapper = Mapper69::new(&header(), prg, vec![0u8; 8 * 1024], None);
        let mut mapper = mapper;
        assert_eq!(mapper.cpu_read(0xE000), Some(7));
    }

    #[test]
    fn irq_counter_underflow_raises_pending() {
        let mut mapper = Mapper69::new(&header(), vec![0u8; 8 * PRG_BANK_SIZE], vec![0u8; 8 * 1024], None);
        mapper.cpu_write(0x8000, 0xE);
        mapper.cpu_write(0xA000, 0x01); // counter low = 1
        mapper.cpu_write(0x8000, 0xD);
        mapper.cpu_write(0xA000, 0x01); // enable
        mapper.clock_cpu(2);
        assert!(mapper.irq_pending());
    }
}
