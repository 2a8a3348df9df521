//! Mappers 9 (MMC2/PxROM, Punch-Out!!) and 10 (MMC4/FxROM, Fire Emblem). CHR
//! latch banking: reading tile `$FD` or `$FE` from the low byte of a pattern
//! fetch flips a latch that changes which CHR bank serves the *next* fetch
//! from that half of pattern space. MMC2 has separate fixed PRG ROM plus one
//! switchable 8 KiB PRG bank; MMC4 switches a 16 KiB PRG bank instead.

use crate::cartridge::header::{Header, Mirroring};
use crate::cartridge::mapper::{ChrStorage, Mapper, MapperCapabilities, PpuAccess};
use crate::memory::cpu as cpu_mem;
use crate::reset_kind::ResetKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Latch {
    Fd,
    Fe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrgGranularity {
    /// MMC2: 8 KiB switchable window at $8000, fixed last 24 KiB.
    Mmc2,
    /// MMC4: 16 KiB switchable window at $8000, fixed last 16 KiB.
    Mmc4,
}

#[derive(Debug, Clone)]
struct ChrLatchMapper {
    prg_rom: Vec<u8>,
    chr_rom: Vec<u8>,
    mirroring: Mirroring,
    granularity: PrgGranularity,

    prg_bank: u8,
    chr_bank_fd_low: u8,
    chr_bank_fe_low: u8,
    chr_bank_fd_high: u8,
    chr_bank_fe_high: u8,
    latch_low: Latch,
    latch_high: Latch,
}

const CHR_BANK_SIZE: usize = 4 * 1024;

impl ChrLatchMapper {
    fn new(header: &Header, prg_rom: Vec<u8>, chr_rom: Vec<u8>, granularity: PrgGranularity) -> Self {
        Self {
            prg_rom,
            chr_rom,
            mirroring: header.mirroring,
            granularity,
            prg_bank: 0,
            chr_bank_fd_low: 0,
            chr_bank_fe_low: 0,
            chr_bank_fd_high: 0,
            chr_bank_fe_high: 0,
            latch_low: Latch::Fe,
            latch_high: Latch::Fe,
        }
    }

    fn prg_bank_count(&self, window: usize) -> usize {
        (self.prg_rom.len() / window).max(1)
    }

    fn read_prg(&self, addr: u16) -> u8 {
        if self.prg_rom.is_empty() {
            return 0;
        }
        match self.granularity {
            PrgGranularity::Mmc2 => {
                const WINDOW: usize = 8 * 1024;
                let bank = if addr < 0xA000 {
                    self.prg_bank as usize % self.prg_bank_count(WINDOW)
                } else {
                    // Fixed: last three 8 KiB banks.
                    let total = self.prg_rom.len() / WINDOW;
                    total.saturating_sub(4 - ((addr - 0xA000) / WINDOW as u16) as usize - 1)
                };
                let offset = (addr as usize) & (WINDOW - 1);
                self.prg_rom[(bank % self.prg_bank_count(WINDOW)) * WINDOW + offset]
            }
            PrgGranularity::Mmc4 => {
                const WINDOW: usize = 16 * 1024;
                let bank = if addr < 0xC000 {
                    self.prg_bank as usize % self.prg_bank_count(WINDOW)
                } else {
                    self.prg_bank_count(WINDOW).saturating_sub(1)
                };
                let offset = (addr as usize) & (WINDOW - 1);
                self.prg_rom[bank * WINDOW + offset]
            }
        }
    }

    fn chr_bank_count(&self) -> usize {
        (self.chr_rom.len() / CHR_BANK_SIZE).max(1)
    }

    fn read_chr(&mut self, addr: u16) -> u8 {
        let half_low = addr < 0x1000;
        let latch = if half_low { self.latch_low } else { self.latch_high };
        let bank = if half_low {
            match latch {
                Latch::Fd => self.chr_bank_fd_low,
                Latch::Fe => self.chr_bank_fe_low,
            }
        } else {
            match latch {
                Latch::Fd => self.chr_bank_fd_high,
                Latch::Fe => self.chr_bank_fe_high,
            }
        } as usize
            % self.chr_bank_count();

        // Latch flips on the second bitplane byte of tile $FD/$FE ($xFD8-$xFDF,
        // $xFE8-$xFEF within each half), not the first ($xFD0-$xFD7).
        let local = addr & 0x0FFF;
        if (0x0FD8..=0x0FDF).contains(&local) {
            if half_low {
                self.latch_low = Latch::Fd;
            } else {
                self.latch_high = Latch::Fd;
            }
        } else if (0x0FE8..=0x0FEF).contains(&local) {
            if half_low {
                self.latch_low = Latch::Fe;
            } else {
                self.latch_high = Latch::Fe;
            }
        }

        if self.chr_rom.is_empty() {
            return 0;
        }
        let offset = (addr as usize) & (CHR_BANK_SIZE - 1);
        self.chr_rom[bank * CHR_BANK_SIZE + offset]
    }

    fn cpu_write(&mut self, addr: u16, data: u8) {
        match addr {
            0xA000..=0xAFFF => self.prg_bank = data,
            0xB000..=0xBFFF => self.chr_bank_fd_low = data & 0x1F,
            0xC000..=0xCFFF => self.chr_bank_fe_low = data & 0x1F,
            0xD000..=0xDFFF => self.chr_bank_fd_high = data & 0x1F,
            0xE000..=0xEFFF => self.chr_bank_fe_high = data & 0x1F,
            0xF000..=0xFFFF => {
                self.mirroring = if data & 0x01 != 0 {
                    Mirroring::Horizontal
                } else {
                    Mirroring::Vertical
                };
            }
            _ => {}
        }
    }
}

macro_rules! chr_latch_mapper {
    ($name:ident, $id:expr, $label:expr, $granularity:expr) => {
        #[derive(Debug, Clone)]
        pub struct $name(ChrLatchMapper);

        impl $name {
            pub fn new(header: &Header, prg_rom: Vec<u8>, chr_rom: Vec<u8>) -> Self {
                Self(ChrLatchMapper::new(header, prg_rom, chr_rom, $granularity))
            }
        }

        impl Mapper for $name {
            fn cpu_read(&mut self, addr: u16) -> Option<u8> {
                match addr {
                    cpu_mem::PRG_ROM_START..=cpu_mem::CPU_ADDR_END => Some(self.0.read_prg(addr)),
                    _ => None,
                }
            }

            fn cpu_write(&mut self, addr: u16, data: u8) {
                self.0.cpu_write(addr, data);
            }

            fn ppu_read(&mut self, addr: u16, _ctx: PpuAccess) -> Option<u8> {
                Some(self.0.read_chr(addr))
            }

            fn ppu_write(&mut self, _addr: u16, _data: u8) -> bool {
                false
            }

            fn reset(&mut self, _kind: ResetKind) {
                self.0.latch_low = Latch::Fe;
                self.0.latch_high = Latch::Fe;
            }

            fn capabilities(&self) -> MapperCapabilities {
                MapperCapabilities {
                    chr_latch: true,
                    ..Default::default()
                }
            }

            fn mirroring(&self) -> Mirroring {
                self.0.mirroring
            }

            fn mapper_id(&self) -> u16 {
                $id
            }

            fn name(&self) -> &'static str {
                $label
            }

            fn save_state(&self) -> Vec<u8> {
                #[cfg(feature = "savestate-postcard")]
                {
                    let latch_low = self.0.latch_low == Latch::Fd;
                    let latch_high = self.0.latch_high == Latch::Fd;
                    postcard::to_allocvec(&(
                        self.0.prg_bank,
                        self.0.chr_bank_fd_low,
                        self.0.chr_bank_fe_low,
                        self.0.chr_bank_fd_high,
                        self.0.chr_bank_fe_high,
                        latch_low,
                        latch_high,
                        self.0.mirroring,
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
                    type Blob = (u8, u8, u8, u8, u8, bool, bool, Mirroring);
                    if let Ok((
                        prg_bank,
                        chr_bank_fd_low,
                        chr_bank_fe_low,
                        chr_bank_fd_high,
                        chr_bank_fe_high,
                        latch_low,
                        latch_high,
                        mirroring,
                    )) = postcard::from_bytes::<Blob>(_bytes)
                    {
                        self.0.prg_bank = prg_bank;
                        self.0.chr_bank_fd_low = chr_bank_fd_low;
                        self.0.chr_bank_fe_low = chr_bank_fe_low;
                        self.0.chr_bank_fd_high = chr_bank_fd_high;
                        self.0.chr_bank_fe_high = chr_bank_fe_high;
                        self.0.latch_low = if latch_low { Latch::Fd } else { Latch::Fe };
                        self.0.latch_high = if latch_high { Latch::Fd } else { Latch::Fe };
                        self.0.mirroring = mirroring;
                    }
                }
            }
        }
    };
}

chr_latch_mapper!(Mapper9, 9, "MMC2", PrgGranularity::Mmc2);
chr_latch_mapper!(Mapper10, 10, "MMC4", PrgGranularity::Mmc4);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::header::RomFormat;

    fn header() -> Header {
        Header {
            format: RomFormat::INes,
            mapper: 9,
            submapper: 0,
            mirroring: Mirroring::Vertical,
            battery_backed: false,
            trainer_present: false,
            prg_rom_size: 128 * 1024,
            chr_rom_size: 128 * 1024,
            chr_is_ram: false,
        }
    }

    fn chr_with_markers() -> Vec<u8> {
        let mut chr = vec![0u8; 32 * CHR_BANK_SIZE];
        chr[0] = 0xAA; // bank 0, low half, latch FE default value
        chr[CHR_BANK_SIZE] = 0xBB; // bank 1
        chr
    }

    #[test]
    fn reading_fd_tile_flips_latch_for_next_fetch() {
        let mut mapper = Mapper9::new(&header(), vec![0u8; 128 * 1024], chr_with_markers());
        mapper.cpu_write(0xB000, 0); // FD -> bank 0
        mapper.cpu_write(0xC000, 1); // FE -> bank 1

        // Default latch is FE, so normal fetch returns bank 1's value.
        assert_eq!(mapper.ppu_read(0, PpuAccess::Background), Some(0xBB));
        // Fetching tile $FD's second bitplane byte ($0FD8-$0FDF) flips the latch to FD.
        mapper.ppu_read(0x0FD8, PpuAccess::Background);
        assert_eq!(mapper.ppu_read(0, PpuAccess::Background), Some(0xAA));
    }

    #[test]
    fn reading_fd_tile_in_the_first_bitplane_does_not_flip_the_latch() {
        let mut mapper = Mapper9::new(&header(), vec![0u8; 128 * 1024], chr_with_markers());
        mapper.cpu_write(0xB000, 0); // FD -> bank 0
        mapper.cpu_write(0xC000, 1); // FE -> bank 1

        // $0FD0-$0FD7 is tile $FD's *first* bitplane; real hardware only
        // reacts to the second bitplane fetch at $0FD8-$0FDF.
        mapper.ppu_read(0x0FD0, PpuAccess::Background);
        assert_eq!(mapper.ppu_read(0, PpuAccess::Background), Some(0xBB));
    }

    #[test]
    fn the_high_half_has_its_own_independent_latch() {
        let mut mapper = Mapper9::new(&header(), vec![0u8; 128 * 1024], chr_with_markers());
        mapper.cpu_write(0xD000, 0); // high FD -> bank 0
        mapper.cpu_write(0xE000, 1); // high FE -> bank 1

        assert_eq!(mapper.ppu_read(0x1000, PpuAccess::Background), Some(0xBB));
        // Fetching tile $FD in the high half's second bitplane ($1FD8-$1FDF)
        // must flip latch_high without disturbing latch_low.
        mapper.ppu_read(0x1FD8, PpuAccess::Background);
        assert_eq!(mapper.ppu_read(0x1000, PpuAccess::Background), Some(0xAA));
        assert_eq!(mapper.ppu_read(0, PpuAccess::Background), Some(0xBB));
    }

    #[test]
    fn mmc2_fixes_last_three_8kb_banks() {
        let mut prg = vec![0u8; 5 * 8 * 1024];
        for (bank, chunk) in prg.chunks_mut(8 * 1024).enumerate() {
            chunk.fill(bank as u8);
        }
        let mut mapper = Mapper9::new(&header(), prg, chr_with_markers());
        assert_eq!(mapper.cpu_read(0xA000), Some(2));
        assert_eq!(mapper.cpu_read(0xFFFF), Some(4));
    }
}
