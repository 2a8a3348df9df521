//! iNES / NES 2.0 header parsing.
//!
//! See §6 of the spec for the exact byte layout. This module only parses the
//! 16-byte header; PRG/CHR extraction and trainer handling live in
//! [`super`].

use crate::error::{Error, Result};

pub const NES_HEADER_LEN: usize = 16;
const MAGIC: [u8; 4] = [b'N', b'E', b'S', 0x1A];
pub const TRAINER_SIZE: usize = 512;
pub const PRG_BANK_UNIT: usize = 16 * 1024;
pub const CHR_BANK_UNIT: usize = 8 * 1024;

/// Nametable mirroring mode. Most mappers install one of these at load time
/// and may later switch it (AxROM, MMC1, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "savestate-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mirroring {
    Horizontal,
    Vertical,
    SingleScreenA,
    SingleScreenB,
    FourScreen,
}

impl Mirroring {
    /// Maps a PPU nametable-space address (`$2000-$2FFF`, already masked to
    /// 12 bits) to a byte offset within the 2 KiB CIRAM block. Four-screen
    /// mirroring is handled by the mapper's ExRAM/nametable override instead
    /// and should never reach this function.
    pub fn ciram_offset(self, addr: u16) -> usize {
        let table = (addr / 0x0400) % 4;
        let offset_in_table = (addr % 0x0400) as usize;
        let bank = match self {
            Mirroring::Horizontal => table / 2,
            Mirroring::Vertical => table % 2,
            Mirroring::SingleScreenA => 0,
            Mirroring::SingleScreenB => 1,
            Mirroring::FourScreen => table,
        };
        (bank as usize % 2) * 0x0400 + offset_in_table
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RomFormat {
    INes,
    Nes20,
}

/// Parsed iNES/NES 2.0 header fields relevant to this core.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Header {
    pub format: RomFormat,
    pub mapper: u16,
    pub submapper: u8,
    pub mirroring: Mirroring,
    pub battery_backed: bool,
    pub trainer_present: bool,
    pub prg_rom_size: usize,
    pub chr_rom_size: usize,
    /// `0` means the cartridge uses CHR RAM instead of CHR ROM.
    pub chr_is_ram: bool,
}

impl Header {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < NES_HEADER_LEN {
            return Err(Error::TooShort { actual: bytes.len() });
        }
        if bytes[0..4] != MAGIC {
            return Err(Error::InvalidMagic);
        }

        let prg_banks = bytes[4] as usize;
        let chr_banks = bytes[5] as usize;
        let flags6 = bytes[6];
        let flags7 = bytes[7];

        let four_screen = flags6 & 0x08 != 0;
        let vertical = flags6 & 0x01 != 0;
        let mirroring = if four_screen {
            Mirroring::FourScreen
        } else if vertical {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };
        let battery_backed = flags6 & 0x02 != 0;
        let trainer_present = flags6 & 0x04 != 0;

        let is_nes20 = flags7 & 0x0C == 0x08;
        let format = if is_nes20 { RomFormat::Nes20 } else { RomFormat::INes };

        // Heuristic from §6: in iNES 1.0 with non-zero bytes 8-15, trust only
        // the low 4 bits of the mapper id (the high nibble in byte 7 is
        // frequently garbage left by older tools).
        let tail_nonzero = bytes[8..16].iter().any(|&b| b != 0);
        let mapper_low = (flags6 >> 4) as u16;
        let mapper_high = (flags7 & 0xF0) as u16;
        let mapper = match format {
            RomFormat::Nes20 => {
                let extra_high = (bytes[8] & 0x0F) as u16;
                mapper_low | mapper_high | (extra_high << 8)
            }
            RomFormat::INes => {
                if tail_nonzero {
                    mapper_low
                } else {
                    mapper_low | mapper_high
                }
            }
        };

        let submapper = match format {
            RomFormat::Nes20 => bytes[8] >> 4,
            RomFormat::INes => 0,
        };

        let prg_rom_size = prg_banks * PRG_BANK_UNIT;
        let chr_rom_size = chr_banks * CHR_BANK_UNIT;
        let chr_is_ram = chr_banks == 0;

        Ok(Self {
            format,
            mapper,
            submapper,
            mirroring,
            battery_backed,
            trainer_present,
            prg_rom_size,
            chr_rom_size,
            chr_is_ram,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header(prg_banks: u8, chr_banks: u8, flags6: u8, flags7: u8) -> Vec<u8> {
        let mut h = vec![0u8; 16];
        h[0..4].copy_from_slice(&MAGIC);
        h[4] = prg_banks;
        h[5] = chr_banks;
        h[6] = flags6;
        h[7] = flags7;
        h
    }

    #[test]
    fn rejects_missing_magic() {
        let bytes = vec![0u8; 16];
        assert!(matches!(Header::parse(&bytes), Err(Error::InvalidMagic)));
    }

    #[test]
    fn rejects_short_buffer() {
        let bytes = vec![0u8; 8];
        assert!(matches!(Header::parse(&bytes), Err(Error::TooShort { actual: 8 })));
    }

    #[test]
    fn parses_nrom_horizontal() {
        let bytes = sample_header(2, 1, 0x00, 0x00);
        let header = Header::parse(&bytes).unwrap();
        assert_eq!(header.mapper, 0);
        assert_eq!(header.mirroring, Mirroring::Horizontal);
        assert_eq!(header.prg_rom_size, 32 * 1024);
        assert_eq!(header.chr_rom_size, 8 * 1024);
        assert!(!header.chr_is_ram);
    }

    #[test]
    fn chr_zero_banks_means_chr_ram() {
        let bytes = sample_header(2, 0, 0x00, 0x00);
        let header = Header::parse(&bytes).unwrap();
        assert!(header.chr_is_ram);
    }

    #[test]
    fn decodes_mapper_id_across_both_nibbles() {
        // Mapper 4 (MMC3): low nibble 0x4 in flags6, high nibble 0x0 in flags7.
        let bytes = sample_header(8, 8, 0x40, 0x00);
        let header = Header::parse(&bytes).unwrap();
        assert_eq!(header.mapper, 4);
    }

    #[test]
    fn four_screen_overrides_mirroring_bit() {
        let bytes = sample_header(2, 1, 0x09, 0x00);
        let header = Header::parse(&bytes).unwrap();
        assert_eq!(header.mirroring, Mirroring::FourScreen);
    }

    #[test]
    fn detects_nes20_format() {
        let bytes = sample_header(2, 1, 0x00, 0x08);
        let header = Header::parse(&bytes).unwrap();
        assert_eq!(header.format, RomFormat::Nes20);
    }
}
