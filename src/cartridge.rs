//! ROM loading and the top-level [`Cartridge`] handle that owns a parsed
//! header, the constructed [`mapper::Mapper`] trait object, and the ROM's
//! checksum for save-state compatibility checks.

pub mod header;
pub mod mapper;

use crate::error::{Error, Result};
use header::{Header, Mirroring, NES_HEADER_LEN, TRAINER_SIZE};
use mapper::Mapper;

/// A loaded ROM image: parsed header, constructed mapper, and an identity
/// checksum over the raw PRG+CHR payload used to validate save states
/// against the cartridge they were taken from.
pub struct Cartridge {
    header: Header,
    mapper: Box<dyn Mapper>,
    checksum: u32,
}

impl Cartridge {
    /// Parses a full iNES/NES 2.0 image (header, optional trainer, PRG ROM,
    /// CHR ROM) and constructs the appropriate mapper.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let header = Header::parse(bytes)?;
        let mut offset = NES_HEADER_LEN;

        let trainer = if header.trainer_present {
            let end = offset + TRAINER_SIZE;
            if bytes.len() < end {
                return Err(Error::SectionTooShort {
                    section: "trainer",
                    expected: TRAINER_SIZE,
                    actual: bytes.len().saturating_sub(offset),
                });
            }
            let trainer = &bytes[offset..end];
            offset = end;
            Some(trainer)
        } else {
            None
        };

        let prg_end = offset + header.prg_rom_size;
        if bytes.len() < prg_end {
            return Err(Error::SectionTooShort {
                section: "PRG ROM",
                expected: header.prg_rom_size,
                actual: bytes.len().saturating_sub(offset),
            });
        }
        let prg_rom = bytes[offset..prg_end].to_vec();
        offset = prg_end;

        let chr_end = offset + header.chr_rom_size;
        let chr_rom = if header.chr_rom_size > 0 {
            if bytes.len() < chr_end {
                return Err(Error::SectionTooShort {
                    section: "CHR ROM",
                    expected: header.chr_rom_size,
                    actual: bytes.len().saturating_sub(offset),
                });
            }
            bytes[offset..chr_end].to_vec()
        } else {
            Vec::new()
        };

        let checksum = Self::checksum_of(&prg_rom, &chr_rom);

        tracing::info!(
            mapper = header.mapper,
            prg_kib = header.prg_rom_size / 1024,
            chr_kib = header.chr_rom_size / 1024,
            format = ?header.format,
            "loaded cartridge"
        );

        let mapper = mapper::build_mapper(&header, prg_rom, chr_rom, trainer);

        Ok(Self {
            header,
            mapper,
            checksum,
        })
    }

    #[cfg(feature = "cartridge-db")]
    fn checksum_of(prg_rom: &[u8], chr_rom: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(prg_rom);
        hasher.update(chr_rom);
        hasher.finalize()
    }

    #[cfg(not(feature = "cartridge-db"))]
    fn checksum_of(_prg_rom: &[u8], _chr_rom: &[u8]) -> u32 {
        0
    }

    /// CRC32 over the raw PRG+CHR payload (`0` if the `cartridge-db` feature
    /// is disabled). Used to guard save-state loads against a mismatched
    /// cartridge rather than to identify games in an external database.
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn mirroring(&self) -> Mirroring {
        self.mapper.mirroring()
    }

    pub fn mapper(&self) -> &dyn Mapper {
        self.mapper.as_ref()
    }

    pub fn mapper_mut(&mut self) -> &mut dyn Mapper {
        self.mapper.as_mut()
    }
}

impl std::fmt::Debug for Cartridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cartridge")
            .field("header", &self.header)
            .field("mapper", &self.mapper.name())
            .field("checksum", &self.checksum)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nrom_image(prg_banks: u8, chr_banks: u8) -> Vec<u8> {
        let mut bytes = vec![0u8; NES_HEADER_LEN];
        bytes[0..4].copy_from_slice(b"NES\x1A");
        bytes[4] = prg_banks;
        bytes[5] = chr_banks;
        bytes.extend(vec![0xEA; prg_banks as usize * header::PRG_BANK_UNIT]);
        bytes.extend(vec![0x00; chr_banks as usize * header::CHR_BANK_UNIT]);
        bytes
    }

    #[test]
    fn loads_minimal_nrom_image() {
        let cart = Cartridge::load(&nrom_image(2, 1)).unwrap();
        assert_eq!(cart.header().mapper, 0);
        assert_eq!(cart.mapper().name(), "NROM");
    }

    #[test]
    fn rejects_truncated_prg_section() {
        let mut bytes = nrom_image(2, 1);
        bytes.truncate(NES_HEADER_LEN + 100);
        let err = Cartridge::load(&bytes).unwrap_err();
        assert!(matches!(err, Error::SectionTooShort { section: "PRG ROM", .. }));
    }

    #[test]
    fn identical_images_checksum_identically() {
        let a = Cartridge::load(&nrom_image(2, 1)).unwrap();
        let b = Cartridge::load(&nrom_image(2, 1)).unwrap();
        assert_eq!(a.checksum(), b.checksum());
    }
}
