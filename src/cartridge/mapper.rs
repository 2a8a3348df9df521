//! Cartridge mapper capability contract and the mapper registry.
//!
//! Mappers are represented as trait objects (`Box<dyn Mapper>`) rather than
//! by reflection or method-presence checks: every mapper declares its
//! [`MapperCapabilities`] up front, and the CPU/PPU/APU call the optional
//! hooks unconditionally (the default no-op implementations make this safe
//! for mappers that don't need them).

use std::fmt::Debug;

use crate::cartridge::header::{Header, Mirroring};
use crate::reset_kind::ResetKind;

pub mod mapper0;
pub mod mapper1;
pub mod mapper2;
pub mod mapper3;
pub mod mapper4;
pub mod mapper5;
pub mod mapper6;
pub mod mapper7;
pub mod mapper911;
pub mod mapper_simple;
pub mod mapper25;
pub mod mapper69;
pub mod mapper206;

pub use mapper0::Mapper0;
pub use mapper1::Mapper1;
pub use mapper2::Mapper2;
pub use mapper3::Mapper3;
pub use mapper4::Mapper4;
pub use mapper5::Mapper5;
pub use mapper6::Mapper6;
pub use mapper7::Mapper7;
pub use mapper25::Mapper25;
pub use mapper69::Mapper69;
pub use mapper206::Mapper206;
pub use mapper911::{Mapper10, Mapper9};
pub use mapper_simple::{Mapper11, Mapper34, Mapper66, Mapper79};

/// What kind of PPU fetch is asking for a byte from pattern space. Mappers
/// with per-tile attributes (MMC5) or CHR latches (MMC2/4) need to know
/// whether the fetch is the background pipeline, a sprite fetch, or an
/// attribute byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PpuAccess {
    Background,
    Sprite,
    Attribute,
}

/// What the PPU's nametable fetch logic is asking for, when routed through a
/// mapper that declares `nametable_override`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NametableAccess {
    Tile,
    Attribute,
    /// A CPU-side access to ExRAM-as-nametable-RAM (`$5C00-$5FFF` on MMC5).
    Cpu,
}

/// Capability flags declared by a mapper at construction time (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MapperCapabilities {
    /// Requires [`Mapper::clock_scanline_irq`] to be called on qualifying
    /// A12 rising edges.
    pub scanline_irq: bool,
    /// Requires [`Mapper::read_nametable`] / [`Mapper::write_nametable`].
    pub nametable_override: bool,
    /// Requires [`Mapper::extended_attribute`].
    pub per_tile_attributes: bool,
    /// CHR latch transitions happen inside [`Mapper::ppu_read`] itself.
    pub chr_latch: bool,
}

/// Core mapper interface implemented by all cartridge boards.
///
/// `cpu_read`/`ppu_read` take `&mut self` because several boards mutate
/// latches purely as a side effect of being read (MMC2/4 CHR latches, MMC5
/// ExRAM mode 1 reads).
pub trait Mapper: Debug {
    fn cpu_read(&mut self, addr: u16) -> Option<u8>;
    fn cpu_write(&mut self, addr: u16, data: u8);
    fn ppu_read(&mut self, addr: u16, ctx: PpuAccess) -> Option<u8>;
    /// Returns `true` if the mapper consumed the write (the PPU should not
    /// fall back to CHR RAM/CIRAM itself).
    fn ppu_write(&mut self, addr: u16, data: u8) -> bool;

    fn reset(&mut self, kind: ResetKind);
    fn capabilities(&self) -> MapperCapabilities;
    fn mirroring(&self) -> Mirroring;
    fn mapper_id(&self) -> u16;
    fn name(&self) -> &'static str;

    /// Returns `true` while the mapper's internal interrupt line is
    /// asserted (OR'd with the APU's frame/DMC IRQ lines by the CPU).
    fn irq_pending(&self) -> bool {
        false
    }

    fn clear_irq(&mut self) {}

    /// Called once per CPU cycle with the number of cycles elapsed since the
    /// last call (§4.1 step 4 / catch-up).
    fn clock_cpu(&mut self, _cycles: u32) {}

    /// Called by the console once every CPU instruction retires. MMC1 uses
    /// this to detect and reject a second serial-register write issued
    /// within the same instruction (the documented read-modify-write quirk).
    fn on_instruction_boundary(&mut self) {}

    /// Called by the PPU when `capabilities().scanline_irq` is set and a
    /// qualifying A12 rising edge (outside the ~12-dot filter window) is
    /// observed on a pattern-space fetch.
    fn clock_scanline_irq(&mut self) {}

    /// Notification hook for CPU writes to `$2000-$3FFF` (MMC5 watches
    /// `$2000`/`$2001` for the PPU sprite-size bit and rendering state).
    fn on_ppu_register_write(&mut self, _addr: u16, _data: u8) {}

    /// Called at dot 4 of every rendered scanline (background or sprites
    /// enabled), early enough that a mapper IRQ handler can update
    /// nametables before the next background fetch (MMC5 scanline-compare
    /// IRQ).
    fn on_end_scanline(&mut self, _line: u16) {}

    fn read_nametable(&mut self, _addr: u16, _ctx: NametableAccess) -> Option<u8> {
        None
    }

    fn write_nametable(&mut self, _addr: u16, _data: u8) -> bool {
        false
    }

    fn extended_attribute(&mut self, _coarse_x: u8, _coarse_y: u8) -> Option<u8> {
        None
    }

    /// Current expansion-audio sample in `[0.0, 1.0]`-ish linear amplitude
    /// space (MMC5's two extra pulse channels + PCM output).
    fn expansion_audio_sample(&self) -> f32 {
        0.0
    }

    fn clock_expansion_audio(&mut self, _cpu_cycles: u32) {}

    fn prg_ram(&self) -> Option<&[u8]> {
        None
    }

    fn prg_ram_mut(&mut self) -> Option<&mut [u8]> {
        None
    }

    /// Serializes mapper-private state to an opaque byte blob. With the
    /// `savestate-postcard` feature disabled this returns an empty vector;
    /// the `Cartridge`-level checksum guards against loading it back into a
    /// mismatched cartridge.
    fn save_state(&self) -> Vec<u8>;

    /// Restores mapper-private state from a blob produced by
    /// [`Mapper::save_state`] for a mapper of the same `mapper_id`.
    fn load_state(&mut self, bytes: &[u8]);
}

/// Allocates CPU-visible PRG RAM for boards with a fixed-size work RAM
/// window, optionally copying in the 512-byte trainer at its conventional
/// offset (`$7000`, i.e. byte 0x1000 into an 8 KiB PRG RAM window).
pub(crate) fn allocate_prg_ram_with_trainer(size: usize, trainer: Option<&[u8]>) -> Vec<u8> {
    let mut ram = vec![0u8; size];
    if let Some(trainer) = trainer {
        const TRAINER_OFFSET: usize = 0x1000;
        if ram.len() >= TRAINER_OFFSET + trainer.len() {
            ram[TRAINER_OFFSET..TRAINER_OFFSET + trainer.len()].copy_from_slice(trainer);
        }
    }
    ram
}

/// Backing storage for PPU pattern space: either read-only CHR ROM or
/// mutable CHR RAM, addressed uniformly by `$0000-$1FFF`.
#[derive(Debug, Clone)]
pub(crate) enum ChrStorage {
    Rom(Vec<u8>),
    Ram(Vec<u8>),
}

impl ChrStorage {
    pub(crate) fn new(header: &Header, chr_rom: Vec<u8>) -> Self {
        if header.chr_is_ram {
            // 8 KiB is the conventional default CHR RAM size when the header
            // doesn't specify one via NES 2.0 extensions.
            ChrStorage::Ram(vec![0u8; 8 * 1024])
        } else {
            ChrStorage::Rom(chr_rom)
        }
    }

    pub(crate) fn read(&self, offset: usize) -> u8 {
        match self {
            ChrStorage::Rom(data) | ChrStorage::Ram(data) => {
                if data.is_empty() {
                    0
                } else {
                    data[offset % data.len()]
                }
            }
        }
    }

    pub(crate) fn write(&mut self, offset: usize, value: u8) {
        if let ChrStorage::Ram(data) = self {
            if !data.is_empty() {
                let len = data.len();
                data[offset % len] = value;
            }
        }
    }

    pub(crate) fn is_ram(&self) -> bool {
        matches!(self, ChrStorage::Ram(_))
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        match self {
            ChrStorage::Rom(data) | ChrStorage::Ram(data) => data,
        }
    }
}

/// Constructs the mapper for a parsed header, falling back to NROM with a
/// logged warning for unimplemented mapper ids (§7 "Unknown mapper").
pub fn build_mapper(
    header: &Header,
    prg_rom: Vec<u8>,
    chr_rom: Vec<u8>,
    trainer: Option<&[u8]>,
) -> Box<dyn Mapper> {
    match header.mapper {
        0 => Box::new(Mapper0::new(header, prg_rom, chr_rom)),
        1 => Box::new(Mapper1::new(header, prg_rom, chr_rom, trainer)),
        2 => Box::new(Mapper2::new(header, prg_rom, chr_rom, trainer)),
        3 => Box::new(Mapper3::new(header, prg_rom, chr_rom)),
        4 | 118 | 119 => Box::new(Mapper4::new(header, prg_rom, chr_rom, trainer)),
        5 => Box::new(Mapper5::new(header, prg_rom, chr_rom, trainer)),
        6 => Box::new(Mapper6::new(header, prg_rom, chr_rom, trainer)),
        7 => Box::new(Mapper7::new(header, prg_rom, chr_rom)),
        9 => Box::new(Mapper9::new(header, prg_rom, chr_rom)),
        10 => Box::new(Mapper10::new(header, prg_rom, chr_rom)),
        11 => Box::new(Mapper11::new(header, prg_rom, chr_rom)),
        25 => Box::new(Mapper25::new(header, prg_rom, chr_rom)),
        34 => Box::new(Mapper34::new(header, prg_rom, chr_rom)),
        66 => Box::new(Mapper66::new(header, prg_rom, chr_rom)),
        69 => Box::new(Mapper69::new(header, prg_rom, chr_rom, trainer)),
        79 => Box::new(Mapper79::new(header, prg_rom, chr_rom)),
        206 => Box::new(Mapper206::new(header, prg_rom, chr_rom)),
        other => {
            tracing::warn!(mapper = other, "unsupported mapper id, falling back to NROM");
            Box::new(Mapper0::new(header, prg_rom, chr_rom))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::header::RomFormat;

    fn header_with_mapper(mapper: u16) -> Header {
        Header {
            format: RomFormat::INes,
            mapper,
            submapper: 0,
            mirroring: Mirroring::Horizontal,
            battery_backed: false,
            trainer_present: false,
            prg_rom_size: 32 * 1024,
            chr_rom_size: 8 * 1024,
            chr_is_ram: false,
        }
    }

    #[test]
    fn unknown_mapper_falls_back_to_nrom() {
        let header = header_with_mapper(250);
        let mapper = build_mapper(&header, vec![0u8; 32 * 1024], vec![0u8; 8 * 1024], None);
        assert_eq!(mapper.mapper_id(), 0);
    }
}
