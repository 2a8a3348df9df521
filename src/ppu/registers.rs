//! Bitflag definitions for the three CPU-visible PPU registers that carry
//! more than a plain byte's worth of independent state: `PPUCTRL`,
//! `PPUMASK`, and `PPUSTATUS`.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "savestate-serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct Control: u8 {
        /// Base nametable select, low bit. Mirrored into `t` directly rather
        /// than read back out of this flag set.
        const NAMETABLE_LO = 1 << 0;
        const NAMETABLE_HI = 1 << 1;
        const VRAM_INCREMENT_32 = 1 << 2;
        const SPRITE_TABLE = 1 << 3;
        const BACKGROUND_TABLE = 1 << 4;
        const SPRITE_SIZE_16 = 1 << 5;
        const MASTER_SLAVE = 1 << 6;
        const NMI_ENABLE = 1 << 7;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "savestate-serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct Mask: u8 {
        const GRAYSCALE = 1 << 0;
        const SHOW_BACKGROUND_LEFT = 1 << 1;
        const SHOW_SPRITES_LEFT = 1 << 2;
        const SHOW_BACKGROUND = 1 << 3;
        const SHOW_SPRITES = 1 << 4;
        const EMPHASIZE_RED = 1 << 5;
        const EMPHASIZE_GREEN = 1 << 6;
        const EMPHASIZE_BLUE = 1 << 7;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "savestate-serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct Status: u8 {
        const SPRITE_OVERFLOW = 1 << 5;
        const SPRITE_ZERO_HIT = 1 << 6;
        const VBLANK = 1 << 7;
    }
}
