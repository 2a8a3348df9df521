//! Versioned save-state document (§6 external interfaces).
//!
//! [`SaveState`] is a plain data snapshot of everything [`crate::console::Console`]
//! needs to resume bit-for-bit: CPU/PPU/APU register state, internal RAM, both
//! controllers, the zapper, and an opaque mapper-private blob. The core does
//! not pick a wire encoding itself (per the design notes' stance against
//! baked-in serialization formats): with `savestate-serde` enabled the
//! document derives `Serialize`/`Deserialize` so a host can pick its own
//! encoder, and with `savestate-postcard` enabled [`SaveState::to_bytes`] /
//! [`SaveState::from_bytes`] offer a ready-made compact binary encoding.

use crate::apu::Apu;
use crate::controller::{Controller, Zapper};
use crate::cpu::Cpu;
use crate::error::{Error, Result};
use crate::mem_block::cpu::Ram;
use crate::ppu::Ppu;

/// Bumped whenever a field is added, removed, or reinterpreted in a way that
/// would desync an older document from this build's expectations.
pub const SAVE_STATE_VERSION: u32 = 1;

#[derive(Debug, Clone)]
#[cfg_attr(feature = "savestate-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SaveState {
    pub version: u32,
    /// [`crate::cartridge::Cartridge::checksum`] of the cartridge this state
    /// was taken against. Checked against the currently-loaded cartridge on
    /// load, but a mismatch only warns (§7) rather than failing the load.
    pub cartridge_checksum: u32,
    /// [`crate::cartridge::mapper::Mapper::mapper_id`] of the mapper
    /// `mapper_state` was produced by. Unlike the cartridge checksum, a
    /// mismatch here skips restoring the mapper blob entirely, since feeding
    /// bytes shaped for one mapper's private layout into another's
    /// `load_state` has no well-defined behavior.
    pub mapper_id: u16,
    pub cpu: Cpu,
    pub ppu: Ppu,
    pub apu: Apu,
    pub ram: Ram,
    pub controller1: Controller,
    pub controller2: Controller,
    pub zapper: Zapper,
    pub mapper_state: Vec<u8>,
    pub pending_nmi: bool,
    pub cycle_parity: bool,
    pub open_bus: u8,
}

#[cfg(feature = "savestate-postcard")]
impl SaveState {
    /// Encodes this document with `postcard`'s compact binary format.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        postcard::to_allocvec(self).map_err(|err| Error::SaveStateCodec(err.to_string()))
    }

    /// Decodes a document previously produced by [`SaveState::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        postcard::from_bytes(bytes).map_err(|err| Error::SaveStateCodec(err.to_string()))
    }
}

#[cfg(all(test, feature = "savestate-postcard"))]
mod tests {
    use super::*;

    fn sample_state() -> SaveState {
        SaveState {
            version: SAVE_STATE_VERSION,
            cartridge_checksum: 0xDEAD_BEEF,
            mapper_id: 4,
            cpu: Cpu::new(),
            ppu: Ppu::new(),
            apu: Apu::new(),
            ram: Ram::new(),
            controller1: Controller::new(),
            controller2: Controller::new(),
            zapper: Zapper::new(),
            mapper_state: vec![1, 2, 3, 4],
            pending_nmi: false,
            cycle_parity: true,
            open_bus: 0x42,
        }
    }

    #[test]
    fn postcard_round_trip_preserves_scalar_fields() {
        let original = sample_state();
        let bytes = original.to_bytes().expect("encode");
        let restored = SaveState::from_bytes(&bytes).expect("decode");

        assert_eq!(restored.version, original.version);
        assert_eq!(restored.cartridge_checksum, original.cartridge_checksum);
        assert_eq!(restored.mapper_id, original.mapper_id);
        assert_eq!(restored.mapper_state, original.mapper_state);
        assert_eq!(restored.pending_nmi, original.pending_nmi);
        assert_eq!(restored.cycle_parity, original.cycle_parity);
        assert_eq!(restored.open_bus, original.open_bus);
    }

    #[test]
    fn decoding_truncated_bytes_fails_instead_of_panicking() {
        let original = sample_state();
        let mut bytes = original.to_bytes().expect("encode");
        bytes.truncate(bytes.len() / 2);
        assert!(SaveState::from_bytes(&bytes).is_err());
    }
}
