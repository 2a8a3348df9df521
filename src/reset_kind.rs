//! Distinguishes power-on from soft reset.
//!
//! The distilled spec's `power_on`/`reset` operations (§4.1) imply two
//! different entry vectors: power-on re-applies the configured RAM-init
//! pattern and clears every latch; soft reset leaves CPU/cartridge RAM
//! contents untouched and only resets registers, the PC (via the reset
//! vector), and a handful of PPU/APU latches, matching real hardware.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResetKind {
    PowerOn,
    Soft,
}
