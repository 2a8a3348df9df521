//! Cycle-accurate NES emulation core.
//!
//! Wires together a 6502 [`cpu`], a [`ppu`], an [`apu`], and a polymorphic
//! cartridge [`cartridge::mapper`] layer behind a single [`console::Console`]
//! orchestrator. Host frontends (frame pump, audio device, input capture,
//! ROM loading from disk) are not part of this crate; see `console` for the
//! minimal surface a frontend drives.

pub mod apu;
pub mod bus;
pub mod cartridge;
pub mod config;
pub mod console;
pub mod controller;
pub mod cpu;
pub mod error;
pub mod mem_block;
pub mod memory;
pub mod ppu;
pub mod reset_kind;
pub mod state;

pub use config::{EmulatorConfig, RamInitPattern};
pub use console::Console;
pub use error::Error;

#[cfg(test)]
mod tests {
    use tracing_subscriber::FmtSubscriber;

    #[test]
    fn init_tracing_does_not_panic() {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(tracing::Level::WARN)
            .finish();
        let _ = tracing::subscriber::set_default(subscriber);
    }
}
