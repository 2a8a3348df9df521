//! Processor status flags (`P` register).

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "savestate-serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct StatusFlags: u8 {
        const CARRY             = 0b0000_0001;
        const ZERO              = 0b0000_0010;
        const INTERRUPT_DISABLE = 0b0000_0100;
        const DECIMAL           = 0b0000_1000;
        /// Only meaningful as pushed to the stack by PHP/BRK; never read back
        /// from the live `P` register during execution.
        const BREAK             = 0b0001_0000;
        const UNUSED            = 0b0010_0000;
        const OVERFLOW          = 0b0100_0000;
        const NEGATIVE          = 0b1000_0000;
    }
}

impl StatusFlags {
    /// Power-on value: IRQ disabled, the two unused/break bits set as they
    /// read back on real hardware.
    pub const POWER_ON: Self = Self::from_bits_truncate(
        Self::INTERRUPT_DISABLE.bits() | Self::UNUSED.bits() | Self::BREAK.bits(),
    );

    pub fn set_zero_negative(&mut self, value: u8) {
        self.set(Self::ZERO, value == 0);
        self.set(Self::NEGATIVE, value & 0x80 != 0);
    }
}

impl Default for StatusFlags {
    fn default() -> Self {
        Self::POWER_ON
    }
}
