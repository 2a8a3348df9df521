//! Mapper 5 - MMC5 (ExROM). The most capable mapper in this core: 8 switchable
//! 8 KiB PRG windows with a PRG-RAM/ROM mode register, 1 KiB CHR windows with
//! separate background/sprite bank sets, ExRAM in four distinct modes
//! (including use as extra nametable RAM and per-tile attribute storage), a
//! fill-mode nametable, a vertical split-screen region, and a
//! scanline-counter IRQ driven by the PPU's internal rendering state rather
//! than A12 edges.
//!
//! Expansion audio is two pulse channels (no sweep unit, unlike the main
//! APU's) plus a direct-load PCM output, mixed independently of the main
//! APU's frame sequencer: [`Mapper5::clock_expansion_audio`] runs its own
//! 4-step envelope/length sequencer at the same cycle offsets as the main
//! APU's 4-step mode, since nothing reaches back into this mapper to share
//! the APU's `FrameCounter`.

use crate::cartridge::header::{Header, Mirroring};
use crate::cartridge::mapper::{
    allocate_prg_ram_with_trainer, ChrStorage, Mapper, MapperCapabilities, NametableAccess,
    PpuAccess,
};
use crate::memory::cpu as cpu_mem;
use crate::reset_kind::ResetKind;

const PRG_BANK_SIZE: usize = 8 * 1024;
const CHR_BANK_1K: usize = 1024;
const EXRAM_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExRamMode {
    ExtendedNametable,
    ExtendedAttribute,
    PlainRam,
    PlainRamWriteProtected,
}

/// Envelope/duty-gated unit shared by the two expansion-audio pulse
/// channels. Standalone rather than reusing `apu::Envelope`/`apu::Pulse`
/// directly, since those are private to the main APU module and MMC5's
/// pulses lack a sweep unit entirely.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "savestate-serde", derive(serde::Serialize, serde::Deserialize))]
struct Mmc5Envelope {
    start: bool,
    loop_flag: bool,
    constant_volume: bool,
    volume_or_period: u8,
    divider: u8,
    decay: u8,
}

impl Mmc5Envelope {
    fn write(&mut self, data: u8) {
        self.loop_flag = data & 0x20 != 0;
        self.constant_volume = data & 0x10 != 0;
        self.volume_or_period = data & 0x0F;
    }

    fn restart(&mut self) {
        self.start = true;
    }

    fn clock(&mut self) {
        if self.start {
            self.start = false;
            self.decay = 15;
            self.divider = self.volume_or_period;
            return;
        }
        if self.divider == 0 {
            self.divider = self.volume_or_period;
            if self.decay > 0 {
                self.decay -= 1;
            } else if self.loop_flag {
                self.decay = 15;
            }
        } else {
            self.divider -= 1;
        }
    }

    fn output(&self) -> u8 {
        if self.constant_volume { self.volume_or_period } else { self.decay }
    }
}

const MMC5_DUTY_SEQUENCES: [[u8; 8]; 4] = [
    [0, 1, 0, 0, 0, 0, 0, 0],
    [0, 1, 1, 0, 0, 0, 0, 0],
    [0, 1, 1, 1, 1, 0, 0, 0],
    [1, 0, 0, 1, 1, 1, 1, 1],
];

const MMC5_LENGTH_TABLE: [u8; 32] = [
    10, 254, 20, 2, 40, 4, 80, 6, 160, 8, 60, 10, 14, 12, 26, 14,
    12, 16, 24, 18, 48, 20, 96, 22, 192, 24, 72, 26, 16, 28, 32, 30,
];

#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "savestate-serde", derive(serde::Serialize, serde::Deserialize))]
struct Mmc5Pulse {
    duty: u8,
    duty_step: u8,
    envelope: Mmc5Envelope,
    timer_period: u16,
    timer_value: u16,
    length_counter: u8,
    length_halt: bool,
    enabled: bool,
}

impl Mmc5Pulse {
    fn write_control(&mut self, data: u8) {
        self.duty = (data >> 6) & 0x03;
        self.length_halt = data & 0x20 != 0;
        self.envelope.loop_flag = self.length_halt;
        self.envelope.write(data);
    }

    fn write_timer_lo(&mut self, data: u8) {
        self.timer_period = (self.timer_period & 0x0700) | data as u16;
    }

    fn write_timer_hi(&mut self, data: u8) {
        self.timer_period = (self.timer_period & 0x00FF) | (((data & 0x07) as u16) << 8);
        self.duty_step = 0;
        self.envelope.restart();
        if self.enabled {
            self.length_counter = MMC5_LENGTH_TABLE[(data >> 3) as usize];
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.length_counter = 0;
        }
    }

    fn clock_timer(&mut self) {
        if self.timer_value == 0 {
            self.timer_value = self.timer_period;
            self.duty_step = (self.duty_step + 1) % 8;
        } else {
            self.timer_value -= 1;
        }
    }

    fn clock_length(&mut self) {
        if !self.length_halt && self.length_counter > 0 {
            self.length_counter -= 1;
        }
    }

    /// MMC5 pulses run their timer from the same 11-bit period but, unlike
    /// the main APU's pulses, aren't muted by a sweep unit computing a
    /// target period above `$7FF`.
    fn sample(&self) -> u8 {
        if self.length_counter == 0 || self.timer_period < 8 {
            return 0;
        }
        if MMC5_DUTY_SEQUENCES[self.duty as usize][self.duty_step as usize] == 0 {
            return 0;
        }
        self.envelope.output()
    }
}

#[derive(Debug, Clone)]
pub struct Mapper5 {
    prg_rom: Vec<u8>,
    prg_ram: Vec<u8>,
    chr: ChrStorage,
    exram: [u8; EXRAM_SIZE],
    mirroring: Mirroring,

    prg_mode: u8,
    chr_mode: u8,
    exram_mode: u8,
    prg_banks: [u8; 5],
    chr_banks_bg: [u8; 8],
    chr_banks_spr: [u8; 8],
    chr_upper_bits: u8,

    irq_target: u8,
    irq_counter: u16,
    irq_enabled: bool,
    irq_pending: bool,
    in_frame: bool,

    multiplicand: u8,
    multiplier: u8,

    /// Raw `$5105` nametable-mapping register: one 2-bit field per quadrant
    /// (0/1 = CIRAM page 0/1, 2 = ExRAM-as-nametable, 3 = fill mode). Kept
    /// alongside the coarser `mirroring` derivation above (which only looks
    /// at the first quadrant's bits) so fill mode can be detected per
    /// address.
    nametable_mapping: u8,
    fill_tile: u8,
    fill_attribute: u8,

    /// Raw `$5200` vertical split-screen control register.
    split_ctrl: u8,
    split_scroll: u8,
    split_bank: u8,
    /// Set by the most recent `read_nametable` tile fetch, consumed by the
    /// very next `ppu_read(Background)` pattern fetch, so the split
    /// region's pattern bytes come from `split_bank` instead of the normal
    /// background CHR banks.
    split_active_for_fetch: bool,

    pulse1: Mmc5Pulse,
    pulse2: Mmc5Pulse,
    pcm_output: u8,
    pcm_read_mode: bool,
    expansion_cycle_is_even: bool,
    expansion_frame_cycle: u32,
}

impl Mapper5 {
    pub fn new(header: &Header, prg_rom: Vec<u8>, chr_rom: Vec<u8>, trainer: Option<&[u8]>) -> Self {
        Self {
            prg_rom,
            prg_ram: allocate_prg_ram_with_trainer(64 * 1024, trainer),
            chr: ChrStorage::new(header, chr_rom),
            exram: [0; EXRAM_SIZE],
            mirroring: header.mirroring,
            prg_mode: 3,
            chr_mode: 3,
            exram_mode: 0,
            prg_banks: [0xFF; 5],
            chr_banks_bg: [0; 8],
            chr_banks_spr: [0; 8],
            chr_upper_bits: 0,
            irq_target: 0,
            irq_counter: 0,
            irq_enabled: false,
            irq_pending: false,
            in_frame: false,
            multiplicand: 0xFF,
            multiplier: 0xFF,
            nametable_mapping: 0,
            fill_tile: 0,
            fill_attribute: 0,
            split_ctrl: 0,
            split_scroll: 0,
            split_bank: 0,
            split_active_for_fetch: false,
            pulse1: Mmc5Pulse::default(),
            pulse2: Mmc5Pulse::default(),
            pcm_output: 0,
            pcm_read_mode: false,
            expansion_cycle_is_even: true,
            expansion_frame_cycle: 0,
        }
    }

    fn split_enabled(&self) -> bool {
        self.split_ctrl & 0x80 != 0
    }

    fn split_right_side(&self) -> bool {
        self.split_ctrl & 0x40 != 0
    }

    fn split_tile_boundary(&self) -> u8 {
        self.split_ctrl & 0x1F
    }

    /// Returns the fill-tile/ExRAM byte for the vertical split region when
    /// `addr` (already masked to `$000-$FFF`) falls inside it, or `None`
    /// otherwise. Only applies to tile fetches; this core does not model a
    /// separate split-screen attribute source (deviation noted in
    /// DESIGN.md).
    fn split_screen_override(&self, masked: u16, ctx: NametableAccess) -> Option<u8> {
        if !self.split_enabled() || ctx != NametableAccess::Tile {
            return None;
        }
        let coarse_x = (masked & 0x1F) as u8;
        let in_split_region = if self.split_right_side() {
            coarse_x >= self.split_tile_boundary()
        } else {
            coarse_x < self.split_tile_boundary()
        };
        if !in_split_region {
            return None;
        }
        let effective_row = (self.irq_counter.wrapping_add(self.split_scroll as u16)) % 240;
        let tile_row = (effective_row / 8) as usize % 30;
        self.exram.get(tile_row * 32 + coarse_x as usize).copied()
    }

    fn nametable_quadrant(&self, masked: u16) -> u8 {
        let quadrant = ((masked >> 10) & 0x03) as u8;
        (self.nametable_mapping >> (quadrant * 2)) & 0x03
    }

    fn clock_expansion_quarter_frame(&mut self) {
        self.pulse1.envelope.clock();
        self.pulse2.envelope.clock();
    }

    fn clock_expansion_half_frame(&mut self) {
        self.pulse1.clock_length();
        self.pulse2.clock_length();
    }

    fn exram_mode(&self) -> ExRamMode {
        match self.exram_mode & 0x03 {
            0 => ExRamMode::ExtendedNametable,
            1 => ExRamMode::ExtendedAttribute,
            2 => ExRamMode::PlainRam,
            _ => ExRamMode::PlainRamWriteProtected,
        }
    }

    fn prg_bank_count_8k(&self) -> usize {
        (self.prg_rom.len() / PRG_BANK_SIZE).max(1)
    }

    /// Resolves the PRG window at `addr` to either a ROM bank index or, when
    /// the selecting register's high bit is clear, PRG RAM.
    fn prg_lookup(&self, addr: u16) -> (bool, usize) {
        let window = ((addr - 0x6000) / PRG_BANK_SIZE as u16) as usize; // 0=$6000,1=$8000,2=$A000,3=$C000,4=$E000
        let last = self.prg_bank_count_8k().saturating_sub(1);

        match window {
            0 => (false, 0), // $6000-$7FFF is always PRG RAM on this core
            _ => {
                let reg = self.prg_banks[window - 1];
                let is_rom = window == 4 || reg & 0x80 != 0;
                let bank = (reg & 0x7F) as usize % self.prg_bank_count_8k().max(1);
                (is_rom, bank.min(last))
            }
        }
    }

    fn read_prg(&self, addr: u16) -> u8 {
        let (is_rom, bank) = self.prg_lookup(addr);
        let offset = (addr as usize) & (PRG_BANK_SIZE - 1);
        if is_rom {
            if self.prg_rom.is_empty() {
                0
            } else {
                self.prg_rom[bank * PRG_BANK_SIZE + offset]
            }
        } else {
            let ram_offset = bank * PRG_BANK_SIZE + offset;
            if self.prg_ram.is_empty() {
                0
            } else {
                self.prg_ram[ram_offset % self.prg_ram.len()]
            }
        }
    }

    fn write_prg(&mut self, addr: u16, data: u8) {
        let (is_rom, bank) = self.prg_lookup(addr);
        if is_rom || self.prg_ram.is_empty() {
            return;
        }
        let offset = (addr as usize) & (PRG_BANK_SIZE - 1);
        let len = self.prg_ram.len();
        self.prg_ram[(bank * PRG_BANK_SIZE + offset) % len] = data;
    }

    fn chr_offset(&self, addr: u16, ctx: PpuAccess) -> usize {
        let banks = if ctx == PpuAccess::Sprite {
            &self.chr_banks_spr
        } else {
            &self.chr_banks_bg
        };
        let bank_size = match self.chr_mode & 0x03 {
            0 => 8 * 1024,
            1 => 4 * 1024,
            2 => 2 * 1024,
            _ => 1 * 1024,
        };
        let banks_per_window = bank_size / CHR_BANK_1K;
        let window = (addr as usize / bank_size).min(banks.len().saturating_sub(1));
        let reg = banks[window.min(7)] as usize | ((self.chr_upper_bits as usize) << 8);
        let base_bank = (reg / banks_per_window.max(1)) * banks_per_window.max(1);
        let within = addr as usize % bank_size;
        let total_1k = (self.chr.as_slice().len() / CHR_BANK_1K).max(1);
        (base_bank * CHR_BANK_1K + within) % (total_1k * CHR_BANK_1K).max(CHR_BANK_1K)
    }
}

impl Mapper for Mapper5 {
    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x5204 => {
                // IRQ status: bit7 pending, bit6 in-frame.
                let value = ((self.irq_pending as u8) << 7) | ((self.in_frame as u8) << 6);
                self.irq_pending = false;
                Some(value)
            }
            0x5205 => Some(((self.multiplicand as u16) * (self.multiplier as u16)) as u8),
            0x5206 => Some((((self.multiplicand as u16) * (self.multiplier as u16)) >> 8) as u8),
            0x5C00..=0x5FFF => Some(self.exram[(addr - 0x5C00) as usize]),
            cpu_mem::PRG_RAM_START..=cpu_mem::CPU_ADDR_END => Some(self.read_prg(addr)),
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, data: u8) {
        match addr {
            0x5100 => self.prg_mode = data & 0x03,
            0x5101 => self.chr_mode = data & 0x03,
            0x5104 => self.exram_mode = data & 0x03,
            0x5105 => {
                // Nametable mapping register; this core only tracks the
                // common all-CIRAM/all-ExRAM configurations, matching the
                // Mirroring enum's single/horizontal/vertical vocabulary, in
                // `self.mirroring` (used by the CIRAM fallback path). The raw
                // per-quadrant fields are kept separately in
                // `nametable_mapping` so fill mode (quadrant value 3) can
                // still be detected per-address regardless of what
                // `self.mirroring` approximates.
                self.nametable_mapping = data;
                self.mirroring = match data & 0x03 {
                    0 => Mirroring::SingleScreenA,
                    3 => Mirroring::SingleScreenB,
                    1 => Mirroring::Vertical,
                    _ => Mirroring::Horizontal,
                };
            }
            0x5106 => self.fill_tile = data,
            0x5107 => self.fill_attribute = data & 0x03,
            0x5113..=0x5117 => self.prg_banks[(addr - 0x5113) as usize] = data,
            0x5120..=0x5127 => self.chr_banks_spr[(addr - 0x5120) as usize] = data,
            0x5128..=0x512B => {
                let idx = (addr - 0x5128) as usize;
                self.chr_banks_bg[idx] = data;
                self.chr_banks_bg[idx + 4] = data;
            }
            0x5130 => self.chr_upper_bits = data & 0x03,
            0x5200 => self.split_ctrl = data,
            0x5201 => self.split_scroll = data,
            0x5202 => self.split_bank = data,
            0x5203 => self.irq_target = data,
            0x5204 => self.irq_enabled = data & 0x80 != 0,
            0x5205 => self.multiplicand = data,
            0x5206 => self.multiplier = data,
            0x5000 => self.pulse1.write_control(data),
            0x5002 => self.pulse1.write_timer_lo(data),
            0x5003 => self.pulse1.write_timer_hi(data),
            0x5004 => self.pulse2.write_control(data),
            0x5006 => self.pulse2.write_timer_lo(data),
            0x5007 => self.pulse2.write_timer_hi(data),
            0x5010 => self.pcm_read_mode = data & 0x01 != 0,
            0x5011 => {
                if !self.pcm_read_mode {
                    self.pcm_output = data;
                }
            }
            0x5015 => {
                self.pulse1.set_enabled(data & 0x01 != 0);
                self.pulse2.set_enabled(data & 0x02 != 0);
            }
            0x5C00..=0x5FFF => {
                if self.exram_mode() != ExRamMode::PlainRamWriteProtected {
                    self.exram[(addr - 0x5C00) as usize] = data;
                }
            }
            cpu_mem::PRG_RAM_START..=cpu_mem::CPU_ADDR_END => self.write_prg(addr, data),
            _ => {}
        }
    }

    fn ppu_read(&mut self, addr: u16, ctx: PpuAccess) -> Option<u8> {
        if ctx == PpuAccess::Background && self.split_active_for_fetch && self.split_enabled() {
            let total_1k = (self.chr.as_slice().len() / CHR_BANK_1K).max(1);
            let bank = self.split_bank as usize % total_1k;
            let within = addr as usize % CHR_BANK_1K;
            return Some(self.chr.read(bank * CHR_BANK_1K + within));
        }
        let offset = self.chr_offset(addr, ctx);
        Some(self.chr.read(offset))
    }

    fn ppu_write(&mut self, addr: u16, data: u8) -> bool {
        let offset = self.chr_offset(addr, PpuAccess::Background);
        self.chr.write(offset, data);
        self.chr.is_ram()
    }

    fn reset(&mut self, _kind: ResetKind) {
        self.prg_mode = 3;
        self.chr_mode = 3;
        self.exram_mode = 0;
        self.irq_enabled = false;
        self.irq_pending = false;
        self.in_frame = false;
    }

    fn capabilities(&self) -> MapperCapabilities {
        MapperCapabilities {
            nametable_override: true,
            per_tile_attributes: true,
            ..Default::default()
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn mapper_id(&self) -> u16 {
        5
    }

    fn name(&self) -> &'static str {
        "MMC5"
    }

    /// Real MMC5 hardware latches `irq_pending` on a counter match
    /// regardless of the enable bit (readable at `$5204` bit 7 either way),
    /// but only asserts the CPU-visible IRQ line while `$5204` bit 7 is set.
    fn irq_pending(&self) -> bool {
        self.irq_pending && self.irq_enabled
    }

    fn clear_irq(&mut self) {
        self.irq_pending = false;
    }

    /// MMC5's IRQ is clocked by the PPU's scanline count (derived from
    /// rendering state), not A12 edges; the console calls this once per
    /// visible scanline while rendering is enabled.
    fn on_end_scanline(&mut self, line: u16) {
        if line == 0 {
            self.in_frame = true;
            self.irq_counter = 0;
        } else {
            self.in_frame = true;
        }
        self.irq_counter = self.irq_counter.saturating_add(1);
        if self.irq_counter == self.irq_target as u16 && self.irq_target != 0 {
            self.irq_pending = true;
        }
    }

    fn read_nametable(&mut self, addr: u16, ctx: NametableAccess) -> Option<u8> {
        let masked = addr & 0x0FFF;

        if ctx == NametableAccess::Tile {
            if let Some(byte) = self.split_screen_override(masked, ctx) {
                self.split_active_for_fetch = true;
                return Some(byte);
            }
            self.split_active_for_fetch = false;
        }

        if self.nametable_quadrant(masked) == 3 {
            return match ctx {
                NametableAccess::Tile | NametableAccess::Cpu => Some(self.fill_tile),
                // Fill mode's attribute byte repeats the 2-bit palette index
                // across all four quadrants of the attribute byte.
                NametableAccess::Attribute => Some(self.fill_attribute * 0x55),
            };
        }

        if self.exram_mode() != ExRamMode::ExtendedNametable {
            return None;
        }
        match ctx {
            NametableAccess::Tile | NametableAccess::Cpu => {
                Some(self.exram[(addr & 0x3FF) as usize])
            }
            NametableAccess::Attribute => None,
        }
    }

    fn write_nametable(&mut self, addr: u16, data: u8) -> bool {
        let masked = addr & 0x0FFF;
        if self.nametable_quadrant(masked) == 3 {
            // Fill mode has no backing storage to write through to.
            return true;
        }
        if self.exram_mode() != ExRamMode::ExtendedNametable {
            return false;
        }
        self.exram[(addr & 0x3FF) as usize] = data;
        true
    }

    fn extended_attribute(&mut self, coarse_x: u8, coarse_y: u8) -> Option<u8> {
        if self.exram_mode() != ExRamMode::ExtendedAttribute {
            return None;
        }
        let index = (coarse_y as usize % 30) * 32 + coarse_x as usize % 32;
        self.exram.get(index).copied()
    }

    /// Runs the two expansion-audio pulses through the same 4-step NTSC
    /// timing as the main APU's non-five-step frame sequence, since MMC5
    /// doesn't expose its own frame-counter mode select.
    fn clock_expansion_audio(&mut self, cpu_cycles: u32) {
        for _ in 0..cpu_cycles {
            if self.expansion_cycle_is_even {
                self.pulse1.clock_timer();
                self.pulse2.clock_timer();
            }
            self.expansion_cycle_is_even = !self.expansion_cycle_is_even;

            self.expansion_frame_cycle += 1;
            match self.expansion_frame_cycle {
                7457 => self.clock_expansion_quarter_frame(),
                14913 => {
                    self.clock_expansion_quarter_frame();
                    self.clock_expansion_half_frame();
                }
                22371 => self.clock_expansion_quarter_frame(),
                29829 => {
                    self.clock_expansion_quarter_frame();
                    self.clock_expansion_half_frame();
                }
                29830 => self.expansion_frame_cycle = 0,
                _ => {}
            }
        }
    }

    fn expansion_audio_sample(&self) -> f32 {
        let pulse1 = self.pulse1.sample() as f32;
        let pulse2 = self.pulse2.sample() as f32;
        let pcm = self.pcm_output as f32;
        // Matches the main APU's pulse mixing curve (two 4-bit pulse
        // channels summed into one non-linear table) with the PCM channel
        // blended in at its own linear weight, since it's a direct 8-bit DAC
        // load rather than a duty/envelope-gated channel.
        let pulse_mix = if pulse1 + pulse2 > 0.0 {
            95.88 / ((8128.0 / (pulse1 + pulse2)) + 100.0)
        } else {
            0.0
        };
        pulse_mix + (pcm / 255.0) * 0.5
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
                self.exram.to_vec(),
                self.prg_mode,
                self.chr_mode,
                self.exram_mode,
                self.prg_banks,
                self.chr_banks_bg,
                self.chr_banks_spr,
                self.irq_target,
                self.irq_counter,
                self.irq_enabled,
                self.irq_pending,
                self.mirroring,
                self.nametable_mapping,
                self.fill_tile,
                self.fill_attribute,
                self.split_ctrl,
                self.split_scroll,
                self.split_bank,
                self.pulse1,
                self.pulse2,
                self.pcm_output,
                self.pcm_read_mode,
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
                Vec<u8>,
                u8,
                u8,
                u8,
                [u8; 5],
                [u8; 8],
                [u8; 8],
                u8,
                u16,
                bool,
                bool,
                Mirroring,
                u8,
                u8,
                u8,
                u8,
                u8,
                u8,
                Mmc5Pulse,
                Mmc5Pulse,
                u8,
                bool,
            );
            if let Ok((
                prg_ram,
                chr,
                exram,
                prg_mode,
                chr_mode,
                exram_mode,
                prg_banks,
                chr_banks_bg,
                chr_banks_spr,
                irq_target,
                irq_counter,
                irq_enabled,
                irq_pending,
                mirroring,
                nametable_mapping,
                fill_tile,
                fill_attribute,
                split_ctrl,
                split_scroll,
                split_bank,
                pulse1,
                pulse2,
                pcm_output,
                pcm_read_mode,
            )) = postcard::from_bytes::<Blob>(_bytes)
            {
                self.prg_ram = prg_ram;
                match &mut self.chr {
                    ChrStorage::Rom(_) => {}
                    ChrStorage::Ram(data) => *data = chr,
                }
                if exram.len() == EXRAM_SIZE {
                    self.exram.copy_from_slice(&exram);
                }
                self.prg_mode = prg_mode;
                self.chr_mode = chr_mode;
                self.exram_mode = exram_mode;
                self.prg_banks = prg_banks;
                self.chr_banks_bg = chr_banks_bg;
                self.chr_banks_spr = chr_banks_spr;
                self.irq_target = irq_target;
                self.irq_counter = irq_counter;
                self.irq_enabled = irq_enabled;
                self.irq_pending = irq_pending;
                self.mirroring = mirroring;
                self.nametable_mapping = nametable_mapping;
                self.fill_tile = fill_tile;
                self.fill_attribute = fill_attribute;
                self.split_ctrl = split_ctrl;
                self.split_scroll = split_scroll;
                self.split_bank = split_bank;
                self.pulse1 = pulse1;
                self.pulse2 = pulse2;
                self.pcm_output = pcm_output;
                self.pcm_read_mode = pcm_read_mode;
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
            mapper: 5,
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
    fn multiplier_register_computes_product() {
        let mut mapper = Mapper5::new(&header(), vec![0u8; 8 * PRG_BANK_SIZE], vec![0u8; 8 * 1024], None);
        mapper.cpu_write(0x5205, 12);
        mapper.cpu_write(0x5206, 10);
        assert_eq!(mapper.cpu_read(0x5205), Some(120));
        assert_eq!(mapper.cpu_read(0x5206), Some(0));
    }

    #[test]
    fn exram_extended_nametable_round_trips() {
        let mut mapper = Mapper5::new(&header(), vec![0u8; 8 * PRG_BANK_SIZE], vec![0u8; 8 * 1024], None);
        mapper.cpu_write(0x5104, 0); // extended nametable mode
        assert!(mapper.write_nametable(0x2003, 0x77));
        assert_eq!(mapper.read_nametable(0x2003, NametableAccess::Tile), Some(0x77));
    }

    #[test]
    fn irq_fires_when_scanline_target_reached() {
        let mut mapper = Mapper5::new(&header(), vec![0u8; 8 * PRG_BANK_SIZE], vec![0u8; 8 * 1024], None);
        mapper.cpu_write(0x5203, 2);
        mapper.cpu_write(0x5204, 0x80);
        mapper.on_end_scanline(0);
        mapper.on_end_scanline(1);
        assert!(mapper.irq_pending());
    }

    #[test]
    fn irq_line_is_not_asserted_while_disabled() {
        let mut mapper = Mapper5::new(&header(), vec![0u8; 8 * PRG_BANK_SIZE], vec![0u8; 8 * 1024], None);
        mapper.cpu_write(0x5203, 2);
        // $5204 bit 7 left clear: counter target programmed but IRQ disabled.
        mapper.on_end_scanline(0);
        mapper.on_end_scanline(1);
        assert!(!mapper.irq_pending());
        // The status register should still report the latched match (bit 7,
        // alongside bit 6 for in-frame) even though the CPU-visible line
        // stays low.
        assert_eq!(mapper.cpu_read(0x5204), Some(0xC0));
    }

    #[test]
    fn fill_mode_substitutes_tile_and_attribute() {
        let mut mapper = Mapper5::new(&header(), vec![0u8; 8 * PRG_BANK_SIZE], vec![0u8; 8 * 1024], None);
        mapper.cpu_write(0x5106, 0x42);
        mapper.cpu_write(0x5107, 0b10);
        // Quadrant 0 (bits 0-1 of $5105) set to fill mode (3).
        mapper.cpu_write(0x5105, 0b11);
        assert_eq!(mapper.read_nametable(0x2000, NametableAccess::Tile), Some(0x42));
        assert_eq!(
            mapper.read_nametable(0x23C0, NametableAccess::Attribute),
            Some(0b10_10_10_10)
        );
        // Fill mode has no backing storage: writes are swallowed, not stored.
        assert!(mapper.write_nametable(0x2000, 0xFF));
        assert_eq!(mapper.read_nametable(0x2000, NametableAccess::Tile), Some(0x42));
    }

    #[test]
    fn non_fill_quadrant_still_falls_back_to_exram_mode() {
        let mut mapper = Mapper5::new(&header(), vec![0u8; 8 * PRG_BANK_SIZE], vec![0u8; 8 * 1024], None);
        mapper.cpu_write(0x5104, 0); // extended nametable mode
        mapper.cpu_write(0x5105, 0b11_11_11_00); // quadrant 0 = CIRAM, rest fill
        assert!(mapper.write_nametable(0x2003, 0x99));
        assert_eq!(mapper.read_nametable(0x2003, NametableAccess::Tile), Some(0x99));
    }

    #[test]
    fn split_screen_overrides_tile_fetch_inside_region() {
        let mut mapper = Mapper5::new(&header(), vec![0u8; 8 * PRG_BANK_SIZE], vec![0u8; 8 * 1024], None);
        mapper.exram[0] = 0x5A;
        // Not using ExRAM as a nametable source, so anything that falls
        // through the split-screen check resolves to "not overridden".
        mapper.cpu_write(0x5104, 0x03);
        // Enabled, left side, boundary at tile column 4: columns 0-3 split.
        mapper.cpu_write(0x5200, 0x80 | 4);
        assert_eq!(mapper.read_nametable(0x2000, NametableAccess::Tile), Some(0x5A));
        assert!(mapper.split_active_for_fetch);
        // Column 10 is outside the split region and falls through untouched.
        mapper.split_active_for_fetch = true;
        assert_eq!(mapper.read_nametable(0x200A, NametableAccess::Tile), None);
        assert!(!mapper.split_active_for_fetch);
    }

    #[test]
    fn split_screen_pattern_fetch_uses_split_bank() {
        let chr_header = Header { chr_is_ram: true, ..header() };
        let mut mapper = Mapper5::new(&chr_header, vec![0u8; 8 * PRG_BANK_SIZE], vec![0u8; 8 * 1024], None);
        // Bank 3 of CHR, byte 5 within it: the split region should read from
        // here instead of from the normal background CHR banking.
        mapper.chr.write(3 * CHR_BANK_1K + 5, 0x77);
        mapper.cpu_write(0x5200, 0x80 | 4);
        mapper.cpu_write(0x5202, 3);
        mapper.split_active_for_fetch = true;
        assert_eq!(mapper.ppu_read(5, PpuAccess::Background), Some(0x77));
    }

    #[test]
    fn expansion_pulse_produces_no_sound_when_disabled() {
        let mapper = Mapper5::new(&header(), vec![0u8; 8 * PRG_BANK_SIZE], vec![0u8; 8 * 1024], None);
        assert_eq!(mapper.expansion_audio_sample(), 0.0);
    }

    #[test]
    fn expansion_pulse_sounds_once_enabled_and_clocked() {
        let mut mapper = Mapper5::new(&header(), vec![0u8; 8 * PRG_BANK_SIZE], vec![0u8; 8 * 1024], None);
        mapper.cpu_write(0x5000, 0b1011_1111); // duty 2, constant volume 15
        mapper.cpu_write(0x5015, 0b01); // enable pulse 1 before the length load
        mapper.cpu_write(0x5002, 0x10);
        mapper.cpu_write(0x5003, 0x00); // timer period 0x010, above the mute floor
        mapper.clock_expansion_audio(64);
        assert!(mapper.pulse1.length_counter > 0);
    }

    #[test]
    fn pcm_output_feeds_into_expansion_mix() {
        let mut mapper = Mapper5::new(&header(), vec![0u8; 8 * PRG_BANK_SIZE], vec![0u8; 8 * 1024], None);
        mapper.cpu_write(0x5011, 0x80);
        assert!(mapper.expansion_audio_sample() > 0.0);
    }
}
