//! The CPU-visible address bus: a transient view over disjoint fields of
//! the orchestrator, rather than a persistently-owned struct, so there is
//! no pointer cycle between the CPU, PPU, APU, and mapper (§5 design
//! note).
//!
//! Every [`CpuBus`] call is exactly one CPU cycle; [`CpuBusView::tick`]
//! advances the PPU three dots and clocks the mapper's per-cycle hook on
//! every single call, which is a stricter (and simpler) form of the
//! catch-up described informally in §4.1: rather than deferring PPU
//! advancement until a register access needs an up-to-date value, every
//! cycle is caught up immediately. The two are externally indistinguishable
//! since nothing outside the PPU/mapper observes PPU state between CPU
//! cycles.

use crate::apu::Apu;
use crate::cartridge::mapper::Mapper;
use crate::controller::{Controller, Zapper};
use crate::cpu::CpuBus;
use crate::mem_block::cpu::Ram;
use crate::memory::cpu as cpu_mem;
use crate::ppu::Ppu;

const PPU_OAMDATA: u16 = 0x2004;

pub struct CpuBusView<'a> {
    pub ram: &'a mut Ram,
    pub ppu: &'a mut Ppu,
    pub apu: &'a mut Apu,
    pub mapper: &'a mut dyn Mapper,
    pub controller1: &'a mut Controller,
    pub controller2: &'a mut Controller,
    pub zapper: &'a mut Zapper,
    pub open_bus: &'a mut u8,
    pub pending_nmi: &'a mut bool,
    /// Toggles every CPU cycle; used only to decide whether OAM DMA costs
    /// 513 or 514 cycles depending on the parity of the cycle it starts on.
    pub cycle_parity: &'a mut bool,
}

impl<'a> CpuBusView<'a> {
    fn tick(&mut self) {
        for _ in 0..3 {
            if self.ppu.step(&mut *self.mapper) {
                *self.pending_nmi = true;
            }
        }
        self.mapper.clock_cpu(1);
        *self.cycle_parity = !*self.cycle_parity;
    }

    fn zapper_light_detected(&self) -> bool {
        if self.zapper.is_aimed_off_screen() {
            return false;
        }
        const LIGHT_THRESHOLD: u8 = 0x60;
        let (x, y) = self.zapper.position();
        self.ppu.pixel_brightness(x, y) >= LIGHT_THRESHOLD
    }

    fn oam_dma(&mut self, page: u8) {
        let base = (page as u16) << 8;
        if !*self.cycle_parity {
            self.read(base);
        }
        for i in 0..256u16 {
            let byte = self.read(base + i);
            self.write(PPU_OAMDATA, byte);
        }
    }
}

impl<'a> CpuBus for CpuBusView<'a> {
    fn read(&mut self, addr: u16) -> u8 {
        self.tick();

        let value = match addr {
            cpu_mem::INTERNAL_RAM_START..=cpu_mem::INTERNAL_RAM_MIRROR_END => {
                self.ram[(addr & cpu_mem::INTERNAL_RAM_MASK) as usize]
            }
            cpu_mem::PPU_REGISTER_BASE..=cpu_mem::PPU_REGISTER_END => {
                self.ppu.cpu_read_register(addr, &mut *self.mapper)
            }
            cpu_mem::APU_STATUS => self.apu.read_status(),
            cpu_mem::CONTROLLER_PORT_1 => (*self.open_bus & 0xE0) | self.controller1.read(),
            cpu_mem::CONTROLLER_PORT_2 => {
                let light = self.zapper_light_detected();
                (*self.open_bus & 0xE0) | self.zapper.read_bits(light) | self.controller2.read()
            }
            cpu_mem::CARTRIDGE_SPACE_BASE..=cpu_mem::CPU_ADDR_END => {
                self.mapper.cpu_read(addr).unwrap_or(*self.open_bus)
            }
            _ => *self.open_bus,
        };

        *self.open_bus = value;
        value
    }

    fn write(&mut self, addr: u16, data: u8) {
        self.tick();
        *self.open_bus = data;

        match addr {
            cpu_mem::INTERNAL_RAM_START..=cpu_mem::INTERNAL_RAM_MIRROR_END => {
                self.ram[(addr & cpu_mem::INTERNAL_RAM_MASK) as usize] = data;
            }
            cpu_mem::PPU_REGISTER_BASE..=cpu_mem::PPU_REGISTER_END => {
                if self.ppu.cpu_write_register(addr, data, &mut *self.mapper) {
                    *self.pending_nmi = true;
                }
            }
            cpu_mem::OAM_DMA => self.oam_dma(data),
            cpu_mem::APU_REGISTER_BASE..=cpu_mem::APU_REGISTER_END => self.apu.write_register(addr, data),
            cpu_mem::APU_STATUS => self.apu.write_register(addr, data),
            cpu_mem::CONTROLLER_PORT_1 => {
                let strobe = data & 0x01 != 0;
                self.controller1.write_strobe(strobe);
                self.controller2.write_strobe(strobe);
            }
            cpu_mem::CONTROLLER_PORT_2 => self.apu.write_register(addr, data),
            cpu_mem::CARTRIDGE_SPACE_BASE..=cpu_mem::CPU_ADDR_END => self.mapper.cpu_write(addr, data),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::header::Mirroring;
    use crate::cartridge::mapper::{MapperCapabilities, PpuAccess};
    use crate::reset_kind::ResetKind;

    /// Answers every cartridge-space CPU read with `None`, so the bus must
    /// fall back to the open-bus latch (§8 invariant 1).
    #[derive(Debug, Default)]
    struct OpenBusMapper;

    impl Mapper for OpenBusMapper {
        fn cpu_read(&mut self, _addr: u16) -> Option<u8> {
            None
        }
        fn cpu_write(&mut self, _addr: u16, _data: u8) {}
        fn ppu_read(&mut self, _addr: u16, _ctx: PpuAccess) -> Option<u8> {
            Some(0)
        }
        fn ppu_write(&mut self, _addr: u16, _data: u8) -> bool {
            false
        }
        fn reset(&mut self, _kind: ResetKind) {}
        fn capabilities(&self) -> MapperCapabilities {
            MapperCapabilities::default()
        }
        fn mirroring(&self) -> Mirroring {
            Mirroring::Horizontal
        }
        fn mapper_id(&self) -> u16 {
            0
        }
        fn name(&self) -> &'static str {
            "open-bus"
        }
        fn save_state(&self) -> Vec<u8> {
            Vec::new()
        }
        fn load_state(&mut self, _bytes: &[u8]) {}
    }

    struct Harness {
        ram: Ram,
        ppu: Ppu,
        apu: Apu,
        mapper: OpenBusMapper,
        controller1: Controller,
        controller2: Controller,
        zapper: Zapper,
        open_bus: u8,
        pending_nmi: bool,
        cycle_parity: bool,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                ram: Ram::new(),
                ppu: Ppu::new(),
                apu: Apu::new(),
                mapper: OpenBusMapper,
                controller1: Controller::new(),
                controller2: Controller::new(),
                zapper: Zapper::new(),
                open_bus: 0,
                pending_nmi: false,
                cycle_parity: true,
            }
        }

        fn view(&mut self) -> CpuBusView<'_> {
            CpuBusView {
                ram: &mut self.ram,
                ppu: &mut self.ppu,
                apu: &mut self.apu,
                mapper: &mut self.mapper,
                controller1: &mut self.controller1,
                controller2: &mut self.controller2,
                zapper: &mut self.zapper,
                open_bus: &mut self.open_bus,
                pending_nmi: &mut self.pending_nmi,
                cycle_parity: &mut self.cycle_parity,
            }
        }
    }

    #[test]
    fn internal_ram_is_mirrored_every_0x0800_bytes() {
        let mut harness = Harness::new();
        let mut bus = harness.view();
        bus.write(0x0042, 0xAB);
        assert_eq!(bus.read(0x0042), 0xAB);
        assert_eq!(bus.read(0x0842), 0xAB);
        assert_eq!(bus.read(0x1042), 0xAB);
        assert_eq!(bus.read(0x1842), 0xAB);
    }

    #[test]
    fn reading_unmapped_cartridge_space_returns_the_open_bus_latch() {
        let mut harness = Harness::new();
        let mut bus = harness.view();
        bus.write(0x0000, 0x7E); // latch 0x7E via a RAM write
        let value = bus.read(0x8000); // mapper declines, falls back to the latch
        assert_eq!(value, 0x7E);
    }

    #[test]
    fn every_read_and_write_updates_the_open_bus_latch() {
        let mut harness = Harness::new();
        let mut bus = harness.view();
        bus.write(0x0010, 0x33);
        assert_eq!(*bus.open_bus, 0x33);
        bus.read(0x0010);
        assert_eq!(*bus.open_bus, 0x33);
    }
}
