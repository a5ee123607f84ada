//! One drive: RAM, ROM, controller board and head mechanism behind the
//! drive CPU's address space.
//!
//! # Memory map (1541)
//!
//! | Address       | Contents                      |
//! |---------------|-------------------------------|
//! | $0000-$07FF   | 2K RAM (mirrored to $17FF)    |
//! | $1800-$1BFF   | VIA1, serial bus              |
//! | $1C00-$1FFF   | VIA2, disk controller         |
//! | $C000-$FFFF   | ROM                           |
//!
//! # Memory map (1551)
//!
//! | Address       | Contents                      |
//! |---------------|-------------------------------|
//! | $0000-$0001   | 6510T processor port          |
//! | $0002-$07FF   | 2K RAM                        |
//! | $4000-$4007   | TPI, host link and GCR data   |
//! | $C000-$FFFF   | ROM                           |
//!
//! Unmapped reads return $FF.

use cbm_serial_bus::{Levels, Line, ParticipantId};
use emu_core::{CancelToken, Observable, Ticks, Value};
use format_cbm_disk::DiskImage;

use crate::config::{DriveConfig, DriveModel};
use crate::irq::{IrqLine, IrqSource};
use crate::mechanism::{ByteTick, DriveMechanism};
use crate::tpi_controller::TpiController;
use crate::via_controller::ViaController;

const RAM_SIZE: usize = 0x0800;
const ROM_BASE: u16 = 0xC000;

/// Levels the drive presents to its CPU core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuLines {
    /// IRQ input pulled.
    pub irq: bool,
    /// SO input pulsed: the CPU sets V on the falling edge.
    pub so: bool,
}

#[derive(Debug, Clone)]
pub enum Controller {
    Via(ViaController),
    Tpi(TpiController),
}

#[derive(Debug)]
pub struct Drive {
    model: DriveModel,
    device_number: u8,
    ram: Vec<u8>,
    rom: Vec<u8>,
    mechanism: DriveMechanism,
    controller: Controller,
    irq: IrqLine,
    powered: bool,
    pub(crate) participant: Option<ParticipantId>,
    /// Byte timer, armed while the media turns.
    pub(crate) rotation_timer: Option<CancelToken>,
    /// 1551 periodic IRQ.
    pub(crate) irq_timer: Option<CancelToken>,
    /// Redelivery of a periodic IRQ that found the line busy.
    pub(crate) irq_retry: Option<CancelToken>,
}

impl Drive {
    /// Build a drive from its configuration. It starts powered off.
    #[must_use]
    pub fn new(config: DriveConfig) -> Self {
        let select = config.device_select();
        let controller = match config.model {
            DriveModel::Vc1541 => Controller::Via(ViaController::new(select)),
            DriveModel::C1551 => Controller::Tpi(TpiController::new(select)),
        };
        Self {
            model: config.model,
            device_number: config.device_number,
            ram: vec![0; RAM_SIZE],
            rom: config.rom,
            mechanism: DriveMechanism::new(),
            controller,
            irq: IrqLine::default(),
            powered: false,
            participant: None,
            rotation_timer: None,
            irq_timer: None,
            irq_retry: None,
        }
    }

    #[must_use]
    pub fn model(&self) -> DriveModel {
        self.model
    }

    #[must_use]
    pub fn device_number(&self) -> u8 {
        self.device_number
    }

    #[must_use]
    pub fn is_powered(&self) -> bool {
        self.powered
    }

    #[must_use]
    pub fn mechanism(&self) -> &DriveMechanism {
        &self.mechanism
    }

    #[must_use]
    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    #[must_use]
    pub fn participant(&self) -> Option<ParticipantId> {
        self.participant
    }

    /// Power up: clear RAM, reset the board. Scheduling is the caller's.
    pub(crate) fn power_on(&mut self) {
        self.ram.fill(0);
        self.powered = true;
        self.reset();
    }

    pub(crate) fn power_off(&mut self) {
        self.powered = false;
        self.stop_rotation();
        self.irq.clear();
        if let Controller::Via(via) = &mut self.controller {
            via.bus_released();
        }
    }

    /// Board reset: chips, head back to track 1, motor off. RAM and the
    /// disk are kept.
    pub fn reset(&mut self) {
        self.mechanism.reset();
        match &mut self.controller {
            Controller::Via(via) => via.reset(),
            Controller::Tpi(tpi) => tpi.reset(),
        }
        self.irq.clear();
        self.refresh_head_view();
        self.update_irq();
    }

    pub(crate) fn mount(&mut self, image: DiskImage) -> Option<DiskImage> {
        let previous = self.mechanism.mount(image);
        self.refresh_head_view();
        previous
    }

    pub(crate) fn unmount(&mut self) -> Option<DiskImage> {
        let image = self.mechanism.unmount();
        self.stop_rotation();
        self.refresh_head_view();
        image
    }

    /// The rotation timer was disarmed: byte-ready and SO go idle.
    pub(crate) fn stop_rotation(&mut self) {
        self.mechanism.stop();
        if let Controller::Via(via) = &mut self.controller {
            via.set_byte_ready(false);
        }
        self.update_irq();
    }

    /// Drive CPU read.
    pub fn read(&mut self, address: u16) -> u8 {
        let value = match &mut self.controller {
            Controller::Via(via) => match address {
                0x0000..=0x17FF => self.ram[usize::from(address) & (RAM_SIZE - 1)],
                0x1800..=0x1FFF => via.read(address),
                ROM_BASE.. => rom_byte(&self.rom, address),
                _ => 0xFF,
            },
            Controller::Tpi(tpi) => match address {
                0x0000..=0x0001 => tpi.read_port(address),
                0x0002..=0x07FF => self.ram[usize::from(address)],
                0x4000..=0x4007 => tpi.read(address),
                ROM_BASE.. => rom_byte(&self.rom, address),
                _ => 0xFF,
            },
        };
        self.update_irq();
        value
    }

    /// Drive CPU write. Returns `true` when the rotation timer needs
    /// re-arming (motor or speed zone changed).
    pub fn write(&mut self, address: u16, value: u8) -> bool {
        match &mut self.controller {
            Controller::Via(via) => match address {
                0x0000..=0x17FF => self.ram[usize::from(address) & (RAM_SIZE - 1)] = value,
                0x1800..=0x1FFF => via.write(address, value),
                _ => {}
            },
            Controller::Tpi(tpi) => match address {
                0x0000..=0x0001 => tpi.write_port(address, value),
                0x0002..=0x07FF => self.ram[usize::from(address)] = value,
                0x4000..=0x4007 => tpi.write(address, value),
                _ => {}
            },
        }
        let controls = match &self.controller {
            Controller::Via(via) => via.disk_controls(),
            Controller::Tpi(tpi) => tpi.disk_controls(),
        };
        let rearm = self.mechanism.apply_controls(controls);
        self.refresh_head_view();
        self.update_irq();
        rearm
    }

    /// One drive CPU cycle: the VIA timers count.
    pub fn tick(&mut self) {
        if let Controller::Via(via) = &mut self.controller {
            via.tick();
        }
        self.update_irq();
    }

    /// A rotation timer event.
    pub fn on_byte_tick(&mut self) {
        let tick = self.mechanism.tick();
        self.refresh_head_view();
        match &mut self.controller {
            Controller::Via(via) => via.set_byte_ready(self.mechanism.ready()),
            Controller::Tpi(tpi) => {
                if tick == ByteTick::Ready {
                    tpi.byte_arrived();
                }
            }
        }
        self.update_irq();
    }

    /// A change on the serial bus. Returns this drive's latch changes in
    /// response.
    pub fn on_bus_edge(&mut self, levels: Levels) -> Vec<(Line, bool)> {
        if !self.powered {
            return Vec::new();
        }
        let Controller::Via(via) = &mut self.controller else {
            return Vec::new();
        };
        via.bus_changed(levels);
        let changes = via.bus_outputs();
        self.update_irq();
        changes
    }

    /// Latch changes pending since the last flush (after a CPU write).
    pub fn take_bus_outputs(&mut self) -> Vec<(Line, bool)> {
        match &mut self.controller {
            Controller::Via(via) if self.powered => via.bus_outputs(),
            _ => Vec::new(),
        }
    }

    /// The bus gave up settling: adopt its view of this drive's latches.
    pub(crate) fn resync_bus_outputs(&mut self, clock: bool, data: bool) {
        if let Controller::Via(via) = &mut self.controller {
            via.resync_outputs(clock, data);
        }
    }

    /// Deliver the periodic IRQ. Returns `false` if another source is
    /// holding the line and the caller should try again later.
    pub fn raise_timer_irq(&mut self) -> bool {
        if self.irq.is_set(IrqSource::Timer) {
            return true;
        }
        if self.irq.asserted() {
            return false;
        }
        self.irq.set(IrqSource::Timer, true);
        true
    }

    /// The CPU core has taken the periodic IRQ.
    pub fn acknowledge_timer_irq(&mut self) {
        self.irq.set(IrqSource::Timer, false);
    }

    #[must_use]
    pub fn cpu_lines(&self) -> CpuLines {
        CpuLines {
            irq: self.irq.asserted(),
            so: match &self.controller {
                Controller::Via(via) => via.so_asserted(),
                Controller::Tpi(_) => false,
            },
        }
    }

    /// VIA1 port B as the drive CPU reads it (1541 only).
    #[must_use]
    pub fn serial_status(&self) -> Option<u8> {
        match &self.controller {
            Controller::Via(via) => Some(via.status_byte()),
            Controller::Tpi(_) => None,
        }
    }

    /// Rotation timer period, or `None` while the media stands still.
    #[must_use]
    pub fn rotation_period(&self) -> Option<Ticks> {
        (self.powered && self.mechanism.spinning()).then(|| self.mechanism.tick_period())
    }

    pub(crate) fn tpi_mut(&mut self) -> Option<&mut TpiController> {
        match &mut self.controller {
            Controller::Tpi(tpi) => Some(tpi),
            Controller::Via(_) => None,
        }
    }

    pub(crate) fn tpi(&self) -> Option<&TpiController> {
        match &self.controller {
            Controller::Tpi(tpi) => Some(tpi),
            Controller::Via(_) => None,
        }
    }

    #[cfg(test)]
    pub(crate) fn force_irq(&mut self, source: IrqSource, active: bool) {
        self.irq.set(source, active);
    }

    fn refresh_head_view(&mut self) {
        let byte = self.mechanism.current_byte();
        let sync = self.mechanism.sync();
        let writable = self.mechanism.has_disk();
        match &mut self.controller {
            Controller::Via(via) => via.refresh_disk(byte, sync, writable),
            Controller::Tpi(tpi) => tpi.refresh_disk(byte, sync, writable),
        }
    }

    fn update_irq(&mut self) {
        match &self.controller {
            Controller::Via(via) => {
                let (serial, disk) = via.irq_outputs();
                self.irq.set(IrqSource::SerialVia, serial);
                self.irq.set(IrqSource::DiskVia, disk);
            }
            Controller::Tpi(tpi) => {
                self.irq.set(IrqSource::Tpi, tpi.irq_active());
            }
        }
    }
}

fn rom_byte(rom: &[u8], address: u16) -> u8 {
    if rom.is_empty() {
        return 0xFF;
    }
    rom[usize::from(address - ROM_BASE) % rom.len()]
}

impl Observable for Drive {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "model" => Some(Value::String(self.model.name().to_owned())),
            "device" => Some(self.device_number.into()),
            "powered" => Some(self.powered.into()),
            "track" => Some(self.mechanism.track().into()),
            "sector" => Some(self.mechanism.sector().into()),
            "motor" => Some(self.mechanism.motor().into()),
            "led" => Some(self.mechanism.led().into()),
            "sync" => Some(self.mechanism.sync().into()),
            "zone" => Some(self.mechanism.zone().density().into()),
            "irq" => Some(self.irq.asserted().into()),
            "bytes" => Some(self.mechanism.bytes_read().into()),
            "disk" => Some(self.mechanism.has_disk().into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "model", "device", "powered", "track", "sector", "motor", "led", "sync", "zone",
            "irq", "bytes", "disk",
        ]
    }
}
