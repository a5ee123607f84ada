//! 1541 controller board: two 6522 VIAs between the drive CPU, the serial
//! bus and the head electronics.
//!
//! VIA1 ($1800) carries the serial bus on port B and sees ATN on CA1.
//! VIA2 ($1C00) reads GCR bytes on port A, drives the stepper, motor, LED
//! and density select on port B, and gets the byte-ready pulse on CA1.

use cbm_serial_bus::{Levels, Line};
use format_gcr::SpeedZone;
use mos_via_6522::Via6522;

use crate::bits::{DiskPortB, SerialPortB};
use crate::mechanism::Controls;

/// PCR CA2 mode "manual output high": VIA2 uses it to let byte-ready reach
/// the CPU's SO pin.
const CA2_HIGH: u8 = 0b111;

#[derive(Debug, Clone)]
pub struct ViaController {
    serial: Via6522,
    disk: Via6522,
    /// Jumper bits for port B bits 5-6.
    device: u8,
    atn_asserted: bool,
    /// Bus latches last handed to the bus (`true` = released).
    sent_clock: bool,
    sent_data: bool,
    ready: bool,
}

impl ViaController {
    #[must_use]
    pub fn new(device_select: u8) -> Self {
        let mut controller = Self {
            serial: Via6522::new(),
            disk: Via6522::new(),
            device: device_select & 0x03,
            atn_asserted: false,
            sent_clock: true,
            sent_data: true,
            ready: false,
        };
        controller.bus_changed(Levels::IDLE);
        controller.refresh_disk(0, false, false);
        // Settling the inputs mustn't leave edge flags behind.
        controller.reset();
        controller
    }

    pub fn reset(&mut self) {
        self.serial.reset();
        self.disk.reset();
        self.ready = false;
        self.disk.set_ca1(true);
    }

    #[must_use]
    pub fn serial_via(&self) -> &Via6522 {
        &self.serial
    }

    #[must_use]
    pub fn disk_via(&self) -> &Via6522 {
        &self.disk
    }

    /// Register access in the $1800-$1FFF window.
    pub fn read(&mut self, address: u16) -> u8 {
        let reg = (address & 0x0F) as u8;
        if address & 0x0400 == 0 {
            self.serial.read(reg)
        } else {
            self.disk.read(reg)
        }
    }

    pub fn write(&mut self, address: u16, value: u8) {
        let reg = (address & 0x0F) as u8;
        if address & 0x0400 == 0 {
            self.serial.write(reg, value);
        } else {
            self.disk.write(reg, value);
        }
    }

    /// One drive CPU cycle.
    pub fn tick(&mut self) {
        self.serial.tick();
        self.disk.tick();
    }

    /// Serial VIA IRQ output, disk VIA IRQ output.
    #[must_use]
    pub fn irq_outputs(&self) -> (bool, bool) {
        (self.serial.irq_active(), self.disk.irq_active())
    }

    /// Feed the combined bus levels into VIA1.
    pub fn bus_changed(&mut self, levels: Levels) {
        self.atn_asserted = !levels.atn;
        let pins = SerialPortB::from_bits(0xFF)
            .with_data_in(!levels.data)
            .with_clock_in(!levels.clock)
            .with_device(self.device)
            .with_atn_in(self.atn_asserted);
        self.serial.set_port_b_input(pins.into_bits());
        self.serial.set_ca1(self.atn_asserted);
    }

    /// Latch changes this drive wants on the bus since the last call.
    ///
    /// DATA is pulled by DATA OUT, and also whenever ATN ACK disagrees with
    /// ATN IN, which answers ATN without any help from the CPU.
    pub fn bus_outputs(&mut self) -> Vec<(Line, bool)> {
        let out = SerialPortB::from_bits(self.serial.port_b_output());
        let clock = !out.clock_out();
        let data = !(out.data_out() || out.atn_ack() != self.atn_asserted);

        let clock_change = (clock != self.sent_clock).then_some((Line::Clock, clock));
        let data_change = (data != self.sent_data).then_some((Line::Data, data));
        self.sent_clock = clock;
        self.sent_data = data;
        clock_change.into_iter().chain(data_change).collect()
    }

    /// Forget what was sent; the bus has released this drive's latches.
    pub fn bus_released(&mut self) {
        self.sent_clock = true;
        self.sent_data = true;
    }

    /// Take the bus's copy of this drive's latches as what was sent. The
    /// next [`ViaController::bus_outputs`] reports whatever differs.
    pub fn resync_outputs(&mut self, clock: bool, data: bool) {
        self.sent_clock = clock;
        self.sent_data = data;
    }

    /// VIA1 port B as the CPU would read it.
    #[must_use]
    pub fn status_byte(&self) -> u8 {
        self.serial.port_b().read()
    }

    /// Mechanism controls from VIA2 port B. Undriven bits read 0.
    #[must_use]
    pub fn disk_controls(&self) -> Controls {
        let pb = DiskPortB::from_bits(self.disk.port_b_output());
        Controls {
            stepper: pb.stepper(),
            motor: pb.motor(),
            led: pb.led(),
            zone: SpeedZone::from_density(pb.density()),
        }
    }

    /// Put the head's view on VIA2: GCR byte on port A, sync and write
    /// sense on port B.
    pub fn refresh_disk(&mut self, byte: u8, sync: bool, writable: bool) {
        self.disk.set_port_a_input(byte);
        let pins = DiskPortB::from_bits(0xFF)
            .with_write_enable(writable)
            .with_no_sync(!sync);
        self.disk.set_port_b_input(pins.into_bits());
    }

    /// Byte-ready into VIA2 CA1 (active low).
    pub fn set_byte_ready(&mut self, ready: bool) {
        self.ready = ready;
        self.disk.set_ca1(!ready);
    }

    /// The CPU's SO input: pulsed by byte-ready while VIA2 holds CA2 high.
    #[must_use]
    pub fn so_asserted(&self) -> bool {
        self.ready && self.disk.pcr().ca2_control() == CA2_HIGH
    }
}
