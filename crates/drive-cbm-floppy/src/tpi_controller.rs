//! 1551 controller board: a 6525 TPI and the 6510T's on-chip port.
//!
//! The processor port at $0000/$0001 drives the head mechanism and reads
//! write-protect and byte-ready. The TPI at $4000 links to the host: port A
//! is the 8-bit data path, port C carries the handshake and status lines,
//! and port B reads the GCR byte under the head.

use emu_core::ParallelPort;
use format_gcr::SpeedZone;
use mos_tpi_6525::{Tpi6525, reg};

use crate::bits::{ProcessorPort, TpiPortC};
use crate::mechanism::Controls;

/// Input pins of the processor port with nothing driving them.
const PORT_IDLE: u8 = 0x7F;

#[derive(Debug, Clone)]
pub struct TpiController {
    tpi: Tpi6525,
    port: ParallelPort,
    device_9: bool,
    /// ACK handshake from the host.
    ack: bool,
    /// Host-side enable; a disabled link reads $FF and ignores writes.
    host_enabled: bool,
    byte_ready: bool,
    writable: bool,
    sync: bool,
}

impl TpiController {
    #[must_use]
    pub fn new(device_select: u8) -> Self {
        let mut controller = Self {
            tpi: Tpi6525::new(),
            port: ParallelPort::new(),
            device_9: device_select & 0x01 != 0,
            ack: true,
            host_enabled: true,
            byte_ready: false,
            writable: false,
            sync: false,
        };
        controller.refresh_port_c();
        controller
    }

    /// Chip reset. The host link and the head's view are external and stay.
    pub fn reset(&mut self) {
        self.tpi.reset();
        self.port.reset();
        self.byte_ready = false;
    }

    #[must_use]
    pub fn tpi(&self) -> &Tpi6525 {
        &self.tpi
    }

    /// Processor port read: $0000 is the DDR, $0001 the data. Reading the
    /// data clears byte-ready.
    pub fn read_port(&mut self, address: u16) -> u8 {
        if address & 1 == 0 {
            return self.port.ddr;
        }
        self.port.pins = ProcessorPort::from_bits(PORT_IDLE)
            .with_write_enable(self.writable)
            .with_byte_ready(self.byte_ready)
            .into_bits();
        self.byte_ready = false;
        self.port.read()
    }

    pub fn write_port(&mut self, address: u16, value: u8) {
        if address & 1 == 0 {
            self.port.ddr = value;
        } else {
            self.port.latch = value;
        }
    }

    /// TPI register access ($4000-$4007).
    pub fn read(&mut self, address: u16) -> u8 {
        self.tpi.read((address & 0x07) as u8)
    }

    pub fn write(&mut self, address: u16, value: u8) {
        self.tpi.write((address & 0x07) as u8, value);
        if (address & 0x07) as u8 == reg::DDRC {
            // A newly unmasked source sees the current pin levels.
            self.refresh_port_c();
        }
    }

    #[must_use]
    pub fn irq_active(&self) -> bool {
        self.tpi.irq_active()
    }

    /// Mechanism controls from the processor port. Undriven bits read 0.
    #[must_use]
    pub fn disk_controls(&self) -> Controls {
        let port = ProcessorPort::from_bits(self.port.output());
        Controls {
            stepper: port.stepper(),
            motor: port.motor(),
            led: port.led(),
            zone: SpeedZone::from_density(port.density()),
        }
    }

    /// Put the head's view on the board: GCR byte on TPI port B, sync on
    /// port C, write sense on the processor port.
    pub fn refresh_disk(&mut self, byte: u8, sync: bool, writable: bool) {
        self.tpi.set_port_b_input(byte);
        self.writable = writable;
        if sync != self.sync {
            self.sync = sync;
            self.refresh_port_c();
        }
    }

    /// Latch a byte-ready pulse for the next processor port read.
    pub fn byte_arrived(&mut self) {
        self.byte_ready = true;
    }

    #[must_use]
    pub fn byte_ready(&self) -> bool {
        self.byte_ready
    }

    pub fn set_host_enabled(&mut self, enabled: bool) {
        self.host_enabled = enabled;
    }

    #[must_use]
    pub fn host_enabled(&self) -> bool {
        self.host_enabled
    }

    /// Host puts a byte on the data lines.
    pub fn write_data(&mut self, value: u8) {
        if self.host_enabled {
            self.tpi.set_port_a_input(value);
        }
    }

    /// Host reads the data lines.
    #[must_use]
    pub fn read_data(&self) -> u8 {
        if self.host_enabled {
            self.tpi.port_a_pins_view()
        } else {
            0xFF
        }
    }

    /// Host drives ACK from bit 6.
    pub fn write_handshake(&mut self, value: u8) {
        if self.host_enabled {
            self.ack = value & 0x40 != 0;
            self.refresh_port_c();
        }
    }

    /// DAV as bit 7.
    #[must_use]
    pub fn read_handshake(&self) -> u8 {
        if !self.host_enabled {
            return 0xFF;
        }
        if TpiPortC::from_bits(self.tpi.port_c_pins_view()).dav() {
            0x80
        } else {
            0x00
        }
    }

    /// Status lines in bits 0-1.
    #[must_use]
    pub fn read_status(&self) -> u8 {
        if !self.host_enabled {
            return 0xFF;
        }
        TpiPortC::from_bits(self.tpi.port_c_pins_view()).status()
    }

    /// Port C inputs are composed from every source at once, so one
    /// source changing can't overwrite another's bit.
    fn refresh_port_c(&mut self) {
        let pins = TpiPortC::from_bits(0xFF)
            .with_device_9(self.device_9)
            .with_no_sync(!self.sync)
            .with_ack(self.ack);
        self.tpi.set_port_c_input(pins.into_bits());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TPI: u16 = 0x4000;

    #[test]
    fn processor_port_read_clears_byte_ready() {
        let mut c = TpiController::new(0);
        c.write_port(0, 0x6F);
        c.byte_arrived();
        let first = ProcessorPort::from_bits(c.read_port(1));
        assert!(first.byte_ready());
        let second = ProcessorPort::from_bits(c.read_port(1));
        assert!(!second.byte_ready());
        assert_eq!(c.read_port(0), 0x6F);
    }

    #[test]
    fn write_sense_follows_disk() {
        let mut c = TpiController::new(0);
        c.write_port(0, 0x6F);
        c.refresh_disk(0, false, true);
        assert!(ProcessorPort::from_bits(c.read_port(1)).write_enable());
        c.refresh_disk(0, false, false);
        assert!(!ProcessorPort::from_bits(c.read_port(1)).write_enable());
    }

    #[test]
    fn controls_from_processor_port() {
        let mut c = TpiController::new(0);
        c.write_port(0, 0x6F);
        c.write_port(1, 0x2D);
        let controls = c.disk_controls();
        assert_eq!(controls.stepper, 1);
        assert!(controls.motor);
        assert!(controls.led);
        assert_eq!(controls.zone, SpeedZone::from_density(1));
    }

    #[test]
    fn gcr_byte_and_sync_on_tpi() {
        let mut c = TpiController::new(1);
        c.refresh_disk(0xFF, true, true);
        assert_eq!(c.read(TPI + u16::from(reg::PRB)), 0xFF);
        let pc = TpiPortC::from_bits(c.read(TPI + u16::from(reg::PRC)));
        assert!(!pc.no_sync());
        assert!(pc.device_9());
        assert!(pc.ack());

        c.refresh_disk(0x52, false, true);
        assert_eq!(c.read(TPI + u16::from(reg::PRB)), 0x52);
        assert!(TpiPortC::from_bits(c.read(TPI + u16::from(reg::PRC))).no_sync());
    }

    #[test]
    fn ack_keeps_sync_bit() {
        let mut c = TpiController::new(0);
        c.refresh_disk(0xFF, true, true);
        c.write_handshake(0x00);
        let pc = TpiPortC::from_bits(c.read(TPI + u16::from(reg::PRC)));
        assert!(!pc.ack());
        assert!(!pc.no_sync());
        assert!(!pc.device_9());
    }

    #[test]
    fn host_data_path() {
        let mut c = TpiController::new(0);
        c.write_data(0x42);
        assert_eq!(c.read(TPI + u16::from(reg::PRA)), 0x42);

        c.write(TPI + u16::from(reg::DDRA), 0xFF);
        c.write(TPI + u16::from(reg::PRA), 0x99);
        assert_eq!(c.read_data(), 0x99);
    }

    #[test]
    fn host_handshake_and_status() {
        let mut c = TpiController::new(0);
        c.write(TPI + u16::from(reg::DDRC), 0x1F);
        c.write(TPI + u16::from(reg::PRC), 0x0A);
        assert_eq!(c.read_handshake(), 0x80);
        assert_eq!(c.read_status(), 0x02);
        c.write(TPI + u16::from(reg::PRC), 0x01);
        assert_eq!(c.read_handshake(), 0x00);
        assert_eq!(c.read_status(), 0x01);
    }

    #[test]
    fn disabled_host_link() {
        let mut c = TpiController::new(0);
        c.write(TPI + u16::from(reg::DDRA), 0xFF);
        c.write(TPI + u16::from(reg::PRA), 0x00);
        c.set_host_enabled(false);
        assert_eq!(c.read_data(), 0xFF);
        assert_eq!(c.read_handshake(), 0xFF);
        assert_eq!(c.read_status(), 0xFF);
        c.write_handshake(0x00);
        assert!(TpiPortC::from_bits(c.read(TPI + u16::from(reg::PRC))).ack());
        c.set_host_enabled(true);
        assert_eq!(c.read_data(), 0x00);
    }
}
