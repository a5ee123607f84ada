//! MOS 6522 Versatile Interface Adapter (VIA).
//!
//! The 6522 provides two 8-bit I/O ports, two 16-bit timers, a serial
//! shift register, and an interrupt controller. The 1541 floppy drive
//! uses two VIAs: VIA1 for the serial bus and VIA2 for the disk
//! controller.
//!
//! # Registers ($0-$F)
//!
//! | Reg | Name | Description                              |
//! |-----|------|------------------------------------------|
//! | $0  | ORB  | Port B data (handshake on access)        |
//! | $1  | ORA  | Port A data (handshake on access)        |
//! | $2  | DDRB | Port B data direction (1 = output)       |
//! | $3  | DDRA | Port A data direction (1 = output)       |
//! | $4  | T1CL | Timer 1 counter low (read clears T1 IRQ) |
//! | $5  | T1CH | Timer 1 counter high (write starts T1)   |
//! | $6  | T1LL | Timer 1 latch low                        |
//! | $7  | T1LH | Timer 1 latch high                       |
//! | $8  | T2CL | Timer 2 counter low (read clears T2 IRQ) |
//! | $9  | T2CH | Timer 2 counter high (write starts T2)   |
//! | $A  | SR   | Shift register latch (never shifts)      |
//! | $B  | ACR  | Auxiliary control register               |
//! | $C  | PCR  | Peripheral control register              |
//! | $D  | IFR  | Interrupt flag register                  |
//! | $E  | IER  | Interrupt enable register                |
//! | $F  | ORA  | Port A data (no handshake)               |

mod registers;

use emu_core::ParallelPort;

pub use registers::{AuxControl, InterruptFlags, PeripheralControl};

/// Register offsets within the 16-byte window.
pub mod reg {
    pub const ORB: u8 = 0x0;
    pub const ORA: u8 = 0x1;
    pub const DDRB: u8 = 0x2;
    pub const DDRA: u8 = 0x3;
    pub const T1CL: u8 = 0x4;
    pub const T1CH: u8 = 0x5;
    pub const T1LL: u8 = 0x6;
    pub const T1LH: u8 = 0x7;
    pub const T2CL: u8 = 0x8;
    pub const T2CH: u8 = 0x9;
    pub const SR: u8 = 0xA;
    pub const ACR: u8 = 0xB;
    pub const PCR: u8 = 0xC;
    pub const IFR: u8 = 0xD;
    pub const IER: u8 = 0xE;
    pub const ORA_NH: u8 = 0xF;
}

/// MOS 6522 Versatile Interface Adapter.
#[derive(Debug, Clone)]
pub struct Via6522 {
    port_a: ParallelPort,
    port_b: ParallelPort,

    timer1_counter: u16,
    timer1_latch: u16,
    /// Counting and able to raise an interrupt. One-shot mode clears this
    /// after the first underflow.
    timer1_running: bool,

    timer2_counter: u16,
    /// Only the low byte of the T2 latch exists.
    timer2_latch_lo: u8,
    timer2_running: bool,

    shift_register: u8,

    acr: AuxControl,
    pcr: PeripheralControl,
    ifr: InterruptFlags,
    ier: InterruptFlags,

    ca1: bool,
    cb1: bool,

    /// PB7 level while Timer 1 owns it.
    pb7_output: bool,
}

impl Via6522 {
    /// Create a new VIA with all registers in their reset state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            port_a: ParallelPort::new(),
            port_b: ParallelPort::new(),
            timer1_counter: 0xFFFF,
            timer1_latch: 0xFFFF,
            timer1_running: false,
            timer2_counter: 0xFFFF,
            timer2_latch_lo: 0xFF,
            timer2_running: false,
            shift_register: 0,
            acr: AuxControl::new(),
            pcr: PeripheralControl::new(),
            ifr: InterruptFlags::new(),
            ier: InterruptFlags::new(),
            ca1: true,
            cb1: true,
            pb7_output: false,
        }
    }

    /// Return to the power-on state. External pin levels are kept, since
    /// whatever drives them is unaffected by the chip's RESET line.
    pub fn reset(&mut self) {
        let (pins_a, pins_b, ca1, cb1) = (self.port_a.pins, self.port_b.pins, self.ca1, self.cb1);
        *self = Self::new();
        self.port_a.pins = pins_a;
        self.port_b.pins = pins_b;
        self.ca1 = ca1;
        self.cb1 = cb1;
    }

    /// Advance one φ2 cycle: count the timers down and flag underflows.
    pub fn tick(&mut self) {
        self.tick_timer1();
        self.tick_timer2();
    }

    /// The chip's IRQ output: any flag that is also enabled.
    #[must_use]
    pub fn irq_active(&self) -> bool {
        self.ifr.sources() & self.ier.sources() != 0
    }

    /// Read a register. Some reads clear interrupt flags.
    pub fn read(&mut self, reg: u8) -> u8 {
        match reg & 0x0F {
            reg::ORB => {
                self.ifr.set_cb1(false);
                self.ifr.set_cb2(false);
                self.read_port_b()
            }
            reg::ORA => {
                self.ifr.set_ca1(false);
                self.ifr.set_ca2(false);
                self.port_a.read()
            }
            reg::DDRB => self.port_b.ddr,
            reg::DDRA => self.port_a.ddr,
            reg::T1CL => {
                self.ifr.set_timer1(false);
                self.timer1_counter as u8
            }
            reg::T1CH => (self.timer1_counter >> 8) as u8,
            reg::T1LL => self.timer1_latch as u8,
            reg::T1LH => (self.timer1_latch >> 8) as u8,
            reg::T2CL => {
                self.ifr.set_timer2(false);
                self.timer2_counter as u8
            }
            reg::T2CH => (self.timer2_counter >> 8) as u8,
            reg::SR => {
                self.ifr.set_shift(false);
                self.shift_register
            }
            reg::ACR => self.acr.into_bits(),
            reg::PCR => self.pcr.into_bits(),
            reg::IFR => self.ifr.with_any(self.irq_active()).into_bits(),
            reg::IER => self.ier.with_any(true).into_bits(),
            // ORA without handshake
            _ => self.port_a.read(),
        }
    }

    /// Write a register.
    pub fn write(&mut self, reg: u8, value: u8) {
        match reg & 0x0F {
            reg::ORB => {
                self.ifr.set_cb1(false);
                self.ifr.set_cb2(false);
                self.port_b.latch = value;
            }
            reg::ORA => {
                self.ifr.set_ca1(false);
                self.ifr.set_ca2(false);
                self.port_a.latch = value;
            }
            reg::DDRB => self.port_b.ddr = value,
            reg::DDRA => self.port_a.ddr = value,
            reg::T1CL | reg::T1LL => {
                self.timer1_latch = (self.timer1_latch & 0xFF00) | u16::from(value);
            }
            reg::T1CH => {
                self.timer1_latch = (self.timer1_latch & 0x00FF) | (u16::from(value) << 8);
                self.timer1_counter = self.timer1_latch;
                self.timer1_running = true;
                self.ifr.set_timer1(false);
                self.pb7_output = false;
            }
            reg::T1LH => {
                self.timer1_latch = (self.timer1_latch & 0x00FF) | (u16::from(value) << 8);
                self.ifr.set_timer1(false);
            }
            reg::T2CL => self.timer2_latch_lo = value,
            reg::T2CH => {
                self.timer2_counter = u16::from(self.timer2_latch_lo) | (u16::from(value) << 8);
                self.timer2_running = true;
                self.ifr.set_timer2(false);
            }
            reg::SR => {
                self.shift_register = value;
                self.ifr.set_shift(false);
            }
            reg::ACR => self.acr = AuxControl::from_bits(value),
            reg::PCR => self.pcr = PeripheralControl::from_bits(value),
            reg::IFR => {
                // Writing 1s clears the corresponding flags.
                self.ifr = InterruptFlags::from_bits(self.ifr.sources() & !value);
            }
            reg::IER => {
                let bits = value & 0x7F;
                let ier = if value & 0x80 != 0 {
                    self.ier.sources() | bits
                } else {
                    self.ier.sources() & !bits
                };
                self.ier = InterruptFlags::from_bits(ier);
            }
            // ORA without handshake
            _ => self.port_a.latch = value,
        }
    }

    /// Drive the CA1 input. Flags CA1 on the edge selected by PCR bit 0.
    pub fn set_ca1(&mut self, level: bool) {
        if Self::active_edge(self.ca1, level, self.pcr.ca1_rising()) {
            self.ifr.set_ca1(true);
        }
        self.ca1 = level;
    }

    /// Drive the CB1 input. Flags CB1 on the edge selected by PCR bit 4.
    pub fn set_cb1(&mut self, level: bool) {
        if Self::active_edge(self.cb1, level, self.pcr.cb1_rising()) {
            self.ifr.set_cb1(true);
        }
        self.cb1 = level;
    }

    /// Raise the CA2 flag from external logic.
    pub fn set_ca2_flag(&mut self) {
        self.ifr.set_ca2(true);
    }

    /// Raise the CB2 flag from external logic.
    pub fn set_cb2_flag(&mut self) {
        self.ifr.set_cb2(true);
    }

    fn active_edge(previous: bool, level: bool, rising: bool) -> bool {
        if rising {
            !previous && level
        } else {
            previous && !level
        }
    }

    /// External levels on the port A pins.
    pub fn set_port_a_input(&mut self, pins: u8) {
        self.port_a.pins = pins;
    }

    /// External levels on the port B pins.
    pub fn set_port_b_input(&mut self, pins: u8) {
        self.port_b.pins = pins;
    }

    /// Port A bits the chip drives (input bits read as 0).
    #[must_use]
    pub fn port_a_output(&self) -> u8 {
        self.port_a.output()
    }

    /// Port B bits the chip drives (input bits read as 0).
    ///
    /// With ACR bit 7 set, PB7 follows the Timer 1 toggle instead of the
    /// output latch.
    #[must_use]
    pub fn port_b_output(&self) -> u8 {
        let out = self.port_b.output();
        if self.acr.t1_pb7_output() {
            (out & 0x7F) | if self.pb7_output { 0x80 } else { 0 }
        } else {
            out
        }
    }

    #[must_use]
    pub fn port_a(&self) -> &ParallelPort {
        &self.port_a
    }

    #[must_use]
    pub fn port_b(&self) -> &ParallelPort {
        &self.port_b
    }

    #[must_use]
    pub fn ifr(&self) -> InterruptFlags {
        self.ifr
    }

    #[must_use]
    pub fn ier(&self) -> InterruptFlags {
        self.ier
    }

    #[must_use]
    pub fn acr(&self) -> AuxControl {
        self.acr
    }

    #[must_use]
    pub fn pcr(&self) -> PeripheralControl {
        self.pcr
    }

    #[must_use]
    pub fn timer1_counter(&self) -> u16 {
        self.timer1_counter
    }

    #[must_use]
    pub fn timer2_counter(&self) -> u16 {
        self.timer2_counter
    }

    fn read_port_b(&self) -> u8 {
        let value = self.port_b.read();
        if self.acr.t1_pb7_output() {
            (value & 0x7F) | if self.pb7_output { 0x80 } else { 0 }
        } else {
            value
        }
    }

    fn tick_timer1(&mut self) {
        // Free-run keeps counting after the first underflow.
        if !self.timer1_running && !self.acr.t1_free_run() {
            return;
        }

        let (counter, underflow) = self.timer1_counter.overflowing_sub(1);
        self.timer1_counter = counter;
        if !underflow {
            return;
        }

        if self.acr.t1_free_run() {
            self.ifr.set_timer1(true);
            self.timer1_counter = self.timer1_latch;
            if self.acr.t1_pb7_output() {
                self.pb7_output = !self.pb7_output;
            }
        } else if self.timer1_running {
            self.ifr.set_timer1(true);
            self.timer1_running = false;
        }
    }

    fn tick_timer2(&mut self) {
        // Pulse counting on PB6 is not driven by the clock.
        if self.acr.t2_count_pulses() {
            return;
        }

        // T2 keeps decrementing after it fires; it just can't fire again
        // until rewritten.
        let (counter, underflow) = self.timer2_counter.overflowing_sub(1);
        self.timer2_counter = counter;
        if underflow && self.timer2_running {
            self.ifr.set_timer2(true);
            self.timer2_running = false;
        }
    }
}

impl Default for Via6522 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::quickcheck;

    const T1: u8 = 0x40;
    const T2: u8 = 0x20;
    const CB1: u8 = 0x10;
    const CB2: u8 = 0x08;
    const CA1: u8 = 0x02;
    const CA2: u8 = 0x01;

    fn flags(via: &Via6522) -> u8 {
        via.ifr().sources()
    }

    #[test]
    fn timer1_countdown_and_underflow() {
        let mut via = Via6522::new();
        via.write(reg::T1CL, 3);
        via.write(reg::T1CH, 0);
        assert_eq!(via.timer1_counter(), 3);
        assert_eq!(flags(&via) & T1, 0);

        via.tick(); // 3 -> 2
        assert_eq!(via.timer1_counter(), 2);
        via.tick(); // 2 -> 1
        via.tick(); // 1 -> 0
        assert_eq!(flags(&via) & T1, 0);
        via.tick(); // underflow
        assert_ne!(flags(&via) & T1, 0);
    }

    #[test]
    fn timer1_one_shot_fires_once() {
        let mut via = Via6522::new();
        via.write(reg::T1CL, 2);
        via.write(reg::T1CH, 0);
        for _ in 0..3 {
            via.tick();
        }
        assert_ne!(flags(&via) & T1, 0);

        via.write(reg::IFR, T1);
        for _ in 0..0x1_0000 {
            via.tick();
        }
        assert_eq!(flags(&via) & T1, 0);
    }

    #[test]
    fn timer1_free_run_reloads() {
        let mut via = Via6522::new();
        via.write(reg::ACR, 0x40);
        via.write(reg::T1CL, 2);
        via.write(reg::T1CH, 0);

        via.tick();
        via.tick();
        via.tick(); // underflow, reload
        assert_ne!(flags(&via) & T1, 0);
        assert_eq!(via.timer1_counter(), 2);
    }

    #[test]
    fn timer1_write_high_starts_and_clears_irq() {
        let mut via = Via6522::new();
        via.write(reg::T1CL, 0);
        via.write(reg::T1CH, 0);
        via.tick();
        assert_ne!(flags(&via) & T1, 0);

        via.write(reg::T1CL, 10);
        via.write(reg::T1CH, 0);
        assert_eq!(flags(&via) & T1, 0);
        assert_eq!(via.timer1_counter(), 10);
    }

    #[test]
    fn timer1_read_low_clears_irq() {
        let mut via = Via6522::new();
        via.write(reg::T1CL, 0);
        via.write(reg::T1CH, 0);
        via.tick();
        let _ = via.read(reg::T1CL);
        assert_eq!(flags(&via) & T1, 0);
    }

    #[test]
    fn timer1_latch_write_does_not_start() {
        let mut via = Via6522::new();
        via.write(reg::T1LL, 0x01);
        via.write(reg::T1LH, 0x00);
        for _ in 0..4 {
            via.tick();
        }
        assert_eq!(flags(&via) & T1, 0);
        assert_eq!(via.timer1_counter(), 0xFFFF);
    }

    #[test]
    fn timer2_one_shot() {
        let mut via = Via6522::new();
        via.write(reg::T2CL, 3);
        via.write(reg::T2CH, 0);
        for _ in 0..3 {
            via.tick();
        }
        assert_eq!(flags(&via) & T2, 0);
        via.tick();
        assert_ne!(flags(&via) & T2, 0);

        let _ = via.read(reg::T2CL);
        assert_eq!(flags(&via) & T2, 0);
        for _ in 0..0x1_0000 {
            via.tick();
        }
        assert_eq!(flags(&via) & T2, 0);
    }

    #[test]
    fn ifr_write_clears_flags() {
        let mut via = Via6522::new();
        via.write(reg::PCR, 0x01);
        via.set_ca1(false);
        via.set_ca1(true);
        via.write(reg::T2CL, 0);
        via.write(reg::T2CH, 0);
        via.tick();
        assert_eq!(flags(&via), T2 | CA1);

        via.write(reg::IFR, CA1);
        assert_eq!(flags(&via), T2);
    }

    #[test]
    fn ier_set_clear_mode() {
        let mut via = Via6522::new();
        via.write(reg::IER, 0x80 | T1 | CB1);
        assert_eq!(via.read(reg::IER), 0x80 | T1 | CB1);

        via.write(reg::IER, T1);
        assert_eq!(via.read(reg::IER), 0x80 | CB1);
    }

    #[test]
    fn ifr_bit7_reflects_enabled_flags() {
        let mut via = Via6522::new();
        via.set_ca1(false); // falling edge, PCR default
        assert_eq!(via.read(reg::IFR), CA1);
        assert!(!via.irq_active());

        via.write(reg::IER, 0x80 | CA1);
        assert_eq!(via.read(reg::IFR), 0x80 | CA1);
        assert!(via.irq_active());

        let _ = via.read(reg::ORA);
        assert!(!via.irq_active());
    }

    #[test]
    fn cb1_edges() {
        let mut via = Via6522::new();
        via.write(reg::PCR, 0x10); // rising
        via.set_cb1(false);
        assert_eq!(flags(&via) & CB1, 0);
        via.set_cb1(true);
        assert_ne!(flags(&via) & CB1, 0);

        let mut via = Via6522::new();
        via.set_cb1(true);
        assert_eq!(flags(&via) & CB1, 0);
        via.set_cb1(false); // falling, PCR default
        assert_ne!(flags(&via) & CB1, 0);
    }

    #[test]
    fn ca1_level_without_edge_does_nothing() {
        let mut via = Via6522::new();
        via.write(reg::PCR, 0x01);
        via.set_ca1(true);
        via.set_ca1(true);
        assert_eq!(flags(&via) & CA1, 0);
    }

    #[test]
    fn mixed_port_reads() {
        let mut via = Via6522::new();
        via.write(reg::DDRA, 0x0F);
        via.write(reg::ORA, 0xAB);
        via.set_port_a_input(0xC0);
        assert_eq!(via.read(reg::ORA_NH), 0xCB);
        assert_eq!(via.port_a_output(), 0x0B);
    }

    #[test]
    fn port_b_input() {
        let mut via = Via6522::new();
        via.set_port_b_input(0x42);
        assert_eq!(via.read(reg::ORB), 0x42);
        assert_eq!(via.port_b_output(), 0);
    }

    #[test]
    fn pb7_toggle_on_free_run() {
        let mut via = Via6522::new();
        via.write(reg::ACR, 0xC0);
        via.write(reg::DDRB, 0x80);
        via.write(reg::T1CL, 1);
        via.write(reg::T1CH, 0);

        assert_eq!(via.port_b_output() & 0x80, 0);
        via.tick();
        via.tick();
        assert_eq!(via.port_b_output() & 0x80, 0x80);
        via.tick();
        via.tick();
        assert_eq!(via.port_b_output() & 0x80, 0);
    }

    #[test]
    fn handshake_reads_clear_their_flags_only() {
        let mut via = Via6522::new();
        via.set_ca1(false);
        via.set_cb1(false);
        via.set_ca2_flag();
        via.set_cb2_flag();
        assert_eq!(flags(&via), CA1 | CA2 | CB1 | CB2);

        let _ = via.read(reg::ORA_NH);
        assert_eq!(flags(&via), CA1 | CA2 | CB1 | CB2);
        let _ = via.read(reg::ORB);
        assert_eq!(flags(&via), CA1 | CA2);
        let _ = via.read(reg::ORA);
        assert_eq!(flags(&via), 0);
    }

    #[test]
    fn shift_register_is_a_latch() {
        let mut via = Via6522::new();
        via.write(reg::ACR, 0x1C);
        via.write(reg::SR, 0xA5);
        for _ in 0..64 {
            via.tick();
        }
        assert_eq!(via.read(reg::SR), 0xA5);
        assert_eq!(via.read(reg::ACR), 0x1C);
        assert_eq!(flags(&via) & 0x04, 0);
    }

    #[test]
    fn reset_keeps_external_pins() {
        let mut via = Via6522::new();
        via.set_port_b_input(0x12);
        via.write(reg::DDRB, 0xFF);
        via.write(reg::IER, 0xFF);
        via.reset();
        assert_eq!(via.read(reg::DDRB), 0);
        assert_eq!(via.read(reg::IER), 0x80);
        assert_eq!(via.read(reg::ORB), 0x12);
    }

    quickcheck! {
        fn port_read_back_law(pins: u8, latch: u8, ddr: u8) -> bool {
            let mut via = Via6522::new();
            via.set_port_b_input(pins);
            via.write(reg::ORB, latch);
            via.write(reg::DDRB, ddr);
            via.read(reg::ORB) == (pins & !ddr) | (latch & ddr)
        }
    }
}
