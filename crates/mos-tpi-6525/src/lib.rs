//! MOS 6525 Tri-Port Interface (TPI).
//!
//! Three 8-bit ports with data-direction registers. In interrupt mode
//! (CR bit 0) the low five bits of port C become interrupt inputs I0-I4,
//! DDRC becomes their mask, and PC5-PC7 turn into IRQ, CA and CB outputs.
//! The 1551 parallel drive uses one TPI for the host link and disk data.
//!
//! # Registers ($0-$7)
//!
//! | Reg | Name | Description                                   |
//! |-----|------|-----------------------------------------------|
//! | $0  | PRA  | Port A data                                   |
//! | $1  | PRB  | Port B data                                   |
//! | $2  | PRC  | Port C data / interrupt status                |
//! | $3  | DDRA | Port A data direction (1 = output)            |
//! | $4  | DDRB | Port B data direction                         |
//! | $5  | DDRC | Port C data direction / interrupt mask        |
//! | $6  | CR   | Control register                              |
//! | $7  | AIR  | Active interrupt register (read-only)         |
//!
//! # Interrupt priority
//!
//! With CR bit 1 set the AIR is "priorized": a read returns only the
//! highest pending source (I4 first, I0 last) and clears just that one, so
//! the IRQ output stays asserted while anything else is pending. With the
//! bit clear a read returns every pending source and clears them all.

mod registers;

use emu_core::ParallelPort;

pub use registers::Control;

/// Register offsets.
pub mod reg {
    pub const PRA: u8 = 0;
    pub const PRB: u8 = 1;
    pub const PRC: u8 = 2;
    pub const DDRA: u8 = 3;
    pub const DDRB: u8 = 4;
    pub const DDRC: u8 = 5;
    pub const CR: u8 = 6;
    pub const AIR: u8 = 7;
}

/// Number of interrupt inputs (I0-I4).
pub const INTERRUPT_INPUTS: usize = 5;

/// MOS 6525 Tri-Port Interface.
#[derive(Debug, Clone)]
pub struct Tpi6525 {
    port_a: ParallelPort,
    port_b: ParallelPort,
    port_c: ParallelPort,
    cr: Control,
    /// Latched interrupt sources, bit n = In.
    air: u8,
    /// Current level of each interrupt input, bit n = In.
    input_levels: u8,
    /// IRQ output (active high here; the pin itself is active low).
    interrupt: bool,
    ca: bool,
    cb: bool,
}

impl Tpi6525 {
    #[must_use]
    pub fn new() -> Self {
        Self {
            port_a: ParallelPort::new(),
            port_b: ParallelPort::new(),
            port_c: ParallelPort::new(),
            cr: Control::new(),
            air: 0,
            input_levels: 0x1F,
            interrupt: false,
            ca: true,
            cb: true,
        }
    }

    /// Return to the power-on state, keeping external pin levels.
    pub fn reset(&mut self) {
        let pins = (self.port_a.pins, self.port_b.pins, self.port_c.pins);
        let levels = self.input_levels;
        *self = Self::new();
        (self.port_a.pins, self.port_b.pins, self.port_c.pins) = pins;
        self.input_levels = levels;
    }

    /// IRQ output.
    #[must_use]
    pub fn irq_active(&self) -> bool {
        self.interrupt
    }

    #[must_use]
    pub fn control(&self) -> Control {
        self.cr
    }

    /// Pending sources without the read side effect.
    #[must_use]
    pub fn pending(&self) -> u8 {
        self.air
    }

    /// CA output level.
    #[must_use]
    pub fn ca(&self) -> bool {
        self.ca
    }

    /// CB output level.
    #[must_use]
    pub fn cb(&self) -> bool {
        self.cb
    }

    pub fn read(&mut self, reg: u8) -> u8 {
        match reg & 0x07 {
            reg::PRA => self.port_a.read(),
            reg::PRB => self.port_b.read(),
            reg::PRC => self.read_port_c(),
            reg::DDRA => self.port_a.ddr,
            reg::DDRB => self.port_b.ddr,
            reg::DDRC => self.port_c.ddr,
            reg::CR => self.cr.into_bits(),
            _ => self.read_air(),
        }
    }

    pub fn write(&mut self, reg: u8, value: u8) {
        match reg & 0x07 {
            reg::PRA => self.port_a.latch = value,
            reg::PRB => self.port_b.latch = value,
            reg::PRC => self.port_c.latch = value,
            reg::DDRA => self.port_a.ddr = value,
            reg::DDRB => self.port_b.ddr = value,
            reg::DDRC => self.port_c.ddr = value,
            reg::CR => self.write_control(value),
            // AIR is read-only.
            _ => {}
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

    /// External levels on the port C pins.
    ///
    /// In interrupt mode the low five pins also feed I0-I4.
    pub fn set_port_c_input(&mut self, pins: u8) {
        self.port_c.pins = pins;
        for line in 0..INTERRUPT_INPUTS {
            self.set_interrupt_input(line, pins & (1 << line) != 0);
        }
    }

    /// Drive one interrupt input.
    ///
    /// I0-I2 latch on a falling edge; I3 and I4 on the edge selected by
    /// CR bits 2 and 3. Nothing latches outside interrupt mode or for a
    /// source masked off in DDRC.
    pub fn set_interrupt_input(&mut self, line: usize, level: bool) {
        if line >= INTERRUPT_INPUTS {
            return;
        }
        let bit = 1u8 << line;
        let previous = self.input_levels & bit != 0;
        if previous == level {
            return;
        }
        if level {
            self.input_levels |= bit;
        } else {
            self.input_levels &= !bit;
        }

        let rising = match line {
            3 => self.cr.i3_rising(),
            4 => self.cr.i4_rising(),
            _ => false,
        };
        let triggered = if rising { level } else { !level };
        if triggered && self.cr.interrupt_mode() && self.port_c.ddr & bit != 0 {
            self.air |= bit;
            if !self.interrupt {
                log::trace!("TPI interrupt I{line}");
            }
            self.interrupt = true;
        }
    }

    /// Port A as seen from outside the chip.
    #[must_use]
    pub fn port_a_pins_view(&self) -> u8 {
        self.port_a.read()
    }

    /// Port C as seen from outside the chip.
    #[must_use]
    pub fn port_c_pins_view(&self) -> u8 {
        self.port_c.read()
    }

    /// Port A bits the chip drives (input bits read as 0).
    #[must_use]
    pub fn port_a_output(&self) -> u8 {
        self.port_a.output()
    }

    /// Port B bits the chip drives (input bits read as 0).
    #[must_use]
    pub fn port_b_output(&self) -> u8 {
        self.port_b.output()
    }

    /// Port C bits the chip drives (input bits read as 0).
    #[must_use]
    pub fn port_c_output(&self) -> u8 {
        self.port_c.output()
    }

    fn read_port_c(&self) -> u8 {
        if !self.cr.interrupt_mode() {
            return self.port_c.read();
        }
        let mut value = self.air & 0x1F;
        if !self.interrupt {
            value |= 0x20;
        }
        if self.ca {
            value |= 0x40;
        }
        if self.cb {
            value |= 0x80;
        }
        value
    }

    fn read_air(&mut self) -> u8 {
        let value = if self.cr.priorized() {
            let highest = (0..INTERRUPT_INPUTS)
                .rev()
                .map(|line| 1u8 << line)
                .find(|bit| self.air & bit != 0)
                .unwrap_or(0);
            self.air &= !highest;
            highest
        } else {
            std::mem::take(&mut self.air)
        };
        if self.air == 0 {
            self.interrupt = false;
        }
        value
    }

    fn write_control(&mut self, value: u8) {
        self.cr = Control::from_bits(value);
        if let Some(level) = self.cr.ca_manual_level() {
            self.ca = level;
        }
        if let Some(level) = self.cr.cb_manual_level() {
            self.cb = level;
        }
    }
}

impl Default for Tpi6525 {
    fn default() -> Self {
        Self::new()
    }
}
