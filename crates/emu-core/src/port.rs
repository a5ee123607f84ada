//! Bidirectional 8-bit parallel port with a data-direction register.
//!
//! Shared by every port-bearing chip in the drive: both 6522 ports, the
//! three 6525 ports and the 6510T processor port.

/// One 8-bit port: output latch, data-direction register and external pins.
///
/// Bits set in `ddr` are outputs and read back the latch; bits clear are
/// inputs and read the external pin level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParallelPort {
    /// Output latch written by the CPU.
    pub latch: u8,
    /// Data direction (1 = output).
    pub ddr: u8,
    /// Level of the external pins, as driven by whatever is wired to them.
    pub pins: u8,
}

impl ParallelPort {
    /// Port after reset: all inputs, latch clear, pins pulled high.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            latch: 0,
            ddr: 0,
            pins: 0xFF,
        }
    }

    /// Value the CPU sees when reading the port.
    #[must_use]
    pub const fn read(&self) -> u8 {
        (self.pins & !self.ddr) | (self.latch & self.ddr)
    }

    /// Bits actively driven by the chip. Undriven (input) bits read as 0.
    #[must_use]
    pub const fn output(&self) -> u8 {
        self.latch & self.ddr
    }

    /// Set or clear a single external pin.
    pub fn set_pin(&mut self, mask: u8, high: bool) {
        if high {
            self.pins |= mask;
        } else {
            self.pins &= !mask;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for ParallelPort {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::quickcheck;

    #[test]
    fn all_inputs_after_reset() {
        let mut port = ParallelPort::new();
        port.latch = 0x55;
        assert_eq!(port.read(), 0xFF);
        assert_eq!(port.output(), 0x00);
    }

    #[test]
    fn mixed_direction() {
        let port = ParallelPort {
            latch: 0xAB,
            ddr: 0x0F,
            pins: 0xC0,
        };
        assert_eq!(port.read(), 0xCB);
        assert_eq!(port.output(), 0x0B);
    }

    #[test]
    fn set_pin_touches_one_bit() {
        let mut port = ParallelPort::new();
        port.set_pin(0x10, false);
        assert_eq!(port.pins, 0xEF);
        port.set_pin(0x10, true);
        assert_eq!(port.pins, 0xFF);
    }

    quickcheck! {
        fn read_back_law(pins: u8, latch: u8, ddr: u8) -> bool {
            let port = ParallelPort { latch, ddr, pins };
            port.read() == (pins & !ddr) | (latch & ddr)
        }

        fn output_never_drives_inputs(latch: u8, ddr: u8) -> bool {
            let port = ParallelPort { latch, ddr, pins: 0 };
            port.output() & !ddr == 0
        }
    }
}
