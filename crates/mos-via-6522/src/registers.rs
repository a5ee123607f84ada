//! Typed views of the VIA control registers.

use bitfield_struct::bitfield;

/// Interrupt flag register ($D). The same layout serves IER ($E).
///
/// Bit 7 is not stored: on IFR reads it reflects whether any enabled
/// flag is set, on IER writes it selects set or clear.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct InterruptFlags {
    pub ca2: bool,
    pub ca1: bool,
    pub shift: bool,
    pub cb2: bool,
    pub cb1: bool,
    pub timer2: bool,
    pub timer1: bool,
    pub any: bool,
}

impl InterruptFlags {
    /// Sources only, bit 7 masked off.
    #[must_use]
    pub const fn sources(self) -> u8 {
        self.into_bits() & 0x7F
    }
}

/// Auxiliary control register ($B).
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct AuxControl {
    pub pa_latch: bool,
    pub pb_latch: bool,
    /// Stored for read-back only: the shift register doesn't shift.
    #[bits(3)]
    pub shift_mode: u8,
    /// Timer 2 counts PB6 pulses instead of clock cycles.
    pub t2_count_pulses: bool,
    pub t1_free_run: bool,
    /// Timer 1 toggles PB7 on every underflow.
    pub t1_pb7_output: bool,
}

/// Peripheral control register ($C).
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct PeripheralControl {
    /// CA1 triggers on the rising edge (falling when clear).
    pub ca1_rising: bool,
    #[bits(3)]
    pub ca2_control: u8,
    /// CB1 triggers on the rising edge (falling when clear).
    pub cb1_rising: bool,
    #[bits(3)]
    pub cb2_control: u8,
}
