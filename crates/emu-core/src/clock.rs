//! Master clock configuration.

use crate::Ticks;

/// Master clock configuration for a system.
///
/// Every periodic timer in the drive subsystem derives its period from this
/// frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterClock {
    /// Crystal frequency in Hz (`16_000_000` for the 1541 board).
    pub frequency_hz: u64,
}

impl MasterClock {
    /// The 16 MHz crystal on Commodore 1541/1551 logic boards.
    pub const XTAL_16MHZ: Self = Self::new(16_000_000);

    #[must_use]
    pub const fn new(frequency_hz: u64) -> Self {
        Self { frequency_hz }
    }

    /// Period of a timer firing `hz` times per second (integer division).
    ///
    /// Zero frequencies map to the longest representable period so that a
    /// caller can never arm a zero-length periodic timer.
    #[must_use]
    pub const fn period_of_hz(&self, hz: u64) -> Ticks {
        if hz == 0 {
            return Ticks::new(u64::MAX);
        }
        Ticks::new(self.frequency_hz / hz)
    }
}
