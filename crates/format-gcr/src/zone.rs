//! Speed zones.
//!
//! The drive writes outer tracks at a higher bit rate so they hold more
//! sectors. Firmware selects the rate with two density bits; the bit clock is
//! the 16 MHz crystal divided by 16 - density, and a GCR byte is 8 bit cells
//! of 4 clocks each.

/// Ticks of the 16 MHz drive crystal per bit cell at divisor 1.
const TICKS_PER_BIT_UNIT: u64 = 4;

/// One of the four recording densities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpeedZone(u8);

impl SpeedZone {
    /// Innermost tracks, 17 sectors.
    pub const SLOWEST: Self = Self(0);
    /// Outermost tracks, 21 sectors.
    pub const FASTEST: Self = Self(3);

    /// Zone selected by the two density bits (upper bits ignored).
    #[must_use]
    pub const fn from_density(bits: u8) -> Self {
        Self(bits & 0x03)
    }

    /// The zone the stock DOS picks for a 1541 track.
    #[must_use]
    pub const fn for_track(track: u8) -> Self {
        match track {
            1..=17 => Self(3),
            18..=24 => Self(2),
            25..=30 => Self(1),
            _ => Self(0),
        }
    }

    #[must_use]
    pub const fn density(self) -> u8 {
        self.0
    }

    /// Crystal divisor for the bit clock: 13 (fastest) to 16 (slowest).
    #[must_use]
    pub const fn divisor(self) -> u8 {
        16 - self.0
    }

    /// Crystal ticks per GCR byte: 416 (26 µs) down to 512 (32 µs).
    #[must_use]
    pub const fn byte_period_ticks(self) -> u64 {
        self.divisor() as u64 * TICKS_PER_BIT_UNIT * 8
    }
}

/// Shorthand for [`SpeedZone::for_track`].
#[must_use]
pub const fn speed_zone(track: u8) -> SpeedZone {
    SpeedZone::for_track(track)
}
