//! Commodore serial bus: ATN, CLK and DATA.
//!
//! Every line is open-collector with a pull-up. Each participant (the host
//! and up to two drives) has its own output latch per line and can only pull
//! a line low; the line reads high only while every latch is released. The
//! bus keeps those latches and the combined levels, and tells every
//! participant about each change of a combined level.
//!
//! Levels are electrical: `true` is released (high), `false` is pulled low,
//! which is what the protocol calls "asserted".

mod bus;

pub use bus::{LineObserver, MAX_SETTLE_STEPS, SerialBus};

/// One of the three bus lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Line {
    Atn,
    Clock,
    Data,
}

impl Line {
    pub const ALL: [Line; 3] = [Line::Atn, Line::Clock, Line::Data];

    const fn index(self) -> usize {
        match self {
            Line::Atn => 0,
            Line::Clock => 1,
            Line::Data => 2,
        }
    }
}

impl std::fmt::Display for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Line::Atn => "ATN",
            Line::Clock => "CLK",
            Line::Data => "DATA",
        })
    }
}

/// Handle handed out by [`SerialBus::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParticipantId(pub usize);

/// Combined level of all three lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Levels {
    pub atn: bool,
    pub clock: bool,
    pub data: bool,
}

impl Levels {
    /// Every line released.
    pub const IDLE: Self = Self {
        atn: true,
        clock: true,
        data: true,
    };

    #[must_use]
    pub const fn get(&self, line: Line) -> bool {
        match line {
            Line::Atn => self.atn,
            Line::Clock => self.clock,
            Line::Data => self.data,
        }
    }

    fn set(&mut self, line: Line, level: bool) {
        match line {
            Line::Atn => self.atn = level,
            Line::Clock => self.clock = level,
            Line::Data => self.data = level,
        }
    }
}

impl Default for Levels {
    fn default() -> Self {
        Self::IDLE
    }
}

/// A change of one line's combined level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub line: Line,
    /// New combined level.
    pub level: bool,
}

impl Edge {
    #[must_use]
    pub const fn is_falling(&self) -> bool {
        !self.level
    }
}

/// A participant's request to change one of its own latches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputChange {
    pub participant: ParticipantId,
    pub line: Line,
    /// `true` releases the line, `false` pulls it low.
    pub level: bool,
}
