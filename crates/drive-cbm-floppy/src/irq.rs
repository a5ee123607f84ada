//! Drive CPU IRQ input: the wired-OR of every interrupt source on the board.

/// Something that can pull the drive CPU's IRQ line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqSource {
    /// 1541 VIA1 ($1800).
    SerialVia,
    /// 1541 VIA2 ($1C00).
    DiskVia,
    /// 1551 TPI ($4000).
    Tpi,
    /// 1551 periodic timer.
    Timer,
}

impl IrqSource {
    const fn mask(self) -> u8 {
        match self {
            Self::SerialVia => 0x01,
            Self::DiskVia => 0x02,
            Self::Tpi => 0x04,
            Self::Timer => 0x08,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IrqLine {
    sources: u8,
}

impl IrqLine {
    /// Update one source. Returns `true` if the combined line changed.
    pub fn set(&mut self, source: IrqSource, active: bool) -> bool {
        let before = self.asserted();
        if active {
            self.sources |= source.mask();
        } else {
            self.sources &= !source.mask();
        }
        before != self.asserted()
    }

    /// Whether any source is pulling the line.
    #[must_use]
    pub fn asserted(&self) -> bool {
        self.sources != 0
    }

    #[must_use]
    pub fn is_set(&self, source: IrqSource) -> bool {
        self.sources & source.mask() != 0
    }

    pub fn clear(&mut self) {
        self.sources = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_is_or_of_sources() {
        let mut line = IrqLine::default();
        assert!(line.set(IrqSource::SerialVia, true));
        assert!(!line.set(IrqSource::DiskVia, true));
        assert!(!line.set(IrqSource::SerialVia, false));
        assert!(line.asserted());
        assert!(line.set(IrqSource::DiskVia, false));
        assert!(!line.asserted());
    }

    #[test]
    fn sources_are_tracked_separately() {
        let mut line = IrqLine::default();
        line.set(IrqSource::Tpi, true);
        assert!(line.is_set(IrqSource::Tpi));
        assert!(!line.is_set(IrqSource::Timer));
        line.clear();
        assert!(!line.asserted());
    }
}
