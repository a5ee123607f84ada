use bitfield_struct::bitfield;

/// Control register ($6).
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct Control {
    /// MC: port C low bits become interrupt inputs, DDRC their mask.
    pub interrupt_mode: bool,
    /// IP: the AIR reports and clears one source at a time.
    pub priorized: bool,
    pub i3_rising: bool,
    pub i4_rising: bool,
    #[bits(2)]
    pub ca_mode: u8,
    #[bits(2)]
    pub cb_mode: u8,
}

impl Control {
    /// CA level when CA is in manual mode (mode bit 1 set).
    #[must_use]
    pub const fn ca_manual_level(self) -> Option<bool> {
        manual_level(self.ca_mode())
    }

    /// CB level when CB is in manual mode (mode bit 1 set).
    #[must_use]
    pub const fn cb_manual_level(self) -> Option<bool> {
        manual_level(self.cb_mode())
    }
}

const fn manual_level(mode: u8) -> Option<bool> {
    if mode & 0b10 != 0 {
        Some(mode & 0b01 != 0)
    } else {
        None
    }
}
