//! Bit layouts of the drive-side ports.

use bitfield_struct::bitfield;

/// 1541 VIA1 port B ($1800): serial bus interface.
///
/// The `_in` bits read 1 while the corresponding line is pulled low; the
/// `_out` bits pull their line low when set.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct SerialPortB {
    pub data_in: bool,
    pub data_out: bool,
    pub clock_in: bool,
    pub clock_out: bool,
    /// ATNA: DATA is pulled whenever this disagrees with ATN IN.
    pub atn_ack: bool,
    /// Device-select jumpers, 0 = device 8.
    #[bits(2)]
    pub device: u8,
    pub atn_in: bool,
}

/// 1541 VIA2 port B ($1C00): head, motor and read electronics.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct DiskPortB {
    #[bits(2)]
    pub stepper: u8,
    pub motor: bool,
    pub led: bool,
    /// 1 = disk present and not write protected.
    pub write_enable: bool,
    #[bits(2)]
    pub density: u8,
    /// 0 while the read electronics see a sync mark.
    pub no_sync: bool,
}

/// 1551 6510T processor port ($0001).
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct ProcessorPort {
    #[bits(2)]
    pub stepper: u8,
    pub motor: bool,
    pub led: bool,
    pub write_enable: bool,
    #[bits(2)]
    pub density: u8,
    /// Set when a GCR byte has arrived; cleared by reading the port.
    pub byte_ready: bool,
}

/// 1551 TPI port C ($4002).
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct TpiPortC {
    /// Status lines to the host.
    #[bits(2)]
    pub status: u8,
    #[bits(1)]
    __: u8,
    /// Data-available handshake out.
    pub dav: bool,
    #[bits(1)]
    __: u8,
    /// Device-number jumper: 0 = device 8, 1 = device 9.
    pub device_9: bool,
    /// 0 while the read electronics see a sync mark.
    pub no_sync: bool,
    /// Acknowledge handshake in, from the host.
    pub ack: bool,
}

/// Head movement caused by a stepper phase change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// One half-track towards the spindle (higher track numbers).
    Inward,
    /// One half-track towards the rim.
    Outward,
    /// Same phase, or a jump of two phases the motor can't follow.
    Hold,
}

impl Step {
    /// Decode a change of the two phase bits.
    ///
    /// The phases cycle 00, 01, 10, 11: one step forward moves inward, one
    /// step back moves outward.
    #[must_use]
    pub const fn between(old: u8, new: u8) -> Self {
        match new.wrapping_sub(old) & 0x03 {
            1 => Self::Inward,
            3 => Self::Outward,
            _ => Self::Hold,
        }
    }
}
