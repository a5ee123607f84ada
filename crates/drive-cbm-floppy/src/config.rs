//! Drive configuration: model selection, device number and ROM image.

use std::ops::RangeInclusive;

/// Drive model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DriveModel {
    /// VC1541: two 6522 VIAs, serial bus.
    #[default]
    Vc1541,
    /// C1551: 6525 TPI and 6510T processor port, parallel link to a C16/Plus4.
    C1551,
}

impl DriveModel {
    /// Device numbers the drive's jumpers can select.
    #[must_use]
    pub const fn device_numbers(self) -> RangeInclusive<u8> {
        match self {
            Self::Vc1541 => 8..=11,
            Self::C1551 => 8..=9,
        }
    }

    /// Whether the drive sits on the ATN/CLK/DATA bus.
    #[must_use]
    pub const fn uses_serial_bus(self) -> bool {
        matches!(self, Self::Vc1541)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Vc1541 => "1541",
            Self::C1551 => "1551",
        }
    }
}

/// Configuration for constructing a drive.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DriveConfig {
    /// Model variant.
    pub model: DriveModel,
    /// Device number (8-11 for a 1541, 8-9 for a 1551). Out-of-range
    /// numbers wrap onto the select jumpers.
    pub device_number: u8,
    /// Drive ROM mapped at $C000 (16,384 bytes for both models). Shorter
    /// images are mirrored; an empty ROM reads $FF.
    pub rom: Vec<u8>,
}

impl DriveConfig {
    #[must_use]
    pub fn new(model: DriveModel, device_number: u8, rom: Vec<u8>) -> Self {
        Self {
            model,
            device_number,
            rom,
        }
    }

    #[must_use]
    pub fn vc1541(device_number: u8, rom: Vec<u8>) -> Self {
        Self::new(DriveModel::Vc1541, device_number, rom)
    }

    #[must_use]
    pub fn c1551(device_number: u8, rom: Vec<u8>) -> Self {
        Self::new(DriveModel::C1551, device_number, rom)
    }

    /// Jumper bits for the device number: 0 = device 8.
    #[must_use]
    pub fn device_select(&self) -> u8 {
        let mask = match self.model {
            DriveModel::Vc1541 => 0x03,
            DriveModel::C1551 => 0x01,
        };
        self.device_number.wrapping_sub(8) & mask
    }
}
