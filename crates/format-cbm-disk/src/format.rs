//! Image format variants and their zone tables.
//!
//! Commodore drives record more sectors on the longer outer tracks. Each
//! format is a table of sectors per track; 256-byte sectors throughout.
//!
//! | Format | Tracks | Sectors/track               |
//! |--------|--------|-----------------------------|
//! | D64    | 35     | 21 / 19 / 18 / 17           |
//! | D64-40 | 40     | as D64, tracks 36-40 = 17   |
//! | D71    | 70     | D64 zoning, once per side   |
//! | D81    | 80     | 40                          |
//! | D80    | 77     | 29 / 27 / 25 / 23           |
//! | D82    | 154    | D80 zoning, once per side   |

use crate::error::DiskError;

/// Bytes per sector in every supported format.
pub const SECTOR_SIZE: usize = 256;

/// 1541-family zoning. Tracks 36-42 exist on 40-track disks and in principle
/// the drive can seek to 42.
const D64_SECTORS: [u8; 42] = [
    21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, // 1-17
    19, 19, 19, 19, 19, 19, 19, // 18-24
    18, 18, 18, 18, 18, 18, // 25-30
    17, 17, 17, 17, 17, // 31-35
    17, 17, 17, 17, 17, // 36-40
    17, 17, // 41-42
];

/// 8050/8250 zoning for one side.
const D80_SECTORS: [u8; 77] = {
    let mut table = [0u8; 77];
    let mut i = 0;
    while i < 77 {
        table[i] = match i {
            0..=38 => 29,
            39..=52 => 27,
            53..=63 => 25,
            _ => 23,
        };
        i += 1;
    }
    table
};

/// Sectors per track on a D81 (3.5" MFM, but stored the same way).
const D81_SECTORS: u8 = 40;

/// A sector-dump image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DiskFormat {
    /// 35-track 1541 image.
    D64,
    /// 35-track image followed by one error byte per sector.
    D64WithErrors,
    /// 40-track 1541 image.
    D64Extended,
    /// 40-track image with error bytes.
    D64ExtendedWithErrors,
    /// 2040/3040 image (stored with 1541 zoning).
    D67,
    /// 70-track double-sided 1571 image.
    D71,
    /// 1571 image with error bytes.
    D71WithErrors,
    /// 80-track 1581 image, 40 sectors per track.
    D81,
    /// 77-track 8050 image.
    D80,
    /// 154-track double-sided 8250 image.
    D82,
}

impl DiskFormat {
    /// Number of tracks on the disk.
    #[must_use]
    pub const fn max_track(self) -> u8 {
        match self {
            Self::D64 | Self::D64WithErrors | Self::D67 => 35,
            Self::D64Extended | Self::D64ExtendedWithErrors => 40,
            Self::D71 | Self::D71WithErrors => 70,
            Self::D81 => 80,
            Self::D80 => 77,
            Self::D82 => 154,
        }
    }

    /// Sectors on `track` (1-based). Zero for tracks outside the format.
    #[must_use]
    pub const fn sectors_per_track(self, track: u8) -> u8 {
        if track == 0 || track > self.max_track() {
            return 0;
        }
        let index = (track - 1) as usize;
        match self {
            Self::D64
            | Self::D64WithErrors
            | Self::D64Extended
            | Self::D64ExtendedWithErrors
            | Self::D67 => D64_SECTORS[index],
            Self::D71 | Self::D71WithErrors => D64_SECTORS[index % 35],
            Self::D81 => D81_SECTORS,
            Self::D80 => D80_SECTORS[index],
            Self::D82 => D80_SECTORS[index % 77],
        }
    }

    /// Total sectors on the disk.
    #[must_use]
    pub fn total_sectors(self) -> usize {
        (1..=self.max_track())
            .map(|t| usize::from(self.sectors_per_track(t)))
            .sum()
    }

    /// Whether the image carries one error byte per sector after the data.
    #[must_use]
    pub const fn has_error_info(self) -> bool {
        matches!(
            self,
            Self::D64WithErrors | Self::D64ExtendedWithErrors | Self::D71WithErrors
        )
    }

    /// Size in bytes of a complete image of this format.
    #[must_use]
    pub fn image_len(self) -> usize {
        let sectors = self.total_sectors();
        let data = sectors * SECTOR_SIZE;
        if self.has_error_info() {
            data + sectors
        } else {
            data
        }
    }

    /// Where the two disk ID bytes live: (track, sector, byte within sector).
    #[must_use]
    pub const fn disk_id_location(self) -> (u8, u8, usize) {
        match self {
            Self::D81 => (40, 0, 0x16),
            Self::D80 | Self::D82 => (39, 0, 0x18),
            _ => (18, 0, 0xA2),
        }
    }

    /// Usual file extension, without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::D64 | Self::D64WithErrors | Self::D64Extended | Self::D64ExtendedWithErrors => {
                "d64"
            }
            Self::D67 => "d67",
            Self::D71 | Self::D71WithErrors => "d71",
            Self::D81 => "d81",
            Self::D80 => "d80",
            Self::D82 => "d82",
        }
    }

    /// Pick a format from the file extension and length, the way the mount
    /// layer does it: D64 and D71 are told apart by size, the rest by name.
    pub fn detect(extension: &str, len: usize) -> Result<Self, DiskError> {
        if len == 0 {
            return Err(DiskError::Empty);
        }
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        let by_size = |candidates: &[Self]| {
            candidates
                .iter()
                .copied()
                .find(|f| f.image_len() == len)
                .ok_or(DiskError::UnexpectedSize {
                    extension: ext.clone(),
                    len,
                })
        };
        match ext.as_str() {
            "d64" => by_size(&[
                Self::D64,
                Self::D64WithErrors,
                Self::D64Extended,
                Self::D64ExtendedWithErrors,
            ]),
            "d71" => by_size(&[Self::D71, Self::D71WithErrors]),
            "d67" => Ok(Self::D67),
            "d81" => Ok(Self::D81),
            "d80" => Ok(Self::D80),
            "d82" => Ok(Self::D82),
            _ => Err(DiskError::UnsupportedFormat(ext)),
        }
    }
}

impl std::fmt::Display for DiskFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let suffix = match self {
            Self::D64Extended => "-40",
            Self::D64WithErrors | Self::D71WithErrors => "+err",
            Self::D64ExtendedWithErrors => "-40+err",
            _ => "",
        };
        write!(f, "{}{suffix}", self.extension())
    }
}
