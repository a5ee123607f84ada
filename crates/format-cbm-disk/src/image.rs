//! Mounted disk image: backing bytes plus the track/sector offset table.

use crate::error::DiskError;
use crate::format::{DiskFormat, SECTOR_SIZE};

/// Byte offset of the first sector of every track, built once per mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetTable {
    format: DiskFormat,
    /// `starts[t - 1]` is the offset of track `t`.
    starts: Vec<usize>,
}

impl OffsetTable {
    /// Prefix sum over the format's sectors-per-track table.
    #[must_use]
    pub fn build(format: DiskFormat) -> Self {
        let mut starts = Vec::with_capacity(usize::from(format.max_track()));
        let mut offset = 0;
        for track in 1..=format.max_track() {
            starts.push(offset);
            offset += usize::from(format.sectors_per_track(track)) * SECTOR_SIZE;
        }
        Self { format, starts }
    }

    #[must_use]
    pub fn format(&self) -> DiskFormat {
        self.format
    }

    /// Byte offset of a sector within the image (1-based track).
    ///
    /// Returns `None` for addresses outside the format.
    #[must_use]
    pub fn offset(&self, track: u8, sector: u8) -> Option<usize> {
        if sector >= self.format.sectors_per_track(track) {
            return None;
        }
        let start = self.starts.get(usize::from(track).checked_sub(1)?)?;
        Some(start + usize::from(sector) * SECTOR_SIZE)
    }

    /// Bytes of sector data on the whole disk.
    #[must_use]
    pub fn data_len(&self) -> usize {
        self.format.total_sectors() * SECTOR_SIZE
    }
}

/// The two format ID bytes every GCR header carries.
///
/// `first` is the byte stored at the format's ID location, `second` the one
/// after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiskId {
    pub first: u8,
    pub second: u8,
}

impl DiskId {
    #[must_use]
    pub const fn new(first: u8, second: u8) -> Self {
        Self { first, second }
    }
}

/// A mounted sector-dump image.
///
/// The image owns its backing buffer outright; a drive holds it by value and
/// drops it on unmount. Short (truncated) images are accepted and the missing
/// bytes read as zero.
#[derive(Debug, Clone)]
pub struct DiskImage {
    data: Vec<u8>,
    offsets: OffsetTable,
    id: DiskId,
}

impl DiskImage {
    /// Mount `data` as an image of the given format.
    #[must_use]
    pub fn mount(format: DiskFormat, data: Vec<u8>) -> Self {
        let offsets = OffsetTable::build(format);
        if data.len() < offsets.data_len() {
            log::debug!(
                "{format} image is {} bytes short, missing sectors read as zero",
                offsets.data_len() - data.len()
            );
        }
        let (track, sector, byte) = format.disk_id_location();
        let id = offsets
            .offset(track, sector)
            .map(|base| {
                let at = |i: usize| data.get(base + byte + i).copied().unwrap_or(0);
                DiskId::new(at(0), at(1))
            })
            .unwrap_or_default();
        Self { data, offsets, id }
    }

    /// Detect the format from the file extension and size, then mount.
    pub fn from_file_bytes(extension: &str, data: Vec<u8>) -> Result<Self, DiskError> {
        let format = DiskFormat::detect(extension, data.len())?;
        Ok(Self::mount(format, data))
    }

    #[must_use]
    pub fn format(&self) -> DiskFormat {
        self.offsets.format()
    }

    #[must_use]
    pub fn max_track(&self) -> u8 {
        self.format().max_track()
    }

    #[must_use]
    pub fn sectors_per_track(&self, track: u8) -> u8 {
        self.format().sectors_per_track(track)
    }

    #[must_use]
    pub fn offsets(&self) -> &OffsetTable {
        &self.offsets
    }

    /// Disk ID read once at mount time.
    #[must_use]
    pub fn disk_id(&self) -> DiskId {
        self.id
    }

    /// Copy of a 256-byte sector.
    ///
    /// Bytes past the end of a truncated image, and every byte of an address
    /// outside the format, read as zero.
    #[must_use]
    pub fn read_sector(&self, track: u8, sector: u8) -> [u8; SECTOR_SIZE] {
        let mut out = [0u8; SECTOR_SIZE];
        if let Some(offset) = self.offsets.offset(track, sector) {
            let end = (offset + SECTOR_SIZE).min(self.data.len());
            if offset < end {
                out[..end - offset].copy_from_slice(&self.data[offset..end]);
            }
        }
        out
    }

    /// Overwrite a sector. Short images grow as needed.
    ///
    /// Returns `false` for invalid addresses or data that isn't 256 bytes.
    pub fn write_sector(&mut self, track: u8, sector: u8, data: &[u8]) -> bool {
        if data.len() != SECTOR_SIZE {
            return false;
        }
        let Some(offset) = self.offsets.offset(track, sector) else {
            return false;
        };
        if self.data.len() < offset + SECTOR_SIZE {
            self.data.resize(offset + SECTOR_SIZE, 0);
        }
        self.data[offset..offset + SECTOR_SIZE].copy_from_slice(data);
        true
    }

    /// Per-sector error code for formats that carry an error map.
    ///
    /// The map follows the sector data, one byte per sector in
    /// track/sector order. `None` if the format has no map or it is missing.
    #[must_use]
    pub fn error_code(&self, track: u8, sector: u8) -> Option<u8> {
        if !self.format().has_error_info() {
            return None;
        }
        let index = self.offsets.offset(track, sector)? / SECTOR_SIZE;
        self.data.get(self.offsets.data_len() + index).copied()
    }

    /// Raw image bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Give the backing buffer back (unmount for saving).
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}
