//! Commodore sector-dump disk images.
//!
//! A sector dump is a flat file: tracks in ascending order from track 1,
//! each holding the format's number of 256-byte sectors, no header. Some
//! variants append one error byte per sector.

mod error;
mod format;
mod image;

pub use error::DiskError;
pub use format::{DiskFormat, SECTOR_SIZE};
pub use image::{DiskId, DiskImage, OffsetTable};
