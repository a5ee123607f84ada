//! Mount-time errors.
//!
//! Only format detection can fail. Once an image is mounted every access
//! has a defined fallback value.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiskError {
    #[error("image is empty")]
    Empty,
    #[error("unsupported image format: .{0}")]
    UnsupportedFormat(String),
    #[error("unexpected size for a .{extension} image: {len} bytes")]
    UnexpectedSize { extension: String, len: usize },
}
