//! GCR (Group Code Recording) for Commodore disk drives.
//!
//! Every 4 bits of data are written as a 5-bit code chosen so that the flux
//! stream never has more than two consecutive zeros, which keeps the read
//! clock locked. Four data bytes therefore occupy five bytes on disk.
//!
//! A sector as this crate lays it out:
//!
//! | Offset | Len | Content                                   |
//! |--------|-----|-------------------------------------------|
//! | 0      | 5   | header sync, `$FF`                        |
//! | 5      | 10  | header block (8 raw bytes)                |
//! | 15     | 10  | header gap, two GCR groups of `$00`       |
//! | 25     | 5   | data sync, `$FF`                          |
//! | 30     | 325 | data block (260 raw bytes)                |
//! | 355    | 10  | inter-sector gap, two GCR groups of `$00` |

mod sector;
mod zone;

pub use sector::{
    DATA_BLOCK_LEN, DATA_OFFSET, HEADER_BLOCK_LEN, HEADER_OFFSET, SECTOR_GCR_LEN, SYNC_LEN,
    SectorHeader, decode_data_block, decode_header, encode_data_block, encode_header,
    encode_sector,
};
pub use zone::{SpeedZone, speed_zone};

/// 4-bit to 5-bit GCR encoding table.
const GCR_ENCODE: [u8; 16] = [
    0x0A, 0x0B, 0x12, 0x13, 0x0E, 0x0F, 0x16, 0x17,
    0x09, 0x19, 0x1A, 0x1B, 0x0D, 0x1D, 0x1E, 0x15,
];

/// 5-bit to 4-bit decoding table. `0xFF` marks codes that never occur.
const GCR_DECODE: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, // 00-07
    0xFF, 0x08, 0x00, 0x01, 0xFF, 0x0C, 0x04, 0x05, // 08-0F
    0xFF, 0xFF, 0x02, 0x03, 0xFF, 0x0F, 0x06, 0x07, // 10-17
    0xFF, 0x09, 0x0A, 0x0B, 0xFF, 0x0D, 0x0E, 0xFF, // 18-1F
];

/// Encode 4 raw bytes into 5 GCR bytes.
///
/// The eight nibbles become eight 5-bit codes packed MSB-first across the
/// five output bytes.
#[must_use]
pub fn encode_group(input: [u8; 4]) -> [u8; 5] {
    let mut codes = [0u8; 8];
    for (i, byte) in input.iter().enumerate() {
        codes[i * 2] = GCR_ENCODE[usize::from(byte >> 4)];
        codes[i * 2 + 1] = GCR_ENCODE[usize::from(byte & 0x0F)];
    }

    [
        (codes[0] << 3) | (codes[1] >> 2),
        (codes[1] << 6) | (codes[2] << 1) | (codes[3] >> 4),
        (codes[3] << 4) | (codes[4] >> 1),
        (codes[4] << 7) | (codes[5] << 2) | (codes[6] >> 3),
        (codes[6] << 5) | codes[7],
    ]
}

/// Decode 5 GCR bytes into 4 raw bytes.
///
/// Returns `None` if any 5-bit code is not in the table.
#[must_use]
pub fn decode_group(input: &[u8; 5]) -> Option<[u8; 4]> {
    let codes = [
        (input[0] >> 3) & 0x1F,
        ((input[0] << 2) | (input[1] >> 6)) & 0x1F,
        (input[1] >> 1) & 0x1F,
        ((input[1] << 4) | (input[2] >> 4)) & 0x1F,
        ((input[2] << 1) | (input[3] >> 7)) & 0x1F,
        (input[3] >> 2) & 0x1F,
        ((input[3] << 3) | (input[4] >> 5)) & 0x1F,
        input[4] & 0x1F,
    ];

    let mut nibbles = [0u8; 8];
    for (nibble, code) in nibbles.iter_mut().zip(codes) {
        *nibble = GCR_DECODE[usize::from(code)];
        if *nibble == 0xFF {
            return None;
        }
    }

    Some([
        (nibbles[0] << 4) | nibbles[1],
        (nibbles[2] << 4) | nibbles[3],
        (nibbles[4] << 4) | nibbles[5],
        (nibbles[6] << 4) | nibbles[7],
    ])
}

/// Encode a run of raw bytes (a multiple of 4 long) group by group.
fn encode_groups(raw: &[u8], out: &mut Vec<u8>) {
    for chunk in raw.chunks_exact(4) {
        out.extend_from_slice(&encode_group([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
}

/// Decode a run of GCR bytes (a multiple of 5 long).
fn decode_groups(gcr: &[u8]) -> Option<Vec<u8>> {
    let mut raw = Vec::with_capacity(gcr.len() / 5 * 4);
    for chunk in gcr.chunks_exact(5) {
        raw.extend_from_slice(&decode_group(&[chunk[0], chunk[1], chunk[2], chunk[3], chunk[4]])?);
    }
    Some(raw)
}
