//! Sector-level layout: header block, data block and the sync/gap framing.

use format_cbm_disk::{DiskId, SECTOR_SIZE};

use crate::{decode_groups, encode_group, encode_groups};

/// Sync run before each block.
pub const SYNC_LEN: usize = 5;
/// GCR length of the 8-byte header block.
pub const HEADER_BLOCK_LEN: usize = 10;
/// GCR length of the 260-byte data block.
pub const DATA_BLOCK_LEN: usize = 325;
/// Header gap and inter-sector gap, two zero groups each.
const GAP_LEN: usize = 10;

/// Offset of the header block within an encoded sector.
pub const HEADER_OFFSET: usize = SYNC_LEN;
/// Offset of the data block within an encoded sector.
pub const DATA_OFFSET: usize = HEADER_OFFSET + HEADER_BLOCK_LEN + GAP_LEN + SYNC_LEN;
/// Encoded length of one sector, framing included.
pub const SECTOR_GCR_LEN: usize = DATA_OFFSET + DATA_BLOCK_LEN + GAP_LEN;

const HEADER_MARK: u8 = 0x08;
const DATA_MARK: u8 = 0x07;
const SYNC_BYTE: u8 = 0xFF;

/// Decoded sector header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorHeader {
    pub track: u8,
    pub sector: u8,
    pub id: DiskId,
    pub checksum: u8,
}

impl SectorHeader {
    /// XOR of sector, track and both ID bytes.
    #[must_use]
    pub fn expected_checksum(&self) -> u8 {
        self.sector ^ self.track ^ self.id.first ^ self.id.second
    }

    #[must_use]
    pub fn checksum_ok(&self) -> bool {
        self.checksum == self.expected_checksum()
    }
}

/// Encode the 8-byte header block: mark, checksum, sector, track, the ID
/// bytes (second then first, as the drive writes them) and two `$0F` pads.
#[must_use]
pub fn encode_header(track: u8, sector: u8, id: DiskId) -> [u8; HEADER_BLOCK_LEN] {
    let checksum = sector ^ track ^ id.first ^ id.second;
    let a = encode_group([HEADER_MARK, checksum, sector, track]);
    let b = encode_group([id.second, id.first, 0x0F, 0x0F]);
    let mut out = [0u8; HEADER_BLOCK_LEN];
    out[..5].copy_from_slice(&a);
    out[5..].copy_from_slice(&b);
    out
}

/// Decode a header block. `None` if it isn't valid GCR or lacks the mark.
///
/// The checksum is returned as read; use [`SectorHeader::checksum_ok`].
#[must_use]
pub fn decode_header(gcr: &[u8]) -> Option<SectorHeader> {
    let raw = decode_groups(gcr.get(..HEADER_BLOCK_LEN)?)?;
    if raw[0] != HEADER_MARK {
        return None;
    }
    Some(SectorHeader {
        checksum: raw[1],
        sector: raw[2],
        track: raw[3],
        id: DiskId::new(raw[5], raw[4]),
    })
}

/// Encode a data block: mark, 256 data bytes, XOR checksum, two zero pads.
///
/// Short input is zero-extended, extra input is ignored.
#[must_use]
pub fn encode_data_block(data: &[u8]) -> Vec<u8> {
    let mut raw = [0u8; SECTOR_SIZE + 4];
    raw[0] = DATA_MARK;
    let len = data.len().min(SECTOR_SIZE);
    raw[1..=len].copy_from_slice(&data[..len]);
    raw[SECTOR_SIZE + 1] = raw[1..=SECTOR_SIZE].iter().fold(0, |acc, &b| acc ^ b);

    let mut out = Vec::with_capacity(DATA_BLOCK_LEN);
    encode_groups(&raw, &mut out);
    out
}

/// Decode a data block and verify its mark and checksum.
#[must_use]
pub fn decode_data_block(gcr: &[u8]) -> Option<Vec<u8>> {
    let raw = decode_groups(gcr.get(..DATA_BLOCK_LEN)?)?;
    if raw[0] != DATA_MARK {
        return None;
    }
    let data = &raw[1..=SECTOR_SIZE];
    let checksum = data.iter().fold(0, |acc, &b| acc ^ b);
    (checksum == raw[SECTOR_SIZE + 1]).then(|| data.to_vec())
}

fn push_gap(out: &mut Vec<u8>) {
    let zero = encode_group([0; 4]);
    out.extend_from_slice(&zero);
    out.extend_from_slice(&zero);
}

/// Encode one complete sector: sync, header, gap, sync, data, gap.
#[must_use]
pub fn encode_sector(track: u8, sector: u8, id: DiskId, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(SECTOR_GCR_LEN);
    out.extend_from_slice(&[SYNC_BYTE; SYNC_LEN]);
    out.extend_from_slice(&encode_header(track, sector, id));
    push_gap(&mut out);
    out.extend_from_slice(&[SYNC_BYTE; SYNC_LEN]);
    out.extend_from_slice(&encode_data_block(data));
    push_gap(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode_group;
    use quickcheck::quickcheck;

    #[test]
    fn sector_layout() {
        let gcr = encode_sector(1, 0, DiskId::new(0x41, 0x42), &[0; SECTOR_SIZE]);
        assert_eq!(gcr.len(), SECTOR_GCR_LEN);
        assert_eq!(SECTOR_GCR_LEN, 365);
        assert!(gcr[..SYNC_LEN].iter().all(|&b| b == SYNC_BYTE));
        assert!(gcr[DATA_OFFSET - SYNC_LEN..DATA_OFFSET].iter().all(|&b| b == SYNC_BYTE));
        assert_eq!(&gcr[15..20], &[0x52, 0x94, 0xA5, 0x29, 0x4A]);
        assert_eq!(&gcr[360..365], &[0x52, 0x94, 0xA5, 0x29, 0x4A]);
    }

    #[test]
    fn header_follows_sync() {
        let gcr = encode_sector(18, 0, DiskId::new(0x41, 0x42), &[]);
        let first = decode_group(&[gcr[5], gcr[6], gcr[7], gcr[8], gcr[9]]).expect("valid gcr");
        assert_eq!(first[0], HEADER_MARK);
        assert_eq!(first[2], 0); // sector
        assert_eq!(first[3], 18); // track
    }

    #[test]
    fn header_decodes_with_id_order() {
        let id = DiskId::new(0x30, 0x31);
        let header = decode_header(&encode_header(17, 20, id)).expect("valid header");
        assert_eq!(header.track, 17);
        assert_eq!(header.sector, 20);
        assert_eq!(header.id, id);
        assert!(header.checksum_ok());

        let raw = decode_groups(&encode_header(17, 20, id)).expect("valid gcr");
        assert_eq!(raw[4], 0x31);
        assert_eq!(raw[5], 0x30);
    }

    #[test]
    fn data_block_round_trip_and_checksum() {
        let data: Vec<u8> = (0..=255).collect();
        let gcr = encode_data_block(&data);
        assert_eq!(gcr.len(), DATA_BLOCK_LEN);
        assert_eq!(decode_data_block(&gcr), Some(data));

        let mut corrupt = gcr.clone();
        // Data bytes 3..7 become 9,9,9,9: XOR 0 instead of 4.
        corrupt[5..10].copy_from_slice(&encode_group([9, 9, 9, 9]));
        assert_eq!(decode_data_block(&corrupt), None);
    }

    #[test]
    fn short_data_is_zero_filled() {
        let gcr = encode_data_block(&[0xAA]);
        let data = decode_data_block(&gcr).expect("valid block");
        assert_eq!(data[0], 0xAA);
        assert!(data[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn wrong_mark_rejected() {
        let mut gcr = encode_header(1, 1, DiskId::default());
        gcr[..5].copy_from_slice(&encode_group([0x07, 0, 1, 1]));
        assert_eq!(decode_header(&gcr), None);
        assert_eq!(decode_header(&gcr[..4]), None);
    }

    quickcheck! {
        fn header_checksum_is_xor(track: u8, sector: u8, a: u8, b: u8) -> bool {
            let id = DiskId::new(a, b);
            decode_header(&encode_header(track, sector, id))
                .is_some_and(|h| h.checksum == track ^ sector ^ a ^ b && h.checksum_ok())
        }
    }
}
