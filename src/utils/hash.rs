use byteorder::{BigEndian, ByteOrder};
use crc32fast::Hasher;

use crate::types::{CHECKSUM_OFFSET, CHECKSUM_SIZE};

/// CRC32 over a serialized page block, skipping the checksum field itself.
pub fn page_checksum(block: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&block[..CHECKSUM_OFFSET]);
    hasher.update(&block[CHECKSUM_OFFSET + CHECKSUM_SIZE..]);
    hasher.finalize()
}

pub fn verify_page_checksum(block: &[u8]) -> bool {
    if block.len() < CHECKSUM_OFFSET + CHECKSUM_SIZE {
        return false;
    }
    let expected = BigEndian::read_u32(&block[CHECKSUM_OFFSET..]);
    page_checksum(block) == expected
}
